//! Command-line argument parsing and processing.
//!
//! Arguments are parsed by hand: a handful of flags (`--debug`, `--config`,
//! `--help`, `--version`) may appear anywhere, and at most one subcommand
//! selects what to do. Without a subcommand the daemon runs.

/// Manual activation override requested from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Override {
    On,
    Off,
    Toggle,
}

impl Override {
    /// The value to write given the currently persisted one.
    pub fn resolve(self, currently_activated: bool) -> bool {
        match self {
            Override::On => true,
            Override::Off => false,
            Override::Toggle => !currently_activated,
        }
    }
}

/// Represents the parsed command-line arguments and their intended actions.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// Run the daemon
    Run {
        debug_enabled: bool,
        config_dir: Option<String>,
    },
    /// Print the current state and what the auto-mode would decide
    Status {
        debug_enabled: bool,
        config_dir: Option<String>,
    },
    /// Write a manual activation override
    Activate {
        debug_enabled: bool,
        config_dir: Option<String>,
        request: Override,
    },
    /// Ask the running daemon to reload its configuration
    Reload { debug_enabled: bool },

    /// Display help information and exit
    ShowHelp,
    /// Display version information and exit
    ShowVersion,
    /// Show help due to unknown arguments and exit
    ShowHelpDueToError,
}

/// Result of parsing command-line arguments.
pub struct ParsedArgs {
    pub action: CliAction,
}

impl ParsedArgs {
    /// Parse command-line arguments into a structured result.
    ///
    /// The first item is the program name and is skipped.
    pub fn parse<I, S>(args: I) -> ParsedArgs
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut debug_enabled = false;
        let mut display_help = false;
        let mut display_version = false;
        let mut unknown_arg_found = false;
        let mut config_dir: Option<String> = None;
        let mut subcommand: Option<String> = None;

        let args_vec: Vec<String> = args
            .into_iter()
            .skip(1)
            .map(|s| s.as_ref().to_string())
            .collect();

        let mut i = 0;
        while i < args_vec.len() {
            let arg = args_vec[i].as_str();
            match arg {
                "--help" | "-h" => display_help = true,
                "--version" | "-V" | "-v" => display_version = true,
                "--debug" | "-d" => debug_enabled = true,
                "--config" | "-c" => {
                    if let Some(dir) = args_vec.get(i + 1) {
                        config_dir = Some(dir.clone());
                        i += 1;
                    } else {
                        unknown_arg_found = true;
                    }
                }
                _ if arg.starts_with("--config=") => {
                    config_dir = Some(arg["--config=".len()..].to_string());
                }
                _ if arg.starts_with('-') => unknown_arg_found = true,
                _ if subcommand.is_none() => subcommand = Some(arg.to_string()),
                // A second positional argument
                _ => unknown_arg_found = true,
            }
            i += 1;
        }

        let action = if display_version {
            CliAction::ShowVersion
        } else if unknown_arg_found {
            CliAction::ShowHelpDueToError
        } else if display_help {
            CliAction::ShowHelp
        } else {
            match subcommand.as_deref() {
                None | Some("run") => CliAction::Run {
                    debug_enabled,
                    config_dir,
                },
                Some("status") => CliAction::Status {
                    debug_enabled,
                    config_dir,
                },
                Some("on") => CliAction::Activate {
                    debug_enabled,
                    config_dir,
                    request: Override::On,
                },
                Some("off") => CliAction::Activate {
                    debug_enabled,
                    config_dir,
                    request: Override::Off,
                },
                Some("toggle") => CliAction::Activate {
                    debug_enabled,
                    config_dir,
                    request: Override::Toggle,
                },
                Some("reload") => CliAction::Reload { debug_enabled },
                Some("help") => CliAction::ShowHelp,
                Some("version") => CliAction::ShowVersion,
                Some(_) => CliAction::ShowHelpDueToError,
            }
        };

        ParsedArgs { action }
    }

    /// Parse from the process arguments.
    pub fn from_env() -> ParsedArgs {
        Self::parse(std::env::args())
    }
}
