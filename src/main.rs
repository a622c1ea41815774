//! Binary entry point: parse arguments and dispatch.

use anyhow::Result;

use nightshade::args::{CliAction, ParsedArgs};
use nightshade::commands;
use nightshade::common::constants::EXIT_FAILURE;
use nightshade::{Nightshade, config, log_error_exit, log_pipe, log_warning};

fn main() -> Result<()> {
    let parsed = ParsedArgs::from_env();

    match parsed.action {
        CliAction::ShowVersion => {
            commands::help::display_version_info();
            Ok(())
        }
        CliAction::ShowHelp => {
            commands::help::display_help();
            Ok(())
        }
        CliAction::ShowHelpDueToError => {
            log_pipe!();
            log_warning!("Unknown arguments");
            commands::help::display_help();
            std::process::exit(EXIT_FAILURE);
        }
        CliAction::Run {
            debug_enabled,
            config_dir,
        } => {
            config::set_config_dir(config_dir)?;
            Nightshade::new(debug_enabled).run()
        }
        CliAction::Status {
            debug_enabled,
            config_dir,
        } => {
            config::set_config_dir(config_dir)?;
            commands::status::handle_status_command(debug_enabled)
        }
        CliAction::Activate {
            debug_enabled,
            config_dir,
            request,
        } => {
            config::set_config_dir(config_dir)?;
            commands::activate::handle_activate_command(request, debug_enabled)
        }
        CliAction::Reload { debug_enabled } => {
            if let Err(e) = commands::reload::handle_reload_command(debug_enabled) {
                log_error_exit!("Reload failed: {e:#}");
                std::process::exit(EXIT_FAILURE);
            }
            Ok(())
        }
    }
}
