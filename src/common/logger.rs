//! Structured logging with box-drawing output.
//!
//! Every line nightshade prints goes through the macros in this module so the
//! daemon's output reads as one continuous tree:
//!
//! ```text
//! ┏ nightshade v0.1.0 ━━╸
//! ┃
//! ┣ Loaded default configuration
//! ┃   Mode: Custom (22:00 → 06:00)
//! ┃
//! ┣[INFO] Turning on night display
//! ╹
//! ```
//!
//! ## Conventions
//!
//! - **`log_block_start!`** opens a new conceptual block (mode changes, startup
//!   phases). It prepends an empty `┃` line for spacing.
//! - **`log_decorated!`** continues the current block with `┣ message`.
//! - **`log_indented!`** prints nested detail as `┃   message`.
//! - **`log_pipe!`** inserts a single `┃` spacer, normally right before a
//!   semantic message (`log_info!`, `log_warning!`, ...) that starts a block.
//! - **`log_version!`** / **`log_end!`** print the header and the final `╹`.
//! - **`log_info!`, `log_warning!`, `log_error!`, `log_debug!`,
//!   `log_critical!`** carry a colored `[LEVEL]` tag.
//! - **`log_error_exit!`** closes the tree with `┗[ERROR]` before an exit.
//!
//! Logging can be switched off at runtime (`Log::set_enabled(false)`), which
//! the CLI commands use for quiet one-shot output and the tests use to keep
//! the harness output readable.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

static LOGGING_ENABLED: AtomicBool = AtomicBool::new(true);

/// The shape of a single emitted line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Decorated,
    Indented,
    BlockStart,
    Info,
    Warning,
    Error,
    ErrorExit,
    Debug,
    Critical,
}

/// Main logging interface.
pub struct Log;

impl Log {
    /// Enable or disable logging.
    pub fn set_enabled(enabled: bool) {
        LOGGING_ENABLED.store(enabled, Ordering::SeqCst);
    }

    /// Check if logging is currently enabled.
    pub fn is_enabled() -> bool {
        LOGGING_ENABLED.load(Ordering::SeqCst)
    }

    /// Timestamp prefix shown when the process runs on a simulated clock.
    ///
    /// Real-time runs get no prefix; the terminal or journal already stamps
    /// each line.
    pub fn get_timestamp_prefix() -> String {
        if crate::time::source::is_initialized() && crate::time::source::is_simulated() {
            format!("[{}] ", crate::time::source::now().format("%Y-%m-%d %H:%M:%S"))
        } else {
            String::new()
        }
    }
}

fn render(kind: LineKind, prefix: &str, message: &str) -> String {
    match kind {
        LineKind::Decorated => format!("{prefix}┣ {message}\n"),
        LineKind::Indented => format!("{prefix}┃   {message}\n"),
        LineKind::BlockStart => format!("{prefix}┃\n{prefix}┣ {message}\n"),
        LineKind::Info => format!("{prefix}┣[\x1b[32mINFO\x1b[0m] {message}\n"),
        LineKind::Warning => format!("{prefix}┣[\x1b[33mWARNING\x1b[0m] {message}\n"),
        LineKind::Error => format!("{prefix}┣[\x1b[31mERROR\x1b[0m] {message}\n"),
        LineKind::ErrorExit => format!("{prefix}┃\n{prefix}┗[\x1b[31mERROR\x1b[0m] {message}\n"),
        LineKind::Debug => format!("{prefix}┣[\x1b[32mDEBUG\x1b[0m] {message}\n"),
        LineKind::Critical => format!("{prefix}┣[\x1b[31mCRITICAL\x1b[0m] {message}\n"),
    }
}

/// Format and print one line if logging is enabled (used by the macros).
pub fn emit(kind: LineKind, message: &str) {
    if Log::is_enabled() {
        let prefix = Log::get_timestamp_prefix();
        write_output(&render(kind, &prefix, message));
    }
}

/// Print raw, already formatted text if logging is enabled.
pub fn emit_raw(text: &str) {
    if Log::is_enabled() {
        let prefix = Log::get_timestamp_prefix();
        write_output(&format!("{prefix}{text}"));
    }
}

pub fn write_output(text: &str) {
    print!("{text}");
    let _ = std::io::stdout().flush();
}

// # Logging Macros

#[doc(hidden)]
#[macro_export]
macro_rules! __log_line {
    ($kind:ident, $fmt:literal $($arg:tt)*) => {
        $crate::common::logger::emit(
            $crate::common::logger::LineKind::$kind,
            &format!($fmt $($arg)*),
        )
    };
    ($kind:ident, $expr:expr) => {
        $crate::common::logger::emit(
            $crate::common::logger::LineKind::$kind,
            &($expr).to_string(),
        )
    };
}

/// Log a decorated message as part of the current block.
#[macro_export]
macro_rules! log_decorated {
    ($($arg:tt)+) => { $crate::__log_line!(Decorated, $($arg)+) };
}

/// Log an indented detail line.
#[macro_export]
macro_rules! log_indented {
    ($($arg:tt)+) => { $crate::__log_line!(Indented, $($arg)+) };
}

/// Log a block start message.
#[macro_export]
macro_rules! log_block_start {
    ($($arg:tt)+) => { $crate::__log_line!(BlockStart, $($arg)+) };
}

/// Log an informational message.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)+) => { $crate::__log_line!(Info, $($arg)+) };
}

/// Log a warning.
#[macro_export]
macro_rules! log_warning {
    ($($arg:tt)+) => { $crate::__log_line!(Warning, $($arg)+) };
}

/// Log an error.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)+) => { $crate::__log_line!(Error, $($arg)+) };
}

/// Log an error that terminates the current flow.
#[macro_export]
macro_rules! log_error_exit {
    ($($arg:tt)+) => { $crate::__log_line!(ErrorExit, $($arg)+) };
}

/// Log a debug message. Callers gate these on their `debug_enabled` flag.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)+) => { $crate::__log_line!(Debug, $($arg)+) };
}

/// Log a critical message.
#[macro_export]
macro_rules! log_critical {
    ($($arg:tt)+) => { $crate::__log_line!(Critical, $($arg)+) };
}

/// Log a visual pipe separator for vertical spacing.
#[macro_export]
macro_rules! log_pipe {
    () => {
        $crate::common::logger::emit_raw("┃\n")
    };
}

/// Log the application version header.
#[macro_export]
macro_rules! log_version {
    () => {
        $crate::common::logger::emit_raw(&format!(
            "┏ nightshade v{} ━━╸\n",
            env!("CARGO_PKG_VERSION")
        ))
    };
}

/// Log the final termination marker.
#[macro_export]
macro_rules! log_end {
    () => {
        $crate::common::logger::emit_raw("╹\n")
    };
}
