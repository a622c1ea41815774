//! Help and version output.

/// Display version information.
pub fn display_version_info() {
    log_version!();
    log_pipe!();
    println!("nightshade {}", env!("CARGO_PKG_VERSION"));
    log_end!();
}

/// Display general usage.
pub fn display_help() {
    log_version!();
    log_block_start!("{}", env!("CARGO_PKG_DESCRIPTION"));
    log_block_start!("Usage: nightshade [OPTIONS] [COMMAND]");
    log_block_start!("Commands:");
    log_indented!("run             Run the night display daemon (default)");
    log_indented!("status          Show activation, schedule and the pending decision");
    log_indented!("on, off         Turn night display on or off until the next boundary");
    log_indented!("toggle          Flip the current activation state");
    log_indented!("reload          Ask the running daemon to reload its configuration");
    log_indented!("help, version   Show this help or the version");
    log_block_start!("Options:");
    log_indented!("-c, --config <DIR>  Use a custom configuration directory");
    log_indented!("-d, --debug         Enable detailed debug output");
    log_indented!("-h, --help          Print help information");
    log_indented!("-V, --version       Print version information");
    log_end!();
}
