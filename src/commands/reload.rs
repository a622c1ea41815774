//! Reload command: ask the running daemon to re-read its configuration.

use anyhow::Result;

use crate::io::instance;

/// Handle `nightshade reload`.
pub fn handle_reload_command(debug_enabled: bool) -> Result<()> {
    log_version!();

    match instance::get_running_instance()? {
        Some(info) => {
            if debug_enabled {
                log_pipe!();
                log_debug!("Found nightshade instance with PID {}", info.pid);
            }
            instance::send_reload_signal(info.pid)?;
            log_block_start!("Sent reload signal to nightshade (PID: {})", info.pid);
            log_indented!("The running daemon will reload its configuration");
        }
        None => {
            log_pipe!();
            log_warning!("No nightshade process is running");
            log_indented!("Start it with 'nightshade' or 'nightshade --debug'");
        }
    }

    log_end!();
    Ok(())
}
