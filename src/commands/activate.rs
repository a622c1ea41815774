//! Manual activation override: `nightshade on | off | toggle`.
//!
//! The override is written to the state file like any other activation
//! change, timestamp included. A running daemon notices the edit through its
//! file watcher and treats it as an external toggle, which the auto-mode
//! keeps until the next schedule boundary.

use anyhow::Result;
use std::sync::Arc;

use crate::args::Override;
use crate::io::state::{StateFile, default_state_path};
use crate::time::TimeSource;

/// Apply `request` to the state file. Returns the resulting value and
/// whether anything changed.
pub fn apply_override(state_file: &StateFile, request: Override) -> Result<(bool, bool)> {
    let current = state_file.load()?.is_activated();
    let target = request.resolve(current);
    let changed = state_file.set_activated(target)?;
    Ok((target, changed))
}

/// Handle the on/off/toggle subcommands.
pub fn handle_activate_command(request: Override, debug_enabled: bool) -> Result<()> {
    log_version!();

    let clock: Arc<dyn TimeSource> = crate::time::source::shared();
    let state_file = StateFile::new(default_state_path()?, clock);
    let (activated, changed) = apply_override(&state_file, request)?;

    let word = if activated { "on" } else { "off" };
    if changed {
        log_block_start!("Night display turned {word}");
    } else {
        log_block_start!("Night display is already {word}");
    }
    if debug_enabled {
        log_pipe!();
        log_debug!("State file: {}", state_file.path().display());
    }

    match crate::io::instance::get_running_instance() {
        Ok(Some(info)) => {
            log_indented!("The running daemon (PID {}) will pick it up", info.pid);
        }
        _ => log_indented!("No daemon is running; the value applies on next start"),
    }
    log_end!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualTimeSource;
    use chrono::{Local, TimeZone};
    use tempfile::tempdir;

    fn state_file(dir: &std::path::Path) -> (StateFile, Arc<ManualTimeSource>) {
        let start = Local.with_ymd_and_hms(2024, 1, 15, 21, 0, 0).single().unwrap();
        let clock = Arc::new(ManualTimeSource::new(start));
        (StateFile::new(dir.join("state.toml"), clock.clone()), clock)
    }

    #[test]
    fn test_toggle_flips_and_stamps() {
        let dir = tempdir().unwrap();
        let (file, clock) = state_file(dir.path());

        assert_eq!(apply_override(&file, Override::Toggle).unwrap(), (true, true));
        let stamped = file.load().unwrap().last_activated_time;
        assert_eq!(stamped, Some(clock.now().naive_local()));

        clock.advance(chrono::Duration::minutes(5));
        assert_eq!(apply_override(&file, Override::Toggle).unwrap(), (false, true));
        assert_eq!(
            file.load().unwrap().last_activated_time,
            Some(clock.now().naive_local())
        );
    }

    #[test]
    fn test_repeated_on_keeps_timestamp() {
        let dir = tempdir().unwrap();
        let (file, clock) = state_file(dir.path());

        apply_override(&file, Override::On).unwrap();
        let first = file.load().unwrap().last_activated_time;

        clock.advance(chrono::Duration::minutes(5));
        assert_eq!(apply_override(&file, Override::On).unwrap(), (true, false));
        assert_eq!(file.load().unwrap().last_activated_time, first);
    }

    #[test]
    fn test_off_on_fresh_file_records_value_only() {
        let dir = tempdir().unwrap();
        let (file, _clock) = state_file(dir.path());

        // Off is already the effective value of a missing file
        assert_eq!(apply_override(&file, Override::Off).unwrap(), (false, false));
        let state = file.load().unwrap();
        assert_eq!(state.activated, Some(false));
        assert_eq!(state.last_activated_time, None);
    }
}
