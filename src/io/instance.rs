//! Instance management for nightshade processes.
//!
//! The running daemon records its PID and config directory in the lock
//! file. CLI commands read it to find the daemon and signal it.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::io::lock::{self, LockFile};

/// Information about a running nightshade instance.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceInfo {
    pub pid: u32,
    /// Custom config directory if set
    pub config_dir: Option<PathBuf>,
}

impl InstanceInfo {
    /// Parse instance info from lock file contents.
    ///
    /// Line 1 holds the PID, line 2 the config directory (empty for the
    /// default location).
    pub fn from_lock_contents(contents: &str) -> Result<Self> {
        let mut lines = contents.lines();
        let pid = lines
            .next()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .context("Lock file is empty")?
            .parse::<u32>()
            .context("Invalid PID format in lock file")?;

        let config_dir = lines
            .next()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(PathBuf::from);

        if lines.any(|line| !line.trim().is_empty()) {
            anyhow::bail!("Invalid lock file format (expected at most 2 lines)");
        }

        Ok(InstanceInfo { pid, config_dir })
    }

    pub fn to_lock_contents(&self) -> String {
        match &self.config_dir {
            Some(dir) => format!("{}\n{}\n", self.pid, dir.display()),
            None => format!("{}\n\n", self.pid),
        }
    }
}

/// Get information about the currently running instance, if any.
pub fn get_running_instance() -> Result<Option<InstanceInfo>> {
    let lock_path = lock::get_main_lock_path();
    let Ok(contents) = std::fs::read_to_string(&lock_path) else {
        return Ok(None);
    };
    if contents.trim().is_empty() {
        return Ok(None);
    }

    let info = InstanceInfo::from_lock_contents(&contents)?;
    if is_instance_running(info.pid) {
        Ok(Some(info))
    } else {
        Ok(None)
    }
}

/// Check if a process with the given PID is still running.
pub fn is_instance_running(pid: u32) -> bool {
    Path::new(&format!("/proc/{pid}")).exists()
}

/// Send a reload signal (SIGUSR2) to a running instance.
pub fn send_reload_signal(pid: u32) -> Result<()> {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid as i32), Signal::SIGUSR2)
        .map_err(|e| anyhow::anyhow!("Failed to send reload signal: {e}"))
}

/// Take the single-instance lock and record ourselves in it.
///
/// A lock left by a dead process is cleaned up; a live holder is an error.
pub fn ensure_single_instance() -> Result<(LockFile, PathBuf)> {
    let lock_path = lock::get_main_lock_path();

    if let Some(lock) = LockFile::try_acquire(&lock_path)? {
        return claim(lock, lock_path);
    }

    handle_instance_conflict(&lock_path)?;

    match LockFile::try_acquire(&lock_path)? {
        Some(lock) => claim(lock, lock_path),
        None => anyhow::bail!("Failed to acquire lock after conflict resolution"),
    }
}

fn claim(mut lock: LockFile, lock_path: PathBuf) -> Result<(LockFile, PathBuf)> {
    let info = InstanceInfo {
        pid: std::process::id(),
        config_dir: crate::config::get_custom_config_dir(),
    };
    lock.write(&info.to_lock_contents())?;
    Ok((lock, lock_path))
}

/// Resolve a held lock: stale or unreadable locks are removed, a live
/// instance is reported.
fn handle_instance_conflict(lock_path: &Path) -> Result<()> {
    let Ok(contents) = std::fs::read_to_string(lock_path) else {
        return Ok(());
    };

    let info = match InstanceInfo::from_lock_contents(&contents) {
        Ok(info) => info,
        Err(_) => {
            log_pipe!();
            log_warning!("Lock file format invalid, removing");
            let _ = std::fs::remove_file(lock_path);
            return Ok(());
        }
    };

    if !is_instance_running(info.pid) {
        log_pipe!();
        log_warning!(
            "Removing stale lock file (process {} no longer running)",
            info.pid
        );
        let _ = std::fs::remove_file(lock_path);
        return Ok(());
    }

    log_pipe!();
    log_error!("nightshade is already running (PID: {})", info.pid);
    log_block_start!("Did you mean to:");
    log_indented!("• Check the current state: nightshade status");
    log_indented!("• Turn night display on or off: nightshade on | off | toggle");
    anyhow::bail!("another nightshade instance is running")
}

/// Remove the lock file on shutdown.
pub fn release(lock: LockFile, lock_path: &Path) {
    drop(lock);
    let _ = std::fs::remove_file(lock_path);
}
