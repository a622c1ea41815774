//! Backend that hands the scale factors to a user command.
//!
//! The configured command runs through `sh -c` with the red, green and blue
//! factors appended, e.g. `my-gamma-tool 1.0000 0.8119 0.6097`. Only settled
//! matrices are delivered; spawning a process per animation frame is not
//! worth it.

use anyhow::{Context, Result};
use std::process::{Command, Stdio};

use super::TintBackend;
use crate::core::ColorMatrix;

pub struct CommandBackend {
    command: String,
    debug_enabled: bool,
    last: Option<ColorMatrix>,
}

impl CommandBackend {
    pub fn new(command: &str, debug_enabled: bool) -> Self {
        Self {
            command: command.to_string(),
            debug_enabled,
            last: None,
        }
    }

    /// Full shell command line for a matrix.
    pub fn command_line(&self, matrix: &ColorMatrix) -> String {
        let (red, green, blue) = matrix.diagonal();
        format!("{} {red:.4} {green:.4} {blue:.4}", self.command)
    }
}

impl TintBackend for CommandBackend {
    fn apply_matrix(&mut self, matrix: &ColorMatrix) -> Result<()> {
        if self.last.as_ref() == Some(matrix) {
            return Ok(());
        }

        let line = self.command_line(matrix);
        if self.debug_enabled {
            log_pipe!();
            log_debug!("Running: {line}");
        }

        let status = Command::new("sh")
            .arg("-c")
            .arg(&line)
            .stdin(Stdio::null())
            .status()
            .with_context(|| format!("Failed to run `{}`", self.command))?;
        if !status.success() {
            anyhow::bail!("`{}` exited with {status}", self.command);
        }

        self.last = Some(*matrix);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "Command"
    }

    fn is_continuous(&self) -> bool {
        false
    }
}
