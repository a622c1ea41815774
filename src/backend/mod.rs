//! Tint output backends.
//!
//! The daemon does not talk to a compositor itself. Whatever should happen
//! with the night color matrix is delegated to a [`TintBackend`] chosen with
//! `backend = "..."` in the configuration:
//!
//! - **Log** (`log`): prints the red, green and blue scale factors. Useful to
//!   try schedules without touching the display.
//! - **File** (`file`): writes the matrix as JSON to `output_path`, replacing
//!   the file atomically, for an external tool to pick up.
//! - **Command** (`command`): runs a user command with the scale factors as
//!   trailing arguments, e.g. a gamma tool wrapper.
//!
//! Backends that cannot keep up with animation frames report
//! `is_continuous() == false` and only receive the settled matrices.

use anyhow::Result;

use crate::config::{BackendKind, Config};
use crate::core::ColorMatrix;

pub mod command;
pub mod file;
pub mod log;

/// Destination of the night color matrix.
pub trait TintBackend {
    /// Apply one matrix (an animation frame or a settled value).
    fn apply_matrix(&mut self, matrix: &ColorMatrix) -> Result<()>;

    /// Human-readable backend name for log output.
    fn backend_name(&self) -> &'static str;

    /// Whether intermediate animation frames should be delivered.
    fn is_continuous(&self) -> bool {
        true
    }

    /// Called on shutdown after the identity matrix has been applied.
    fn cleanup(&mut self) {}
}

/// Create the backend selected in the configuration.
pub fn create_backend(config: &Config, debug_enabled: bool) -> Result<Box<dyn TintBackend + Send>> {
    let backend: Box<dyn TintBackend + Send> = match config.backend() {
        BackendKind::Log => Box::new(log::LogBackend::new(debug_enabled)),
        BackendKind::File => Box::new(file::FileBackend::new(config.output_path(), debug_enabled)),
        BackendKind::Command => {
            let command = config
                .command
                .as_deref()
                .map(str::trim)
                .filter(|command| !command.is_empty())
                .ok_or_else(|| anyhow::anyhow!("backend = \"command\" requires `command`"))?;
            Box::new(command::CommandBackend::new(command, debug_enabled))
        }
    };

    if debug_enabled {
        log_pipe!();
        log_debug!("Using {} tint backend", backend.backend_name());
    }
    Ok(backend)
}
