//! Configuration system for nightshade.
//!
//! Settings live in a single TOML file, `nightshade.toml`, under
//! `$XDG_CONFIG_HOME/nightshade/` (or the directory given with `--config`).
//! The file is created with defaults on first start and watched for changes
//! while the daemon runs.
//!
//! ```toml
//! #[Auto mode]
//! auto_mode = "custom"          # "disabled", "custom" or "twilight"
//! custom_start = "22:00"        # Start of the custom window (HH:MM)
//! custom_end = "06:00"          # End of the custom window (HH:MM)
//!
//! #[Tint]
//! color_temperature = 2850      # Night color temperature (2596-4082) Kelvin
//! transition_duration = 3000    # Tint animation length (0-60000) ms
//! linear_color_matrix = true    # Coefficient set: linear or native panel
//!
//! #[Backend]
//! backend = "log"               # "log", "file" or "command"
//!
//! #[Location]
//! latitude = 52.52              # Required for twilight mode
//! longitude = 13.405
//! ```
//!
//! Every field is optional; the accessors on [`Config`] fall back to the
//! `DEFAULT_*` constants. Loading validates ranges and cross-field
//! requirements and refuses files that would leave the daemon unable to work.

pub mod builder;
pub mod loading;
pub mod validation;
pub mod watcher;

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::common::constants::*;
use crate::common::utils::private_path;
use crate::time::TimeOfDay;

pub use builder::create_default_config;
pub use loading::{get_config_path, get_custom_config_dir, load, load_from_path, set_config_dir};
pub use watcher::start_config_watcher;

/// Which auto-mode decides when night display turns on.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AutoModeSetting {
    /// Only manual toggles change activation.
    Disabled,
    /// Fixed daily window between `custom_start` and `custom_end`.
    Custom,
    /// From sunset to sunrise at the configured location.
    Twilight,
}

impl AutoModeSetting {
    pub fn as_str(&self) -> &'static str {
        match self {
            AutoModeSetting::Disabled => "disabled",
            AutoModeSetting::Custom => "custom",
            AutoModeSetting::Twilight => "twilight",
        }
    }
}

/// Where the tint matrix goes.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Log the channel scale factors (debug output only).
    Log,
    /// Write the matrix as JSON to `output_path`.
    File,
    /// Run `command` with the red, green and blue factors as arguments.
    Command,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Log => "log",
            BackendKind::File => "file",
            BackendKind::Command => "command",
        }
    }
}

/// Settings loaded from `nightshade.toml`.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct Config {
    pub auto_mode: Option<AutoModeSetting>,
    pub custom_start: Option<TimeOfDay>,
    pub custom_end: Option<TimeOfDay>,

    pub color_temperature: Option<u32>, // Kelvin
    pub transition_duration: Option<u64>, // milliseconds
    pub linear_color_matrix: Option<bool>,
    /// Nine coefficients overriding the built-in set: (a, b, c) for red,
    /// green and blue.
    pub color_coefficients: Option<Vec<f32>>,

    pub backend: Option<BackendKind>,
    pub output_path: Option<String>, // file backend
    pub command: Option<String>,     // command backend

    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Config {
    /// Load configuration using the module's load function
    pub fn load() -> anyhow::Result<Self> {
        load()
    }

    pub fn auto_mode(&self) -> AutoModeSetting {
        self.auto_mode.unwrap_or(DEFAULT_AUTO_MODE)
    }

    pub fn custom_start(&self) -> TimeOfDay {
        self.custom_start.unwrap_or(DEFAULT_CUSTOM_START)
    }

    pub fn custom_end(&self) -> TimeOfDay {
        self.custom_end.unwrap_or(DEFAULT_CUSTOM_END)
    }

    pub fn color_temperature(&self) -> u32 {
        self.color_temperature.unwrap_or(DEFAULT_COLOR_TEMPERATURE)
    }

    pub fn transition_duration(&self) -> Duration {
        Duration::from_millis(
            self.transition_duration
                .unwrap_or(DEFAULT_TRANSITION_DURATION_MS),
        )
    }

    pub fn backend(&self) -> BackendKind {
        self.backend.unwrap_or(DEFAULT_BACKEND)
    }

    /// Coefficients used to build the night matrix.
    ///
    /// An explicit `color_coefficients` list wins; otherwise the linear or
    /// native built-in set is chosen by `linear_color_matrix`.
    pub fn color_coefficients(&self) -> [f32; 9] {
        if let Some(custom) = &self.color_coefficients
            && let Ok(coefficients) = <[f32; 9]>::try_from(custom.as_slice())
        {
            return coefficients;
        }
        if self
            .linear_color_matrix
            .unwrap_or(DEFAULT_LINEAR_COLOR_MATRIX)
        {
            LINEAR_COLOR_COEFFICIENTS
        } else {
            NATIVE_COLOR_COEFFICIENTS
        }
    }

    pub fn location(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }

    /// Destination of the file backend: `output_path`, or `matrix.json` in
    /// the runtime directory.
    pub fn output_path(&self) -> PathBuf {
        if let Some(path) = &self.output_path {
            return expand_home(path);
        }
        dirs::runtime_dir()
            .or_else(dirs::state_dir)
            .unwrap_or_else(std::env::temp_dir)
            .join(CONFIG_DIR_NAME)
            .join(MATRIX_FILE_NAME)
    }

    pub fn log_config(&self) {
        log_block_start!("Loaded configuration");
        if let Some(custom_dir) = get_custom_config_dir() {
            log_indented!("Directory: {}", private_path(&custom_dir));
        }

        match self.auto_mode() {
            AutoModeSetting::Disabled => log_indented!("Mode: Disabled (manual only)"),
            AutoModeSetting::Custom => log_indented!(
                "Mode: Custom ({} → {})",
                self.custom_start(),
                self.custom_end()
            ),
            AutoModeSetting::Twilight => {
                log_indented!("Mode: Twilight (sunset to sunrise)");
                match self.location() {
                    Some((lat, lon)) => {
                        let lat_dir = if lat >= 0.0 { "N" } else { "S" };
                        let lon_dir = if lon >= 0.0 { "E" } else { "W" };
                        log_indented!(
                            "Location: {:.3}°{}, {:.3}°{}",
                            lat.abs(),
                            lat_dir,
                            lon.abs(),
                            lon_dir
                        );
                    }
                    None => log_indented!("Location: not set"),
                }
            }
        }

        log_indented!("Color temperature: {}K", self.color_temperature());
        log_indented!(
            "Transition: {} ms",
            self.transition_duration().as_millis()
        );
        let backend = self.backend();
        match backend {
            BackendKind::File => log_indented!(
                "Backend: {} ({})",
                backend.as_str(),
                private_path(&self.output_path())
            ),
            _ => log_indented!("Backend: {}", backend.as_str()),
        }
    }
}

/// Expand a leading `~/` to the home directory.
pub(crate) fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}
