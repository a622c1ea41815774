//! Configuration loading functionality.
//!
//! Resolves the config path, creates a default file when none exists,
//! parses and validates it, and merges the optional `geo.toml` location
//! override kept next to the main file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use super::Config;
use super::validation::validate_config;
use crate::common::constants::*;
use crate::common::utils::private_path;

/// Global configuration directory, set once at startup
static CONFIG_DIR: OnceLock<Option<PathBuf>> = OnceLock::new();

/// Coordinates stored apart from the main configuration so the main file can
/// be shared without revealing a location.
#[derive(Debug, Deserialize)]
struct GeoConfig {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

/// Set the configuration directory for the current process.
/// This can only be called once, typically at startup.
pub fn set_config_dir(dir: Option<String>) -> Result<()> {
    CONFIG_DIR
        .set(dir.map(|d| super::expand_home(&d)))
        .map_err(|_| anyhow::anyhow!("Configuration directory already set"))
}

/// Get the custom configuration directory if one was set.
pub fn get_custom_config_dir() -> Option<PathBuf> {
    CONFIG_DIR.get().and_then(|d| d.clone())
}

/// Get the configuration file path.
pub fn get_config_path() -> Result<PathBuf> {
    if let Some(custom_dir) = get_custom_config_dir() {
        return Ok(custom_dir.join(CONFIG_FILE_NAME));
    }
    let config_dir = dirs::config_dir().context("Could not determine config directory")?;
    Ok(config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Path of the optional location override next to a config file.
pub fn geo_path_for(config_path: &Path) -> Option<PathBuf> {
    config_path.parent().map(|parent| parent.join("geo.toml"))
}

/// Load configuration using automatic path detection.
///
/// Creates a default configuration file if none exists.
pub fn load() -> Result<Config> {
    let config_path = get_config_path()?;

    if !config_path.exists() {
        super::builder::create_default_config(&config_path)
            .context("Failed to create default config during load")?;
    }

    load_from_path(&config_path).with_context(|| {
        format!(
            "Failed to load configuration from {}",
            private_path(&config_path)
        )
    })
}

/// Load configuration from a specific path.
///
/// This version does NOT create a default config if the path doesn't exist.
pub fn load_from_path(path: &Path) -> Result<Config> {
    if !path.exists() {
        anyhow::bail!(
            "Configuration file not found at {}",
            private_path(path)
        );
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", private_path(path)))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config from {}", private_path(path)))?;

    // Merge geo.toml before validation so its values are validated too
    load_geo_override_from_path(&mut config, path);

    validate_config(&config)?;
    warn_about_unused_settings(&config);

    Ok(config)
}

/// Override coordinates from `geo.toml` when present. A broken override is
/// reported and ignored.
fn load_geo_override_from_path(config: &mut Config, config_path: &Path) {
    let Some(geo_path) = geo_path_for(config_path) else {
        return;
    };
    if !geo_path.exists() {
        return;
    }

    match fs::read_to_string(&geo_path) {
        Ok(content) => match toml::from_str::<GeoConfig>(&content) {
            Ok(geo) => {
                if let Some(lat) = geo.latitude {
                    config.latitude = Some(lat);
                }
                if let Some(lon) = geo.longitude {
                    config.longitude = Some(lon);
                }
            }
            Err(e) => {
                log_pipe!();
                log_warning!("Failed to parse geo.toml: {e}. Using coordinates from main config.");
            }
        },
        Err(e) => {
            log_pipe!();
            log_warning!("Failed to read geo.toml: {e}. Using coordinates from main config.");
        }
    }
}

/// Settings that are valid but have no effect with the selected mode.
fn warn_about_unused_settings(config: &Config) {
    use super::AutoModeSetting;

    if config.auto_mode() == AutoModeSetting::Twilight && config.location().is_none() {
        log_pipe!();
        log_warning!("Twilight mode needs latitude and longitude");
        log_indented!("Night display will stay as it is until a location is configured");
    }

    if config.color_coefficients.is_some() && config.linear_color_matrix.is_some() {
        log_pipe!();
        log_warning!("color_coefficients overrides linear_color_matrix");
    }
}
