//! Configuration validation functionality.
//!
//! Rejects values the daemon cannot work with: out-of-range temperatures and
//! durations, malformed coefficient lists, coordinates off the globe, and
//! backends missing the setting they depend on.

use anyhow::Result;

use super::{BackendKind, Config};
use crate::common::constants::*;

/// Validate a parsed configuration.
pub fn validate_config(config: &Config) -> Result<()> {
    if let Some(temp) = config.color_temperature
        && !(MINIMUM_COLOR_TEMPERATURE..=MAXIMUM_COLOR_TEMPERATURE).contains(&temp)
    {
        anyhow::bail!(
            "color_temperature ({}) must be between {} and {} Kelvin",
            temp,
            MINIMUM_COLOR_TEMPERATURE,
            MAXIMUM_COLOR_TEMPERATURE
        );
    }

    if let Some(duration) = config.transition_duration
        && duration > MAXIMUM_TRANSITION_DURATION_MS
    {
        anyhow::bail!(
            "transition_duration ({} ms) must be at most {} milliseconds",
            duration,
            MAXIMUM_TRANSITION_DURATION_MS
        );
    }

    if let Some(coefficients) = &config.color_coefficients {
        if coefficients.len() != 9 {
            anyhow::bail!(
                "color_coefficients must contain exactly 9 numbers (got {})",
                coefficients.len()
            );
        }
        if coefficients.iter().any(|c| !c.is_finite()) {
            anyhow::bail!("color_coefficients must be finite numbers");
        }
    }

    if let Some(lat) = config.latitude
        && !(-90.0..=90.0).contains(&lat)
    {
        anyhow::bail!("latitude must be between -90 and 90 degrees (got {})", lat);
    }

    if let Some(lon) = config.longitude
        && !(-180.0..=180.0).contains(&lon)
    {
        anyhow::bail!(
            "longitude must be between -180 and 180 degrees (got {})",
            lon
        );
    }

    if config.latitude.is_some() != config.longitude.is_some() {
        anyhow::bail!("latitude and longitude must be set together");
    }

    if config.backend() == BackendKind::Command {
        match config.command.as_deref().map(str::trim) {
            None | Some("") => {
                anyhow::bail!("The command backend requires a non-empty 'command' setting")
            }
            Some(_) => {}
        }
    }

    if config.custom_start.is_some()
        && config.custom_start == config.custom_end
    {
        log_pipe!();
        log_warning!(
            "custom_start and custom_end are both {}: the custom window is empty",
            config.custom_start()
        );
    }

    Ok(())
}
