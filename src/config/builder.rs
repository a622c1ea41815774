//! Default configuration file creation.
//!
//! The generated file lists every setting with its default and a short
//! aligned comment, grouped in sections.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::common::constants::*;
use crate::common::utils::private_path;

/// Write a default configuration file at `path`, creating parent directories.
pub fn create_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    fs::write(path, default_config_content())
        .with_context(|| format!("Failed to write default config to {}", private_path(path)))?;

    log_block_start!("Created default configuration");
    log_indented!("{}", private_path(path));
    Ok(())
}

/// Contents of a freshly generated `nightshade.toml`.
pub fn default_config_content() -> String {
    let mut content = ConfigBuilder::new()
        .add_section("Auto mode")
        .add_setting(
            "auto_mode",
            &format!("\"{}\"", DEFAULT_AUTO_MODE.as_str()),
            "Select: \"disabled\", \"custom\" or \"twilight\"",
        )
        .add_setting(
            "custom_start",
            &format!("\"{DEFAULT_CUSTOM_START}\""),
            "Start of the custom window (HH:MM)",
        )
        .add_setting(
            "custom_end",
            &format!("\"{DEFAULT_CUSTOM_END}\""),
            "End of the custom window (HH:MM), may be past midnight",
        )
        .add_section("Tint")
        .add_setting(
            "color_temperature",
            &DEFAULT_COLOR_TEMPERATURE.to_string(),
            &format!(
                "Night color temperature ({MINIMUM_COLOR_TEMPERATURE}-{MAXIMUM_COLOR_TEMPERATURE}) Kelvin"
            ),
        )
        .add_setting(
            "transition_duration",
            &DEFAULT_TRANSITION_DURATION_MS.to_string(),
            &format!("Tint animation length (0-{MAXIMUM_TRANSITION_DURATION_MS}) ms"),
        )
        .add_setting(
            "linear_color_matrix",
            &DEFAULT_LINEAR_COLOR_MATRIX.to_string(),
            "Coefficient set: true = linear, false = native panel",
        )
        .add_section("Backend")
        .add_setting(
            "backend",
            &format!("\"{}\"", DEFAULT_BACKEND.as_str()),
            "Select: \"log\", \"file\" or \"command\"",
        )
        .build();

    content.push_str(
        "\n\n#[Location]\n\
         # Required for twilight mode. Can also live in geo.toml next to this file.\n\
         #latitude = 52.52\n\
         #longitude = 13.405\n",
    );
    content
}

struct ConfigBuilder {
    entries: Vec<ConfigEntry>,
}

enum ConfigEntry {
    Section(String),
    Setting { line: String, comment: String },
}

impl ConfigBuilder {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn add_section(mut self, title: &str) -> Self {
        self.entries.push(ConfigEntry::Section(format!("#[{title}]")));
        self
    }

    fn add_setting(mut self, key: &str, value: &str, comment: &str) -> Self {
        self.entries.push(ConfigEntry::Setting {
            line: format!("{key} = {value}"),
            comment: format!("# {comment}"),
        });
        self
    }

    fn build(self) -> String {
        // Align comments one space past the longest setting line
        let max_width = self
            .entries
            .iter()
            .filter_map(|entry| match entry {
                ConfigEntry::Setting { line, .. } => Some(line.len()),
                ConfigEntry::Section(_) => None,
            })
            .max()
            .unwrap_or(0)
            + 1;

        let mut result = Vec::new();
        let mut first_section = true;

        for entry in self.entries {
            match entry {
                ConfigEntry::Section(title) => {
                    if !first_section {
                        result.push(String::new());
                    }
                    result.push(title);
                    first_section = false;
                }
                ConfigEntry::Setting { line, comment } => {
                    let padding = " ".repeat(max_width - line.len());
                    result.push(format!("{line}{padding}{comment}"));
                }
            }
        }

        result.join("\n")
    }
}
