//! Persisted activation state.
//!
//! `state.toml` in `$XDG_STATE_HOME/nightshade/` holds whether night display
//! is on and when that last changed:
//!
//! ```toml
//! activated = true
//! last_activated_time = "2024-01-15T22:00:00"
//! ```
//!
//! The timestamp is a local wall-clock reading. Older files stored epoch
//! milliseconds (as an integer or a numeric string); those are converted
//! with the current zone. Anything unreadable counts as "unknown".
//!
//! The daemon and the `on`/`off`/`toggle` commands both write through
//! [`StateFile`]; the daemon notices external writes via the file watcher.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::Sender;

use crate::common::constants::{CONFIG_DIR_NAME, STATE_FILE_NAME};
use crate::common::utils::private_path;
use crate::core::{ActivationSink, TimestampStore};
use crate::io::signals::SignalMessage;
use crate::time::TimeSource;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Contents of the state file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistedState {
    pub activated: Option<bool>,
    pub last_activated_time: Option<NaiveDateTime>,
}

impl PersistedState {
    pub fn is_activated(&self) -> bool {
        self.activated.unwrap_or(false)
    }
}

#[derive(Deserialize)]
struct RawState {
    activated: Option<bool>,
    last_activated_time: Option<toml::Value>,
}

#[derive(Serialize)]
struct StoredState {
    #[serde(skip_serializing_if = "Option::is_none")]
    activated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_activated_time: Option<String>,
}

/// Parse a stored last-activation time.
///
/// Accepts an ISO-8601 local date-time, or legacy epoch milliseconds as an
/// integer or numeric string. Returns `None` for anything else.
pub fn parse_last_activated(value: &toml::Value) -> Option<NaiveDateTime> {
    match value {
        toml::Value::String(text) => {
            let text = text.trim();
            text.parse::<NaiveDateTime>()
                .ok()
                .or_else(|| text.parse::<i64>().ok().and_then(from_epoch_millis))
        }
        toml::Value::Integer(millis) => from_epoch_millis(*millis),
        // An unquoted TOML local date-time
        toml::Value::Datetime(datetime) => datetime.to_string().parse::<NaiveDateTime>().ok(),
        _ => None,
    }
}

fn from_epoch_millis(millis: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(millis).map(|utc| utc.with_timezone(&Local).naive_local())
}

/// Parse state file contents. Malformed values degrade to unknown.
pub fn parse_state(content: &str) -> Result<PersistedState> {
    let raw: RawState = toml::from_str(content).context("Failed to parse state file")?;
    Ok(PersistedState {
        activated: raw.activated,
        last_activated_time: raw.last_activated_time.as_ref().and_then(parse_last_activated),
    })
}

/// Default location of the state file.
pub fn default_state_path() -> Result<PathBuf> {
    let state_dir = dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .context("Could not determine state directory")?;
    Ok(state_dir.join(CONFIG_DIR_NAME).join(STATE_FILE_NAME))
}

/// Handle on the state file, usable as activation sink and timestamp store.
#[derive(Clone)]
pub struct StateFile {
    path: PathBuf,
    clock: Arc<dyn TimeSource>,
    notifier: Option<Sender<SignalMessage>>,
}

impl StateFile {
    pub fn new(path: PathBuf, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            path,
            clock,
            notifier: None,
        }
    }

    /// Post [`SignalMessage::ActivationChanged`] after every change made
    /// through this handle.
    pub fn with_notifier(mut self, sender: Sender<SignalMessage>) -> Self {
        self.notifier = Some(sender);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the file. A missing file is the default (off, never changed).
    pub fn load(&self) -> Result<PersistedState> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => parse_state(&content)
                .with_context(|| format!("Invalid state file {}", private_path(&self.path))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PersistedState::default()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to read {}", private_path(&self.path))),
        }
    }

    /// Like [`StateFile::load`], logging and defaulting on errors.
    pub fn load_or_default(&self) -> PersistedState {
        self.load().unwrap_or_else(|e| {
            log_pipe!();
            log_warning!("{e:#}");
            PersistedState::default()
        })
    }

    /// Replace the file atomically.
    pub fn save(&self, state: &PersistedState) -> Result<()> {
        let dir = self
            .path
            .parent()
            .context("State file path has no parent directory")?;
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", private_path(dir)))?;

        let stored = StoredState {
            activated: state.activated,
            last_activated_time: state
                .last_activated_time
                .map(|time| time.format(TIMESTAMP_FORMAT).to_string()),
        };
        let content = toml::to_string(&stored).context("Failed to serialize state")?;

        let mut temp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temp file in {}", private_path(dir)))?;
        temp.write_all(content.as_bytes())?;
        temp.flush()?;
        temp.persist(&self.path)
            .with_context(|| format!("Failed to write {}", private_path(&self.path)))?;
        Ok(())
    }

    /// Record a new activation state. The timestamp only moves when the
    /// value actually changes. Returns whether it changed.
    pub fn set_activated(&self, activated: bool) -> Result<bool> {
        let mut state = self.load_or_default();
        if state.activated == Some(activated) {
            return Ok(false);
        }
        let changed = state.is_activated() != activated;

        state.activated = Some(activated);
        if changed {
            state.last_activated_time = Some(self.clock.now().naive_local());
        }
        self.save(&state)?;

        if changed && let Some(sender) = &self.notifier {
            let _ = sender.send(SignalMessage::ActivationChanged(activated));
        }
        Ok(changed)
    }
}

impl ActivationSink for StateFile {
    fn is_activated(&self) -> bool {
        self.load_or_default().is_activated()
    }

    fn set_activated(&mut self, activated: bool) -> Result<()> {
        StateFile::set_activated(self, activated).map(|_| ())
    }
}

impl TimestampStore for StateFile {
    fn last_activated(&self) -> Option<NaiveDateTime> {
        self.load().ok().and_then(|state| state.last_activated_time)
    }
}
