//! File watching for hot config reloading and external state edits.
//!
//! The watcher observes the directories holding `nightshade.toml` (plus its
//! `geo.toml` override) and the persisted state file. Editors and our own
//! atomic writes replace files rather than modifying them in place, so
//! directories are watched and events are filtered by file name.

use anyhow::{Context, Result};
use notify::{
    Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::thread;
use std::time::{Duration, Instant};

use crate::common::utils::private_path;
use crate::io::signals::SignalMessage;

/// Debounce duration for file change events (in milliseconds).
/// This prevents multiple reloads when editors write files in multiple steps.
const DEBOUNCE_MS: u64 = 500;

/// What a file system event means for the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Config,
    State,
}

/// Classify an event path against the watched files.
///
/// Matches the file itself and editor or tempfile siblings that start with
/// its name (`nightshade.toml~`, `state.toml.tmp`).
pub fn classify(event_path: &Path, config_files: &[PathBuf], state_file: &Path) -> Option<ChangeKind> {
    let matches = |watched: &Path| {
        if event_path == watched {
            return true;
        }
        event_path.parent() == watched.parent()
            && event_path
                .file_name()
                .and_then(|n| n.to_str())
                .zip(watched.file_name().and_then(|w| w.to_str()))
                .map(|(event_name, watched_name)| event_name.starts_with(watched_name))
                .unwrap_or(false)
    };

    if config_files.iter().any(|path| matches(path)) {
        Some(ChangeKind::Config)
    } else if matches(state_file) {
        Some(ChangeKind::State)
    } else {
        None
    }
}

/// Configuration and state file watcher.
pub struct ConfigWatcher {
    signal_sender: Sender<SignalMessage>,
    debug_enabled: bool,
    config_files: Vec<PathBuf>,
    state_file: PathBuf,
}

impl ConfigWatcher {
    pub fn new(
        signal_sender: Sender<SignalMessage>,
        config_path: PathBuf,
        state_file: PathBuf,
        debug_enabled: bool,
    ) -> Self {
        let mut config_files = vec![config_path.clone()];
        if let Some(geo) = super::loading::geo_path_for(&config_path) {
            config_files.push(geo);
        }
        Self {
            signal_sender,
            debug_enabled,
            config_files,
            state_file,
        }
    }

    /// Spawn the watcher thread.
    pub fn start(self) -> Result<()> {
        let (tx, rx) = std::sync::mpsc::channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                if let Ok(event) = res {
                    match event.kind {
                        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {
                            let _ = tx.send(event);
                        }
                        _ => {}
                    }
                }
            },
            NotifyConfig::default(),
        )
        .context("Failed to create file watcher")?;

        let mut watched_dirs = HashSet::new();
        for path in self.config_files.iter().chain(std::iter::once(&self.state_file)) {
            let Some(parent) = path.parent() else {
                continue;
            };
            if !parent.exists() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create directory: {}", private_path(parent))
                })?;
            }
            if watched_dirs.insert(parent.to_path_buf()) {
                watcher
                    .watch(parent, RecursiveMode::NonRecursive)
                    .with_context(|| format!("Failed to watch directory: {}", private_path(parent)))?;
            }
        }

        if self.debug_enabled {
            log_pipe!();
            log_debug!("Starting file watcher for hot reload:");
            for path in self.config_files.iter().chain(std::iter::once(&self.state_file)) {
                log_indented!("Watching: {}", private_path(path));
            }
        }

        thread::spawn(move || {
            // Keep the watcher alive by moving it into the thread
            let _watcher = watcher;
            let debounce = Duration::from_millis(DEBOUNCE_MS);
            let mut last_config: Option<Instant> = None;

            for event in rx {
                let kinds: HashSet<ChangeKind> = event
                    .paths
                    .iter()
                    .filter_map(|p| classify(p, &self.config_files, &self.state_file))
                    .collect();

                for kind in kinds {
                    let message = match kind {
                        ChangeKind::Config => {
                            if last_config.is_some_and(|at| at.elapsed() < debounce) {
                                continue;
                            }
                            last_config = Some(Instant::now());
                            if self.debug_enabled {
                                log_pipe!();
                                log_info!("Configuration file change detected");
                            }
                            SignalMessage::Reload
                        }
                        // Not debounced: the state file is re-read on every
                        // notice and unchanged values are ignored downstream
                        ChangeKind::State => SignalMessage::StateChanged,
                    };

                    if self.signal_sender.send(message).is_err() {
                        // Main loop is gone
                        return;
                    }
                }
            }
        });

        Ok(())
    }
}

/// Start the configuration file watcher.
pub fn start_config_watcher(
    signal_sender: Sender<SignalMessage>,
    config_path: PathBuf,
    state_file: PathBuf,
    debug_enabled: bool,
) -> Result<()> {
    ConfigWatcher::new(signal_sender, config_path, state_file, debug_enabled).start()
}
