//! Application coordinator that manages the complete lifecycle of the daemon.
//!
//! This module acquires every resource the core loop needs and wires the
//! real collaborators into the service:
//! - Lock file for single-instance enforcement
//! - Signal handler and the shared message channel
//! - State file (activation sink and timestamp store)
//! - Alarm threads, system time monitors and the twilight tracker
//! - Config and state file watcher
//! - Tint backend
//!
//! The `Nightshade` struct uses a builder pattern so tests and special
//! startups can skip parts of it:
//! - Normal startup: `Nightshade::new(debug_enabled).run()`
//! - Without lock or headers: `Nightshade::new(true).without_lock().without_headers().run()`

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::{
    backend::create_backend,
    common::constants::EXIT_FAILURE,
    config::{self, Config},
    core::{Core, CoreParams, Host, NightDisplayService, Tint},
    geo::TwilightTracker,
    io::{
        alarm::ThreadAlarmScheduler,
        dbus::{SystemTimeChanges, start_system_monitors},
        instance,
        signals::setup_signal_handler,
        state::{StateFile, default_state_path},
    },
    time::TimeSource,
};

/// Builder for configuring and running the nightshade daemon.
pub struct Nightshade {
    debug_enabled: bool,
    create_lock: bool,
    show_headers: bool,
}

impl Nightshade {
    /// Create a new runner with defaults matching normal run
    pub fn new(debug_enabled: bool) -> Self {
        Self {
            debug_enabled,
            create_lock: true,
            show_headers: true,
        }
    }

    /// Skip lock file creation
    pub fn without_lock(mut self) -> Self {
        self.create_lock = false;
        self
    }

    /// Skip the version header
    pub fn without_headers(mut self) -> Self {
        self.show_headers = false;
        self
    }

    /// Run the daemon until a shutdown signal arrives.
    pub fn run(self) -> Result<()> {
        if self.show_headers {
            log_version!();
        }

        let config = match Config::load() {
            Ok(config) => config,
            Err(e) => {
                log_error_exit!("Configuration failed");
                eprintln!("{e:?}");
                std::process::exit(EXIT_FAILURE);
            }
        };

        // Lock before any watcher starts logging
        let lock_info = if self.create_lock {
            Some(instance::ensure_single_instance()?)
        } else {
            None
        };

        let signal_state = setup_signal_handler(self.debug_enabled)?;
        let sender = signal_state.signal_sender.clone();
        let clock: Arc<dyn TimeSource> = crate::time::source::shared();

        let state_path = default_state_path()?;
        let state_file =
            StateFile::new(state_path.clone(), clock.clone()).with_notifier(sender.clone());
        if self.debug_enabled {
            log_pipe!();
            log_debug!("State file: {}", state_path.display());
        }

        let time_changes = SystemTimeChanges::new();
        start_system_monitors(sender.clone(), time_changes.clone(), self.debug_enabled);

        let config_path = config::get_config_path()?;
        if let Err(e) =
            config::start_config_watcher(sender.clone(), config_path, state_path, self.debug_enabled)
        {
            log_pipe!();
            log_warning!("Config file watching unavailable: {e}");
            log_indented!("Hot reload disabled, use 'nightshade reload' or SIGUSR2");
        }

        config.log_config();

        let tracker = TwilightTracker::start(
            clock.clone(),
            sender.clone(),
            config.location(),
            self.debug_enabled,
        );

        let backend = create_backend(&config, self.debug_enabled)
            .context("Failed to create the tint backend")?;
        let tint = Tint::new(
            backend,
            config.color_coefficients(),
            config.color_temperature(),
            config.transition_duration(),
        );

        let host = Host {
            clock: clock.clone(),
            sink: Box::new(state_file.clone()),
            timestamps: Box::new(state_file),
            alarms: Box::new(ThreadAlarmScheduler::new(clock, sender)),
            time_changes: Box::new(time_changes),
            celestial: Box::new(tracker.clone()),
        };
        let service = NightDisplayService::new(host, config, tint, self.debug_enabled);

        if lock_info.is_some() {
            log_block_start!("Lock acquired, starting nightshade...");
        }

        let core = Core::new(CoreParams {
            service,
            signal_state,
            tracker: Some(tracker),
            lock_info,
            debug_enabled: self.debug_enabled,
        });
        core.execute()?;

        Ok(())
    }
}
