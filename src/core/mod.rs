//! Core application logic and state management.
//!
//! The decision logic lives in the submodules:
//!
//! - [`scheduled`] and [`celestial`]: the two auto-mode strategies
//! - [`auto_mode`]: the tagged union the service dispatches through
//! - [`collaborators`]: the contracts the strategies use to reach the system
//! - [`service`]: the hosting service owning the active mode and the tint
//! - [`tint`]: the night color matrix and its animation
//!
//! [`Core`] is the daemon's main loop. Every producer (signals, monitors,
//! watchers, alarm threads, the twilight tracker) posts a
//! [`SignalMessage`]; the loop drains them one at a time and feeds the
//! service, so no controller state is ever touched from two threads.

pub mod auto_mode;
pub mod celestial;
pub mod collaborators;
pub mod scheduled;
pub mod service;
pub mod tint;

pub use auto_mode::AutoMode;
pub use collaborators::{
    ActivationSink, AlarmId, AlarmScheduler, CelestialSignal, CelestialState, Host,
    TimeChangeSource, TimestampStore,
};
pub use scheduled::{AnchoredWindow, Boundary};
pub use service::NightDisplayService;
pub use tint::{ColorMatrix, Tint};

#[cfg(test)]
mod tests;

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::mpsc::RecvTimeoutError;
use std::time::{Duration, Instant};

use crate::common::constants::{ANIMATION_FRAME_MS, IDLE_POLL_MS};
use crate::config::{self, Config};
use crate::geo::TwilightTracker;
use crate::io::instance;
use crate::io::lock::LockFile;
use crate::io::signals::{SignalMessage, SignalState};

/// Parameters for creating a Core instance.
pub(crate) struct CoreParams {
    pub service: NightDisplayService,
    pub signal_state: SignalState,
    pub tracker: Option<TwilightTracker>,
    pub lock_info: Option<(LockFile, PathBuf)>,
    pub debug_enabled: bool,
}

/// The daemon's main loop around a [`NightDisplayService`].
pub(crate) struct Core {
    service: NightDisplayService,
    signal_state: SignalState,
    tracker: Option<TwilightTracker>,
    lock_info: Option<(LockFile, PathBuf)>,
    debug_enabled: bool,
}

impl Core {
    pub fn new(params: CoreParams) -> Self {
        Self {
            service: params.service,
            signal_state: params.signal_state,
            tracker: params.tracker,
            lock_info: params.lock_info,
            debug_enabled: params.debug_enabled,
        }
    }

    /// Run until a shutdown is requested, then restore the display.
    pub fn execute(mut self) -> anyhow::Result<NightDisplayService> {
        log_block_start!(
            "Using {} backend",
            self.service.tint().backend_name()
        );

        self.service.set_up();
        self.main_loop();

        // The signal thread may have stopped the loop before its message
        // was read
        while let Ok(message) = self.signal_state.signal_receiver.try_recv() {
            if let SignalMessage::Shutdown { instant: true } = message {
                self.signal_state
                    .instant_shutdown
                    .store(true, Ordering::SeqCst);
            }
        }

        if !self.signal_state.instant_shutdown.load(Ordering::SeqCst) {
            log_block_start!("Shutting down nightshade...");
        }
        self.service.tear_down();
        self.service.reset_tint();

        if let Some(tracker) = &self.tracker {
            tracker.shutdown();
        }
        if let Some((lock, lock_path)) = self.lock_info.take() {
            instance::release(lock, &lock_path);
        }
        if !self.signal_state.instant_shutdown.load(Ordering::SeqCst) {
            log_end!();
        }
        Ok(self.service)
    }

    fn main_loop(&mut self) {
        while self.signal_state.running.load(Ordering::SeqCst) {
            let timeout = if self.service.is_animating() {
                Duration::from_millis(ANIMATION_FRAME_MS)
            } else {
                Duration::from_millis(IDLE_POLL_MS)
            };

            match self.signal_state.signal_receiver.recv_timeout(timeout) {
                Ok(message) => {
                    if !self.handle_message(message) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    log_pipe!();
                    log_error!("Signal channel disconnected unexpectedly");
                    break;
                }
            }

            if self.service.is_animating() {
                self.service.tick(Instant::now());
            }
        }
    }

    /// Process one message. Returns false when the loop should end.
    fn handle_message(&mut self, message: SignalMessage) -> bool {
        if self.debug_enabled {
            log_pipe!();
            log_debug!("Processing {message:?}");
        }

        match message {
            SignalMessage::Reload => self.reload(),
            SignalMessage::Shutdown { instant } => {
                self.signal_state
                    .instant_shutdown
                    .store(instant, Ordering::SeqCst);
                self.signal_state.running.store(false, Ordering::SeqCst);
                return false;
            }
            SignalMessage::TimeChange
            | SignalMessage::TimezoneChange
            | SignalMessage::Sleep { resuming: true } => {
                if let Some(tracker) = &self.tracker {
                    tracker.refresh();
                }
                self.service.on_time_changed();
            }
            SignalMessage::Sleep { resuming: false } => {
                // Nothing animates while suspended
                self.service.finish_animation();
            }
            SignalMessage::Alarm(id) => self.service.on_alarm(id),
            SignalMessage::Celestial(state) => self.service.on_celestial_changed(state),
            SignalMessage::ActivationChanged(activated) => {
                self.service.on_activation_observed(activated)
            }
            SignalMessage::StateChanged => self.service.on_state_changed(),
        }
        true
    }

    /// Reload the configuration file, keeping the current one on errors.
    fn reload(&mut self) {
        match config::load() {
            Ok(new_config) => self.apply_config(new_config),
            Err(e) => {
                log_pipe!();
                log_warning!("Failed to reload configuration: {e:#}");
                log_indented!("Continuing with the previous configuration");
            }
        }
    }

    fn apply_config(&mut self, new_config: Config) {
        if new_config == *self.service.config() {
            if self.debug_enabled {
                log_pipe!();
                log_debug!("Configuration unchanged");
            }
            return;
        }

        log_block_start!("Configuration reloaded");
        if new_config.location() != self.service.config().location()
            && let Some(tracker) = &self.tracker
        {
            tracker.set_location(new_config.location());
        }
        new_config.log_config();
        self.service.apply_settings(new_config);
    }
}
