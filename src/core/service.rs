//! The hosting service: owns the active auto-mode and the tint.
//!
//! [`NightDisplayService`] is the single place where notifications meet the
//! decision logic. It keeps at most one [`AutoMode`] alive, always stopping
//! the old one before starting a replacement, caches the last activation
//! value it observed from the sink, and animates the tint whenever that value
//! flips. All of its methods run on the core loop thread.

use std::time::Instant;

use super::auto_mode::AutoMode;
use super::collaborators::{AlarmId, CelestialState, Host};
use super::scheduled::Boundary;
use super::tint::Tint;
use crate::config::{AutoModeSetting, Config};
use crate::time::TimeOfDay;

pub struct NightDisplayService {
    host: Host,
    config: Config,
    tint: Tint,
    auto_mode: Option<AutoMode>,
    /// Last activation value observed from the sink; `None` until the
    /// first observation after set-up.
    is_activated: Option<bool>,
    next_alarm_id: u64,
    debug_enabled: bool,
}

impl NightDisplayService {
    pub fn new(host: Host, config: Config, tint: Tint, debug_enabled: bool) -> Self {
        Self {
            host,
            config,
            tint,
            auto_mode: None,
            is_activated: None,
            next_alarm_id: 1,
            debug_enabled,
        }
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tint(&self) -> &Tint {
        &self.tint
    }

    pub fn auto_mode(&self) -> Option<&AutoMode> {
        self.auto_mode.as_ref()
    }

    pub fn cached_activation(&self) -> Option<bool> {
        self.is_activated
    }

    /// Bring the service up from the current configuration.
    pub fn set_up(&mut self) {
        self.is_activated = None;
        self.tint.set_coefficients(
            self.config.color_coefficients(),
            self.config.color_temperature(),
        );
        self.tint.set_duration(self.config.transition_duration());

        self.on_auto_mode_changed(self.config.auto_mode());

        // Force the initialization of the activated state
        if self.is_activated.is_none() {
            let activated = self.host.sink.is_activated();
            self.on_activation_observed(activated);
        }
    }

    /// Stop the auto-mode and settle the tint.
    pub fn tear_down(&mut self) {
        if let Some(mut mode) = self.auto_mode.take() {
            mode.stop(&mut self.host);
        }
        self.tint.finish();
    }

    /// Put the display back to identity, as on daemon exit.
    pub fn reset_tint(&mut self) {
        self.tint.reset();
    }

    /// The sink reported an activation value (our own change or an
    /// external one).
    pub fn on_activation_observed(&mut self, activated: bool) {
        if self.is_activated == Some(activated) {
            return;
        }

        log_block_start!(
            "{} night display",
            if activated { "Turning on" } else { "Turning off" }
        );
        self.is_activated = Some(activated);

        if let Some(mode) = self.auto_mode.as_mut() {
            mode.on_activated(&mut self.host, activated);
        }
        self.tint.apply(activated, false, Instant::now());
    }

    /// Re-read the sink after an external write (state file edited).
    pub fn on_state_changed(&mut self) {
        let activated = self.host.sink.is_activated();
        self.on_activation_observed(activated);
    }

    pub fn on_auto_mode_changed(&mut self, setting: AutoModeSetting) {
        if let Some(mut previous) = self.auto_mode.take() {
            if self.debug_enabled {
                log_pipe!();
                log_debug!("Stopping {} auto mode", previous.name());
            }
            previous.stop(&mut self.host);
        }

        self.config.auto_mode = Some(setting);
        let mut mode = match setting {
            AutoModeSetting::Disabled => {
                log_block_start!("Auto mode: disabled (manual control only)");
                return;
            }
            AutoModeSetting::Custom => {
                let id = self.allocate_alarm_id();
                AutoMode::scheduled(
                    id,
                    self.config.custom_start(),
                    self.config.custom_end(),
                    self.debug_enabled,
                )
            }
            AutoModeSetting::Twilight => AutoMode::celestial(self.debug_enabled),
        };

        log_block_start!("Auto mode: {}", mode.name());
        mode.start(&mut self.host);
        self.auto_mode = Some(mode);
    }

    pub fn on_custom_start_changed(&mut self, time: TimeOfDay) {
        self.config.custom_start = Some(time);
        if let Some(mode) = self.auto_mode.as_mut() {
            mode.on_boundary_changed(&mut self.host, Boundary::Start, time);
        }
    }

    pub fn on_custom_end_changed(&mut self, time: TimeOfDay) {
        self.config.custom_end = Some(time);
        if let Some(mode) = self.auto_mode.as_mut() {
            mode.on_boundary_changed(&mut self.host, Boundary::End, time);
        }
    }

    /// New color temperature: rebuild the matrix and show it right away.
    pub fn on_color_temperature_changed(&mut self, kelvin: u32) {
        self.config.color_temperature = Some(kelvin);
        self.tint.set_temperature(kelvin);
        if self.is_activated == Some(true) {
            self.tint.apply(true, true, Instant::now());
        }
    }

    /// Route every setting that differs from the current configuration to
    /// its hook.
    pub fn apply_settings(&mut self, new: Config) {
        let old = std::mem::replace(&mut self.config, new.clone());

        if old.color_coefficients() != new.color_coefficients() {
            self.tint
                .set_coefficients(new.color_coefficients(), new.color_temperature());
            if self.is_activated == Some(true) {
                self.tint.apply(true, true, Instant::now());
            }
        }
        if old.transition_duration() != new.transition_duration() {
            self.tint.set_duration(new.transition_duration());
        }
        if old.backend != new.backend
            || old.output_path != new.output_path
            || old.command != new.command
        {
            self.replace_backend();
        }

        if old.auto_mode() != new.auto_mode() {
            // The new mode reads both boundaries from the new settings
            self.on_auto_mode_changed(new.auto_mode());
        } else {
            if old.custom_start() != new.custom_start() {
                self.on_custom_start_changed(new.custom_start());
            }
            if old.custom_end() != new.custom_end() {
                self.on_custom_end_changed(new.custom_end());
            }
        }

        if old.color_temperature() != new.color_temperature() {
            self.on_color_temperature_changed(new.color_temperature());
        }
    }

    pub fn on_time_changed(&mut self) {
        if let Some(mode) = self.auto_mode.as_mut() {
            mode.on_time_changed(&mut self.host);
        }
    }

    pub fn on_alarm(&mut self, id: AlarmId) {
        let delivered = match self.auto_mode.as_mut() {
            Some(mode) => mode.on_alarm(&mut self.host, id),
            None => false,
        };
        if !delivered && self.debug_enabled {
            log_pipe!();
            log_debug!("Dropping stale alarm {}", id.0);
        }
    }

    pub fn on_celestial_changed(&mut self, state: Option<CelestialState>) {
        if let Some(mode) = self.auto_mode.as_mut() {
            mode.on_celestial_changed(&mut self.host, state);
        }
    }

    /// Advance the tint animation. Returns true while frames remain.
    pub fn tick(&mut self, now: Instant) -> bool {
        self.tint.tick(now)
    }

    /// Jump a running tint animation to its end.
    pub fn finish_animation(&mut self) {
        self.tint.finish();
    }

    pub fn is_animating(&self) -> bool {
        self.tint.is_animating()
    }

    fn allocate_alarm_id(&mut self) -> AlarmId {
        let id = AlarmId(self.next_alarm_id);
        self.next_alarm_id += 1;
        id
    }

    fn replace_backend(&mut self) {
        match crate::backend::create_backend(&self.config, self.debug_enabled) {
            Ok(backend) => {
                self.tint.replace_backend(backend);
                log_block_start!("Switched to {} backend", self.tint.backend_name());
                if let Some(activated) = self.is_activated {
                    self.tint.apply(activated, true, Instant::now());
                }
            }
            Err(e) => {
                log_pipe!();
                log_warning!("Keeping {} backend: {e:#}", self.tint.backend_name());
            }
        }
    }
}
