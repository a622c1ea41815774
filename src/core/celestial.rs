//! Sunset-to-sunrise auto-mode: night display follows the twilight tracker.
//!
//! There is no alarm here. The tracker pushes a fresh [`CelestialState`]
//! whenever day turns to night or back, and the controller re-decides on
//! every push. A missing state (no location yet, polar day) leaves the
//! display exactly as it is.

use chrono::NaiveDateTime;

use super::collaborators::{CelestialState, Host};

/// Whether an activation change at `last` already happened inside the
/// period described by `state`, in which case the sink's value is kept.
///
/// `last` has to be in the past and lie before exactly one of the two
/// events: after the sunset that started this night but before the sunrise
/// ending it, or after this morning's sunrise but before tonight's sunset.
pub fn holds_state(state: &CelestialState, last: NaiveDateTime, now: NaiveDateTime) -> bool {
    last < now && ((last < state.sunrise) ^ (last < state.sunset))
}

/// Decide the activation state for a celestial update.
pub fn decide(
    state: &CelestialState,
    now: NaiveDateTime,
    last_activated: Option<NaiveDateTime>,
    currently_activated: bool,
) -> bool {
    match last_activated {
        Some(last) if holds_state(state, last, now) => currently_activated,
        _ => state.is_night,
    }
}

/// Auto-mode driven by sunrise and sunset at the configured location.
#[derive(Debug, Default)]
pub struct CelestialMode {
    last_activated: Option<NaiveDateTime>,
    running: bool,
    debug_enabled: bool,
}

impl CelestialMode {
    pub fn new(debug_enabled: bool) -> Self {
        Self {
            last_activated: None,
            running: false,
            debug_enabled,
        }
    }

    pub fn last_activated(&self) -> Option<NaiveDateTime> {
        self.last_activated
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn start(&mut self, host: &mut Host) {
        if self.running {
            return;
        }
        self.running = true;
        self.last_activated = host.timestamps.last_activated();
        host.celestial.subscribe();

        // Force an update to initialize state
        let state = host.celestial.current_state();
        self.evaluate(host, state);
    }

    pub fn stop(&mut self, host: &mut Host) {
        if self.running {
            host.celestial.unsubscribe();
            self.running = false;
        }
        self.last_activated = None;
    }

    pub fn evaluate(&mut self, host: &mut Host, state: Option<CelestialState>) {
        if !self.running {
            return;
        }
        let Some(state) = state else {
            // No twilight data yet: keep whatever is currently applied
            if self.debug_enabled {
                log_pipe!();
                log_debug!("No twilight data available, keeping current state");
            }
            return;
        };

        let now = host.now();
        let activate = decide(&state, now, self.last_activated, host.sink.is_activated());

        if self.debug_enabled {
            log_pipe!();
            log_debug!(
                "Twilight: {} (sunset {}, sunrise {}): night display should be {}",
                if state.is_night { "night" } else { "day" },
                state.sunset,
                state.sunrise,
                if activate { "on" } else { "off" }
            );
        }

        host.apply_activation(activate);
    }

    pub fn on_activated(&mut self, host: &mut Host, _activated: bool) {
        if !self.running {
            return;
        }
        self.last_activated = host.timestamps.last_activated();
    }

    pub fn on_state_changed(&mut self, host: &mut Host, state: Option<CelestialState>) {
        if self.debug_enabled {
            log_pipe!();
            log_debug!(
                "Twilight state changed: is_night={:?}",
                state.map(|s| s.is_night)
            );
        }
        self.evaluate(host, state);
    }
}
