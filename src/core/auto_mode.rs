//! The auto-mode controller: one tagged union over both strategies.
//!
//! Every operation is a single `match`, so the complete temporal logic of a
//! variant lives in its own module and nothing is hidden behind dynamic
//! dispatch.

use super::celestial::CelestialMode;
use super::collaborators::{AlarmId, CelestialState, Host};
use super::scheduled::{Boundary, ScheduledWindowMode};
use crate::time::TimeOfDay;

#[derive(Debug)]
pub enum AutoMode {
    Scheduled(ScheduledWindowMode),
    Celestial(CelestialMode),
}

impl AutoMode {
    pub fn scheduled(alarm_id: AlarmId, start: TimeOfDay, end: TimeOfDay, debug: bool) -> Self {
        AutoMode::Scheduled(ScheduledWindowMode::new(alarm_id, start, end, debug))
    }

    pub fn celestial(debug: bool) -> Self {
        AutoMode::Celestial(CelestialMode::new(debug))
    }

    pub fn name(&self) -> &'static str {
        match self {
            AutoMode::Scheduled(_) => "custom",
            AutoMode::Celestial(_) => "twilight",
        }
    }

    pub fn start(&mut self, host: &mut Host) {
        match self {
            AutoMode::Scheduled(mode) => mode.start(host),
            AutoMode::Celestial(mode) => mode.start(host),
        }
    }

    pub fn stop(&mut self, host: &mut Host) {
        match self {
            AutoMode::Scheduled(mode) => mode.stop(host),
            AutoMode::Celestial(mode) => mode.stop(host),
        }
    }

    pub fn on_activated(&mut self, host: &mut Host, activated: bool) {
        match self {
            AutoMode::Scheduled(mode) => mode.on_activated(host, activated),
            AutoMode::Celestial(mode) => mode.on_activated(host, activated),
        }
    }

    pub fn on_boundary_changed(&mut self, host: &mut Host, which: Boundary, time: TimeOfDay) {
        match self {
            AutoMode::Scheduled(mode) => mode.on_boundary_changed(host, which, time),
            AutoMode::Celestial(_) => {}
        }
    }

    pub fn on_time_changed(&mut self, host: &mut Host) {
        match self {
            AutoMode::Scheduled(mode) => mode.on_time_changed(host),
            AutoMode::Celestial(_) => {}
        }
    }

    /// Deliver an alarm. Returns false when the alarm does not belong to this
    /// controller (a leftover from a stopped instance).
    pub fn on_alarm(&mut self, host: &mut Host, id: AlarmId) -> bool {
        match self {
            AutoMode::Scheduled(mode) if mode.alarm_id() == id => {
                mode.on_alarm(host);
                true
            }
            _ => false,
        }
    }

    pub fn on_celestial_changed(&mut self, host: &mut Host, state: Option<CelestialState>) {
        match self {
            AutoMode::Celestial(mode) => mode.on_state_changed(host, state),
            AutoMode::Scheduled(_) => {}
        }
    }
}
