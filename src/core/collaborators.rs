//! Contracts between the auto-mode controllers and the rest of the system.
//!
//! The controllers never touch files, threads or the display directly. They
//! talk to the collaborators below, bundled in a [`Host`] that the owning
//! service lends to every controller call. The daemon wires real
//! implementations (state file, alarm threads, twilight tracker, system
//! monitors); tests wire in-memory ones.

use anyhow::Result;
use chrono::{DateTime, Local, NaiveDateTime};
use std::sync::Arc;

use crate::time::TimeSource;

/// Identity of the controller instance that owns an alarm.
///
/// Deliveries carrying an id that no longer belongs to the running
/// controller are stale and get dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AlarmId(pub u64);

/// Day/night classification produced by the twilight tracker.
///
/// `sunrise` and `sunset` bracket the current period: during the day they are
/// today's sunrise and sunset; at night they are the sunset that started the
/// night and the sunrise that will end it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CelestialState {
    pub is_night: bool,
    pub sunrise: NaiveDateTime,
    pub sunset: NaiveDateTime,
}

/// Where activation actually happens. Its flag is the source of truth and may
/// be changed behind the controller's back (manual toggles).
pub trait ActivationSink {
    fn is_activated(&self) -> bool;

    /// Turn night display on or off. The change is reported back to the
    /// service as an activation notification, possibly after this returns.
    fn set_activated(&mut self, activated: bool) -> Result<()>;
}

/// Durable record of the most recent activation change.
pub trait TimestampStore {
    /// Local wall-clock time of the last activation change, `None` when it
    /// was never recorded or cannot be read.
    fn last_activated(&self) -> Option<NaiveDateTime>;
}

/// One-shot wake-ups at absolute wall-clock instants.
#[cfg_attr(test, mockall::automock)]
pub trait AlarmScheduler {
    /// Arm the alarm for `id`, replacing any pending alarm with the same id.
    fn schedule_exact(&mut self, id: AlarmId, at: DateTime<Local>) -> Result<()>;

    /// Disarm the alarm for `id`. No delivery for `id` happens afterwards.
    fn cancel(&mut self, id: AlarmId);
}

/// Registration for "system time changed" and "time zone changed" notices.
#[cfg_attr(test, mockall::automock)]
pub trait TimeChangeSource {
    fn register(&mut self);
    fn unregister(&mut self);
}

/// Push source of [`CelestialState`] updates.
#[cfg_attr(test, mockall::automock)]
pub trait CelestialSignal {
    fn subscribe(&mut self);
    fn unsubscribe(&mut self);
    fn current_state(&self) -> Option<CelestialState>;
}

/// Everything a controller may call, owned by the hosting service.
pub struct Host {
    pub clock: Arc<dyn TimeSource>,
    pub sink: Box<dyn ActivationSink + Send>,
    pub timestamps: Box<dyn TimestampStore + Send>,
    pub alarms: Box<dyn AlarmScheduler + Send>,
    pub time_changes: Box<dyn TimeChangeSource + Send>,
    pub celestial: Box<dyn CelestialSignal + Send>,
}

impl Host {
    /// Current local wall-clock reading.
    pub fn now(&self) -> NaiveDateTime {
        self.clock.now().naive_local()
    }

    /// Command the sink only when the desired value differs from what it
    /// currently reports. Failures are logged, never propagated.
    pub(crate) fn apply_activation(&mut self, activate: bool) {
        if self.sink.is_activated() == activate {
            return;
        }
        if let Err(e) = self.sink.set_activated(activate) {
            log_pipe!();
            log_warning!(
                "Failed to turn {} night display: {e}",
                if activate { "on" } else { "off" }
            );
        }
    }
}
