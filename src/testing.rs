//! In-memory collaborators for exercising the service without threads,
//! files or D-Bus.
//!
//! Every fake is a cheap handle over shared state, so a test can hand one
//! clone to the [`Host`] and keep another to inspect or drive it.

use anyhow::Result;
use chrono::{DateTime, Local, NaiveDateTime};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::core::{
    ActivationSink, AlarmId, AlarmScheduler, CelestialSignal, CelestialState, Host,
    TimeChangeSource, TimestampStore,
};
use crate::time::{ManualTimeSource, TimeSource};

#[derive(Default)]
struct SinkState {
    activated: bool,
    last_activated: Option<NaiveDateTime>,
    writes: usize,
    notifications: Vec<bool>,
    fail_writes: bool,
}

/// Activation sink plus timestamp store, like the state file.
///
/// Changes are stamped with the clock and queued as notifications that the
/// test delivers to the service whenever it likes (deferred callbacks).
#[derive(Clone)]
pub struct MemorySink {
    state: Arc<Mutex<SinkState>>,
    clock: Arc<dyn TimeSource>,
}

impl MemorySink {
    pub fn new(clock: Arc<dyn TimeSource>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SinkState::default())),
            clock,
        }
    }

    /// Seed the persisted state without counting a write or notifying.
    pub fn preset(&self, activated: bool, last_activated: Option<NaiveDateTime>) {
        let mut state = self.state.lock().unwrap();
        state.activated = activated;
        state.last_activated = last_activated;
    }

    /// An external toggle (manual override from outside the service).
    pub fn toggle_externally(&self, activated: bool) {
        let now = self.clock.now().naive_local();
        let mut state = self.state.lock().unwrap();
        if state.activated != activated {
            state.activated = activated;
            state.last_activated = Some(now);
            state.notifications.push(activated);
        }
    }

    pub fn activated(&self) -> bool {
        self.state.lock().unwrap().activated
    }

    /// Number of successful `set_activated` calls that changed the value.
    pub fn writes(&self) -> usize {
        self.state.lock().unwrap().writes
    }

    /// Drain the queued change notifications.
    pub fn take_notifications(&self) -> Vec<bool> {
        std::mem::take(&mut self.state.lock().unwrap().notifications)
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_writes = fail;
    }
}

impl ActivationSink for MemorySink {
    fn is_activated(&self) -> bool {
        self.activated()
    }

    fn set_activated(&mut self, activated: bool) -> Result<()> {
        let now = self.clock.now().naive_local();
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            anyhow::bail!("sink unavailable");
        }
        if state.activated != activated {
            state.activated = activated;
            state.last_activated = Some(now);
            state.writes += 1;
            state.notifications.push(activated);
        }
        Ok(())
    }
}

impl TimestampStore for MemorySink {
    fn last_activated(&self) -> Option<NaiveDateTime> {
        self.state.lock().unwrap().last_activated
    }
}

#[derive(Default)]
struct AlarmState {
    pending: HashMap<AlarmId, DateTime<Local>>,
    scheduled: Vec<(AlarmId, DateTime<Local>)>,
    cancelled: Vec<AlarmId>,
}

/// Alarm scheduler that only records what it was asked to do.
#[derive(Clone, Default)]
pub struct RecordingAlarms {
    state: Arc<Mutex<AlarmState>>,
}

impl RecordingAlarms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently armed alarms.
    pub fn pending(&self) -> Vec<(AlarmId, DateTime<Local>)> {
        let mut pending: Vec<_> = self
            .state
            .lock()
            .unwrap()
            .pending
            .iter()
            .map(|(id, at)| (*id, *at))
            .collect();
        pending.sort_by_key(|(id, _)| id.0);
        pending
    }

    /// Every `schedule_exact` call, in order.
    pub fn scheduled(&self) -> Vec<(AlarmId, DateTime<Local>)> {
        self.state.lock().unwrap().scheduled.clone()
    }

    /// Every `cancel` call, in order.
    pub fn cancelled(&self) -> Vec<AlarmId> {
        self.state.lock().unwrap().cancelled.clone()
    }

    /// Treat the alarm for `id` as delivered.
    pub fn fire(&self, id: AlarmId) -> bool {
        self.state.lock().unwrap().pending.remove(&id).is_some()
    }
}

impl AlarmScheduler for RecordingAlarms {
    fn schedule_exact(&mut self, id: AlarmId, at: DateTime<Local>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.pending.insert(id, at);
        state.scheduled.push((id, at));
        Ok(())
    }

    fn cancel(&mut self, id: AlarmId) {
        let mut state = self.state.lock().unwrap();
        state.pending.remove(&id);
        state.cancelled.push(id);
    }
}

/// Time-change registration flag.
#[derive(Clone, Default)]
pub struct RegistrationFlag {
    registered: Arc<Mutex<bool>>,
}

impl RegistrationFlag {
    pub fn is_registered(&self) -> bool {
        *self.registered.lock().unwrap()
    }
}

impl TimeChangeSource for RegistrationFlag {
    fn register(&mut self) {
        *self.registered.lock().unwrap() = true;
    }

    fn unregister(&mut self) {
        *self.registered.lock().unwrap() = false;
    }
}

#[derive(Default)]
struct CelestialInner {
    state: Option<CelestialState>,
    subscribed: bool,
}

/// Celestial signal whose state the test sets directly.
#[derive(Clone, Default)]
pub struct ScriptedCelestial {
    inner: Arc<Mutex<CelestialInner>>,
}

impl ScriptedCelestial {
    pub fn set_state(&self, state: Option<CelestialState>) {
        self.inner.lock().unwrap().state = state;
    }

    pub fn is_subscribed(&self) -> bool {
        self.inner.lock().unwrap().subscribed
    }
}

impl CelestialSignal for ScriptedCelestial {
    fn subscribe(&mut self) {
        self.inner.lock().unwrap().subscribed = true;
    }

    fn unsubscribe(&mut self) {
        self.inner.lock().unwrap().subscribed = false;
    }

    fn current_state(&self) -> Option<CelestialState> {
        self.inner.lock().unwrap().state
    }
}

/// Test-side handles on the collaborators inside a [`Host`].
#[derive(Clone)]
pub struct Fakes {
    pub clock: Arc<ManualTimeSource>,
    pub sink: MemorySink,
    pub alarms: RecordingAlarms,
    pub time_changes: RegistrationFlag,
    pub celestial: ScriptedCelestial,
}

/// Build a host wired to fresh fakes, with the clock at `now`.
pub fn fake_host(now: DateTime<Local>) -> (Host, Fakes) {
    let clock = Arc::new(ManualTimeSource::new(now));
    let fakes = Fakes {
        clock: clock.clone(),
        sink: MemorySink::new(clock.clone()),
        alarms: RecordingAlarms::new(),
        time_changes: RegistrationFlag::default(),
        celestial: ScriptedCelestial::default(),
    };
    let host = Host {
        clock,
        sink: Box::new(fakes.sink.clone()),
        timestamps: Box::new(fakes.sink.clone()),
        alarms: Box::new(fakes.alarms.clone()),
        time_changes: Box::new(fakes.time_changes.clone()),
        celestial: Box::new(fakes.celestial.clone()),
    };
    (host, fakes)
}
