//! Background twilight tracker.
//!
//! A single thread recomputes the [`CelestialState`] for the configured
//! location whenever the current one expires (the next sunrise or sunset),
//! and at least every [`TWILIGHT_MAX_SLEEP_SECS`] so clock jumps are caught.
//! Changes are posted as [`SignalMessage::Celestial`] while someone is
//! subscribed. [`TwilightTracker::refresh`] recalculates on the caller's
//! thread before waking the tracker, used after time changes and resume.

use chrono::Local;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use super::twilight::{celestial_state_at, next_change};
use crate::common::constants::TWILIGHT_MAX_SLEEP_SECS;
use crate::core::{CelestialSignal, CelestialState};
use crate::io::signals::SignalMessage;
use crate::time::TimeSource;

struct Shared {
    clock: Arc<dyn TimeSource>,
    sender: Sender<SignalMessage>,
    debug_enabled: bool,
    location: Mutex<Option<(f64, f64)>>,
    state: Mutex<Option<CelestialState>>,
    subscribed: AtomicBool,
    stopped: AtomicBool,
    poke: Mutex<bool>,
    wake: Condvar,
}

impl Shared {
    fn compute(&self) -> Option<CelestialState> {
        let location = *self.location.lock().ok()?;
        let (latitude, longitude) = location?;
        let now = self.clock.now();
        celestial_state_at(latitude, longitude, &now.with_timezone(&Local))
    }

    /// Recompute and store. Returns the new state when it differs.
    fn update(&self) -> Option<Option<CelestialState>> {
        let fresh = self.compute();
        let mut state = self.state.lock().ok()?;
        if *state == fresh {
            return None;
        }
        *state = fresh;
        Some(fresh)
    }

    /// Recompute and post the new state to subscribers. Returns false once
    /// the receiving side is gone.
    fn publish(&self) -> bool {
        let Some(state) = self.update() else {
            return true;
        };
        if self.debug_enabled {
            log_pipe!();
            match state {
                Some(state) => log_debug!(
                    "Twilight: {} (sunset {}, sunrise {})",
                    if state.is_night { "night" } else { "day" },
                    state.sunset.format("%Y-%m-%d %H:%M"),
                    state.sunrise.format("%Y-%m-%d %H:%M")
                ),
                None => log_debug!("Twilight: no data for the current location"),
            }
        }
        !self.subscribed.load(Ordering::SeqCst)
            || self.sender.send(SignalMessage::Celestial(state)).is_ok()
    }

    fn poke(&self) {
        if let Ok(mut poked) = self.poke.lock() {
            *poked = true;
        }
        self.wake.notify_all();
    }
}

/// Handle on the tracker thread. Clones share the same thread.
#[derive(Clone)]
pub struct TwilightTracker {
    shared: Arc<Shared>,
}

impl TwilightTracker {
    /// Start tracking `location` (none yet is fine; the state stays absent).
    pub fn start(
        clock: Arc<dyn TimeSource>,
        sender: Sender<SignalMessage>,
        location: Option<(f64, f64)>,
        debug_enabled: bool,
    ) -> Self {
        let shared = Arc::new(Shared {
            clock,
            sender,
            debug_enabled,
            location: Mutex::new(location),
            state: Mutex::new(None),
            subscribed: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            poke: Mutex::new(false),
            wake: Condvar::new(),
        });
        // Seed the cache so current_state() is meaningful right away
        let _ = shared.update();

        let tracker = Self {
            shared: shared.clone(),
        };
        thread::spawn(move || run(shared));
        tracker
    }

    /// Change the location and recompute immediately.
    pub fn set_location(&self, location: Option<(f64, f64)>) {
        if let Ok(mut current) = self.shared.location.lock() {
            *current = location;
        }
        self.shared.poke();
    }

    /// Recompute now (the clock or zone may have jumped) and reschedule the
    /// tracker's next wake-up.
    pub fn refresh(&self) {
        self.shared.publish();
        self.shared.poke();
    }

    /// Stop the thread. Further calls are no-ops.
    pub fn shutdown(&self) {
        self.shared.stopped.store(true, Ordering::SeqCst);
        self.shared.poke();
    }
}

impl CelestialSignal for TwilightTracker {
    fn subscribe(&mut self) {
        self.shared.subscribed.store(true, Ordering::SeqCst);
    }

    fn unsubscribe(&mut self) {
        self.shared.subscribed.store(false, Ordering::SeqCst);
    }

    fn current_state(&self) -> Option<CelestialState> {
        // Fresh rather than cached: the thread may be mid-sleep past an event
        let _ = self.shared.update();
        self.shared.state.lock().ok().and_then(|state| *state)
    }
}

fn run(shared: Arc<Shared>) {
    let max_sleep = Duration::from_secs(TWILIGHT_MAX_SLEEP_SECS);

    loop {
        if shared.stopped.load(Ordering::SeqCst) {
            return;
        }

        if !shared.publish() {
            return;
        }

        let current = shared.state.lock().ok().and_then(|state| *state);
        let wait = current
            .and_then(|state| {
                let now = shared.clock.now().naive_local();
                // One second past the event so the recalculation lands after it
                (next_change(&state) - now + chrono::Duration::seconds(1))
                    .to_std()
                    .ok()
            })
            .map_or(max_sleep, |until| until.min(max_sleep));

        let Ok(poked) = shared.poke.lock() else {
            return;
        };
        let Ok((mut poked, _)) = shared.wake.wait_timeout_while(poked, wait, |poked| !*poked)
        else {
            return;
        };
        *poked = false;
    }
}
