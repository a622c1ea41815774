//! Wall-clock alarms backed by sleeper threads.
//!
//! Each armed alarm owns one thread that sleeps in bounded chunks and
//! re-reads the wall clock after every chunk, so suspend, NTP corrections and
//! manual clock changes only delay a delivery by at most one chunk. Firing
//! posts [`SignalMessage::Alarm`] to the core loop.
//!
//! Re-arming an id cancels the thread previously armed for it. Cancellation
//! wakes the sleeper immediately and it exits without delivering.

use anyhow::Result;
use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use crate::common::constants::ALARM_MAX_SLEEP_SECS;
use crate::core::{AlarmId, AlarmScheduler};
use crate::io::signals::SignalMessage;
use crate::time::TimeSource;

#[derive(Default)]
struct Slot {
    cancelled: Mutex<bool>,
    wake: Condvar,
}

impl Slot {
    fn cancel(&self) {
        if let Ok(mut cancelled) = self.cancelled.lock() {
            *cancelled = true;
        }
        self.wake.notify_all();
    }
}

/// [`AlarmScheduler`] that delivers through the daemon's message channel.
pub struct ThreadAlarmScheduler {
    clock: Arc<dyn TimeSource>,
    sender: Sender<SignalMessage>,
    slots: Arc<Mutex<HashMap<AlarmId, Arc<Slot>>>>,
    max_sleep: Duration,
}

impl ThreadAlarmScheduler {
    pub fn new(clock: Arc<dyn TimeSource>, sender: Sender<SignalMessage>) -> Self {
        Self {
            clock,
            sender,
            slots: Arc::new(Mutex::new(HashMap::new())),
            max_sleep: Duration::from_secs(ALARM_MAX_SLEEP_SECS),
        }
    }

    /// Override the longest single sleep between clock readings.
    pub fn with_max_sleep(mut self, max_sleep: Duration) -> Self {
        self.max_sleep = max_sleep;
        self
    }

    /// Number of alarms armed and not yet delivered or cancelled.
    pub fn pending(&self) -> usize {
        self.slots.lock().map(|slots| slots.len()).unwrap_or(0)
    }
}

impl AlarmScheduler for ThreadAlarmScheduler {
    fn schedule_exact(&mut self, id: AlarmId, at: DateTime<Local>) -> Result<()> {
        let slot = Arc::new(Slot::default());
        {
            let mut slots = self
                .slots
                .lock()
                .map_err(|_| anyhow::anyhow!("alarm table poisoned"))?;
            if let Some(previous) = slots.insert(id, slot.clone()) {
                previous.cancel();
            }
        }

        let clock = self.clock.clone();
        let sender = self.sender.clone();
        let slots = self.slots.clone();
        let max_sleep = self.max_sleep;

        thread::Builder::new()
            .name(format!("alarm-{}", id.0))
            .spawn(move || {
                loop {
                    let remaining = (at - clock.now()).to_std().unwrap_or(Duration::ZERO);
                    let Ok(cancelled) = slot.cancelled.lock() else {
                        return;
                    };
                    if *cancelled {
                        return;
                    }
                    if remaining.is_zero() {
                        drop(cancelled);
                        break;
                    }
                    let wait = remaining.min(max_sleep);
                    // Spurious wake-ups just re-read the clock
                    let _ = slot.wake.wait_timeout(cancelled, wait);
                }

                // Only the slot still registered for this id may deliver
                let current = match slots.lock() {
                    Ok(mut slots) => match slots.get(&id) {
                        Some(registered) if Arc::ptr_eq(registered, &slot) => {
                            slots.remove(&id);
                            true
                        }
                        _ => false,
                    },
                    Err(_) => false,
                };
                if current {
                    let _ = sender.send(SignalMessage::Alarm(id));
                }
            })?;
        Ok(())
    }

    fn cancel(&mut self, id: AlarmId) {
        if let Ok(mut slots) = self.slots.lock()
            && let Some(slot) = slots.remove(&id)
        {
            slot.cancel();
        }
    }
}

impl Drop for ThreadAlarmScheduler {
    fn drop(&mut self) {
        if let Ok(mut slots) = self.slots.lock() {
            for (_, slot) in slots.drain() {
                slot.cancel();
            }
        }
    }
}
