//! Custom-hours auto-mode: night display follows a fixed daily window.
//!
//! The window is two [`TimeOfDay`] boundaries. Each evaluation anchors them
//! to real dates around "now" (the window may span midnight), decides whether
//! night display belongs on, and arms exactly one alarm for the next
//! boundary so the decision is revisited when it can actually change.
//!
//! ## Hysteresis
//!
//! A re-evaluation must not undo a manual toggle made inside the current
//! period. If the last recorded activation change happened after the window
//! opened and is still "current" (either the window has not closed yet, or
//! the change itself happened after it closed), the sink's present value is
//! kept instead of the computed one. Only a real boundary crossing since that
//! change lets the schedule win again.

use chrono::NaiveDateTime;

use super::collaborators::{AlarmId, Host};
use crate::time::{TimeOfDay, date_time_after, date_time_before, next_occurrence_after, to_local};

/// Which boundary of the window a settings change touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    Start,
    End,
}

/// The window boundaries resolved to concrete date-times around "now".
///
/// `start <= now` always holds, and `end` is the first occurrence of the end
/// time at or after `start`, so `start <= end` even across midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchoredWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl AnchoredWindow {
    pub fn resolve(start: TimeOfDay, end: TimeOfDay, now: NaiveDateTime) -> Self {
        let start = date_time_before(start, now);
        let end = date_time_after(end, start);
        Self { start, end }
    }

    /// Whether the schedule alone says night display belongs on at `now`.
    pub fn is_active_at(&self, now: NaiveDateTime) -> bool {
        now < self.end
    }

    /// Whether an activation change at `last` is still current at `now`, in
    /// which case the sink's value should be kept.
    ///
    /// Comparisons are strict: a change recorded exactly on the anchored
    /// start, or exactly at `now`, does not hold the state.
    pub fn holds_state(&self, last: NaiveDateTime, now: NaiveDateTime) -> bool {
        last < now && last > self.start && (last > self.end || now < self.end)
    }
}

/// Decide the activation state for the custom window.
pub fn decide(
    window: &AnchoredWindow,
    now: NaiveDateTime,
    last_activated: Option<NaiveDateTime>,
    currently_activated: bool,
) -> bool {
    match last_activated {
        Some(last) if window.holds_state(last, now) => currently_activated,
        _ => window.is_active_at(now),
    }
}

/// Auto-mode driven by the custom start and end times.
#[derive(Debug)]
pub struct ScheduledWindowMode {
    alarm_id: AlarmId,
    start: TimeOfDay,
    end: TimeOfDay,
    last_activated: Option<NaiveDateTime>,
    running: bool,
    debug_enabled: bool,
}

impl ScheduledWindowMode {
    pub fn new(alarm_id: AlarmId, start: TimeOfDay, end: TimeOfDay, debug_enabled: bool) -> Self {
        Self {
            alarm_id,
            start,
            end,
            last_activated: None,
            running: false,
            debug_enabled,
        }
    }

    pub fn alarm_id(&self) -> AlarmId {
        self.alarm_id
    }

    pub fn boundaries(&self) -> (TimeOfDay, TimeOfDay) {
        (self.start, self.end)
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
        host.time_changes.register();
        self.last_activated = host.timestamps.last_activated();

        if self.debug_enabled {
            log_pipe!();
            log_debug!("Custom schedule started: {} → {}", self.start, self.end);
            match self.last_activated {
                Some(last) => log_indented!("Last activation change: {last}"),
                None => log_indented!("Last activation change: unknown"),
            }
        }

        // Force an update to initialize state
        self.evaluate(host);
    }

    pub fn stop(&mut self, host: &mut Host) {
        if self.running {
            host.time_changes.unregister();
            self.running = false;
        }
        host.alarms.cancel(self.alarm_id);
        self.last_activated = None;
    }

    /// Re-decide activation against the current clock and re-arm the alarm.
    pub fn evaluate(&mut self, host: &mut Host) {
        if !self.running {
            return;
        }

        let now = host.now();
        let window = AnchoredWindow::resolve(self.start, self.end, now);
        let activate = decide(&window, now, self.last_activated, host.sink.is_activated());

        if self.debug_enabled {
            log_pipe!();
            log_debug!(
                "Window {} → {}: night display should be {}",
                window.start,
                window.end,
                if activate { "on" } else { "off" }
            );
        }

        host.apply_activation(activate);

        let activated = host.sink.is_activated();
        self.schedule_next_alarm(host, activated, now);
    }

    /// Activation flipped (by us or externally).
    pub fn on_activated(&mut self, host: &mut Host, activated: bool) {
        if !self.running {
            return;
        }
        self.last_activated = host.timestamps.last_activated();
        let now = host.now();
        self.schedule_next_alarm(host, activated, now);
    }

    /// A boundary was edited in settings. The old activation timestamp says
    /// nothing about the new window, so it is dropped before re-evaluating.
    pub fn on_boundary_changed(&mut self, host: &mut Host, which: Boundary, time: TimeOfDay) {
        match which {
            Boundary::Start => self.start = time,
            Boundary::End => self.end = time,
        }
        self.last_activated = None;
        self.evaluate(host);
    }

    pub fn on_alarm(&mut self, host: &mut Host) {
        self.evaluate(host);
    }

    pub fn on_time_changed(&mut self, host: &mut Host) {
        self.evaluate(host);
    }

    /// The boundary the next alarm targets given an activation state.
    pub fn next_transition(&self, activated: bool, now: NaiveDateTime) -> NaiveDateTime {
        let boundary = if activated { self.end } else { self.start };
        next_occurrence_after(boundary, now)
    }

    fn schedule_next_alarm(&mut self, host: &mut Host, activated: bool, now: NaiveDateTime) {
        let next = self.next_transition(activated, now);
        if let Err(e) = host.alarms.schedule_exact(self.alarm_id, to_local(next)) {
            log_pipe!();
            log_warning!("Failed to schedule the next night display change: {e}");
            log_indented!("The schedule will be re-armed on the next time change or reload");
            return;
        }
        if self.debug_enabled {
            log_indented!(
                "Next {} at {}",
                if activated { "deactivation" } else { "activation" },
                next
            );
        }
    }
}
