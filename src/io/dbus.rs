//! D-Bus and system event monitoring.
//!
//! This module provides detection for:
//! - Sleep/resume events via systemd-logind PrepareForSleep signal (D-Bus)
//! - Time zone changes via systemd-timedated's `Timezone` property (D-Bus)
//! - Time changes via timerfd with TFD_TIMER_CANCEL_ON_SET (kernel mechanism)
//!
//! Each mechanism runs in its own thread and posts a [`SignalMessage`].
//! Time and time zone notices are always forwarded: the twilight tracker
//! needs them in every mode. [`SystemTimeChanges`] records whether an
//! auto-mode has registered for them, which only decides how loudly they are
//! logged; the core loop routes them to the active mode.

use anyhow::{Context, Result};
use nix::errno::Errno;
use nix::sys::time::TimeSpec;
use nix::sys::timerfd::{ClockId, Expiration, TimerFd, TimerFlags, TimerSetTimeFlags};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::mpsc::Sender;
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};
use zbus::blocking::Connection;

use crate::core::TimeChangeSource;
use crate::io::signals::SignalMessage;

/// D-Bus proxy trait for systemd-logind Manager interface.
#[zbus::proxy(
    interface = "org.freedesktop.login1.Manager",
    default_service = "org.freedesktop.login1",
    default_path = "/org/freedesktop/login1"
)]
trait LogindManager {
    /// `start` is true when the system is about to suspend and false on resume.
    #[zbus(signal)]
    fn prepare_for_sleep(&self, start: bool) -> zbus::Result<()>;
}

/// D-Bus proxy for systemd-timedated.
#[zbus::proxy(
    interface = "org.freedesktop.timedate1",
    default_service = "org.freedesktop.timedate1",
    default_path = "/org/freedesktop/timedate1"
)]
trait Timedate {
    #[zbus(property)]
    fn timezone(&self) -> zbus::Result<String>;
}

/// Registration record for time and time zone notices.
///
/// The monitors run for the whole life of the daemon and forward what they
/// detect either way.
#[derive(Clone, Default)]
pub struct SystemTimeChanges {
    registered: Arc<AtomicBool>,
}

impl SystemTimeChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }
}

impl TimeChangeSource for SystemTimeChanges {
    fn register(&mut self) {
        self.registered.store(true, Ordering::SeqCst);
    }

    fn unregister(&mut self) {
        self.registered.store(false, Ordering::SeqCst);
    }
}

/// Post a time or time zone notice to the core loop. Returns false once the
/// receiving side is gone.
fn forward_time_notice(
    signal_sender: &Sender<SignalMessage>,
    gate: &SystemTimeChanges,
    message: SignalMessage,
    description: &str,
    debug_enabled: bool,
) -> bool {
    if gate.is_registered() {
        log_pipe!();
        log_info!("{description}");
    } else if debug_enabled {
        log_pipe!();
        log_debug!("{description}");
    }
    signal_sender.send(message).is_ok()
}

/// Tracks sleep state to coordinate between sleep and time change detection
#[derive(Clone)]
struct SleepTracker {
    is_sleeping: Arc<AtomicBool>,
    /// Unix epoch seconds of the last resume, 0 before the first one
    resume_time: Arc<AtomicI64>,
}

impl SleepTracker {
    fn new() -> Self {
        Self {
            is_sleeping: Arc::new(AtomicBool::new(false)),
            resume_time: Arc::new(AtomicI64::new(0)),
        }
    }

    fn current_timestamp() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }

    /// Clock jumps within a few seconds of resume come from the suspend
    /// itself; the resume notice already covers them.
    fn in_resume_grace_period(&self) -> bool {
        let resume_time = self.resume_time.load(Ordering::Relaxed);
        resume_time != 0 && (Self::current_timestamp() - resume_time) <= 5
    }
}

/// Start system event monitoring in dedicated threads.
///
/// Failures are logged and the daemon continues without the affected
/// detection; alarms still fire because alarm threads re-read the clock.
pub fn start_system_monitors(
    signal_sender: Sender<SignalMessage>,
    gate: SystemTimeChanges,
    debug_enabled: bool,
) {
    let sleep_tracker = SleepTracker::new();

    thread::spawn({
        let signal_sender = signal_sender.clone();
        let sleep_tracker = sleep_tracker.clone();
        move || {
            const MAX_RESTARTS: u8 = 3;
            const RESTART_DELAY_MS: u64 = 2000;

            for attempt in 0..=MAX_RESTARTS {
                match monitor_sleep_signals(&signal_sender, debug_enabled, &sleep_tracker) {
                    Ok(()) => return,
                    Err(e) => {
                        log_pipe!();
                        log_warning!("Sleep monitor error: {e}");
                        if attempt == MAX_RESTARTS {
                            log_indented!("Sleep/resume detection will not be available");
                            return;
                        }
                        log_indented!(
                            "Will restart D-Bus monitor (attempt {}/{})",
                            attempt + 1,
                            MAX_RESTARTS
                        );
                        thread::sleep(std::time::Duration::from_millis(RESTART_DELAY_MS));
                    }
                }
            }
        }
    });

    thread::spawn({
        let signal_sender = signal_sender.clone();
        let gate = gate.clone();
        move || {
            if let Err(e) = monitor_timezone(&signal_sender, &gate, debug_enabled) {
                log_pipe!();
                log_warning!("Time zone monitor error: {e}");
                log_indented!("Time zone changes will be picked up at the next alarm");
            }
        }
    });

    thread::spawn(move || {
        if let Err(e) = monitor_time_changes(&signal_sender, &gate, debug_enabled, &sleep_tracker) {
            log_pipe!();
            log_warning!("Time change monitor error: {e}");
            log_indented!("System time change detection will not be available");
        }
    });
}

/// Monitor PrepareForSleep signals. Returns Ok when the channel closes.
fn monitor_sleep_signals(
    signal_sender: &Sender<SignalMessage>,
    debug_enabled: bool,
    sleep_tracker: &SleepTracker,
) -> Result<()> {
    let connection = Connection::system().context("Failed to connect to system D-Bus")?;
    let logind_proxy =
        LogindManagerProxyBlocking::new(&connection).context("Failed to create logind proxy")?;
    let sleep_signals = logind_proxy
        .receive_prepare_for_sleep()
        .context("Failed to subscribe to PrepareForSleep signals")?;

    if debug_enabled {
        log_pipe!();
        log_debug!("Subscribed to systemd-logind PrepareForSleep signals");
    }

    for signal in sleep_signals {
        let args = match signal.args() {
            Ok(args) => args,
            Err(e) => {
                log_pipe!();
                log_warning!("Failed to parse PrepareForSleep signal args: {e}");
                continue;
            }
        };

        if args.start {
            sleep_tracker.is_sleeping.store(true, Ordering::SeqCst);
            if debug_enabled {
                log_pipe!();
                log_debug!("System entering sleep/suspend mode");
            }
            if signal_sender
                .send(SignalMessage::Sleep { resuming: false })
                .is_err()
            {
                return Ok(());
            }
        } else {
            sleep_tracker
                .resume_time
                .store(SleepTracker::current_timestamp(), Ordering::SeqCst);
            sleep_tracker.is_sleeping.store(false, Ordering::SeqCst);

            log_pipe!();
            log_info!("System resuming from sleep/suspend");
            if signal_sender
                .send(SignalMessage::Sleep { resuming: true })
                .is_err()
            {
                return Ok(());
            }
        }
    }

    anyhow::bail!("D-Bus connection lost - PrepareForSleep signal stream ended")
}

/// Monitor the system time zone through systemd-timedated.
fn monitor_timezone(
    signal_sender: &Sender<SignalMessage>,
    gate: &SystemTimeChanges,
    debug_enabled: bool,
) -> Result<()> {
    let connection = Connection::system().context("Failed to connect to system D-Bus")?;
    let proxy = TimedateProxyBlocking::new(&connection).context("Failed to create timedated proxy")?;
    let mut current = proxy.timezone().ok();

    if debug_enabled {
        log_pipe!();
        log_debug!(
            "Watching time zone changes (current: {})",
            current.as_deref().unwrap_or("unknown")
        );
    }

    for changed in proxy.receive_timezone_changed() {
        let Ok(zone) = changed.get() else {
            continue;
        };
        if current.as_deref() == Some(zone.as_str()) {
            continue;
        }
        current = Some(zone.clone());

        if !forward_time_notice(
            signal_sender,
            gate,
            SignalMessage::TimezoneChange,
            &format!("System time zone changed to {zone}"),
            debug_enabled,
        ) {
            return Ok(());
        }
    }

    anyhow::bail!("D-Bus connection lost - time zone property stream ended")
}

/// Time change detector using nix crate's timerfd API.
///
/// A timer armed far in the future with TFD_TIMER_CANCEL_ON_SET only ever
/// wakes up because the realtime clock was set.
struct TimeChangeDetector {
    timer: TimerFd,
}

impl TimeChangeDetector {
    fn new() -> nix::Result<Self> {
        let timer = TimerFd::new(ClockId::CLOCK_REALTIME, TimerFlags::empty())?;
        let mut detector = TimeChangeDetector { timer };
        detector.arm_timer()?;
        Ok(detector)
    }

    fn arm_timer(&mut self) -> nix::Result<()> {
        let flags =
            TimerSetTimeFlags::TFD_TIMER_ABSTIME | TimerSetTimeFlags::TFD_TIMER_CANCEL_ON_SET;
        // Far enough to never expire, small enough not to overflow
        let far_future = TimeSpec::new(i64::MAX / 1000, 0);
        self.timer.set(Expiration::OneShot(far_future), flags)?;
        Ok(())
    }

    fn wait_for_time_change(&mut self) -> Result<()> {
        match self.timer.wait() {
            Ok(()) | Err(Errno::ECANCELED) => {
                self.arm_timer().context("Failed to re-arm timer")?;
                Ok(())
            }
            Err(other) => Err(anyhow::anyhow!("Timer wait error: {other}")),
        }
    }
}

/// Monitor system time changes. Does not see DST transitions, which do not
/// change the system clock; the anchoring math handles those.
fn monitor_time_changes(
    signal_sender: &Sender<SignalMessage>,
    gate: &SystemTimeChanges,
    debug_enabled: bool,
    sleep_tracker: &SleepTracker,
) -> Result<()> {
    let mut detector =
        TimeChangeDetector::new().context("Failed to create time change detector")?;

    if debug_enabled {
        log_pipe!();
        log_debug!("Starting timerfd-based time change monitoring");
    }

    loop {
        detector
            .wait_for_time_change()
            .context("Time change detection failed")?;

        if sleep_tracker.in_resume_grace_period()
            || sleep_tracker.is_sleeping.load(Ordering::Relaxed)
        {
            continue;
        }

        if !forward_time_notice(
            signal_sender,
            gate,
            SignalMessage::TimeChange,
            "System time changed (clock adjustment/NTP/manual)",
            debug_enabled,
        ) {
            return Ok(());
        }
    }
}
