//! Signal handling and the daemon's message channel.
//!
//! Every asynchronous producer (POSIX signals, system monitors, the file
//! watcher, alarm threads, the twilight tracker, the activation sink) turns
//! its event into a [`SignalMessage`] on one channel. The core loop is the
//! only consumer, which keeps all decision state single-threaded.

use anyhow::{Context, Result};
use signal_hook::{
    consts::signal::{SIGHUP, SIGINT, SIGTERM, SIGUSR2},
    iterator::Signals,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::Arc;
use std::thread;

use crate::core::{AlarmId, CelestialState};

/// Unified message type for everything the core loop reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalMessage {
    /// Configuration reload (SIGUSR2 or config file change)
    Reload,
    /// Shutdown signal (SIGTERM, SIGINT, SIGHUP)
    Shutdown { instant: bool },
    /// The wall clock was set
    TimeChange,
    /// The system time zone changed
    TimezoneChange,
    /// Sleep event detected (going to sleep or resuming)
    Sleep { resuming: bool },
    /// A scheduled alarm fired
    Alarm(AlarmId),
    /// The twilight tracker has a new day/night classification
    Celestial(Option<CelestialState>),
    /// The activation sink changed state
    ActivationChanged(bool),
    /// The persisted state file changed on disk
    StateChanged,
}

/// Signal handling state shared between threads
pub struct SignalState {
    /// Atomic flag indicating if the application should keep running
    pub running: Arc<AtomicBool>,
    /// Channel receiver for unified signal messages
    pub signal_receiver: Receiver<SignalMessage>,
    /// Channel sender handed to every producer
    pub signal_sender: Sender<SignalMessage>,
    /// Flag indicating if shutdown should skip the tint animation
    pub instant_shutdown: Arc<AtomicBool>,
}

impl SignalState {
    /// A channel with no POSIX signal thread attached, for tests and
    /// one-shot commands.
    pub fn detached() -> Self {
        let (signal_sender, signal_receiver) = channel();
        Self {
            running: Arc::new(AtomicBool::new(true)),
            signal_receiver,
            signal_sender,
            instant_shutdown: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Set up signal handling for the application.
///
/// Spawns a background thread that turns SIGUSR2 into a reload and the
/// termination signals into a shutdown message.
pub fn setup_signal_handler(debug_enabled: bool) -> Result<SignalState> {
    let state = SignalState::detached();

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP, SIGUSR2])
        .context("failed to register signal handlers")?;

    let running = state.running.clone();
    let sender = state.signal_sender.clone();

    thread::spawn(move || {
        for sig in signals.forever() {
            match sig {
                SIGUSR2 => {
                    if sender.send(SignalMessage::Reload).is_err() {
                        break;
                    }
                    log_pipe!();
                    log_info!("Received configuration reload signal");
                }
                SIGHUP => {
                    // Terminal is gone; logging would fail, skip the animation
                    running.store(false, Ordering::SeqCst);
                    let _ = sender.send(SignalMessage::Shutdown { instant: true });
                    break;
                }
                _ => {
                    log_pipe!();
                    match sig {
                        SIGINT if debug_enabled => {
                            log_info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...")
                        }
                        SIGINT => {
                            log_info!("Received interrupt signal, initiating graceful shutdown...")
                        }
                        _ => log_info!("Received termination request, initiating graceful shutdown..."),
                    }

                    if let Err(e) = sender.send(SignalMessage::Shutdown { instant: false }) {
                        log_warning!("Failed to send shutdown message: {e}");
                    }
                    running.store(false, Ordering::SeqCst);
                    break;
                }
            }
        }
    });

    Ok(state)
}
