//! Status command: what is persisted, and what the auto-mode would decide.
//!
//! The report is computed from the configuration and the state file with the
//! same decision functions the daemon uses, so it answers "would the daemon
//! change anything right now?" without talking to it.

use anyhow::Result;
use chrono::NaiveDateTime;

use crate::config::{AutoModeSetting, Config};
use crate::core::{AnchoredWindow, CelestialState, celestial, scheduled};
use crate::io::state::{PersistedState, StateFile, default_state_path};
use crate::time::next_occurrence_after;

/// Snapshot of the decision inputs and outcome at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub mode: AutoModeSetting,
    pub activated: bool,
    pub last_activated: Option<NaiveDateTime>,
    /// Custom mode only.
    pub window: Option<AnchoredWindow>,
    /// Twilight mode only; `None` without a location or in polar day/night.
    pub celestial: Option<CelestialState>,
    /// What the auto-mode would set now. `None` when it would not act.
    pub decision: Option<bool>,
    pub next_change: Option<NaiveDateTime>,
}

impl StatusReport {
    /// Whether a running daemon would flip the persisted value right now.
    pub fn would_change(&self) -> bool {
        self.decision.is_some_and(|decision| decision != self.activated)
    }
}

/// Build the report for `now`.
pub fn describe(config: &Config, persisted: &PersistedState, now: NaiveDateTime) -> StatusReport {
    let activated = persisted.is_activated();
    let last_activated = persisted.last_activated_time;
    let mode = config.auto_mode();

    let mut report = StatusReport {
        mode,
        activated,
        last_activated,
        window: None,
        celestial: None,
        decision: None,
        next_change: None,
    };

    match mode {
        AutoModeSetting::Disabled => {}
        AutoModeSetting::Custom => {
            let window = AnchoredWindow::resolve(config.custom_start(), config.custom_end(), now);
            let decision = scheduled::decide(&window, now, last_activated, activated);
            let boundary = if decision {
                config.custom_end()
            } else {
                config.custom_start()
            };
            report.window = Some(window);
            report.decision = Some(decision);
            report.next_change = Some(next_occurrence_after(boundary, now));
        }
        AutoModeSetting::Twilight => {
            let state = config.location().and_then(|(latitude, longitude)| {
                crate::geo::celestial_state_at(latitude, longitude, &crate::time::to_local(now))
            });
            if let Some(state) = state {
                report.decision = Some(celestial::decide(&state, now, last_activated, activated));
                report.next_change = Some(crate::geo::next_change(&state));
            }
            report.celestial = state;
        }
    }

    report
}

/// Handle `nightshade status`.
pub fn handle_status_command(debug_enabled: bool) -> Result<()> {
    let config = Config::load()?;
    let clock = crate::time::source::shared();
    let state_file = StateFile::new(default_state_path()?, clock.clone());
    let persisted = state_file.load()?;

    let report = describe(&config, &persisted, clock.now().naive_local());
    let daemon = crate::io::instance::get_running_instance().ok().flatten();

    print_report(&report);
    match daemon {
        Some(info) => println!("        Daemon: running (PID {})", info.pid),
        None => println!("        Daemon: not running"),
    }
    if debug_enabled {
        println!("    State file: {}", state_file.path().display());
    }
    Ok(())
}

fn on_off(activated: bool) -> &'static str {
    if activated { "on" } else { "off" }
}

fn print_report(report: &StatusReport) {
    println!("     Auto mode: {}", report.mode.as_str());
    println!(" Night display: {}", on_off(report.activated));
    match report.last_activated {
        Some(last) => println!("  Last changed: {}", last.format("%Y-%m-%d %H:%M:%S")),
        None => println!("  Last changed: never"),
    }

    if let Some(window) = &report.window {
        println!(
            "        Window: {} → {}",
            window.start.format("%Y-%m-%d %H:%M"),
            window.end.format("%Y-%m-%d %H:%M")
        );
    }
    if report.mode == AutoModeSetting::Twilight {
        match &report.celestial {
            Some(state) => {
                println!(
                    "      Twilight: {} (sunset {}, sunrise {})",
                    if state.is_night { "night" } else { "day" },
                    state.sunset.format("%Y-%m-%d %H:%M"),
                    state.sunrise.format("%Y-%m-%d %H:%M")
                );
            }
            None => println!("      Twilight: unavailable (no location, or polar day/night)"),
        }
    }

    if let Some(decision) = report.decision {
        let note = if report.would_change() {
            " (manual state will be replaced)"
        } else {
            ""
        };
        println!("      Schedule: {}{}", on_off(decision), note);
    }
    if let Some(next) = report.next_change {
        println!("   Next change: {}", next.format("%Y-%m-%d %H:%M"));
    }
}
