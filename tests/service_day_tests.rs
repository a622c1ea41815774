//! A simulated day with the real state file behind the service.
//!
//! Alarms, time-change registration and the celestial signal are the
//! in-memory fakes; activation and its timestamp go through `StateFile` in a
//! temporary directory, exactly as the daemon persists them.

use chrono::{DateTime, Local, TimeZone};
use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, channel};
use tempfile::tempdir;

use nightshade::args::Override;
use nightshade::backend::file::FileBackend;
use nightshade::commands::activate::apply_override;
use nightshade::config::{AutoModeSetting, Config};
use nightshade::core::{AlarmId, Host, NightDisplayService, Tint};
use nightshade::io::signals::SignalMessage;
use nightshade::io::state::StateFile;
use nightshade::testing::{RecordingAlarms, RegistrationFlag, ScriptedCelestial};
use nightshade::time::{ManualTimeSource, TimeOfDay};

fn local(day: u32, hour: u32, minute: u32) -> DateTime<Local> {
    Local
        .with_ymd_and_hms(2024, 1, day, hour, minute, 0)
        .single()
        .unwrap()
}

fn custom_config() -> Config {
    Config {
        auto_mode: Some(AutoModeSetting::Custom),
        custom_start: Some(TimeOfDay::clamped(22, 0)),
        custom_end: Some(TimeOfDay::clamped(6, 0)),
        ..Config::default()
    }
}

struct Rig {
    service: NightDisplayService,
    clock: Arc<ManualTimeSource>,
    alarms: RecordingAlarms,
    notifications: Receiver<SignalMessage>,
}

impl Rig {
    fn new(dir: &Path, clock: Arc<ManualTimeSource>) -> Self {
        let (sender, notifications) = channel();
        let state = StateFile::new(dir.join("state.toml"), clock.clone()).with_notifier(sender);
        let alarms = RecordingAlarms::new();

        let host = Host {
            clock: clock.clone(),
            sink: Box::new(state.clone()),
            timestamps: Box::new(state),
            alarms: Box::new(alarms.clone()),
            time_changes: Box::new(RegistrationFlag::default()),
            celestial: Box::new(ScriptedCelestial::default()),
        };
        let config = custom_config();
        let tint = Tint::new(
            Box::new(FileBackend::new(dir.join("matrix.json"), false)),
            config.color_coefficients(),
            config.color_temperature(),
            config.transition_duration(),
        );
        let mut service = NightDisplayService::new(host, config, tint, false);
        service.set_up();

        let mut rig = Self {
            service,
            clock,
            alarms,
            notifications,
        };
        rig.deliver();
        rig
    }

    /// Feed queued sink notifications to the service, as the core loop does.
    fn deliver(&mut self) {
        while let Ok(message) = self.notifications.try_recv() {
            if let SignalMessage::ActivationChanged(activated) = message {
                self.service.on_activation_observed(activated);
            }
        }
        self.service.finish_animation();
    }

    fn fire_alarm_at(&mut self, at: DateTime<Local>) {
        assert!(
            self.alarms.pending().contains(&(AlarmId(1), at)),
            "no alarm armed for {at}: {:?}",
            self.alarms.pending()
        );
        self.clock.set(at);
        self.alarms.fire(AlarmId(1));
        self.service.on_alarm(AlarmId(1));
        self.deliver();
    }
}

fn published_activation(dir: &Path) -> bool {
    let content = std::fs::read_to_string(dir.join("matrix.json")).unwrap();
    let document: serde_json::Value = serde_json::from_str(&content).unwrap();
    document["activated"].as_bool().unwrap()
}

#[test]
fn test_full_day_with_manual_override() {
    let dir = tempdir().unwrap();
    let clock = Arc::new(ManualTimeSource::new(local(15, 12, 0)));
    let mut rig = Rig::new(dir.path(), clock.clone());
    let cli_state = StateFile::new(dir.path().join("state.toml"), clock.clone());

    assert_eq!(rig.service.cached_activation(), Some(false));
    assert_eq!(rig.alarms.pending(), vec![(AlarmId(1), local(15, 22, 0))]);

    // The window opens
    rig.fire_alarm_at(local(15, 22, 0));
    assert_eq!(rig.service.cached_activation(), Some(true));
    assert!(published_activation(dir.path()));
    let persisted = cli_state.load().unwrap();
    assert_eq!(persisted.activated, Some(true));
    assert_eq!(
        persisted.last_activated_time,
        Some(local(15, 22, 0).naive_local())
    );

    // `nightshade off` from another process at 23:00
    clock.set(local(15, 23, 0));
    apply_override(&cli_state, Override::Off).unwrap();
    rig.service.on_state_changed();
    rig.deliver();
    assert_eq!(rig.service.cached_activation(), Some(false));
    assert!(!published_activation(dir.path()));
    assert_eq!(rig.alarms.pending(), vec![(AlarmId(1), local(16, 22, 0))]);

    // A clock adjustment later that night does not undo the override
    clock.set(local(15, 23, 30));
    rig.service.on_time_changed();
    rig.deliver();
    assert_eq!(rig.service.cached_activation(), Some(false));

    // The next evening the schedule wins again
    rig.fire_alarm_at(local(16, 22, 0));
    assert_eq!(rig.service.cached_activation(), Some(true));
    assert!(published_activation(dir.path()));
    assert_eq!(rig.alarms.pending(), vec![(AlarmId(1), local(17, 6, 0))]);

    rig.fire_alarm_at(local(17, 6, 0));
    assert_eq!(rig.service.cached_activation(), Some(false));
    assert!(!published_activation(dir.path()));
}

#[test]
fn test_override_survives_daemon_restart() {
    let dir = tempdir().unwrap();
    let clock = Arc::new(ManualTimeSource::new(local(15, 22, 30)));

    {
        let mut rig = Rig::new(dir.path(), clock.clone());
        assert_eq!(rig.service.cached_activation(), Some(true));

        clock.set(local(15, 22, 45));
        let cli_state = StateFile::new(dir.path().join("state.toml"), clock.clone());
        apply_override(&cli_state, Override::Off).unwrap();
        rig.service.on_state_changed();
        rig.deliver();
        rig.service.tear_down();
    }

    // Restarted inside the same window: the persisted timestamp keeps it off
    clock.set(local(15, 23, 15));
    let rig = Rig::new(dir.path(), clock.clone());
    assert_eq!(rig.service.cached_activation(), Some(false));
    assert_eq!(rig.alarms.pending(), vec![(AlarmId(1), local(16, 22, 0))]);
}

#[test]
fn test_restart_after_window_closed_follows_schedule() {
    let dir = tempdir().unwrap();
    let clock = Arc::new(ManualTimeSource::new(local(15, 23, 0)));

    {
        let mut rig = Rig::new(dir.path(), clock.clone());
        assert_eq!(rig.service.cached_activation(), Some(true));
        rig.service.tear_down();
    }

    // The daemon was down across the window end
    clock.set(local(16, 9, 0));
    let rig = Rig::new(dir.path(), clock.clone());
    assert_eq!(rig.service.cached_activation(), Some(false));
    let persisted = StateFile::new(dir.path().join("state.toml"), clock.clone())
        .load()
        .unwrap();
    assert_eq!(persisted.activated, Some(false));
}

#[test]
fn test_switching_to_disabled_leaves_state_alone() {
    let dir = tempdir().unwrap();
    let clock = Arc::new(ManualTimeSource::new(local(15, 23, 0)));
    let mut rig = Rig::new(dir.path(), clock.clone());
    assert_eq!(rig.service.cached_activation(), Some(true));

    let mut disabled = custom_config();
    disabled.auto_mode = Some(AutoModeSetting::Disabled);
    rig.service.apply_settings(disabled);
    rig.deliver();

    assert!(rig.service.auto_mode().is_none());
    assert!(rig.alarms.pending().is_empty());

    // Past the window end nothing turns it off any more
    clock.set(local(16, 7, 0));
    rig.service.on_time_changed();
    rig.deliver();
    assert_eq!(rig.service.cached_activation(), Some(true));
}
