//! Tests for the auto-mode controllers and the hosting service.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use std::sync::Arc;

use super::celestial::{self, CelestialMode};
use super::collaborators::{
    AlarmId, CelestialState, Host, MockAlarmScheduler, MockCelestialSignal, MockTimeChangeSource,
};
use super::scheduled::{self, AnchoredWindow, ScheduledWindowMode};
use super::{AutoMode, ColorMatrix, NightDisplayService, Tint};
use crate::backend::TintBackend;
use crate::config::{AutoModeSetting, Config};
use crate::testing::{Fakes, MemorySink, fake_host};
use crate::time::{ManualTimeSource, TimeOfDay};

fn local(day: u32, hour: u32, minute: u32) -> DateTime<Local> {
    Local
        .with_ymd_and_hms(2024, 1, day, hour, minute, 0)
        .single()
        .unwrap()
}

fn naive(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    local(day, hour, minute).naive_local()
}

fn tod(hour: u32, minute: u32) -> TimeOfDay {
    TimeOfDay::clamped(hour, minute)
}

struct NullBackend;

impl TintBackend for NullBackend {
    fn apply_matrix(&mut self, _matrix: &ColorMatrix) -> anyhow::Result<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "Null"
    }
}

fn custom_config(start: TimeOfDay, end: TimeOfDay) -> Config {
    Config {
        auto_mode: Some(AutoModeSetting::Custom),
        custom_start: Some(start),
        custom_end: Some(end),
        ..Config::default()
    }
}

fn service_at(now: DateTime<Local>, config: Config) -> (NightDisplayService, Fakes) {
    let (host, fakes) = fake_host(now);
    let tint = Tint::new(
        Box::new(NullBackend),
        config.color_coefficients(),
        config.color_temperature(),
        config.transition_duration(),
    );
    (NightDisplayService::new(host, config, tint, false), fakes)
}

/// Hand the sink's deferred change notifications to the service.
fn deliver(service: &mut NightDisplayService, fakes: &Fakes) {
    for activated in fakes.sink.take_notifications() {
        service.on_activation_observed(activated);
    }
}

mod anchoring {
    use super::*;

    #[test]
    fn test_late_evening_is_inside_overnight_window() {
        let window = AnchoredWindow::resolve(tod(22, 0), tod(6, 0), naive(15, 23, 30));
        assert_eq!(window.start, naive(15, 22, 0));
        assert_eq!(window.end, naive(16, 6, 0));
        assert!(window.is_active_at(naive(15, 23, 30)));
    }

    #[test]
    fn test_midday_is_outside_overnight_window() {
        let window = AnchoredWindow::resolve(tod(22, 0), tod(6, 0), naive(15, 12, 0));
        assert_eq!(window.start, naive(14, 22, 0));
        assert_eq!(window.end, naive(15, 6, 0));
        assert!(!window.is_active_at(naive(15, 12, 0)));
    }

    #[test]
    fn test_early_morning_belongs_to_previous_evening() {
        let window = AnchoredWindow::resolve(tod(22, 0), tod(6, 0), naive(15, 3, 0));
        assert_eq!(window.start, naive(14, 22, 0));
        assert_eq!(window.end, naive(15, 6, 0));
        assert!(window.is_active_at(naive(15, 3, 0)));
    }

    #[test]
    fn test_daytime_window_does_not_wrap() {
        let window = AnchoredWindow::resolve(tod(8, 0), tod(17, 0), naive(15, 9, 0));
        assert_eq!(window.start, naive(15, 8, 0));
        assert_eq!(window.end, naive(15, 17, 0));

        let evening = AnchoredWindow::resolve(tod(8, 0), tod(17, 0), naive(15, 18, 0));
        assert!(!evening.is_active_at(naive(15, 18, 0)));
    }

    #[test]
    fn test_now_on_start_boundary_opens_window() {
        let window = AnchoredWindow::resolve(tod(22, 0), tod(6, 0), naive(15, 22, 0));
        assert_eq!(window.start, naive(15, 22, 0));
        assert!(window.is_active_at(naive(15, 22, 0)));
    }

    #[test]
    fn test_equal_boundaries_make_an_empty_window() {
        let window = AnchoredWindow::resolve(tod(22, 0), tod(22, 0), naive(15, 23, 0));
        assert_eq!(window.start, window.end);
        assert!(!window.is_active_at(naive(15, 23, 0)));
    }
}

mod scheduled_hysteresis {
    use super::*;

    fn window() -> AnchoredWindow {
        AnchoredWindow::resolve(tod(22, 0), tod(6, 0), naive(15, 23, 30))
    }

    #[test]
    fn test_unknown_timestamp_follows_schedule() {
        assert!(scheduled::decide(&window(), naive(15, 23, 30), None, false));
    }

    #[test]
    fn test_manual_toggle_inside_window_is_kept() {
        // Turned off by hand at 23:00, re-evaluated at 23:30
        let last = Some(naive(15, 23, 0));
        assert!(!scheduled::decide(&window(), naive(15, 23, 30), last, false));
        assert!(scheduled::decide(&window(), naive(15, 23, 30), last, true));
    }

    #[test]
    fn test_change_before_window_opened_yields_to_schedule() {
        let last = Some(naive(15, 21, 0));
        assert!(scheduled::decide(&window(), naive(15, 23, 30), last, false));
    }

    #[test]
    fn test_change_after_window_closed_is_kept() {
        // Window 22:00 → 06:00 closed; turned on by hand at 06:30
        let now = naive(16, 7, 0);
        let window = AnchoredWindow::resolve(tod(22, 0), tod(6, 0), now);
        let last = Some(naive(16, 6, 30));
        assert!(scheduled::decide(&window, now, last, true));
    }

    #[test]
    fn test_change_inside_window_expires_when_it_closes() {
        // Turned off at 23:00; after 06:00 the schedule says off anyway, and
        // on for the next evening once the new window opens
        let now = naive(16, 7, 0);
        let window = AnchoredWindow::resolve(tod(22, 0), tod(6, 0), now);
        assert!(!window.holds_state(naive(15, 23, 0), now));

        let next_evening = naive(16, 22, 30);
        let window = AnchoredWindow::resolve(tod(22, 0), tod(6, 0), next_evening);
        assert!(scheduled::decide(&window, next_evening, Some(naive(15, 23, 0)), false));
    }

    #[test]
    fn test_boundary_equalities_do_not_hold() {
        let window = window();
        // Exactly on the anchored start
        assert!(!window.holds_state(naive(15, 22, 0), naive(15, 23, 30)));
        // Exactly now
        assert!(!window.holds_state(naive(15, 23, 30), naive(15, 23, 30)));
        // In the future (clock went backwards)
        assert!(!window.holds_state(naive(15, 23, 45), naive(15, 23, 30)));
    }
}

mod celestial_hysteresis {
    use super::*;

    fn night() -> CelestialState {
        CelestialState {
            is_night: true,
            sunrise: naive(16, 6, 0),
            sunset: naive(15, 18, 0),
        }
    }

    #[test]
    fn test_same_side_of_both_events_uses_computed_value() {
        // Before sunset and before sunrise
        let last = Some(naive(15, 10, 0));
        assert!(celestial::decide(&night(), naive(15, 23, 0), last, false));
    }

    #[test]
    fn test_opposite_sides_preserve_state() {
        // After sunset, before sunrise: toggled during this night
        let last = Some(naive(15, 20, 0));
        assert!(!celestial::decide(&night(), naive(15, 23, 0), last, false));
        assert!(celestial::decide(&night(), naive(15, 23, 0), last, true));
    }

    #[test]
    fn test_future_timestamp_is_ignored() {
        let last = Some(naive(15, 23, 30));
        assert!(celestial::decide(&night(), naive(15, 23, 0), last, false));
    }

    #[test]
    fn test_absent_state_never_changes_activation() {
        for initially in [false, true] {
            let (mut host, fakes) = fake_host(local(15, 23, 0));
            fakes.sink.preset(initially, None);
            let mut mode = CelestialMode::new(false);
            mode.start(&mut host);
            mode.on_state_changed(&mut host, None);
            assert_eq!(fakes.sink.activated(), initially);
            assert_eq!(fakes.sink.writes(), 0);
        }
    }

    #[test]
    fn test_start_subscribes_and_applies_current_state() {
        let (mut host, fakes) = fake_host(local(15, 23, 0));
        fakes.celestial.set_state(Some(night()));
        let mut mode = CelestialMode::new(false);

        mode.start(&mut host);
        assert!(fakes.celestial.is_subscribed());
        assert!(fakes.sink.activated());

        mode.stop(&mut host);
        assert!(!fakes.celestial.is_subscribed());
        assert_eq!(mode.last_activated(), None);
    }

    #[test]
    fn test_day_after_manual_toggle_at_night_resets() {
        let (mut host, fakes) = fake_host(local(15, 23, 0));
        fakes.celestial.set_state(Some(night()));
        let mut mode = CelestialMode::new(false);
        mode.start(&mut host);

        // Turned off by hand during the night: kept on re-evaluation
        fakes.clock.set(local(15, 23, 30));
        fakes.sink.toggle_externally(false);
        mode.on_activated(&mut host, false);
        fakes.clock.set(local(15, 23, 45));
        mode.on_state_changed(&mut host, Some(night()));
        assert!(!fakes.sink.activated());

        // Next night, the schedule wins again
        fakes.clock.set(local(16, 19, 0));
        let next_night = CelestialState {
            is_night: true,
            sunrise: naive(17, 6, 0),
            sunset: naive(16, 18, 0),
        };
        mode.on_state_changed(&mut host, Some(next_night));
        assert!(fakes.sink.activated());
    }
}

mod scheduled_mode {
    use super::*;
    use mockall::predicate::eq;

    fn mode() -> ScheduledWindowMode {
        ScheduledWindowMode::new(AlarmId(1), tod(22, 0), tod(6, 0), false)
    }

    #[test]
    fn test_start_inside_window_activates_and_arms_end() {
        let (mut host, fakes) = fake_host(local(15, 23, 30));
        let mut mode = mode();
        mode.start(&mut host);

        assert!(fakes.sink.activated());
        assert!(fakes.time_changes.is_registered());
        assert_eq!(fakes.alarms.pending(), vec![(AlarmId(1), local(16, 6, 0))]);
    }

    #[test]
    fn test_repeated_evaluation_writes_once() {
        let (mut host, fakes) = fake_host(local(15, 23, 30));
        let mut mode = mode();
        mode.start(&mut host);
        mode.evaluate(&mut host);
        mode.on_time_changed(&mut host);
        assert_eq!(fakes.sink.writes(), 1);
        assert_eq!(fakes.alarms.pending().len(), 1);
    }

    #[test]
    fn test_alarm_targets_next_boundary_strictly_after_now() {
        let (mut host, fakes) = fake_host(local(15, 22, 0));
        let mut mode = mode();
        mode.start(&mut host);

        // Exactly at the start: on, and the next alarm is the end, not 22:00
        assert!(fakes.sink.activated());
        assert_eq!(fakes.alarms.pending(), vec![(AlarmId(1), local(16, 6, 0))]);

        fakes.clock.set(local(16, 6, 0));
        mode.on_alarm(&mut host);
        assert!(!fakes.sink.activated());
        assert_eq!(fakes.alarms.pending(), vec![(AlarmId(1), local(16, 22, 0))]);
    }

    #[test]
    fn test_stop_cancels_and_ignores_later_evaluations() {
        let (mut host, fakes) = fake_host(local(15, 12, 0));
        let mut mode = mode();
        mode.start(&mut host);
        assert_eq!(fakes.alarms.pending(), vec![(AlarmId(1), local(15, 22, 0))]);

        mode.stop(&mut host);
        assert!(fakes.alarms.pending().is_empty());
        assert!(!fakes.time_changes.is_registered());
        assert_eq!(mode.last_activated(), None);

        fakes.clock.set(local(15, 23, 0));
        mode.on_alarm(&mut host);
        assert!(!fakes.sink.activated());
        assert!(fakes.alarms.pending().is_empty());
    }

    #[test]
    fn test_boundary_edit_forgets_timestamp() {
        let (mut host, fakes) = fake_host(local(15, 23, 30));
        let mut mode = mode();
        mode.start(&mut host);

        // Manual off inside the window is respected...
        fakes.clock.set(local(15, 23, 40));
        fakes.sink.toggle_externally(false);
        mode.on_activated(&mut host, false);
        fakes.clock.set(local(15, 23, 45));
        mode.on_time_changed(&mut host);
        assert!(!fakes.sink.activated());

        // ...until the window is edited
        mode.on_boundary_changed(&mut host, scheduled::Boundary::End, tod(7, 0));
        assert!(fakes.sink.activated());
        assert_eq!(mode.boundaries(), (tod(22, 0), tod(7, 0)));
        assert_eq!(fakes.alarms.pending(), vec![(AlarmId(1), local(16, 7, 0))]);
    }

    #[test]
    fn test_start_and_stop_talk_to_collaborators_once() {
        let clock = Arc::new(ManualTimeSource::new(local(15, 12, 0)));
        let sink = MemorySink::new(clock.clone());

        let mut alarms = MockAlarmScheduler::new();
        alarms
            .expect_schedule_exact()
            .withf(|id, at| *id == AlarmId(1) && *at == local(15, 22, 0))
            .times(1)
            .returning(|_, _| Ok(()));
        alarms
            .expect_cancel()
            .with(eq(AlarmId(1)))
            .times(1)
            .return_const(());

        let mut time_changes = MockTimeChangeSource::new();
        time_changes.expect_register().times(1).return_const(());
        time_changes.expect_unregister().times(1).return_const(());

        let mut host = Host {
            clock,
            sink: Box::new(sink.clone()),
            timestamps: Box::new(sink),
            alarms: Box::new(alarms),
            time_changes: Box::new(time_changes),
            celestial: Box::new(MockCelestialSignal::new()),
        };

        let mut mode = mode();
        mode.start(&mut host);
        // A second start is a no-op
        mode.start(&mut host);
        mode.stop(&mut host);
    }

    #[test]
    fn test_failed_alarm_is_rearmed_on_next_evaluation() {
        let clock = Arc::new(ManualTimeSource::new(local(15, 12, 0)));
        let sink = MemorySink::new(clock.clone());

        let mut alarms = MockAlarmScheduler::new();
        let mut seq = mockall::Sequence::new();
        alarms
            .expect_schedule_exact()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(anyhow::anyhow!("permission denied")));
        alarms
            .expect_schedule_exact()
            .withf(|_, at| *at == local(15, 22, 0))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        alarms.expect_cancel().return_const(());

        let mut time_changes = MockTimeChangeSource::new();
        time_changes.expect_register().return_const(());
        time_changes.expect_unregister().return_const(());

        let mut host = Host {
            clock,
            sink: Box::new(sink.clone()),
            timestamps: Box::new(sink.clone()),
            alarms: Box::new(alarms),
            time_changes: Box::new(time_changes),
            celestial: Box::new(MockCelestialSignal::new()),
        };

        let mut mode = mode();
        mode.start(&mut host);
        assert!(!sink.activated());
        mode.on_time_changed(&mut host);
        mode.stop(&mut host);
    }

    #[test]
    fn test_sink_failure_keeps_controller_consistent() {
        let (mut host, fakes) = fake_host(local(15, 23, 30));
        fakes.sink.fail_writes(true);
        let mut mode = mode();
        mode.start(&mut host);

        // Still off, so the alarm targets the next start
        assert!(!fakes.sink.activated());
        assert_eq!(fakes.alarms.pending(), vec![(AlarmId(1), local(16, 22, 0))]);

        fakes.sink.fail_writes(false);
        mode.on_time_changed(&mut host);
        assert!(fakes.sink.activated());
        assert_eq!(fakes.alarms.pending(), vec![(AlarmId(1), local(16, 6, 0))]);
    }
}

mod auto_mode_dispatch {
    use super::*;

    #[test]
    fn test_alarm_for_other_id_is_rejected() {
        let (mut host, fakes) = fake_host(local(15, 12, 0));
        let mut mode = AutoMode::scheduled(AlarmId(4), tod(22, 0), tod(6, 0), false);
        mode.start(&mut host);

        fakes.clock.set(local(15, 22, 30));
        assert!(!mode.on_alarm(&mut host, AlarmId(3)));
        assert!(!fakes.sink.activated());

        assert!(mode.on_alarm(&mut host, AlarmId(4)));
        assert!(fakes.sink.activated());
    }

    #[test]
    fn test_celestial_ignores_window_hooks() {
        let (mut host, fakes) = fake_host(local(15, 12, 0));
        let mut mode = AutoMode::celestial(false);
        mode.start(&mut host);
        mode.on_boundary_changed(&mut host, scheduled::Boundary::Start, tod(1, 0));
        mode.on_time_changed(&mut host);
        assert!(!mode.on_alarm(&mut host, AlarmId(1)));
        assert_eq!(fakes.sink.writes(), 0);
        assert_eq!(mode.name(), "twilight");
    }
}

mod service {
    use super::*;
    use mockall::predicate::eq;

    fn night_state() -> CelestialState {
        CelestialState {
            is_night: true,
            sunrise: naive(16, 7, 0),
            sunset: naive(15, 17, 0),
        }
    }

    #[test]
    fn test_set_up_initializes_activation_once() {
        let (mut service, fakes) = service_at(local(15, 23, 30), custom_config(tod(22, 0), tod(6, 0)));
        service.set_up();

        assert_eq!(service.cached_activation(), Some(true));
        assert!(service.is_animating());
        assert_eq!(fakes.sink.writes(), 1);

        // The sink's own notification arrives later and changes nothing
        deliver(&mut service, &fakes);
        assert_eq!(fakes.sink.writes(), 1);
        assert_eq!(fakes.alarms.pending(), vec![(AlarmId(1), local(16, 6, 0))]);
    }

    #[test]
    fn test_set_up_outside_window_observes_off() {
        let (mut service, fakes) = service_at(local(15, 12, 0), custom_config(tod(22, 0), tod(6, 0)));
        service.set_up();
        assert_eq!(service.cached_activation(), Some(false));
        assert_eq!(fakes.sink.writes(), 0);
    }

    #[test]
    fn test_external_toggle_survives_time_change_until_next_boundary() {
        let (mut service, fakes) = service_at(local(15, 23, 30), custom_config(tod(22, 0), tod(6, 0)));
        service.set_up();
        deliver(&mut service, &fakes);

        fakes.clock.set(local(15, 23, 40));
        fakes.sink.toggle_externally(false);
        deliver(&mut service, &fakes);
        assert_eq!(service.cached_activation(), Some(false));
        // Off now, so the next change is the next window start
        assert_eq!(fakes.alarms.pending(), vec![(AlarmId(1), local(16, 22, 0))]);

        fakes.clock.set(local(15, 23, 45));
        service.on_time_changed();
        assert!(!fakes.sink.activated());

        fakes.clock.set(local(16, 22, 0));
        assert!(fakes.alarms.fire(AlarmId(1)));
        service.on_alarm(AlarmId(1));
        assert!(fakes.sink.activated());
        deliver(&mut service, &fakes);
        assert_eq!(service.cached_activation(), Some(true));
    }

    #[test]
    fn test_state_file_edit_is_picked_up() {
        let (mut service, fakes) = service_at(local(15, 12, 0), custom_config(tod(22, 0), tod(6, 0)));
        service.set_up();

        fakes.sink.toggle_externally(true);
        fakes.sink.take_notifications();
        service.on_state_changed();
        assert_eq!(service.cached_activation(), Some(true));
        // Manually on during the day: the next change is the window end
        assert_eq!(fakes.alarms.pending(), vec![(AlarmId(1), local(16, 6, 0))]);
    }

    #[test]
    fn test_switching_modes_stops_previous_first() {
        let (mut service, fakes) = service_at(local(15, 23, 30), custom_config(tod(22, 0), tod(6, 0)));
        service.set_up();
        deliver(&mut service, &fakes);
        assert!(fakes.time_changes.is_registered());

        fakes.celestial.set_state(Some(night_state()));
        service.on_auto_mode_changed(AutoModeSetting::Twilight);

        assert_eq!(fakes.alarms.cancelled(), vec![AlarmId(1)]);
        assert!(fakes.alarms.pending().is_empty());
        assert!(!fakes.time_changes.is_registered());
        assert!(fakes.celestial.is_subscribed());
        assert!(matches!(service.auto_mode(), Some(AutoMode::Celestial(_))));

        // A leftover alarm from the custom mode is dropped
        service.on_alarm(AlarmId(1));
        assert_eq!(fakes.sink.writes(), 1);
    }

    #[test]
    fn test_mode_switch_order_is_stop_then_start() {
        let clock = Arc::new(ManualTimeSource::new(local(15, 12, 0)));
        let sink = MemorySink::new(clock.clone());
        let mut seq = mockall::Sequence::new();

        let mut alarms = MockAlarmScheduler::new();
        alarms.expect_schedule_exact().returning(|_, _| Ok(()));
        let mut time_changes = MockTimeChangeSource::new();
        time_changes.expect_register().return_const(());

        time_changes
            .expect_unregister()
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        alarms
            .expect_cancel()
            .with(eq(AlarmId(1)))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());

        let mut celestial = MockCelestialSignal::new();
        celestial
            .expect_subscribe()
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        celestial
            .expect_current_state()
            .return_const(None::<CelestialState>);
        celestial.expect_unsubscribe().return_const(());

        let host = Host {
            clock,
            sink: Box::new(sink.clone()),
            timestamps: Box::new(sink),
            alarms: Box::new(alarms),
            time_changes: Box::new(time_changes),
            celestial: Box::new(celestial),
        };
        let config = custom_config(tod(22, 0), tod(6, 0));
        let tint = Tint::new(
            Box::new(NullBackend),
            config.color_coefficients(),
            config.color_temperature(),
            config.transition_duration(),
        );
        let mut service = NightDisplayService::new(host, config, tint, false);
        service.set_up();
        service.on_auto_mode_changed(AutoModeSetting::Twilight);
    }

    #[test]
    fn test_disabled_mode_only_follows_sink() {
        let config = Config {
            auto_mode: Some(AutoModeSetting::Disabled),
            ..Config::default()
        };
        let (mut service, fakes) = service_at(local(15, 23, 30), config);
        service.set_up();
        assert!(service.auto_mode().is_none());
        assert_eq!(service.cached_activation(), Some(false));
        assert!(fakes.alarms.scheduled().is_empty());

        fakes.sink.toggle_externally(true);
        deliver(&mut service, &fakes);
        assert_eq!(service.cached_activation(), Some(true));
        service.on_time_changed();
        assert!(fakes.sink.activated());
    }

    #[test]
    fn test_apply_settings_routes_boundary_edit() {
        let (mut service, fakes) = service_at(local(16, 6, 30), custom_config(tod(22, 0), tod(6, 0)));
        service.set_up();
        assert!(!fakes.sink.activated());

        // Extending the window past now turns night display back on
        service.apply_settings(custom_config(tod(22, 0), tod(7, 0)));
        assert!(fakes.sink.activated());
        assert_eq!(service.config().custom_end(), tod(7, 0));
        assert_eq!(fakes.alarms.pending(), vec![(AlarmId(1), local(16, 7, 0))]);
    }

    #[test]
    fn test_apply_settings_mode_change_uses_new_boundaries() {
        let config = Config {
            auto_mode: Some(AutoModeSetting::Disabled),
            ..Config::default()
        };
        let (mut service, fakes) = service_at(local(15, 12, 0), config);
        service.set_up();

        service.apply_settings(custom_config(tod(11, 0), tod(13, 0)));
        assert!(fakes.sink.activated());
        assert_eq!(fakes.alarms.pending(), vec![(AlarmId(1), local(15, 13, 0))]);
    }

    #[test]
    fn test_temperature_change_applies_immediately_when_active() {
        let (mut service, fakes) = service_at(local(15, 23, 30), custom_config(tod(22, 0), tod(6, 0)));
        service.set_up();
        deliver(&mut service, &fakes);
        assert!(service.is_animating());

        let mut warmer = custom_config(tod(22, 0), tod(6, 0));
        warmer.color_temperature = Some(2600);
        service.apply_settings(warmer);

        assert!(!service.is_animating());
        assert_eq!(
            service.tint().current_matrix(),
            ColorMatrix::for_temperature(2600, &service.config().color_coefficients())
        );
        assert_eq!(fakes.sink.writes(), 1);
    }

    #[test]
    fn test_celestial_update_routes_to_mode() {
        let config = Config {
            auto_mode: Some(AutoModeSetting::Twilight),
            ..Config::default()
        };
        let (mut service, fakes) = service_at(local(15, 23, 0), config);
        service.set_up();
        assert_eq!(service.cached_activation(), Some(false));

        service.on_celestial_changed(Some(night_state()));
        assert!(fakes.sink.activated());
        deliver(&mut service, &fakes);
        assert_eq!(service.cached_activation(), Some(true));

        service.on_celestial_changed(None);
        assert!(fakes.sink.activated());
    }

    #[test]
    fn test_tear_down_cancels_alarm_and_settles_tint() {
        let (mut service, fakes) = service_at(local(15, 23, 30), custom_config(tod(22, 0), tod(6, 0)));
        service.set_up();
        service.tear_down();

        assert!(service.auto_mode().is_none());
        assert!(fakes.alarms.pending().is_empty());
        assert!(!service.is_animating());
        assert_eq!(service.tint().current_matrix(), service.tint().night_matrix());

        service.reset_tint();
        assert_eq!(service.tint().current_matrix(), ColorMatrix::IDENTITY);
    }
}

mod core_loop {
    use super::*;
    use crate::core::{Core, CoreParams};
    use crate::io::signals::{SignalMessage, SignalState};

    #[test]
    fn test_messages_are_processed_in_order_until_shutdown() {
        let (service, fakes) = service_at(local(15, 12, 0), custom_config(tod(22, 0), tod(6, 0)));
        let signal_state = SignalState::detached();
        let sender = signal_state.signal_sender.clone();

        fakes.clock.set(local(15, 22, 0));
        sender.send(SignalMessage::Alarm(AlarmId(1))).unwrap();
        sender.send(SignalMessage::Alarm(AlarmId(9))).unwrap();
        sender.send(SignalMessage::Shutdown { instant: true }).unwrap();

        let core = Core::new(CoreParams {
            service,
            signal_state,
            tracker: None,
            lock_info: None,
            debug_enabled: false,
        });
        let service = core.execute().unwrap();

        assert!(fakes.sink.activated());
        assert_eq!(fakes.sink.writes(), 1);
        // Torn down: alarm cancelled, display restored
        assert!(fakes.alarms.pending().is_empty());
        assert!(service.auto_mode().is_none());
        assert_eq!(service.tint().current_matrix(), ColorMatrix::IDENTITY);
    }

    #[test]
    fn test_time_change_in_twilight_mode_refreshes_tracker() {
        use crate::core::CelestialSignal;
        use crate::geo::TwilightTracker;
        use std::time::Duration;

        // Longitude matching the local offset keeps solar noon near 12:00
        let noon = local(15, 12, 0);
        let longitude = noon.offset().local_minus_utc() as f64 / 240.0;
        let config = Config {
            auto_mode: Some(AutoModeSetting::Twilight),
            latitude: Some(10.0),
            longitude: Some(longitude),
            ..Config::default()
        };
        let (mut service, fakes) = service_at(noon, config.clone());
        service.set_up();
        assert!(!fakes.time_changes.is_registered());

        let signal_state = SignalState::detached();
        let mut tracker = TwilightTracker::start(
            fakes.clock.clone(),
            signal_state.signal_sender.clone(),
            config.location(),
            false,
        );
        tracker.subscribe();
        let before = tracker.current_state().unwrap();
        assert!(!before.is_night);

        let mut core = Core::new(CoreParams {
            service,
            signal_state,
            tracker: Some(tracker.clone()),
            lock_info: None,
            debug_enabled: false,
        });

        fakes.clock.set(local(15, 23, 0));
        assert!(core.handle_message(SignalMessage::TimeChange));

        let message = core
            .signal_state
            .signal_receiver
            .recv_timeout(Duration::from_secs(5))
            .unwrap();
        match message {
            SignalMessage::Celestial(Some(state)) => assert!(state.is_night),
            other => panic!("expected a twilight update, got {other:?}"),
        }
        tracker.shutdown();
    }

    #[test]
    fn test_state_change_message_rereads_sink() {
        let config = Config {
            auto_mode: Some(AutoModeSetting::Disabled),
            ..Config::default()
        };
        let (service, fakes) = service_at(local(15, 12, 0), config);
        let signal_state = SignalState::detached();
        let sender = signal_state.signal_sender.clone();

        fakes.sink.toggle_externally(true);
        sender.send(SignalMessage::StateChanged).unwrap();
        sender.send(SignalMessage::Shutdown { instant: true }).unwrap();

        let core = Core::new(CoreParams {
            service,
            signal_state,
            tracker: None,
            lock_info: None,
            debug_enabled: false,
        });
        let service = core.execute().unwrap();
        assert_eq!(service.cached_activation(), Some(true));
    }
}
