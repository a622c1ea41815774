//! Day/night classification from solar events.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone};
use sunrise::{Coordinates, SolarDay, SolarEvent};

use crate::core::CelestialState;

/// Apparent altitude of the sun's center at sunrise and sunset.
const HORIZON_ALTITUDE_DEG: f64 = -0.833;

/// Whether the sun crosses the horizon at all on `date` at `latitude`.
///
/// Uses the approximate declination for the day of the year, which is
/// plenty to tell polar days and nights apart from ordinary ones.
fn sun_crosses_horizon(latitude: f64, date: NaiveDate) -> bool {
    let day_angle = (360.0 / 365.0 * (284.0 + date.ordinal() as f64)).to_radians();
    let declination = (23.44_f64).to_radians() * day_angle.sin();
    let latitude = latitude.to_radians();

    let cos_hour_angle = (HORIZON_ALTITUDE_DEG.to_radians().sin()
        - latitude.sin() * declination.sin())
        / (latitude.cos() * declination.cos());
    cos_hour_angle.abs() <= 1.0
}

/// Sunrise and sunset on `date`, as wall-clock readings in `zone`.
///
/// Returns `None` when the sun does not rise or set that day or the
/// coordinates are invalid.
pub fn solar_events<Tz: TimeZone>(
    latitude: f64,
    longitude: f64,
    date: NaiveDate,
    zone: &Tz,
) -> Option<(NaiveDateTime, NaiveDateTime)> {
    if !sun_crosses_horizon(latitude, date) {
        return None;
    }
    let coordinates = Coordinates::new(latitude, longitude)?;
    let day = SolarDay::new(coordinates, date);
    let sunrise = day
        .event_time(SolarEvent::Sunrise)
        .with_timezone(zone)
        .naive_local();
    let sunset = day
        .event_time(SolarEvent::Sunset)
        .with_timezone(zone)
        .naive_local();

    // Near the polar circles the approximation above can disagree with the
    // full calculation; reject results that do not describe a day
    let noon = date.and_hms_opt(12, 0, 0)?;
    let plausible = |t: NaiveDateTime| (t - noon).abs() <= Duration::hours(36);
    (sunrise < sunset && plausible(sunrise) && plausible(sunset)).then_some((sunrise, sunset))
}

/// Classify `now` as day or night at the given location.
///
/// The returned events bracket the current period: during the day they are
/// the sunrise that started it and the sunset ending it; at night they are
/// the sunset that started it and the sunrise ending it. For ordinary
/// locations that means today's events by day, tomorrow's sunrise after
/// sunset and yesterday's sunset before sunrise.
pub fn celestial_state_at<Tz: TimeZone>(
    latitude: f64,
    longitude: f64,
    now: &DateTime<Tz>,
) -> Option<CelestialState> {
    let zone = now.timezone();
    let local_now = now.naive_local();
    let today = local_now.date();

    // Events of the surrounding days, in time order
    let mut events: Vec<(NaiveDateTime, bool)> = [today.pred_opt()?, today, today.succ_opt()?]
        .into_iter()
        .filter_map(|date| solar_events(latitude, longitude, date, &zone))
        .flat_map(|(sunrise, sunset)| [(sunrise, true), (sunset, false)])
        .collect();
    events.sort();

    let (started, is_sunrise) = events
        .iter()
        .rev()
        .find(|(time, _)| *time <= local_now)
        .copied()?;
    let (ends, _) = events
        .iter()
        .find(|(time, sunrise)| *time > local_now && *sunrise != is_sunrise)
        .copied()?;

    Some(if is_sunrise {
        CelestialState {
            is_night: false,
            sunrise: started,
            sunset: ends,
        }
    } else {
        CelestialState {
            is_night: true,
            sunrise: ends,
            sunset: started,
        }
    })
}

/// The wall-clock time at which `state` stops describing the present.
pub fn next_change(state: &CelestialState) -> NaiveDateTime {
    if state.is_night {
        state.sunrise
    } else {
        state.sunset
    }
}
