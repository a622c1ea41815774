//! Anchoring a bare time of day to concrete local date-times.
//!
//! All arithmetic here works on wall-clock fields (`NaiveDateTime`), not on
//! elapsed durations: "yesterday at 22:00" is the same clock reading one
//! calendar day earlier, regardless of any DST change in between. Conversion
//! to a real instant happens only at the edges, in [`to_local`].

use chrono::{DateTime, Duration, Local, LocalResult, NaiveDateTime, TimeZone};

use super::TimeOfDay;

fn on_same_day(time: TimeOfDay, compare: NaiveDateTime) -> NaiveDateTime {
    compare.date().and_time(time.to_naive_time())
}

/// The most recent date-time with this time of day that is not after `compare`.
///
/// Today's occurrence if it has already been reached, otherwise yesterday's.
pub fn date_time_before(time: TimeOfDay, compare: NaiveDateTime) -> NaiveDateTime {
    let candidate = on_same_day(time, compare);
    if candidate > compare {
        candidate - Duration::days(1)
    } else {
        candidate
    }
}

/// The first date-time with this time of day that is not before `compare`.
///
/// Today's occurrence if it is still ahead (or exactly now), otherwise
/// tomorrow's.
pub fn date_time_after(time: TimeOfDay, compare: NaiveDateTime) -> NaiveDateTime {
    let candidate = on_same_day(time, compare);
    if candidate < compare {
        candidate + Duration::days(1)
    } else {
        candidate
    }
}

/// The first date-time with this time of day strictly after `compare`.
///
/// Used for wake-ups: an alarm at exactly `compare` would fire immediately
/// and re-evaluate to the same decision.
pub fn next_occurrence_after(time: TimeOfDay, compare: NaiveDateTime) -> NaiveDateTime {
    let candidate = on_same_day(time, compare);
    if candidate <= compare {
        candidate + Duration::days(1)
    } else {
        candidate
    }
}

/// Resolve a wall-clock reading to an instant in `zone`.
///
/// An ambiguous reading (clocks going back) resolves to the earlier instant.
/// A reading inside a DST gap does not exist; it is pushed forward by the
/// length of the gap (at most a few probes of one hour), the same reading a
/// wall clock shows once it has jumped.
pub fn resolve_in<Tz: TimeZone>(zone: &Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    let mut probe = naive;
    for _ in 0..4 {
        match zone.from_local_datetime(&probe) {
            LocalResult::Single(dt) => return dt,
            LocalResult::Ambiguous(earliest, _) => return earliest,
            LocalResult::None => probe += Duration::hours(1),
        }
    }
    // No zone has gaps this long; fall back to interpreting the reading as UTC
    zone.from_utc_datetime(&naive)
}

/// [`resolve_in`] for the system zone.
pub fn to_local(naive: NaiveDateTime) -> DateTime<Local> {
    resolve_in(&Local, naive)
}
