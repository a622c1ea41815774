//! Wall-clock primitives: the clock abstraction, times of day and anchoring.

pub mod anchor;
pub mod of_day;
pub mod source;

pub use anchor::{date_time_after, date_time_before, next_occurrence_after, resolve_in, to_local};
pub use of_day::TimeOfDay;
pub use source::{RealTimeSource, TimeSource};

#[cfg(any(test, feature = "testing-support"))]
pub use source::ManualTimeSource;
