//! Sunrise and sunset at the configured location.
//!
//! - [`twilight`]: pure day/night classification from coordinates and a clock
//!   reading, using the `sunrise` crate for the solar events
//! - [`tracker`]: background thread that keeps the classification current and
//!   pushes every change to the core loop
//!
//! Polar day and polar night have no sunrise or sunset to bracket the
//! current period; the classification is then absent and twilight mode
//! leaves the display alone.

pub mod tracker;
pub mod twilight;

pub use tracker::TwilightTracker;
pub use twilight::{celestial_state_at, next_change, solar_events};
