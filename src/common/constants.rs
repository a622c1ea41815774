//! Application constants and default values for nightshade.
//!
//! This module contains the configuration defaults, validation limits,
//! and operational constants used throughout the application.

use crate::config::{AutoModeSetting, BackendKind};
use crate::time::TimeOfDay;

// ═══ Application Configuration Defaults ═══
// These values are used when config options are not specified by the user

pub const DEFAULT_AUTO_MODE: AutoModeSetting = AutoModeSetting::Custom;
pub const DEFAULT_CUSTOM_START: TimeOfDay = TimeOfDay::clamped(22, 0);
pub const DEFAULT_CUSTOM_END: TimeOfDay = TimeOfDay::clamped(6, 0);
pub const DEFAULT_COLOR_TEMPERATURE: u32 = 2850; // Kelvin
pub const DEFAULT_TRANSITION_DURATION_MS: u64 = 3000; // tint animation length
pub const DEFAULT_LINEAR_COLOR_MATRIX: bool = true;
pub const DEFAULT_BACKEND: BackendKind = BackendKind::Log;

// ═══ Color Temperature Coefficients ═══
// Each channel of the night matrix is a·T² + b·T + c for temperature T.
// Rows are (a, b, c) for red, green and blue.

pub const LINEAR_COLOR_COEFFICIENTS: [f32; 9] = [
    0.0,
    0.0,
    1.0,
    -0.000_000_009_623_533,
    0.000_153_045_48,
    0.390_782_78,
    -0.000_000_018_935_904,
    0.000_302_412_2,
    -0.198_650_9,
];

pub const NATIVE_COLOR_COEFFICIENTS: [f32; 9] = [
    0.0,
    0.0,
    1.0,
    -0.000_000_013_313_938,
    0.000_182_893_6,
    0.432_461_7,
    -0.000_000_028_512_63,
    0.000_377_025_8,
    -0.215_362_6,
];

// ═══ Validation Limits ═══

// Night display color temperature (Kelvin)
pub const MINIMUM_COLOR_TEMPERATURE: u32 = 2596;
pub const MAXIMUM_COLOR_TEMPERATURE: u32 = 4082;

// Tint animation length
pub const MAXIMUM_TRANSITION_DURATION_MS: u64 = 60_000;

// ═══ Operational Timing Constants ═══

/// Interval between tint animation frames while a transition runs.
pub const ANIMATION_FRAME_MS: u64 = 16;
/// Longest single sleep of an alarm thread before it re-reads the wall clock.
pub const ALARM_MAX_SLEEP_SECS: u64 = 30;
/// Longest sleep of the twilight tracker between recalculations.
pub const TWILIGHT_MAX_SLEEP_SECS: u64 = 3600;
/// Idle timeout of the core loop when nothing is animating.
pub const IDLE_POLL_MS: u64 = 1000;

// ═══ Exit Codes ═══

pub const EXIT_FAILURE: i32 = 1;

// ═══ File Names ═══

pub const CONFIG_DIR_NAME: &str = "nightshade";
pub const CONFIG_FILE_NAME: &str = "nightshade.toml";
pub const STATE_FILE_NAME: &str = "state.toml";
pub const LOCK_FILE_NAME: &str = "nightshade.lock";
pub const MATRIX_FILE_NAME: &str = "matrix.json";
