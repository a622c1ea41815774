//! # Nightshade Library
//!
//! Internal library for the nightshade binary: a Linux daemon that turns a
//! night display tint on and off automatically, either inside a fixed daily
//! window or between sunset and sunrise.
//!
//! The library exists to keep the decision logic testable and separate from
//! CLI dispatch (main.rs).
//!
//! ## Architecture
//!
//! - **Entry Point**: [`Nightshade`] acquires resources and wires collaborators
//! - **Core Logic**: `core` holds the auto-mode controllers, the hosting
//!   service, the tint animation and the main loop
//! - **Backends**: `backend` writes the color matrix (log, file, command)
//! - **Configuration**: `config` for TOML settings with hot reload
//! - **Geographic**: `geo` for sunrise/sunset and the twilight tracker
//! - **Infrastructure**: `io` for signals, system monitors, alarms, the state
//!   file and the instance lock; `time` for the clock abstraction

// Import macros from logger module for use in all submodules
#[macro_use]
pub mod common;

pub mod args;
pub mod backend;
pub mod commands;
pub mod config;
pub mod core;
pub mod geo;
pub mod io;
pub mod time;

mod app;

#[cfg(any(test, feature = "testing-support"))]
pub mod testing;

pub use app::Nightshade;
