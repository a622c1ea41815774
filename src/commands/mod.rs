//! Command-line command handlers for nightshade.
//!
//! Each one-shot command lives in its own submodule. None of them talk to
//! the daemon directly: overrides go through the state file, reloads through
//! SIGUSR2.

pub mod activate;
pub mod help;
pub mod reload;
pub mod status;
