//! Configuration and raw state persistence
//!
//! Handles:
//! - Engine configuration (`config.toml`, layered with `SE_*` env vars)
//! - Raw persistent state (`state.json`) behind the `StateBackend` trait

mod settings;
mod state;

pub use settings::*;
pub use state::*;
