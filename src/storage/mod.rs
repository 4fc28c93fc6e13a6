//! Storage adapter
//!
//! - `Storage` - contract the session manager persists through
//! - `SessionRecord` - durable form of a session
//! - `FileStorage` - adapter over a `StateBackend` and the config file

mod file;
mod record;

pub use file::*;
pub use record::*;

use crate::config::Config;
use crate::error::Result;

/// Durable storage for session records and configuration
pub trait Storage: Send + Sync {
    /// Load every persisted session record, in stored order
    fn load_sessions(&self) -> Result<Vec<SessionRecord>>;

    /// Replace the persisted session set
    fn save_sessions(&self, sessions: &[SessionRecord]) -> Result<()>;

    fn load_config(&self) -> Result<Config>;

    fn save_config(&self, config: &Config) -> Result<()>;
}
