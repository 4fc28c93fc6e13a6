//! Session management module
//!
//! - `types` - session data model and identity
//! - `handle` - traits for the external session collaborator
//! - `manager` - registry and lifecycle operations
//! - `watcher` - per-session polling task

mod handle;
mod manager;
mod types;
mod watcher;
mod wrapper;

pub use handle::*;
pub use manager::SessionManager;
pub use types::*;

pub(crate) use wrapper::SessionWrapper;
