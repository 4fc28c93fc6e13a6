//! Session Engine - orchestration core for concurrently running AI agent sessions
//!
//! Supervises a fleet of agent sessions, each backed by a worktree and an
//! external process owned by a [`SessionHandle`] implementation. The engine
//! keeps an in-memory registry of live sessions, polls each one from a
//! watcher task, fans observations out as events, and persists the fleet
//! across restarts.
//!
//! # Architecture
//!
//! - **Engine** - lifecycle-guarded facade and the only entry point
//! - **SessionManager** - registry plus create/pause/resume/kill
//! - **Watchers** - one polling task per live session
//! - **EventBus** - non-blocking fan-out to bounded subscriber queues
//! - **Storage** - session records and configuration on disk
//!
//! # Modules
//!
//! - [`engine`] - Engine facade and builder
//! - [`session`] - Session model, collaborator traits and manager
//! - [`events`] - Event model and bus
//! - [`storage`] - Storage adapter and persisted records
//! - [`config`] - Configuration and raw state backend
//! - [`error`] - Error types

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod session;
pub mod storage;

pub use config::{AppState, Config, StateBackend};
pub use engine::{Engine, EngineBuilder};
pub use error::{Error, Result};
pub use events::{Event, EventBus, EventKind, EventPayload, Subscription};
pub use session::{
    DiffStats, InstanceData, LaunchOptions, PromptState, SessionHandle, SessionId, SessionInfo,
    SessionLauncher, SessionOpts, SessionStatus,
};
pub use storage::{FileStorage, SessionRecord, Storage};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
