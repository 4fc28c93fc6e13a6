//! Error types for session-engine
//!
//! Uses `thiserror` for ergonomic error definitions with automatic `Display` and `Error` impls.

use std::path::PathBuf;

use thiserror::Error;

use crate::session::{SessionId, SessionStatus};

/// Top-level error type for session-engine
#[derive(Error, Debug)]
pub enum Error {
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Facade lifecycle errors
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid engine configuration: {0}")]
    ConfigInvalid(String),

    #[error("Engine not started")]
    NotStarted,

    #[error("Engine already started")]
    AlreadyStarted,

    #[error("Engine has been closed")]
    Closed,
}

/// Session management errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(SessionId),

    #[error("Session with title '{0}' already exists")]
    DuplicateTitle(String),

    #[error("Invalid session title '{title}': {reason}")]
    InvalidTitle { title: String, reason: String },

    #[error("Session {0} already has an operation in progress")]
    OperationPending(SessionId),

    #[error("Session {id} cannot {operation} while {status}")]
    InvalidState {
        id: SessionId,
        operation: &'static str,
        status: SessionStatus,
    },

    #[error("Failed to {operation} session: {reason}")]
    ExternalFailure {
        operation: &'static str,
        reason: String,
    },
}

impl SessionError {
    /// Wrap a failure reported by the external session handle
    pub fn external(operation: &'static str, err: anyhow::Error) -> Self {
        Self::ExternalFailure {
            operation,
            reason: format!("{:#}", err),
        }
    }
}

/// Persistence errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to load persisted state: {0}")]
    LoadFailed(String),

    #[error("Failed to save persisted state: {0}")]
    SaveFailed(String),

    #[error("Invalid {field} timestamp '{value}': {reason}")]
    TimestampFormat {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Malformed session record: {0}")]
    MalformedRecord(String),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Failed to create config directory: {0}")]
    DirectoryCreationFailed(PathBuf),
}

/// Result type alias using our error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this is a "not started" lifecycle error
    pub fn is_not_started(&self) -> bool {
        matches!(self, Error::Engine(EngineError::NotStarted))
    }

    /// Whether this is a "session not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Session(SessionError::NotFound(_)))
    }

    /// Whether this is a duplicate title rejection
    pub fn is_duplicate_title(&self) -> bool {
        matches!(self, Error::Session(SessionError::DuplicateTitle(_)))
    }
}
