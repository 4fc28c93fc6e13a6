//! Durable session record
//!
//! The persisted form of a session. Timestamps stay textual until a record
//! is turned back into `InstanceData`, so a malformed value only fails the
//! record that carries it.

use std::path::PathBuf;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::session::{DiffStats, InstanceData, SessionId, SessionStatus, WorktreeDescriptor};

/// Persisted session record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub title: String,
    pub path: PathBuf,
    pub branch: String,
    pub status: SessionStatus,
    pub program: String,
    #[serde(default)]
    pub auto_yes: bool,
    /// RFC 3339, second precision, with zone designator
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub worktree: WorktreeDescriptor,
    #[serde(default)]
    pub diff_stats: Option<DiffStats>,
}

impl SessionRecord {
    /// Serialize handle state into a record
    pub fn from_instance(id: SessionId, data: &InstanceData) -> Self {
        Self {
            id,
            title: data.title.clone(),
            path: data.path.clone(),
            branch: data.branch.clone(),
            status: data.status,
            program: data.program.clone(),
            auto_yes: data.auto_yes,
            created_at: format_timestamp(&data.created_at),
            updated_at: format_timestamp(&data.updated_at),
            worktree: data.worktree.clone(),
            diff_stats: data.diff_stats.clone(),
        }
    }

    /// Reconstruct typed handle state from this record
    pub fn to_instance_data(&self) -> Result<InstanceData, StorageError> {
        if self.status == SessionStatus::Terminated {
            return Err(StorageError::MalformedRecord(format!(
                "session '{}' has terminal status",
                self.title
            )));
        }

        Ok(InstanceData {
            title: self.title.clone(),
            path: self.path.clone(),
            branch: self.branch.clone(),
            status: self.status,
            program: self.program.clone(),
            auto_yes: self.auto_yes,
            created_at: parse_timestamp("created_at", &self.created_at)?,
            updated_at: parse_timestamp("updated_at", &self.updated_at)?,
            worktree: self.worktree.clone(),
            diff_stats: self.diff_stats.clone(),
        })
    }
}

/// Format a timestamp for persistence
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse a persisted timestamp, normalizing to UTC
pub fn parse_timestamp(field: &'static str, value: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StorageError::TimestampFormat {
            field,
            value: value.to_string(),
            reason: e.to_string(),
        })
}
