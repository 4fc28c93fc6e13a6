//! Core session types
//!
//! Defines the session data model shared by the manager, the storage
//! adapter and the external session handles:
//! - `SessionId` - stable identity derived from the title
//! - `SessionStatus` - lifecycle status of a session
//! - `InstanceData` - typed state exchanged with session handles
//! - `SessionInfo` - read-only snapshot returned to callers

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for title-derived session IDs
const SESSION_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a4e_93b7_4d0a_8e55_3c2b_7d9f_1a60);

/// Unique identifier for a session
///
/// Derived deterministically from the session title so that a restored
/// session re-acquires the same identity across restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Derive the ID for a session title
    pub fn from_title(title: &str) -> Self {
        Self(Uuid::new_v5(&SESSION_NAMESPACE, title.as_bytes()))
    }

    /// First 8 chars, for log lines
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Status of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Agent process is starting up
    Loading,
    /// Agent is actively working
    Running,
    /// Agent is idle and waiting for input
    Ready,
    /// Worktree released and process stopped, branch preserved
    Paused,
    /// Session was killed. Only ever reported in `state` events; killed
    /// sessions leave the registry and are never persisted.
    Terminated,
}

impl SessionStatus {
    /// Whether the worktree and external process exist for this status
    pub fn has_resources(&self) -> bool {
        matches!(self, Self::Loading | Self::Running | Self::Ready)
    }

    /// Check if the session can be paused
    pub fn can_pause(&self) -> bool {
        self.has_resources()
    }

    /// Check if the session can be resumed
    pub fn can_resume(&self) -> bool {
        matches!(self, Self::Paused)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading => write!(f, "loading"),
            Self::Running => write!(f, "running"),
            Self::Ready => write!(f, "ready"),
            Self::Paused => write!(f, "paused"),
            Self::Terminated => write!(f, "terminated"),
        }
    }
}

/// Git diff statistics for a session's uncommitted changes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    /// Lines added
    pub added: usize,
    /// Lines removed
    pub removed: usize,
    /// Raw diff content
    #[serde(default)]
    pub content: String,
}

impl DiffStats {
    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.added > 0 || self.removed > 0 || !self.content.is_empty()
    }
}

/// Worktree descriptor, owned by the session handle and persisted verbatim
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorktreeDescriptor {
    pub repo_path: PathBuf,
    pub worktree_path: PathBuf,
    pub session_name: String,
    pub branch_name: String,
    pub base_commit_sha: String,
}

/// Options for creating a new session
#[derive(Debug, Clone, Default)]
pub struct SessionOpts {
    /// User-facing title, unique among live sessions
    pub title: String,
    /// Repository path the session works in
    pub path: PathBuf,
    /// Program to run (falls back to the configured default)
    pub program: Option<String>,
    /// Auto-confirm prompts (falls back to the configured default)
    pub auto_yes: Option<bool>,
    /// Initial prompt delivered after start
    pub prompt: Option<String>,
}

impl SessionOpts {
    pub fn new(title: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            title: title.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = Some(program.into());
        self
    }

    pub fn with_auto_yes(mut self, auto_yes: bool) -> Self {
        self.auto_yes = Some(auto_yes);
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }
}

/// Fully resolved options handed to a `SessionLauncher`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    pub title: String,
    pub path: PathBuf,
    pub branch: String,
    pub program: String,
    pub auto_yes: bool,
}

/// Typed session state exchanged with session handles
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceData {
    pub title: String,
    pub path: PathBuf,
    pub branch: String,
    pub status: SessionStatus,
    pub program: String,
    pub auto_yes: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub worktree: WorktreeDescriptor,
    pub diff_stats: Option<DiffStats>,
}

/// Read-only snapshot of a live session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: SessionId,
    pub title: String,
    pub path: PathBuf,
    pub branch: String,
    pub status: SessionStatus,
    pub program: String,
    pub auto_yes: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff_stats: Option<DiffStats>,
}

impl SessionInfo {
    /// Build a snapshot from handle state
    pub fn from_data(id: SessionId, data: InstanceData) -> Self {
        Self {
            id,
            title: data.title,
            path: data.path,
            branch: data.branch,
            status: data.status,
            program: data.program,
            auto_yes: data.auto_yes,
            created_at: data.created_at,
            updated_at: data.updated_at,
            diff_stats: data.diff_stats,
        }
    }
}

/// Sanitize a name for use as branch/directory name
pub fn sanitize_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect::<String>()
        .trim_matches('-')
        .to_string()
}

/// Generate branch name from title
pub fn branch_name(prefix: &str, title: &str) -> String {
    let sanitized = sanitize_name(title);
    let prefix = prefix.trim_end_matches('/');

    if prefix.is_empty() {
        sanitized
    } else {
        format!("{}/{}", prefix, sanitized)
    }
}
