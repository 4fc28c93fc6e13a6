//! Session event model
//!
//! Events are transient: they are fanned out to subscribers and never
//! persisted. The payload is a closed sum over the four event kinds, so
//! consumers match on the variant rather than probing payload shapes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::{DiffStats, SessionId, SessionStatus};

/// Kind of a session event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Stdout,
    Stderr,
    Diff,
    State,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => write!(f, "stdout"),
            Self::Stderr => write!(f, "stderr"),
            Self::Diff => write!(f, "diff"),
            Self::State => write!(f, "state"),
        }
    }
}

/// Kind-specific event payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum EventPayload {
    /// Full current terminal content (not a delta)
    Stdout { content: String },
    Stderr { content: String },
    Diff {
        stats: Option<DiffStats>,
        has_changes: bool,
    },
    State {
        previous: SessionStatus,
        current: SessionStatus,
    },
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Stdout { .. } => EventKind::Stdout,
            Self::Stderr { .. } => EventKind::Stderr,
            Self::Diff { .. } => EventKind::Diff,
            Self::State { .. } => EventKind::State,
        }
    }
}

/// A session event envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub session_id: SessionId,
    #[serde(flatten)]
    pub payload: EventPayload,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Create an event stamped with the current time
    pub fn new(session_id: SessionId, payload: EventPayload) -> Self {
        Self {
            session_id,
            payload,
            timestamp: Utc::now(),
        }
    }

    pub fn stdout(session_id: SessionId, content: impl Into<String>) -> Self {
        Self::new(
            session_id,
            EventPayload::Stdout {
                content: content.into(),
            },
        )
    }

    pub fn diff(session_id: SessionId, stats: Option<DiffStats>) -> Self {
        let has_changes = stats.as_ref().is_some_and(DiffStats::has_changes);
        Self::new(session_id, EventPayload::Diff { stats, has_changes })
    }

    pub fn state(session_id: SessionId, previous: SessionStatus, current: SessionStatus) -> Self {
        Self::new(session_id, EventPayload::State { previous, current })
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}
