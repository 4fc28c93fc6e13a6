//! External session collaborators
//!
//! The engine never talks to tmux or git directly. A `SessionLauncher`
//! builds `SessionHandle`s, and each handle owns the agent process and the
//! worktree underneath one session.

use async_trait::async_trait;

use super::{DiffStats, InstanceData, LaunchOptions, SessionStatus};

/// Result of polling a handle for a pending confirmation prompt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PromptState {
    /// Output changed since the last poll
    pub updated: bool,
    /// A confirmation prompt is visible
    pub has_prompt: bool,
}

impl PromptState {
    /// A prompt is waiting and nothing has answered it yet
    pub fn needs_confirmation(&self) -> bool {
        self.has_prompt && !self.updated
    }
}

/// Runtime handle to one agent session
#[async_trait]
pub trait SessionHandle: Send {
    /// Create the worktree and launch the agent process
    async fn start(&mut self, first_time: bool) -> anyhow::Result<()>;

    /// Stop the process and release the worktree, keeping the branch
    async fn pause(&mut self) -> anyhow::Result<()>;

    /// Recreate the worktree and relaunch the process
    async fn resume(&mut self) -> anyhow::Result<()>;

    /// Release the process and worktree for good
    async fn kill(&mut self) -> anyhow::Result<()>;

    /// Current terminal content
    async fn preview(&mut self) -> anyhow::Result<String>;

    /// Recompute diff statistics against the base commit
    async fn update_diff_stats(&mut self) -> anyhow::Result<()>;

    /// Last computed diff statistics
    fn diff_stats(&self) -> Option<DiffStats>;

    /// Poll for a pending confirmation prompt
    async fn prompt_state(&mut self) -> PromptState;

    /// Send a confirmation keystroke
    async fn tap_enter(&mut self) -> anyhow::Result<()>;

    /// Deliver a prompt to the agent
    async fn send_prompt(&mut self, prompt: &str) -> anyhow::Result<()>;

    fn status(&self) -> SessionStatus;

    fn auto_yes(&self) -> bool;

    /// Serialize the handle state for persistence and snapshots
    fn to_instance_data(&self) -> InstanceData;
}

/// Factory for session handles
pub trait SessionLauncher: Send + Sync {
    /// Build a handle for a brand new session. The handle is not started.
    fn create(&self, opts: &LaunchOptions) -> anyhow::Result<Box<dyn SessionHandle>>;

    /// Rebuild a handle from persisted state. The handle is not started;
    /// the manager restarts it unless the session was paused.
    fn restore(&self, data: InstanceData) -> anyhow::Result<Box<dyn SessionHandle>>;
}
