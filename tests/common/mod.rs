//! Shared test fixtures: an in-memory session launcher whose handles can be
//! scripted and inspected from the test body.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::bail;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tempfile::TempDir;

use session_engine::session::WorktreeDescriptor;
use session_engine::{
    AppState, Config, DiffStats, Engine, Event, EventKind, InstanceData, LaunchOptions,
    PromptState, SessionHandle, SessionLauncher, SessionStatus, Subscription,
};

/// Scriptable state behind one fake handle
#[derive(Debug)]
pub struct FakeState {
    pub data: InstanceData,
    pub preview: String,
    /// Picked up by the next `update_diff_stats`
    pub next_diff: Option<DiffStats>,
    pub prompt: PromptState,
    pub taps: usize,
    pub prompts: Vec<String>,
    pub starts: Vec<bool>,
    pub pauses: usize,
    pub resumes: usize,
    /// How long `pause` takes
    pub pause_delay: Option<Duration>,
    pub killed: bool,
    pub fail_prompt: bool,
    pub fail_pause: bool,
    pub fail_kill: bool,
}

impl FakeState {
    fn new(data: InstanceData, fail_prompt: bool) -> Self {
        Self {
            data,
            preview: String::new(),
            next_diff: None,
            prompt: PromptState::default(),
            taps: 0,
            prompts: Vec::new(),
            starts: Vec::new(),
            pauses: 0,
            resumes: 0,
            pause_delay: None,
            killed: false,
            fail_prompt,
            fail_pause: false,
            fail_kill: false,
        }
    }
}

pub type Control = Arc<Mutex<FakeState>>;

pub struct FakeHandle {
    state: Control,
}

#[async_trait]
impl SessionHandle for FakeHandle {
    async fn start(&mut self, first_time: bool) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        state.starts.push(first_time);
        state.data.status = SessionStatus::Running;
        Ok(())
    }

    async fn pause(&mut self) -> anyhow::Result<()> {
        let delay = self.state.lock().pause_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        state.pauses += 1;
        if state.fail_pause {
            bail!("worktree is locked");
        }
        state.data.status = SessionStatus::Paused;
        state.data.updated_at = Utc::now();
        Ok(())
    }

    async fn resume(&mut self) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        state.resumes += 1;
        state.data.status = SessionStatus::Running;
        state.data.updated_at = Utc::now();
        Ok(())
    }

    async fn kill(&mut self) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        if state.fail_kill {
            bail!("process refused to exit");
        }
        state.killed = true;
        Ok(())
    }

    async fn preview(&mut self) -> anyhow::Result<String> {
        Ok(self.state.lock().preview.clone())
    }

    async fn update_diff_stats(&mut self) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        state.data.diff_stats = state.next_diff.clone();
        Ok(())
    }

    fn diff_stats(&self) -> Option<DiffStats> {
        self.state.lock().data.diff_stats.clone()
    }

    async fn prompt_state(&mut self) -> PromptState {
        self.state.lock().prompt
    }

    async fn tap_enter(&mut self) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        state.taps += 1;
        state.prompt.has_prompt = false;
        Ok(())
    }

    async fn send_prompt(&mut self, prompt: &str) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        if state.fail_prompt {
            bail!("agent is not accepting input");
        }
        state.prompts.push(prompt.to_string());
        Ok(())
    }

    fn status(&self) -> SessionStatus {
        self.state.lock().data.status
    }

    fn auto_yes(&self) -> bool {
        self.state.lock().data.auto_yes
    }

    fn to_instance_data(&self) -> InstanceData {
        self.state.lock().data.clone()
    }
}

/// Launcher that keeps a control handle for every session it builds
#[derive(Default)]
pub struct FakeLauncher {
    sessions: Mutex<HashMap<String, Control>>,
    pub fail_create: AtomicBool,
    pub fail_prompt: AtomicBool,
}

impl FakeLauncher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Control handle for the session with this title
    pub fn control(&self, title: &str) -> Control {
        self.sessions
            .lock()
            .get(title)
            .cloned()
            .unwrap_or_else(|| panic!("no fake session titled '{title}'"))
    }

    fn register(&self, data: InstanceData) -> Box<dyn SessionHandle> {
        let state = Arc::new(Mutex::new(FakeState::new(
            data.clone(),
            self.fail_prompt.load(Ordering::SeqCst),
        )));
        self.sessions.lock().insert(data.title, Arc::clone(&state));
        Box::new(FakeHandle { state })
    }
}

impl SessionLauncher for FakeLauncher {
    fn create(&self, opts: &LaunchOptions) -> anyhow::Result<Box<dyn SessionHandle>> {
        if self.fail_create.load(Ordering::SeqCst) {
            bail!("tmux is not installed");
        }

        let now = Utc::now();
        let worktree_path = PathBuf::from("/worktrees").join(&opts.title);
        Ok(self.register(InstanceData {
            title: opts.title.clone(),
            path: opts.path.clone(),
            branch: opts.branch.clone(),
            status: SessionStatus::Loading,
            program: opts.program.clone(),
            auto_yes: opts.auto_yes,
            created_at: now,
            updated_at: now,
            worktree: WorktreeDescriptor {
                repo_path: opts.path.clone(),
                worktree_path,
                session_name: opts.title.clone(),
                branch_name: opts.branch.clone(),
                base_commit_sha: "0000000".to_string(),
            },
            diff_stats: None,
        }))
    }

    fn restore(&self, data: InstanceData) -> anyhow::Result<Box<dyn SessionHandle>> {
        Ok(self.register(data))
    }
}

/// Config with a short poll interval so watcher tests run quickly
pub fn test_config() -> Config {
    Config {
        poll_interval_ms: 20,
        branch_prefix: "agents".to_string(),
        ..Config::default()
    }
}

/// An engine over temp-dir state with a fake launcher
pub struct Harness {
    pub engine: Engine,
    pub launcher: Arc<FakeLauncher>,
    pub state: Arc<AppState>,
    pub dir: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let state = Arc::new(AppState::load_from(&dir.path().join("state.json")).unwrap());
        Self::with_state(dir, state, FakeLauncher::new())
    }

    /// Harness over existing state, as after a process restart
    pub fn with_state(dir: TempDir, state: Arc<AppState>, launcher: Arc<FakeLauncher>) -> Self {
        let engine = Engine::builder()
            .config(test_config())
            .state_backend(state.clone())
            .launcher(launcher.clone())
            .config_path(dir.path().join("config.toml"))
            .build()
            .unwrap();

        Self {
            engine,
            launcher,
            state,
            dir,
        }
    }

    /// A started harness
    pub async fn started() -> Self {
        let harness = Self::new();
        harness.engine.start().await.unwrap();
        harness
    }

    /// Close the engine and reopen a fresh one over the same state
    pub async fn restart(self) -> Self {
        self.engine.close().await.unwrap();
        let state = Arc::new(AppState::load_from(&self.dir.path().join("state.json")).unwrap());
        let harness = Self::with_state(self.dir, state, FakeLauncher::new());
        harness.engine.start().await.unwrap();
        harness
    }

    pub fn repo(&self) -> PathBuf {
        self.dir.path().join("repo")
    }
}

/// Wait for the next event of `kind`, skipping others
pub async fn next_event(sub: &mut Subscription, kind: EventKind) -> Event {
    let wait = async {
        loop {
            match sub.recv().await {
                Some(event) if event.kind() == kind => return event,
                Some(_) => continue,
                None => panic!("subscription closed while waiting for {kind} event"),
            }
        }
    };

    tokio::time::timeout(Duration::from_secs(2), wait)
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {kind} event"))
}

/// Poll until `check` holds or two seconds pass
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
