//! Session manager - coordinates session lifecycle
//!
//! Owns the registry of live sessions and drives the external session
//! handles through create, pause, resume and kill. Every live session gets a
//! watcher task that reports what the handle is doing on the event bus.
//!
//! The registry lock is never held across a call into a session handle.
//! Operations on one session are serialized by its pending marker, and
//! titles of sessions still being created are reserved up front.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, instrument, warn};

use super::watcher::spawn_watcher;
use super::{
    InstanceData, LaunchOptions, SessionHandle, SessionId, SessionInfo, SessionLauncher, SessionOpts,
    SessionStatus, SessionWrapper, branch_name,
};
use crate::config::SharedConfig;
use crate::error::{EngineError, Result, SessionError};
use crate::events::{Event, EventBus};
use crate::storage::{SessionRecord, Storage};

#[derive(Default)]
struct Registry {
    sessions: HashMap<SessionId, Arc<SessionWrapper>>,
    /// Titles claimed by creates that have not registered yet
    reserved: HashMap<SessionId, String>,
}

impl Registry {
    // Linear scan; fleets are tens of sessions. Index titles if that grows.
    fn title_taken(&self, title: &str) -> bool {
        self.sessions.values().any(|w| w.title == title)
            || self.reserved.values().any(|t| t == title)
    }
}

/// Session manager coordinates all session operations
pub struct SessionManager {
    config: SharedConfig,
    storage: Arc<dyn Storage>,
    launcher: Arc<dyn SessionLauncher>,
    events: EventBus,
    registry: RwLock<Registry>,
    /// Manager-wide cancellation scope; each session holds a child token
    shutdown: CancellationToken,
    watchers: TaskTracker,
    stopped: AtomicBool,
}

impl SessionManager {
    pub fn new(
        config: SharedConfig,
        storage: Arc<dyn Storage>,
        launcher: Arc<dyn SessionLauncher>,
        events: EventBus,
    ) -> Self {
        Self {
            config,
            storage,
            launcher,
            events,
            registry: RwLock::new(Registry::default()),
            shutdown: CancellationToken::new(),
            watchers: TaskTracker::new(),
            stopped: AtomicBool::new(false),
        }
    }

    /// Restore persisted sessions
    ///
    /// A record that cannot be restored is logged and skipped. Returns the
    /// number of sessions now live.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<usize> {
        let records = self.storage.load_sessions()?;
        let total = records.len();

        let mut restored = 0;
        for record in records {
            let title = record.title.clone();
            match self.restore(record).await {
                Ok(()) => restored += 1,
                Err(e) => warn!("Skipping session '{}': {}", title, e),
            }
        }

        info!("Restored {} of {} persisted sessions", restored, total);
        Ok(restored)
    }

    async fn restore(&self, record: SessionRecord) -> Result<()> {
        let data = record.to_instance_data()?;
        let id = SessionId::from_title(&data.title);
        if id != record.id {
            debug!("Re-deriving id for '{}' (stored {})", data.title, record.id);
        }

        {
            let mut registry = self.registry.write().await;
            if registry.sessions.contains_key(&id) || registry.title_taken(&data.title) {
                return Err(SessionError::DuplicateTitle(data.title).into());
            }
            registry.reserved.insert(id, data.title.clone());
        }

        let title = data.title.clone();
        let result = self.rebuild_handle(data).await;

        let mut registry = self.registry.write().await;
        registry.reserved.remove(&id);
        let handle = result?;
        let status = handle.status();

        let wrapper = SessionWrapper::new(id, title, handle, self.shutdown.child_token());
        registry.sessions.insert(id, Arc::clone(&wrapper));
        drop(registry);

        if status.has_resources() {
            self.watch(wrapper).await;
        }
        debug!("Restored session {} as {}", id.short(), status);
        Ok(())
    }

    async fn rebuild_handle(&self, data: InstanceData) -> Result<Box<dyn SessionHandle>> {
        let paused = data.status == SessionStatus::Paused;
        let mut handle = self
            .launcher
            .restore(data)
            .map_err(|e| SessionError::external("restore", e))?;

        if !paused {
            handle
                .start(false)
                .await
                .map_err(|e| SessionError::external("start", e))?;
        }
        Ok(handle)
    }

    /// Stop every watcher and persist all live sessions
    ///
    /// The manager counts as stopped even when the final save fails.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<()> {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        self.shutdown.cancel();
        self.watchers.close();
        self.watchers.wait().await;
        debug!("All watchers stopped");

        let records = self.snapshot_records().await;
        self.storage.save_sessions(&records)?;

        info!("Session manager stopped, saved {} sessions", records.len());
        Ok(())
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Create and start a new session
    #[instrument(skip(self, opts), fields(title = %opts.title))]
    pub async fn create(&self, opts: SessionOpts) -> Result<SessionId> {
        if self.is_stopped() {
            return Err(EngineError::Closed.into());
        }
        if opts.title.trim().is_empty() {
            return Err(SessionError::InvalidTitle {
                title: opts.title,
                reason: "title must not be empty".to_string(),
            }
            .into());
        }

        let id = SessionId::from_title(&opts.title);
        let launch = {
            let config = self.config.read().await;
            LaunchOptions {
                title: opts.title.clone(),
                path: opts.path.clone(),
                branch: branch_name(&config.branch_prefix, &opts.title),
                program: opts
                    .program
                    .clone()
                    .unwrap_or_else(|| config.default_program.clone()),
                auto_yes: opts.auto_yes.unwrap_or(config.auto_yes),
            }
        };

        {
            let mut registry = self.registry.write().await;
            if registry.title_taken(&opts.title) {
                return Err(SessionError::DuplicateTitle(opts.title).into());
            }
            registry.reserved.insert(id, opts.title.clone());
        }

        info!(
            "Creating session '{}' on branch '{}' running '{}'",
            launch.title, launch.branch, launch.program
        );
        let result = self.launch(&launch, opts.prompt.as_deref()).await;

        let mut registry = self.registry.write().await;
        registry.reserved.remove(&id);
        let handle = result?;

        let wrapper = SessionWrapper::new(id, launch.title, handle, self.shutdown.child_token());
        registry.sessions.insert(id, Arc::clone(&wrapper));
        drop(registry);

        {
            let slot = wrapper.slot.lock().await;
            self.events
                .publish(Event::state(id, SessionStatus::Loading, slot.published_status));
        }
        self.watch(wrapper).await;

        info!("Created session {}", id);
        Ok(id)
    }

    async fn launch(
        &self,
        opts: &LaunchOptions,
        prompt: Option<&str>,
    ) -> Result<Box<dyn SessionHandle>> {
        let mut handle = self
            .launcher
            .create(opts)
            .map_err(|e| SessionError::external("create", e))?;

        handle
            .start(true)
            .await
            .map_err(|e| SessionError::external("start", e))?;

        if let Some(prompt) = prompt.filter(|p| !p.is_empty()) {
            if let Err(e) = handle.send_prompt(prompt).await {
                warn!("Failed to deliver initial prompt to '{}': {:#}", opts.title, e);
            }
        }

        Ok(handle)
    }

    /// Pause a session (release the worktree, keep the branch)
    #[instrument(skip(self))]
    pub async fn pause(&self, id: &SessionId) -> Result<()> {
        let wrapper = self.wrapper(id).await?;
        let _op = wrapper.begin_operation()?;

        let mut slot = wrapper.slot.lock().await;
        if slot.published_status == SessionStatus::Terminated {
            return Err(SessionError::NotFound(*id).into());
        }

        let previous = slot.handle.status();
        if !previous.can_pause() {
            return Err(SessionError::InvalidState {
                id: *id,
                operation: "pause",
                status: previous,
            }
            .into());
        }

        let result = slot.handle.pause().await;
        wrapper.refresh(&slot);
        result.map_err(|e| SessionError::external("pause", e))?;

        let current = slot.handle.status();
        slot.published_status = current;
        self.events.publish(Event::state(*id, previous, current));

        info!("Paused session {}", id);
        Ok(())
    }

    /// Resume a paused session
    #[instrument(skip(self))]
    pub async fn resume(&self, id: &SessionId) -> Result<()> {
        let wrapper = self.wrapper(id).await?;
        let _op = wrapper.begin_operation()?;

        {
            let mut slot = wrapper.slot.lock().await;
            if slot.published_status == SessionStatus::Terminated {
                return Err(SessionError::NotFound(*id).into());
            }

            let previous = slot.handle.status();
            if !previous.can_resume() {
                return Err(SessionError::InvalidState {
                    id: *id,
                    operation: "resume",
                    status: previous,
                }
                .into());
            }

            let result = slot.handle.resume().await;
            wrapper.refresh(&slot);
            result.map_err(|e| SessionError::external("resume", e))?;

            let current = slot.handle.status();
            slot.published_status = current;
            self.events.publish(Event::state(*id, previous, current));
        }

        // Sessions restored while paused have no watcher yet
        self.watch(Arc::clone(&wrapper)).await;

        info!("Resumed session {}", id);
        Ok(())
    }

    /// Kill a session and release its external resources
    #[instrument(skip(self))]
    pub async fn kill(&self, id: &SessionId) -> Result<()> {
        let wrapper = self.wrapper(id).await?;
        let _op = wrapper.begin_operation()?;

        let previous = {
            let mut slot = wrapper.slot.lock().await;
            let previous = slot.handle.status();
            let result = slot.handle.kill().await;
            wrapper.refresh(&slot);
            result.map_err(|e| SessionError::external("kill", e))?;

            // A watcher waiting on the slot sees the cancellation and bails
            wrapper.cancel.cancel();
            slot.published_status = SessionStatus::Terminated;
            previous
        };

        self.registry.write().await.sessions.remove(id);
        self.events
            .publish(Event::state(*id, previous, SessionStatus::Terminated));
        // Ends per-session subscriptions once they drain the terminal event
        self.events.remove_session(id);

        info!("Killed session {}", id);
        Ok(())
    }

    /// Snapshots of all live sessions, oldest first
    pub async fn list(&self) -> Vec<SessionInfo> {
        let wrappers = self.wrappers().await;

        let mut sessions = Vec::with_capacity(wrappers.len());
        for wrapper in wrappers {
            sessions.push(wrapper.info());
        }
        sessions.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.title.cmp(&b.title))
        });
        sessions
    }

    /// Snapshot of one live session
    pub async fn get(&self, id: &SessionId) -> Result<SessionInfo> {
        let wrapper = self.wrapper(id).await?;
        Ok(wrapper.info())
    }

    /// Number of live sessions
    pub async fn len(&self) -> usize {
        self.registry.read().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn wrapper(&self, id: &SessionId) -> Result<Arc<SessionWrapper>> {
        self.registry
            .read()
            .await
            .sessions
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(*id).into())
    }

    async fn wrappers(&self) -> Vec<Arc<SessionWrapper>> {
        self.registry
            .read()
            .await
            .sessions
            .values()
            .cloned()
            .collect()
    }

    async fn snapshot_records(&self) -> Vec<SessionRecord> {
        let mut records = Vec::new();
        for wrapper in self.wrappers().await {
            let slot = wrapper.slot.lock().await;
            records.push(SessionRecord::from_instance(
                wrapper.id,
                &slot.handle.to_instance_data(),
            ));
        }
        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.title.cmp(&b.title))
        });
        records
    }

    async fn watch(&self, wrapper: Arc<SessionWrapper>) {
        if self.is_stopped() {
            return;
        }
        let period = self.config.read().await.poll_interval();
        spawn_watcher(&self.watchers, wrapper, self.events.clone(), period);
    }
}
