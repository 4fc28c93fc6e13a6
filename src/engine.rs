//! Engine facade
//!
//! The single entry point for front ends. Wires configuration, storage, the
//! event bus and the session manager together and enforces the lifecycle
//! `Uninitialized -> Started -> Closed`. Every session operation requires a
//! started engine.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{info, instrument};

use crate::config::{Config, SharedConfig, StateBackend};
use crate::error::{EngineError, Result};
use crate::events::{EventBus, Subscription};
use crate::session::{SessionId, SessionInfo, SessionLauncher, SessionManager, SessionOpts};
use crate::storage::{FileStorage, Storage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Uninitialized,
    Started,
    Closed,
}

/// Session orchestration engine
pub struct Engine {
    lifecycle: RwLock<Lifecycle>,
    config: SharedConfig,
    storage: Arc<dyn Storage>,
    events: EventBus,
    manager: SessionManager,
}

impl Engine {
    /// Engine over a state backend, with the config file at its default location
    pub fn new(
        config: Config,
        state: Arc<dyn StateBackend>,
        launcher: Arc<dyn SessionLauncher>,
    ) -> Result<Self> {
        Self::builder()
            .config(config)
            .state_backend(state)
            .launcher(launcher)
            .build()
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Restore persisted sessions and start their watchers
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.write().await;
        match *lifecycle {
            Lifecycle::Started => return Err(EngineError::AlreadyStarted.into()),
            Lifecycle::Closed => return Err(EngineError::Closed.into()),
            Lifecycle::Uninitialized => {}
        }

        let restored = self.manager.start().await?;
        *lifecycle = Lifecycle::Started;

        info!("Engine started with {} sessions", restored);
        Ok(())
    }

    /// Stop the manager, persist every live session and close the event bus
    ///
    /// No-op unless the engine is started. A failed final save is reported,
    /// but the engine is closed regardless.
    #[instrument(skip(self))]
    pub async fn close(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.write().await;
        if *lifecycle != Lifecycle::Started {
            return Ok(());
        }

        let result = self.manager.stop().await;
        self.events.close();
        *lifecycle = Lifecycle::Closed;

        info!("Engine closed");
        result
    }

    pub async fn is_started(&self) -> bool {
        *self.lifecycle.read().await == Lifecycle::Started
    }

    pub async fn start_session(&self, opts: SessionOpts) -> Result<SessionId> {
        let _started = self.started().await?;
        self.manager.create(opts).await
    }

    pub async fn pause(&self, id: &SessionId) -> Result<()> {
        let _started = self.started().await?;
        self.manager.pause(id).await
    }

    pub async fn resume(&self, id: &SessionId) -> Result<()> {
        let _started = self.started().await?;
        self.manager.resume(id).await
    }

    pub async fn kill(&self, id: &SessionId) -> Result<()> {
        let _started = self.started().await?;
        self.manager.kill(id).await
    }

    pub async fn list(&self) -> Result<Vec<SessionInfo>> {
        let _started = self.started().await?;
        Ok(self.manager.list().await)
    }

    pub async fn get(&self, id: &SessionId) -> Result<SessionInfo> {
        let _started = self.started().await?;
        self.manager.get(id).await
    }

    /// Subscribe to events of one session, or of every session when `None`
    pub async fn events(&self, session_id: Option<SessionId>) -> Result<Subscription> {
        let _started = self.started().await?;
        Ok(self.events.subscribe(session_id))
    }

    /// Validate, persist and apply a new configuration
    ///
    /// Sessions already running keep the settings they were created with.
    #[instrument(skip(self, config))]
    pub async fn update_config(&self, config: Config) -> Result<()> {
        let lifecycle = self.lifecycle.write().await;
        if *lifecycle != Lifecycle::Started {
            return Err(EngineError::NotStarted.into());
        }

        config
            .validate()
            .map_err(|e| EngineError::ConfigInvalid(e.to_string()))?;
        self.storage.save_config(&config)?;
        *self.config.write().await = config;

        info!("Configuration updated");
        Ok(())
    }

    pub async fn get_config(&self) -> Result<Config> {
        let _started = self.started().await?;
        Ok(self.config.read().await.clone())
    }

    async fn started(&self) -> Result<RwLockReadGuard<'_, Lifecycle>> {
        let lifecycle = self.lifecycle.read().await;
        if *lifecycle != Lifecycle::Started {
            return Err(EngineError::NotStarted.into());
        }
        Ok(lifecycle)
    }
}

/// Builder for [`Engine`]
#[derive(Default)]
pub struct EngineBuilder {
    config: Option<Config>,
    state: Option<Arc<dyn StateBackend>>,
    launcher: Option<Arc<dyn SessionLauncher>>,
    config_path: Option<PathBuf>,
    storage: Option<Arc<dyn Storage>>,
}

impl EngineBuilder {
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    pub fn state_backend(mut self, state: Arc<dyn StateBackend>) -> Self {
        self.state = Some(state);
        self
    }

    pub fn launcher(mut self, launcher: Arc<dyn SessionLauncher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    /// Where `update_config` persists the configuration
    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Use a custom storage adapter instead of one over the state backend
    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn build(self) -> Result<Engine> {
        let config = self
            .config
            .ok_or_else(|| EngineError::ConfigInvalid("configuration is required".into()))?;
        config
            .validate()
            .map_err(|e| EngineError::ConfigInvalid(e.to_string()))?;

        let launcher = self
            .launcher
            .ok_or_else(|| EngineError::ConfigInvalid("session launcher is required".into()))?;

        let storage = match (self.storage, self.state) {
            (Some(storage), _) => storage,
            (None, Some(state)) => {
                let config_path = match self.config_path {
                    Some(path) => path,
                    None => Config::config_file_path()?,
                };
                Arc::new(FileStorage::new(state, config_path)) as Arc<dyn Storage>
            }
            (None, None) => {
                return Err(EngineError::ConfigInvalid("state backend is required".into()).into());
            }
        };

        let config = config.into_shared();
        let events = EventBus::new();
        let manager = SessionManager::new(
            Arc::clone(&config),
            Arc::clone(&storage),
            launcher,
            events.clone(),
        );

        Ok(Engine {
            lifecycle: RwLock::new(Lifecycle::Uninitialized),
            config,
            storage,
            events,
            manager,
        })
    }
}
