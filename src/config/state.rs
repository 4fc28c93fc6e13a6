//! Persistent state backend
//!
//! Raw, schema-agnostic persistence underneath the storage adapter. The
//! session list is stored as an opaque JSON blob next to a small counter.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, StorageError};

use super::Config;

/// Opaque load/save of persisted session state
pub trait StateBackend: Send + Sync {
    /// Raw session-record blob (a JSON array, empty when nothing is stored)
    fn load_instances(&self) -> Result<Value>;

    /// Replace the raw session-record blob
    fn save_instances(&self, instances: Value) -> Result<()>;

    /// Drop every stored session record
    fn delete_all_instances(&self) -> Result<()>;

    /// Bitmask of help screens the user has dismissed
    fn help_screens_seen(&self) -> u32;

    fn set_help_screens_seen(&self, seen: u32) -> Result<()>;
}

/// On-disk layout of the state file
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StateFile {
    /// Serialized session records
    #[serde(default = "empty_instances")]
    instances: Value,

    /// Help screens already shown
    #[serde(default)]
    help_screens_seen: u32,

    /// Application version that last wrote this state
    #[serde(default)]
    version: String,
}

fn empty_instances() -> Value {
    Value::Array(Vec::new())
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            instances: empty_instances(),
            help_screens_seen: 0,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// JSON-file state backend
///
/// Every mutation writes through to the state file. An ephemeral state
/// keeps everything in memory.
#[derive(Debug)]
pub struct AppState {
    file: Mutex<StateFile>,
    /// Path to save state to (None for ephemeral state)
    state_path: Option<PathBuf>,
}

impl AppState {
    /// In-memory state that is never written to disk
    pub fn ephemeral() -> Self {
        Self {
            file: Mutex::new(StateFile::default()),
            state_path: None,
        }
    }

    /// Load state from the default location
    pub fn load() -> Result<Self> {
        let path = Config::state_file_path()?;
        Self::load_from(&path)
    }

    /// Load state from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self {
                file: Mutex::new(StateFile::default()),
                state_path: Some(path.to_path_buf()),
            });
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| StorageError::LoadFailed(format!("Failed to read state file: {}", e)))?;

        let mut file: StateFile = serde_json::from_str(&content)
            .map_err(|e| StorageError::LoadFailed(format!("Failed to parse state file: {}", e)))?;

        file.version = env!("CARGO_PKG_VERSION").to_string();

        Ok(Self {
            file: Mutex::new(file),
            state_path: Some(path.to_path_buf()),
        })
    }

    /// Path of the backing file, if any
    pub fn path(&self) -> Option<&Path> {
        self.state_path.as_deref()
    }

    /// Apply a mutation and write it through
    fn update(&self, mutate: impl FnOnce(&mut StateFile)) -> Result<()> {
        let mut file = self.file.lock();
        mutate(&mut file);

        match &self.state_path {
            Some(path) => write_state(path, &file),
            None => Ok(()),
        }
    }
}

fn write_state(path: &Path, file: &StateFile) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            StorageError::SaveFailed(format!("Failed to create state directory: {}", e))
        })?;
    }

    let content = serde_json::to_string_pretty(file)
        .map_err(|e| StorageError::SaveFailed(format!("Failed to serialize state: {}", e)))?;

    std::fs::write(path, content)
        .map_err(|e| StorageError::SaveFailed(format!("Failed to write state file: {}", e)))?;

    debug!("Wrote state file {:?}", path);
    Ok(())
}

impl StateBackend for AppState {
    fn load_instances(&self) -> Result<Value> {
        Ok(self.file.lock().instances.clone())
    }

    fn save_instances(&self, instances: Value) -> Result<()> {
        self.update(|file| file.instances = instances)
    }

    fn delete_all_instances(&self) -> Result<()> {
        self.update(|file| file.instances = empty_instances())
    }

    fn help_screens_seen(&self) -> u32 {
        self.file.lock().help_screens_seen
    }

    fn set_help_screens_seen(&self, seen: u32) -> Result<()> {
        self.update(|file| file.help_screens_seen = seen)
    }
}
