//! File-backed storage adapter
//!
//! Translates session records and configuration to and from a
//! `StateBackend` plus a TOML config file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use super::{SessionRecord, Storage};
use crate::config::{Config, StateBackend};
use crate::error::{Result, StorageError};

/// Storage adapter over a `StateBackend` and a config file
pub struct FileStorage {
    state: Arc<dyn StateBackend>,
    config_path: PathBuf,
}

impl FileStorage {
    pub fn new(state: Arc<dyn StateBackend>, config_path: impl Into<PathBuf>) -> Self {
        Self {
            state,
            config_path: config_path.into(),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

impl Storage for FileStorage {
    fn load_sessions(&self) -> Result<Vec<SessionRecord>> {
        let blob = self.state.load_instances()?;

        let items = match blob {
            Value::Null => return Ok(Vec::new()),
            Value::Array(items) => items,
            other => {
                return Err(StorageError::LoadFailed(format!(
                    "expected a list of session records, found {}",
                    json_kind(&other)
                ))
                .into());
            }
        };

        let total = items.len();
        let records: Vec<SessionRecord> = items
            .into_iter()
            .enumerate()
            .filter_map(|(index, item)| match serde_json::from_value(item) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping malformed session record #{}: {}", index, e);
                    None
                }
            })
            .collect();

        debug!("Loaded {} of {} session records", records.len(), total);
        Ok(records)
    }

    fn save_sessions(&self, sessions: &[SessionRecord]) -> Result<()> {
        let blob = serde_json::to_value(sessions)
            .map_err(|e| StorageError::SaveFailed(format!("Failed to serialize sessions: {}", e)))?;

        self.state.save_instances(blob)?;
        debug!("Saved {} session records", sessions.len());
        Ok(())
    }

    fn load_config(&self) -> Result<Config> {
        Config::load_from(&self.config_path)
    }

    fn save_config(&self, config: &Config) -> Result<()> {
        config.save_to(&self.config_path)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
