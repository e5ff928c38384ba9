//! Publish state persistence
//!
//! The last published payload hash is kept so an unchanged dashboard is not
//! re-sent on every run.

use crate::error::HealthError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::path::{Path, PathBuf};

/// Record of the last successful publish
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishState {
    pub last_payload_hash: String,
    pub last_published_at: DateTime<Utc>,
}

/// Storage for [`PublishState`]
pub trait StateStore {
    /// Previously saved state, or `None` on first run
    fn load(&self) -> Result<Option<PublishState>, HealthError>;

    fn save(&self, state: &PublishState) -> Result<(), HealthError>;
}

/// Default location: `<cache dir>/trmnl_health/state.json`
pub fn default_state_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("trmnl_health")
        .join("state.json")
}

/// JSON state file, replaced atomically on save
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> HealthError {
        HealthError::StateIo {
            path: self.path.clone(),
            source,
        }
    }
}

impl Default for FileStateStore {
    fn default() -> Self {
        Self::new(default_state_path())
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> Result<Option<PublishState>, HealthError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };

        match serde_json::from_str(&content) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "ignoring corrupt state file");
                Ok(None)
            }
        }
    }

    fn save(&self, state: &PublishState) -> Result<(), HealthError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let json = serde_json::to_string_pretty(state)?;
        let file_name = self
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("state.json");
        let tmp_path = self
            .path
            .with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));

        std::fs::write(&tmp_path, json).map_err(|e| self.io_error(e))?;
        if let Err(e) = std::fs::rename(&tmp_path, &self.path) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(self.io_error(e));
        }

        tracing::debug!(path = %self.path.display(), "saved publish state");
        Ok(())
    }
}

/// In-process state store
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    state: RefCell<Option<PublishState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: PublishState) -> Self {
        Self {
            state: RefCell::new(Some(state)),
        }
    }

    pub fn current(&self) -> Option<PublishState> {
        self.state.borrow().clone()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<Option<PublishState>, HealthError> {
        Ok(self.current())
    }

    fn save(&self, state: &PublishState) -> Result<(), HealthError> {
        *self.state.borrow_mut() = Some(state.clone());
        Ok(())
    }
}
