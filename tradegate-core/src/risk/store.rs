//! Risk-state repositories.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::state::RiskState;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("risk state I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt risk state at {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("risk state serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("risk state lock poisoned")]
    Poisoned,
}

/// Narrow repository over a single durable risk record.
pub trait RiskStateStore: Send + Sync {
    fn get_state(&self) -> Result<RiskState, StoreError>;
    fn save_state(&self, state: &RiskState) -> Result<(), StoreError>;
}

impl<S: RiskStateStore + ?Sized> RiskStateStore for Arc<S> {
    fn get_state(&self) -> Result<RiskState, StoreError> {
        (**self).get_state()
    }

    fn save_state(&self, state: &RiskState) -> Result<(), StoreError> {
        (**self).save_state(state)
    }
}

/// Process-local store. Used by backtests and tests.
#[derive(Debug, Default)]
pub struct MemoryRiskStore {
    state: Mutex<RiskState>,
}

impl MemoryRiskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: RiskState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }
}

impl RiskStateStore for MemoryRiskStore {
    fn get_state(&self) -> Result<RiskState, StoreError> {
        self.state.lock().map(|s| s.clone()).map_err(|_| StoreError::Poisoned)
    }

    fn save_state(&self, state: &RiskState) -> Result<(), StoreError> {
        let mut guard = self.state.lock().map_err(|_| StoreError::Poisoned)?;
        *guard = state.clone();
        Ok(())
    }
}

/// Durable JSON file store.
///
/// A missing file reads as the default state. Writes go to a sibling temp
/// file which is then renamed over the target, so readers never see a
/// partially written record.
#[derive(Debug, Clone)]
pub struct JsonFileRiskStore {
    path: PathBuf,
}

impl JsonFileRiskStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl RiskStateStore for JsonFileRiskStore {
    fn get_state(&self) -> Result<RiskState, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(RiskState::default()),
            Err(e) => return Err(self.io_err(e)),
        };
        serde_json::from_str(&text).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn save_state(&self, state: &RiskState) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }
        let json = serde_json::to_string_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp).map_err(|e| self.io_err(e))?;
            file.write_all(json.as_bytes()).map_err(|e| self.io_err(e))?;
            file.sync_all().map_err(|e| self.io_err(e))?;
        }
        fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))
    }
}
