//! Persistence for ledger state.
//!
//! Entitlement and usage are two independently keyed records. Storage is
//! best-effort: the ledger treats a failed or empty read as "no prior
//! state" and logs failed writes instead of failing the operation.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::entitlement::Entitlement;
use crate::error::CoreError;
use crate::quota::UsageStats;

pub const ENTITLEMENT_FILE: &str = "entitlement.json";
pub const USAGE_FILE: &str = "usage.json";

pub trait LedgerStore: Send + Sync {
    fn load_entitlement(&self) -> Result<Option<Entitlement>, CoreError>;
    fn load_usage(&self) -> Result<Option<UsageStats>, CoreError>;
    fn save_entitlement(&self, entitlement: &Entitlement) -> Result<(), CoreError>;
    fn save_usage(&self, usage: &UsageStats) -> Result<(), CoreError>;
}

/// Keeps state in process memory only.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entitlement: Mutex<Option<Entitlement>>,
    usage: Mutex<Option<UsageStats>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed the store, as if a previous session had saved this state.
    pub fn with_state(entitlement: Option<Entitlement>, usage: Option<UsageStats>) -> Self {
        Self {
            entitlement: Mutex::new(entitlement),
            usage: Mutex::new(usage),
        }
    }
}

fn poisoned<T>(_: T) -> CoreError {
    CoreError::Internal("memory store lock poisoned".to_string())
}

impl LedgerStore for MemoryStore {
    fn load_entitlement(&self) -> Result<Option<Entitlement>, CoreError> {
        Ok(self.entitlement.lock().map_err(poisoned)?.clone())
    }

    fn load_usage(&self) -> Result<Option<UsageStats>, CoreError> {
        Ok(self.usage.lock().map_err(poisoned)?.clone())
    }

    fn save_entitlement(&self, entitlement: &Entitlement) -> Result<(), CoreError> {
        *self.entitlement.lock().map_err(poisoned)? = Some(entitlement.clone());
        Ok(())
    }

    fn save_usage(&self, usage: &UsageStats) -> Result<(), CoreError> {
        *self.usage.lock().map_err(poisoned)? = Some(usage.clone());
        Ok(())
    }
}

/// Stores each record as a JSON file inside `dir`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, CoreError> {
        let path = self.dir.join(name);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CoreError::Persistence(format!(
                    "failed to read {}: {e}",
                    path.display()
                )))
            }
        };
        serde_json::from_slice(&raw).map(Some).map_err(|e| {
            CoreError::Persistence(format!("failed to parse {}: {e}", path.display()))
        })
    }

    /// Write via a sibling temp file and rename so readers never see a
    /// half-written record.
    fn write<T: Serialize>(&self, name: &str, value: &T) -> Result<(), CoreError> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            CoreError::Persistence(format!("failed to create {}: {e}", self.dir.display()))
        })?;
        let path = self.dir.join(name);
        let tmp = self.dir.join(format!(".{name}.tmp"));
        let json = serde_json::to_vec_pretty(value)
            .map_err(|e| CoreError::Persistence(format!("failed to encode {name}: {e}")))?;
        fs::write(&tmp, json)
            .and_then(|()| fs::rename(&tmp, &path))
            .map_err(|e| {
                CoreError::Persistence(format!("failed to write {}: {e}", path.display()))
            })
    }
}

impl LedgerStore for JsonFileStore {
    fn load_entitlement(&self) -> Result<Option<Entitlement>, CoreError> {
        self.read(ENTITLEMENT_FILE)
    }

    fn load_usage(&self) -> Result<Option<UsageStats>, CoreError> {
        self.read(USAGE_FILE)
    }

    fn save_entitlement(&self, entitlement: &Entitlement) -> Result<(), CoreError> {
        self.write(ENTITLEMENT_FILE, entitlement)
    }

    fn save_usage(&self, usage: &UsageStats) -> Result<(), CoreError> {
        self.write(USAGE_FILE, usage)
    }
}
