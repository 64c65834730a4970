// ── Persistence boundary ──
//
// The store reads the whole document once at startup and writes it
// back after every mutation. Backends only move bytes; they know
// nothing about networks.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CoreError;
use crate::model::{BandPreference, ConfigKey, NetworkConfig};

pub const STATE_VERSION: u32 = 1;

/// The user's most recent explicit pick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastSelected {
    pub key: ConfigKey,
    pub timestamp_ms: u64,
}

/// Device-wide preferences persisted next to the network list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevicePreferences {
    #[serde(default)]
    pub band: BandPreference,
    #[serde(default)]
    pub untrusted_allowed: bool,
}

/// Everything the store persists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedState {
    pub version: u32,
    #[serde(default)]
    pub networks: Vec<NetworkConfig>,
    #[serde(default)]
    pub last_selected: Option<LastSelected>,
    #[serde(default)]
    pub preferences: DevicePreferences,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            networks: Vec::new(),
            last_selected: None,
            preferences: DevicePreferences::default(),
        }
    }
}

/// Load/save of the persisted document.
pub trait ConfigPersistence: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<PersistedState>, CoreError>;
    fn save(&self, state: &PersistedState) -> Result<(), CoreError>;
}

// ── JSON file ───────────────────────────────────────────────────────

/// Pretty-printed JSON on disk, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigPersistence for JsonFileStore {
    fn load(&self) -> Result<Option<PersistedState>, CoreError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let state: PersistedState = serde_json::from_str(&raw)?;
        if state.version > STATE_VERSION {
            return Err(CoreError::Persistence {
                message: format!(
                    "state file version {} is newer than supported version {STATE_VERSION}",
                    state.version
                ),
            });
        }
        debug!(path = %self.path.display(), networks = state.networks.len(), "loaded state");
        Ok(Some(state))
    }

    fn save(&self, state: &PersistedState) -> Result<(), CoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

// ── In memory ───────────────────────────────────────────────────────

/// Keeps the document in memory. Clones share storage, so a test can
/// hand one clone to the store and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<Option<PersistedState>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: PersistedState) -> Self {
        Self {
            data: Arc::new(RwLock::new(Some(state))),
        }
    }

    pub fn snapshot(&self) -> Option<PersistedState> {
        self.data.read().ok().and_then(|guard| guard.clone())
    }
}

impl ConfigPersistence for MemoryStore {
    fn load(&self) -> Result<Option<PersistedState>, CoreError> {
        self.data
            .read()
            .map(|guard| guard.clone())
            .map_err(|_| poisoned())
    }

    fn save(&self, state: &PersistedState) -> Result<(), CoreError> {
        let mut guard = self.data.write().map_err(|_| poisoned())?;
        *guard = Some(state.clone());
        Ok(())
    }
}

fn poisoned() -> CoreError {
    CoreError::Persistence {
        message: "in-memory state lock poisoned".into(),
    }
}
