//! Snapshot persistence.
//!
//! The engine only sees `PersistenceGateway`; the storage medium is the
//! host's business. Two stores ship here: a JSON file (atomic replace) and an
//! in-memory slot for tests and embedders that persist elsewhere.

use crate::state::PetState;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("snapshot I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode pet snapshot: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("failed to encode pet snapshot: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type PersistenceResult<T> = std::result::Result<T, PersistenceError>;

/// Opaque load/save of the pet snapshot.
pub trait PersistenceGateway: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> PersistenceResult<Option<PetState>>;
    fn save(&self, state: &PetState) -> PersistenceResult<()>;
}

// =============================================================================
// JSON file store
// =============================================================================

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl PersistenceGateway for JsonFileStore {
    fn load(&self) -> PersistenceResult<Option<PetState>> {
        let json = match std::fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_err(e)),
        };
        let state = serde_json::from_str(&json).map_err(PersistenceError::Decode)?;
        Ok(Some(state))
    }

    fn save(&self, state: &PetState) -> PersistenceResult<()> {
        let json = serde_json::to_string_pretty(state).map_err(PersistenceError::Encode)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }
        // Write beside the target and rename so a crash never leaves half a file.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| self.io_err(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))?;
        tracing::trace!("Pet snapshot saved to {}", self.path.display());
        Ok(())
    }
}

// =============================================================================
// In-memory store
// =============================================================================

#[derive(Debug, Default)]
struct MemorySlot {
    state: Option<PetState>,
    saves: usize,
    fail_saves: bool,
}

/// Shared in-memory snapshot slot. Clones see the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slot: Arc<Mutex<MemorySlot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: PetState) -> Self {
        let store = Self::default();
        store.lock().state = Some(state);
        store
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemorySlot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make every subsequent save fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.lock().fail_saves = failing;
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.lock().saves
    }

    pub fn snapshot(&self) -> Option<PetState> {
        self.lock().state.clone()
    }
}

impl PersistenceGateway for MemoryStore {
    fn load(&self) -> PersistenceResult<Option<PetState>> {
        Ok(self.lock().state.clone())
    }

    fn save(&self, state: &PetState) -> PersistenceResult<()> {
        let mut slot = self.lock();
        if slot.fail_saves {
            return Err(PersistenceError::Unavailable("memory store set to fail".into()));
        }
        slot.state = Some(state.clone());
        slot.saves += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ActionKind;

    #[test]
    fn test_file_store_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nope.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested/state.json"));

        let mut state = PetState::default();
        state.xp = 140;
        state.boost_until = Some(1_700_000_300.0);
        state.last_action_at.insert(ActionKind::Joy, Some(1_700_000_000.0));
        store.save(&state).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, state);
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn test_file_store_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = JsonFileStore::new(&path).load().unwrap_err();
        assert!(matches!(err, PersistenceError::Decode(_)));
    }

    #[test]
    fn test_memory_store_failure_toggle() {
        let store = MemoryStore::new();
        store.set_failing(true);
        assert!(store.save(&PetState::default()).is_err());
        assert!(store.snapshot().is_none());
        store.set_failing(false);
        store.save(&PetState::default()).unwrap();
        assert_eq!(store.save_count(), 1);
        assert!(store.load().unwrap().is_some());
    }
}
