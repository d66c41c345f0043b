//! Player state persistence.
//!
//! `StateStore` is the transactional record store the processor writes
//! through. The contract is compare-and-swap: `save` succeeds only when the
//! caller's expected version matches the stored one, which is the sole
//! serialization mechanism between concurrent workers in a multi-instance
//! deployment. `MemoryStore` is the in-process implementation; any
//! transactional key-value or relational store can stand in behind the trait.

use dashmap::DashMap;
use leela_core::PlayerState;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("no record for player {0}")]
    NotFound(String),

    #[error("record for player {0} already exists")]
    AlreadyExists(String),

    #[error("version conflict for player {player_id}: expected {expected}, stored {stored}")]
    VersionConflict {
        player_id: String,
        expected: u64,
        stored: u64,
    },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Transient failures worth retrying with backoff. A version conflict is
    /// transient too, but the caller must reload before retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Unavailable(_) | StoreError::VersionConflict { .. }
        )
    }
}

/// A loaded record together with the version the load observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedState {
    pub state: PlayerState,
    pub version: u64,
}

/// Transactional read/write of `PlayerState` by player id.
pub trait StateStore: Send + Sync {
    /// Load the record, or `None` if the player has no record yet.
    fn load(&self, player_id: &str) -> Result<Option<VersionedState>, StoreError>;

    /// Compare-and-swap write. Succeeds only when the stored version equals
    /// `expected_version`; returns the new version.
    fn save(
        &self,
        player_id: &str,
        state: PlayerState,
        expected_version: u64,
    ) -> Result<u64, StoreError>;

    /// Create the record; fails if one already exists.
    fn create(&self, player_id: &str, state: PlayerState) -> Result<u64, StoreError>;
}

/// In-memory store backed by a concurrent map. CAS is atomic per key via the
/// map's entry locking.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<String, PlayerState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }
}

impl StateStore for MemoryStore {
    fn load(&self, player_id: &str) -> Result<Option<VersionedState>, StoreError> {
        Ok(self.records.get(player_id).map(|record| VersionedState {
            state: record.clone(),
            version: record.version,
        }))
    }

    fn save(
        &self,
        player_id: &str,
        state: PlayerState,
        expected_version: u64,
    ) -> Result<u64, StoreError> {
        let mut record = self
            .records
            .get_mut(player_id)
            .ok_or_else(|| StoreError::NotFound(player_id.to_string()))?;
        if record.version != expected_version {
            return Err(StoreError::VersionConflict {
                player_id: player_id.to_string(),
                expected: expected_version,
                stored: record.version,
            });
        }
        let new_version = state.version;
        *record = state;
        Ok(new_version)
    }

    fn create(&self, player_id: &str, state: PlayerState) -> Result<u64, StoreError> {
        use dashmap::mapref::entry::Entry;
        match self.records.entry(player_id.to_string()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists(player_id.to_string())),
            Entry::Vacant(slot) => {
                let version = state.version;
                slot.insert(state);
                Ok(version)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_version(version: u64) -> PlayerState {
        let mut state = PlayerState::new();
        state.version = version;
        state
    }

    #[test]
    fn test_load_missing_record() {
        let store = MemoryStore::new();
        assert_eq!(store.load("nobody").unwrap(), None);
    }

    #[test]
    fn test_create_then_load() {
        let store = MemoryStore::new();
        store.create("alice", state_with_version(0)).unwrap();

        let loaded = store.load("alice").unwrap().unwrap();
        assert_eq!(loaded.version, 0);

        assert_eq!(
            store.create("alice", state_with_version(0)),
            Err(StoreError::AlreadyExists("alice".to_string()))
        );
    }

    #[test]
    fn test_save_enforces_expected_version() {
        let store = MemoryStore::new();
        store.create("alice", state_with_version(0)).unwrap();

        let new_version = store.save("alice", state_with_version(1), 0).unwrap();
        assert_eq!(new_version, 1);

        // A stale writer still expecting version 0 is rejected.
        let err = store.save("alice", state_with_version(1), 0).unwrap_err();
        assert_eq!(
            err,
            StoreError::VersionConflict {
                player_id: "alice".to_string(),
                expected: 0,
                stored: 1,
            }
        );
        assert!(err.is_transient());
    }

    #[test]
    fn test_save_missing_record_is_not_found() {
        let store = MemoryStore::new();
        let err = store.save("ghost", state_with_version(1), 0).unwrap_err();
        assert_eq!(err, StoreError::NotFound("ghost".to_string()));
        assert!(!err.is_transient());
    }
}
