//! Persistence backends for the access registry.
//!
//! The registry state is a small keyed mapping, read in full before every
//! mutation and rewritten in full after it. Writers race as last-writer-wins;
//! no write-ahead staging or cross-crash atomicity is provided.
//!
//! [`JsonFileStore`] is the production backend (a flat JSON file);
//! [`MemoryStore`] backs tests and in-memory deployments.

use crate::error::{Error, Result};
use crate::registry::{IdentityId, IdentityRecord};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::debug;

/// Full registry snapshot: identity -> record.
pub type RegistrySnapshot = BTreeMap<IdentityId, IdentityRecord>;

/// Storage seam for the access registry.
///
/// Implementations hold one full snapshot. [`load`](Self::load) returns the
/// whole mapping; [`save`](Self::save) replaces it.
pub trait RegistryStore {
    /// Loads the full registry snapshot. An empty backend yields an empty map.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read or decoded.
    fn load(&self) -> Result<RegistrySnapshot>;

    /// Replaces the persisted snapshot with `records`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn save(&self, records: &RegistrySnapshot) -> Result<()>;
}

/// Registry persistence in a flat JSON file.
///
/// A missing file loads as an empty registry; the file is created on first
/// save. The whole file is rewritten on every save.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Creates a store over the given file path.
    ///
    /// The file does not need to exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn path_string(&self) -> String {
        self.path.display().to_string()
    }
}

impl RegistryStore for JsonFileStore {
    fn load(&self) -> Result<RegistrySnapshot> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Registry file absent, starting empty");
                return Ok(RegistrySnapshot::new());
            }
            Err(source) => {
                return Err(Error::Storage {
                    path: self.path_string(),
                    source,
                });
            }
        };

        serde_json::from_str(&raw).map_err(|source| Error::CorruptState {
            path: self.path_string(),
            source,
        })
    }

    fn save(&self, records: &RegistrySnapshot) -> Result<()> {
        let json = serde_json::to_string_pretty(records).map_err(|source| Error::CorruptState {
            path: self.path_string(),
            source,
        })?;

        std::fs::write(&self.path, json).map_err(|source| Error::Storage {
            path: self.path_string(),
            source,
        })
    }
}

/// In-memory registry store for tests and single-process deployments.
///
/// Tracks the number of saves so tests can assert that failed transitions
/// perform no persistence write.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<RegistrySnapshot>,
    writes: AtomicUsize,
}

impl MemoryStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how many times [`save`](RegistryStore::save) has been called.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Returns the current snapshot rendered as canonical JSON.
    ///
    /// Useful for byte-identity assertions around failed transitions.
    ///
    /// # Panics
    ///
    /// Panics if the snapshot cannot be serialized (it always can).
    #[must_use]
    pub fn snapshot_json(&self) -> String {
        let records = self.records.lock().expect("store lock poisoned");
        serde_json::to_string(&*records).expect("registry snapshot serializes")
    }
}

impl RegistryStore for MemoryStore {
    fn load(&self) -> Result<RegistrySnapshot> {
        Ok(self.records.lock().expect("store lock poisoned").clone())
    }

    fn save(&self, records: &RegistrySnapshot) -> Result<()> {
        *self.records.lock().expect("store lock poisoned") = records.clone();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{IdentityState, IdentityRecord};

    fn sample_snapshot() -> RegistrySnapshot {
        let mut records = RegistrySnapshot::new();
        records.insert(
            IdentityId::from("100"),
            IdentityRecord {
                state: IdentityState::Approved,
                daily_count: 3,
                count_date: Some("2024-03-01".parse().unwrap()),
            },
        );
        records.insert(
            IdentityId::from("200"),
            IdentityRecord {
                state: IdentityState::Pending,
                daily_count: 0,
                count_date: None,
            },
        );
        records
    }

    #[test]
    fn test_file_store_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("registry.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_file_store_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("registry.json"));

        let records = sample_snapshot();
        store.save(&records).unwrap();

        assert_eq!(store.load().unwrap(), records);
    }

    #[test]
    fn test_file_store_save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("registry.json"));

        store.save(&sample_snapshot()).unwrap();
        store.save(&RegistrySnapshot::new()).unwrap();

        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_file_store_corrupt_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = JsonFileStore::new(&path);
        let err = store.load().unwrap_err();
        assert!(matches!(err, Error::CorruptState { .. }));
    }

    #[test]
    fn test_file_store_state_serialized_snake_case() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("registry.json"));
        store.save(&sample_snapshot()).unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains(r#""state": "approved""#));
        assert!(raw.contains(r#""state": "pending""#));
    }

    #[test]
    fn test_memory_store_counts_writes() {
        let store = MemoryStore::new();
        assert_eq!(store.write_count(), 0);

        store.save(&sample_snapshot()).unwrap();
        store.save(&sample_snapshot()).unwrap();
        assert_eq!(store.write_count(), 2);

        // Loads are not writes
        store.load().unwrap();
        assert_eq!(store.write_count(), 2);
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        let records = sample_snapshot();
        store.save(&records).unwrap();
        assert_eq!(store.load().unwrap(), records);
    }
}
