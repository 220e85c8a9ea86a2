//! # Storage Backends
//!
//! Concrete `StageStore` implementations and the `StorageBackend` switch the
//! app uses to pick one at startup.

mod redb_store;

pub use redb_store::RedbStore;

use crate::store::{MemoryStore, Partition, StageStore};
use crate::{EntryRecord, PartitionKey, RevisitError};
use std::path::Path;

/// Storage backend for a `ProgressionService`.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory partitions (fast, volatile unless exported).
    InMemory(MemoryStore),
    /// Disk-backed partitions using redb (ACID, persistent).
    Persistent(RedbStore),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemoryStore::new())
    }
}

impl StorageBackend {
    /// Open or create a redb-backed store.
    pub fn redb(path: impl AsRef<Path>) -> Result<Self, RevisitError> {
        Ok(Self::Persistent(RedbStore::open(path)?))
    }

    /// Check if using persistent storage.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::Persistent(_))
    }

    fn store(&self) -> &dyn StageStore {
        match self {
            Self::InMemory(store) => store,
            Self::Persistent(store) => store,
        }
    }
}

impl StageStore for StorageBackend {
    fn get(&self, key: &PartitionKey) -> Result<Partition, RevisitError> {
        self.store().get(key)
    }

    fn upsert(
        &self,
        key: &PartitionKey,
        record: EntryRecord,
        expected_revision: u64,
    ) -> Result<u64, RevisitError> {
        self.store().upsert(key, record, expected_revision)
    }

    fn commit(&self, partition: &Partition) -> Result<u64, RevisitError> {
        self.store().commit(partition)
    }

    fn partition_keys(&self) -> Result<Vec<PartitionKey>, RevisitError> {
        self.store().partition_keys()
    }

    fn snapshot(&self) -> Result<Vec<Partition>, RevisitError> {
        self.store().snapshot()
    }

    fn restore(&self, partitions: Vec<Partition>) -> Result<(), RevisitError> {
        self.store().restore(partitions)
    }
}
