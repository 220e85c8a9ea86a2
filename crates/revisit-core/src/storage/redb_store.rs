//! # redb-backed Partition Storage
//!
//! A disk-backed `StageStore` using the redb embedded database.
//!
//! One table maps `(user, sheet)` to the encoded partition (see
//! [`crate::formats::persistence`]). Every write runs inside a single redb
//! write transaction, which gives:
//! - all-or-nothing commits (a crash never leaves half a movement set)
//! - serialized writers, so the revision check and the write cannot interleave
//! - MVCC readers that always see a committed partition
//!
//! `restore` keeps revisions monotonic: keys missing from the snapshot stay
//! in the table as empty partitions at a bumped revision.

use crate::formats::{partition_from_bytes, partition_to_bytes};
use crate::store::{Partition, StageStore, check_revision, restored_revision};
use crate::{EntryRecord, PartitionKey, RevisitError};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::collections::BTreeMap;
use std::path::Path;

/// Table for partitions: (user_id, sheet_type) -> encoded Partition bytes
const PARTITIONS: TableDefinition<(&str, &str), &[u8]> = TableDefinition::new("partitions");

/// A disk-backed partition store using redb.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RevisitError> {
        let db =
            Database::create(path.as_ref()).map_err(|e| RevisitError::IoError(e.to_string()))?;

        // Initialize the table if it doesn't exist
        {
            let write_txn = db
                .begin_write()
                .map_err(|e| RevisitError::IoError(e.to_string()))?;
            let _ = write_txn
                .open_table(PARTITIONS)
                .map_err(|e| RevisitError::IoError(e.to_string()))?;
            write_txn
                .commit()
                .map_err(|e| RevisitError::IoError(e.to_string()))?;
        }

        Ok(Self { db })
    }

    /// Compact the database (optional optimization).
    pub fn compact(&mut self) -> Result<(), RevisitError> {
        self.db
            .compact()
            .map_err(|e| RevisitError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Number of stored partitions, tombstones excluded.
    pub fn partition_count(&self) -> Result<usize, RevisitError> {
        Ok(self.snapshot()?.len())
    }

    /// Read-modify-write one partition inside a single write transaction.
    ///
    /// `apply` receives the stored partition and returns the replacement;
    /// its revision must match the stored one or the transaction is dropped
    /// with `Conflict`.
    fn write_partition(
        &self,
        key: &PartitionKey,
        expected_revision: u64,
        apply: impl FnOnce(Partition) -> Partition,
    ) -> Result<u64, RevisitError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| RevisitError::IoError(e.to_string()))?;

        let next = {
            let mut table = write_txn
                .open_table(PARTITIONS)
                .map_err(|e| RevisitError::IoError(e.to_string()))?;
            let db_key = (key.user.as_str(), key.sheet.as_str());

            let stored = match table
                .get(db_key)
                .map_err(|e| RevisitError::IoError(e.to_string()))?
            {
                Some(guard) => partition_from_bytes(guard.value())?,
                None => Partition::empty(key.clone()),
            };

            let next = check_revision(key, stored.revision(), expected_revision)?;
            let updated = apply(stored).at_revision(next);
            let bytes = partition_to_bytes(&updated)?;

            table
                .insert(db_key, bytes.as_slice())
                .map_err(|e| RevisitError::IoError(e.to_string()))?;
            next
        };

        write_txn
            .commit()
            .map_err(|e| RevisitError::IoError(e.to_string()))?;
        Ok(next)
    }
}

// =============================================================================
// STAGESTORE TRAIT IMPLEMENTATION
// =============================================================================

impl StageStore for RedbStore {
    fn get(&self, key: &PartitionKey) -> Result<Partition, RevisitError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| RevisitError::IoError(e.to_string()))?;
        let table = read_txn
            .open_table(PARTITIONS)
            .map_err(|e| RevisitError::IoError(e.to_string()))?;

        match table
            .get((key.user.as_str(), key.sheet.as_str()))
            .map_err(|e| RevisitError::IoError(e.to_string()))?
        {
            Some(guard) => partition_from_bytes(guard.value()),
            None => Ok(Partition::empty(key.clone())),
        }
    }

    fn upsert(
        &self,
        key: &PartitionKey,
        record: EntryRecord,
        expected_revision: u64,
    ) -> Result<u64, RevisitError> {
        self.write_partition(key, expected_revision, |mut stored| {
            stored.put(record);
            stored
        })
    }

    fn commit(&self, partition: &Partition) -> Result<u64, RevisitError> {
        self.write_partition(partition.key(), partition.revision(), |_| {
            partition.clone()
        })
    }

    fn partition_keys(&self) -> Result<Vec<PartitionKey>, RevisitError> {
        Ok(self
            .snapshot()?
            .into_iter()
            .map(|p| p.key().clone())
            .collect())
    }

    fn snapshot(&self) -> Result<Vec<Partition>, RevisitError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| RevisitError::IoError(e.to_string()))?;
        let table = read_txn
            .open_table(PARTITIONS)
            .map_err(|e| RevisitError::IoError(e.to_string()))?;

        let mut partitions = Vec::new();
        for entry in table
            .iter()
            .map_err(|e| RevisitError::IoError(e.to_string()))?
        {
            let (_, value) = entry.map_err(|e| RevisitError::IoError(e.to_string()))?;
            let partition = partition_from_bytes(value.value())?;
            if !partition.is_empty() {
                partitions.push(partition);
            }
        }
        Ok(partitions)
    }

    fn restore(&self, partitions: Vec<Partition>) -> Result<(), RevisitError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| RevisitError::IoError(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(PARTITIONS)
                .map_err(|e| RevisitError::IoError(e.to_string()))?;

            let mut stored = BTreeMap::new();
            for entry in table
                .iter()
                .map_err(|e| RevisitError::IoError(e.to_string()))?
            {
                let (_, value) = entry.map_err(|e| RevisitError::IoError(e.to_string()))?;
                let partition = partition_from_bytes(value.value())?;
                stored.insert(partition.key().clone(), partition.revision());
            }

            let mut replacement: BTreeMap<PartitionKey, Partition> = stored
                .iter()
                .map(|(key, revision)| {
                    let tombstone =
                        Partition::empty(key.clone()).at_revision(revision.saturating_add(1));
                    (key.clone(), tombstone)
                })
                .collect();
            for partition in partitions {
                let previous = stored.get(partition.key()).copied().unwrap_or(0);
                let revision = restored_revision(previous, partition.revision());
                replacement.insert(partition.key().clone(), partition.at_revision(revision));
            }

            for (key, partition) in &replacement {
                let bytes = partition_to_bytes(partition)?;
                table
                    .insert((key.user.as_str(), key.sheet.as_str()), bytes.as_slice())
                    .map_err(|e| RevisitError::IoError(e.to_string()))?;
            }
        }
        write_txn
            .commit()
            .map_err(|e| RevisitError::IoError(e.to_string()))?;
        Ok(())
    }
}
