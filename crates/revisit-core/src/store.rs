//! # Stage Store
//!
//! Partitioned storage of tracked entries.
//!
//! This module defines the `StageStore` trait and the in-memory
//! `MemoryStore`. All data structures use `BTreeMap` for deterministic
//! ordering.
//!
//! ## Revisions
//!
//! Every partition carries a revision counter. A write names the revision it
//! was computed from; if the stored revision has moved on, the write fails
//! with `RevisitError::Conflict` and nothing is applied.
//!
//! Revisions never go backwards, not even across `restore`. A restored
//! partition lands above the revision it replaces, and a key the snapshot
//! leaves out is kept as an empty partition at a bumped revision. Empty
//! partitions are invisible to `partition_keys` and `snapshot`.

use crate::{EntryRecord, PartitionKey, ProblemId, RevisitError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

// =============================================================================
// PARTITION
// =============================================================================

/// All tracked entries of one (user, sheet) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    key: PartitionKey,
    revision: u64,
    records: BTreeMap<ProblemId, EntryRecord>,
}

impl Partition {
    /// An empty partition at revision 0.
    #[must_use]
    pub fn empty(key: PartitionKey) -> Self {
        Self {
            key,
            revision: 0,
            records: BTreeMap::new(),
        }
    }

    /// Rebuild a partition from stored parts.
    #[must_use]
    pub fn from_records(
        key: PartitionKey,
        revision: u64,
        records: impl IntoIterator<Item = EntryRecord>,
    ) -> Self {
        Self {
            key,
            revision,
            records: records
                .into_iter()
                .map(|r| (r.problem_id.clone(), r))
                .collect(),
        }
    }

    #[must_use]
    pub fn key(&self) -> &PartitionKey {
        &self.key
    }

    /// The revision this partition was read at.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn get(&self, problem: &ProblemId) -> Option<&EntryRecord> {
        self.records.get(problem)
    }

    #[must_use]
    pub fn contains(&self, problem: &ProblemId) -> bool {
        self.records.contains_key(problem)
    }

    /// Insert or replace a record in this working copy.
    pub fn put(&mut self, record: EntryRecord) {
        self.records.insert(record.problem_id.clone(), record);
    }

    /// Records keyed by problem id.
    pub fn records(&self) -> impl Iterator<Item = &EntryRecord> {
        self.records.values()
    }

    /// Records ordered by `stage_entered_at`, ties broken by problem id.
    #[must_use]
    pub fn ordered(&self) -> Vec<&EntryRecord> {
        let mut ordered: Vec<&EntryRecord> = self.records.values().collect();
        ordered.sort_by(|a, b| {
            a.stage_entered_at
                .cmp(&b.stage_entered_at)
                .then_with(|| a.problem_id.cmp(&b.problem_id))
        });
        ordered
    }

    /// The same contents stamped with a new revision.
    #[must_use]
    pub(crate) fn at_revision(mut self, revision: u64) -> Self {
        self.revision = revision;
        self
    }
}

// =============================================================================
// STAGESTORE TRAIT
// =============================================================================

/// Storage substrate for partitions.
///
/// Implementations must be safe to share between threads; every method
/// takes `&self`. A single call is atomic with respect to its partition.
pub trait StageStore: Send + Sync {
    /// Load a partition. Absent partitions are empty at revision 0.
    fn get(&self, key: &PartitionKey) -> Result<Partition, RevisitError>;

    /// Insert or replace one record.
    ///
    /// Fails with `Conflict` if the stored revision is not `expected_revision`.
    /// Returns the new revision.
    fn upsert(
        &self,
        key: &PartitionKey,
        record: EntryRecord,
        expected_revision: u64,
    ) -> Result<u64, RevisitError>;

    /// Replace the whole partition in one all-or-nothing write.
    ///
    /// Fails with `Conflict` if the stored revision is not
    /// `partition.revision()`. Returns the new revision.
    fn commit(&self, partition: &Partition) -> Result<u64, RevisitError>;

    /// Keys of every stored partition, in order.
    fn partition_keys(&self) -> Result<Vec<PartitionKey>, RevisitError>;

    /// Every stored partition, in key order.
    fn snapshot(&self) -> Result<Vec<Partition>, RevisitError>;

    /// Replace all stored partitions with `partitions`.
    ///
    /// Every key touched, restored or dropped, ends above its previous
    /// revision, so a working copy read before the restore cannot commit
    /// after it.
    fn restore(&self, partitions: Vec<Partition>) -> Result<(), RevisitError>;
}

/// Revision check shared by the backends.
pub(crate) fn check_revision(
    key: &PartitionKey,
    stored: u64,
    expected: u64,
) -> Result<u64, RevisitError> {
    if stored != expected {
        return Err(RevisitError::Conflict(key.clone()));
    }
    Ok(stored.saturating_add(1))
}

/// Revision for a partition restored over one stored at `stored`.
pub(crate) fn restored_revision(stored: u64, snapshot: u64) -> u64 {
    stored.saturating_add(1).max(snapshot)
}

// =============================================================================
// MEMORY STORE
// =============================================================================

/// In-memory store. Clones share the same partitions.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    partitions: Arc<RwLock<BTreeMap<PartitionKey, Partition>>>,
}

impl MemoryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-loaded with partitions.
    #[must_use]
    pub fn with_partitions(partitions: Vec<Partition>) -> Self {
        let map = partitions
            .into_iter()
            .map(|p| (p.key().clone(), p))
            .collect();
        Self {
            partitions: Arc::new(RwLock::new(map)),
        }
    }
}

impl StageStore for MemoryStore {
    fn get(&self, key: &PartitionKey) -> Result<Partition, RevisitError> {
        let partitions = self
            .partitions
            .read()
            .map_err(|_| RevisitError::LockPoisoned)?;
        Ok(partitions
            .get(key)
            .cloned()
            .unwrap_or_else(|| Partition::empty(key.clone())))
    }

    fn upsert(
        &self,
        key: &PartitionKey,
        record: EntryRecord,
        expected_revision: u64,
    ) -> Result<u64, RevisitError> {
        let mut partitions = self
            .partitions
            .write()
            .map_err(|_| RevisitError::LockPoisoned)?;
        let partition = partitions
            .entry(key.clone())
            .or_insert_with(|| Partition::empty(key.clone()));
        let next = check_revision(key, partition.revision, expected_revision)?;
        partition.put(record);
        partition.revision = next;
        Ok(next)
    }

    fn commit(&self, partition: &Partition) -> Result<u64, RevisitError> {
        let mut partitions = self
            .partitions
            .write()
            .map_err(|_| RevisitError::LockPoisoned)?;
        let stored = partitions
            .get(partition.key())
            .map(Partition::revision)
            .unwrap_or(0);
        let next = check_revision(partition.key(), stored, partition.revision())?;
        partitions.insert(
            partition.key().clone(),
            partition.clone().at_revision(next),
        );
        Ok(next)
    }

    fn partition_keys(&self) -> Result<Vec<PartitionKey>, RevisitError> {
        let partitions = self
            .partitions
            .read()
            .map_err(|_| RevisitError::LockPoisoned)?;
        Ok(partitions
            .values()
            .filter(|p| !p.is_empty())
            .map(|p| p.key().clone())
            .collect())
    }

    fn snapshot(&self) -> Result<Vec<Partition>, RevisitError> {
        let partitions = self
            .partitions
            .read()
            .map_err(|_| RevisitError::LockPoisoned)?;
        Ok(partitions
            .values()
            .filter(|p| !p.is_empty())
            .cloned()
            .collect())
    }

    fn restore(&self, restored: Vec<Partition>) -> Result<(), RevisitError> {
        let mut partitions = self
            .partitions
            .write()
            .map_err(|_| RevisitError::LockPoisoned)?;
        let mut replacement: BTreeMap<PartitionKey, Partition> = partitions
            .iter()
            .map(|(key, stored)| {
                let tombstone = Partition::empty(key.clone())
                    .at_revision(stored.revision.saturating_add(1));
                (key.clone(), tombstone)
            })
            .collect();
        for partition in restored {
            let stored = partitions
                .get(partition.key())
                .map(Partition::revision)
                .unwrap_or(0);
            let revision = restored_revision(stored, partition.revision());
            replacement.insert(partition.key().clone(), partition.at_revision(revision));
        }
        *partitions = replacement;
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Entry, SheetType, Timestamp};

    fn record(problem: &str, entered: i64) -> EntryRecord {
        Entry::solved(
            ProblemId::new(problem),
            SheetType::new("apnaCollege"),
            Timestamp::from_millis(entered),
        )
        .to_record()
    }

    fn key() -> PartitionKey {
        PartitionKey::new("u1", "apnaCollege")
    }

    #[test]
    fn absent_partition_is_empty() {
        let store = MemoryStore::new();
        let partition = store.get(&key()).expect("get");
        assert!(partition.is_empty());
        assert_eq!(partition.revision(), 0);
    }

    #[test]
    fn ordered_by_entered_then_problem() {
        let partition = Partition::from_records(
            key(),
            0,
            vec![record("P3", 20), record("P2", 10), record("P1", 20)],
        );
        let order: Vec<&str> = partition
            .ordered()
            .iter()
            .map(|r| r.problem_id.as_str())
            .collect();
        assert_eq!(order, vec!["P2", "P1", "P3"]);
    }

    #[test]
    fn upsert_bumps_revision() {
        let store = MemoryStore::new();
        assert_eq!(store.upsert(&key(), record("P1", 0), 0).expect("upsert"), 1);
        assert_eq!(store.upsert(&key(), record("P2", 0), 1).expect("upsert"), 2);
        assert_eq!(store.get(&key()).expect("get").len(), 2);
    }

    #[test]
    fn stale_upsert_conflicts_and_applies_nothing() {
        let store = MemoryStore::new();
        store.upsert(&key(), record("P1", 0), 0).expect("upsert");
        let result = store.upsert(&key(), record("P2", 0), 0);
        assert!(matches!(result, Err(RevisitError::Conflict(_))));
        assert_eq!(store.get(&key()).expect("get").len(), 1);
    }

    #[test]
    fn stale_commit_conflicts() {
        let store = MemoryStore::new();
        let mut working = store.get(&key()).expect("get");
        store.upsert(&key(), record("P1", 0), 0).expect("upsert");
        working.put(record("P2", 0));
        assert!(matches!(
            store.commit(&working),
            Err(RevisitError::Conflict(_))
        ));
        let stored = store.get(&key()).expect("get");
        assert!(stored.contains(&ProblemId::new("P1")));
        assert!(!stored.contains(&ProblemId::new("P2")));
    }

    #[test]
    fn restore_outranks_working_copies_read_before_it() {
        let store = MemoryStore::new();
        store.upsert(&key(), record("P1", 0), 0).expect("upsert");
        let mut working = store.get(&key()).expect("get");
        assert_eq!(working.revision(), 1);

        let imported = Partition::from_records(key(), 1, vec![record("IMPORTED", 0)]);
        store.restore(vec![imported]).expect("restore");

        working.put(record("P2", 0));
        assert!(matches!(
            store.commit(&working),
            Err(RevisitError::Conflict(_))
        ));
        let stored = store.get(&key()).expect("get");
        assert_eq!(stored.revision(), 2);
        assert!(stored.contains(&ProblemId::new("IMPORTED")));
        assert!(!stored.contains(&ProblemId::new("P1")));
    }

    #[test]
    fn restore_keeps_dropped_keys_as_hidden_tombstones() {
        let store = MemoryStore::new();
        store.upsert(&key(), record("P1", 0), 0).expect("upsert");
        let working = store.get(&key()).expect("get");

        let other = PartitionKey::new("u2", "loveBabbar");
        store
            .restore(vec![Partition::from_records(other.clone(), 4, vec![record("P9", 0)])])
            .expect("restore");

        assert_eq!(store.partition_keys().expect("keys"), vec![other.clone()]);
        assert_eq!(store.snapshot().expect("snapshot").len(), 1);
        assert_eq!(store.get(&other).expect("get").revision(), 4);

        let dropped = store.get(&key()).expect("get");
        assert!(dropped.is_empty());
        assert_eq!(dropped.revision(), 2);
        assert!(matches!(
            store.commit(&working),
            Err(RevisitError::Conflict(_))
        ));
    }

    #[test]
    fn restored_revision_only_moves_forward() {
        assert_eq!(restored_revision(0, 1), 1);
        assert_eq!(restored_revision(1, 1), 2);
        assert_eq!(restored_revision(3, 9), 9);
        assert_eq!(restored_revision(9, 3), 10);
    }

    #[test]
    fn clones_share_state() {
        let store = MemoryStore::new();
        let other = store.clone();
        store.upsert(&key(), record("P1", 0), 0).expect("upsert");
        assert_eq!(other.partition_keys().expect("keys"), vec![key()]);
    }
}
