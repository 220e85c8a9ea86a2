//! # Query Facade
//!
//! Read-only projections over a `StageStore`.
//!
//! The facade only ever calls `StageStore::get` and friends; it has no path
//! to a write. Every projection lists entries in `stage_entered_at` order.
//! Records with an unreadable stage are left out of buckets and reported as
//! diagnostics instead.

use crate::scheduler::StageScheduler;
use crate::store::{Partition, StageStore};
use crate::system::StageName;
use crate::{Diagnostic, Entry, PartitionKey, RevisitError, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// PROJECTION TYPES
// =============================================================================

/// Count of entries per stage. Stages with no entries are absent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageSummary(pub BTreeMap<StageName, usize>);

impl StageSummary {
    /// Number of entries in `stage` (0 if absent).
    #[must_use]
    pub fn count(&self, stage: StageName) -> usize {
        self.0.get(&stage).copied().unwrap_or(0)
    }

    /// Total tracked entries.
    #[must_use]
    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    fn record(&mut self, stage: StageName) {
        let count = self.0.entry(stage).or_insert(0);
        *count = count.saturating_add(1);
    }
}

/// Entries grouped by stage. Every stage has a (possibly empty) bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Buckets(pub BTreeMap<StageName, Vec<Entry>>);

impl Default for Buckets {
    fn default() -> Self {
        Self(StageName::ALL.iter().map(|s| (*s, Vec::new())).collect())
    }
}

impl Buckets {
    /// Entries in `stage`.
    #[must_use]
    pub fn stage(&self, stage: StageName) -> &[Entry] {
        self.0.get(&stage).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Full partition view: buckets + summary.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PartitionView {
    pub buckets: Buckets,
    pub summary: StageSummary,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// Entries of one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageListing {
    pub stage: StageName,
    pub problems: Vec<Entry>,
    pub count: usize,
}

/// An entry whose dwell has elapsed, with the derived due moment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueItem {
    pub entry: Entry,
    pub due_at: Timestamp,
}

/// Entries ready for review, earliest due first.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DueListing {
    pub due: Vec<DueItem>,
    pub count: usize,
}

/// Size of the whole store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoreStatus {
    pub partitions: usize,
    pub entries: usize,
}

// =============================================================================
// PURE PROJECTION
// =============================================================================

/// Project a loaded partition into buckets and summary.
#[must_use]
pub fn project(partition: &Partition) -> PartitionView {
    let mut view = PartitionView::default();
    for record in partition.ordered() {
        match record.decode() {
            Ok(entry) => {
                view.summary.record(entry.stage);
                view.buckets.0.entry(entry.stage).or_default().push(entry);
            }
            Err(e) => view.diagnostics.push(Diagnostic {
                problem_id: record.problem_id.clone(),
                reason: e.to_string(),
            }),
        }
    }
    view
}

// =============================================================================
// QUERY FACADE
// =============================================================================

/// Read-only access to partitions.
pub struct QueryFacade<'a, S: StageStore + ?Sized> {
    store: &'a S,
    scheduler: &'a StageScheduler,
}

impl<'a, S: StageStore + ?Sized> QueryFacade<'a, S> {
    #[must_use]
    pub fn new(store: &'a S, scheduler: &'a StageScheduler) -> Self {
        Self { store, scheduler }
    }

    /// Whole partition grouped by stage.
    pub fn get_all(&self, key: &PartitionKey) -> Result<PartitionView, RevisitError> {
        Ok(project(&self.store.get(key)?))
    }

    /// Entries of a single stage, in `stage_entered_at` order.
    pub fn get_by_stage(
        &self,
        key: &PartitionKey,
        stage: StageName,
    ) -> Result<StageListing, RevisitError> {
        let partition = self.store.get(key)?;
        let problems: Vec<Entry> = partition
            .ordered()
            .into_iter()
            .filter_map(|record| record.decode().ok())
            .filter(|entry| entry.stage == stage)
            .collect();
        Ok(StageListing {
            stage,
            count: problems.len(),
            problems,
        })
    }

    /// Entries whose dwell has elapsed at `now`, checked or not.
    ///
    /// Graduated entries are never due.
    pub fn get_due(&self, key: &PartitionKey, now: Timestamp) -> Result<DueListing, RevisitError> {
        let partition = self.store.get(key)?;
        let mut due: Vec<DueItem> = partition
            .ordered()
            .into_iter()
            .filter_map(|record| record.decode().ok())
            .filter(|entry| self.scheduler.dwell_elapsed(entry, now))
            .filter_map(|entry| {
                self.scheduler
                    .due_at(&entry)
                    .map(|due_at| DueItem { entry, due_at })
            })
            .collect();
        // Stable sort keeps entered order among equal due moments.
        due.sort_by_key(|item| item.due_at);
        Ok(DueListing {
            count: due.len(),
            due,
        })
    }

    /// Partition and entry counts across the store.
    pub fn status(&self) -> Result<StoreStatus, RevisitError> {
        let partitions = self.store.snapshot()?;
        Ok(StoreStatus {
            partitions: partitions.len(),
            entries: partitions.iter().map(Partition::len).sum(),
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
