//! # Progression Service
//!
//! The only mutating entry points of the engine.
//!
//! `add_solved`, `set_checked` and `auto_move` each run under the mutex of
//! the partition they touch, so two calls on the same (user, sheet) never
//! interleave their read-modify-write. Calls on different partitions proceed
//! independently. A partition's mutex lives only while some call holds it,
//! so the registry stays as small as the set of in-flight partitions.
//!
//! The store also checks revisions. A `Conflict` means some writer outside
//! this service moved the partition between our read and our commit; the
//! operation is re-run from a fresh read, at most `MAX_COMMIT_ATTEMPTS`
//! times.

use crate::clock::Clock;
use crate::formats::{snapshot_from_bytes, snapshot_to_bytes};
use crate::primitives::MAX_COMMIT_ATTEMPTS;
use crate::query::{
    Buckets, DueListing, PartitionView, QueryFacade, StageListing, StageSummary, StoreStatus,
    project,
};
use crate::scheduler::StageScheduler;
use crate::storage::StorageBackend;
use crate::store::StageStore;
use crate::system::{DelayTable, StageName};
use crate::{
    Diagnostic, Entry, Movement, PartitionKey, ProblemId, RevisitError, SheetType, Timestamp,
    UserId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Deployment knobs for the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Dwell per stage.
    #[serde(default)]
    pub delays: DelayTable,
    /// Whether callers may bypass dwell time with `simulate`.
    #[serde(default = "default_allow_simulate")]
    pub allow_simulate: bool,
}

fn default_allow_simulate() -> bool {
    true
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            delays: DelayTable::default(),
            allow_simulate: default_allow_simulate(),
        }
    }
}

// =============================================================================
// OUTCOMES
// =============================================================================

/// Result of `add_solved`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddSolvedOutcome {
    /// False when the problem was already tracked.
    pub added: bool,
    /// The tracked entry (new or pre-existing). `None` if the stored record
    /// is unreadable; it is then listed in `diagnostics`.
    pub entry: Option<Entry>,
    pub buckets: Buckets,
    pub summary: StageSummary,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// Result of one `auto_move` pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoMoveReport {
    /// Hops taken, in `stage_entered_at` order of the scanned entries.
    pub movements: Vec<Movement>,
    /// Counts after the pass.
    pub summary: StageSummary,
    /// Records that could not be evaluated.
    pub diagnostics: Vec<Diagnostic>,
    /// The single clock reading the pass used.
    pub evaluated_at: Timestamp,
}

// =============================================================================
// SERVICE
// =============================================================================

/// Per-partition serialized access to a `StageStore`.
pub struct ProgressionService<S: StageStore = StorageBackend> {
    store: S,
    clock: Arc<dyn Clock>,
    scheduler: StageScheduler,
    allow_simulate: bool,
    locks: Mutex<BTreeMap<PartitionKey, Arc<Mutex<()>>>>,
}

impl<S: StageStore + std::fmt::Debug> std::fmt::Debug for ProgressionService<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressionService")
            .field("store", &self.store)
            .field("scheduler", &self.scheduler)
            .field("allow_simulate", &self.allow_simulate)
            .finish_non_exhaustive()
    }
}

impl<S: StageStore> ProgressionService<S> {
    /// Build a service. Fails if the delay table is invalid.
    pub fn new(store: S, clock: Arc<dyn Clock>, config: ServiceConfig) -> Result<Self, RevisitError> {
        Ok(Self {
            store,
            clock,
            scheduler: StageScheduler::with_delays(config.delays)?,
            allow_simulate: config.allow_simulate,
            locks: Mutex::new(BTreeMap::new()),
        })
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn scheduler(&self) -> &StageScheduler {
        &self.scheduler
    }

    #[must_use]
    pub fn allow_simulate(&self) -> bool {
        self.allow_simulate
    }

    /// Current clock reading.
    #[must_use]
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Read-only view over the same store.
    #[must_use]
    pub fn query(&self) -> QueryFacade<'_, S> {
        QueryFacade::new(&self.store, &self.scheduler)
    }

    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    /// Start tracking `problem` at TODAY.
    ///
    /// Idempotent: if the problem is already tracked in this sheet, nothing
    /// is written and `added` is false, whatever its current stage. A stored
    /// record with an unknown stage is left alone and reported in
    /// `diagnostics`.
    pub fn add_solved(
        &self,
        user: &UserId,
        sheet: &SheetType,
        problem: &ProblemId,
    ) -> Result<AddSolvedOutcome, RevisitError> {
        let key = partition_key(user, sheet)?;
        problem.validate()?;

        self.serialized(&key, || {
            let mut partition = self.store.get(&key)?;
            let (added, entry) = match partition.get(problem) {
                Some(existing) => (false, existing.decode().ok()),
                None => {
                    let entry = Entry::solved(problem.clone(), sheet.clone(), self.clock.now());
                    let revision =
                        self.store
                            .upsert(&key, entry.to_record(), partition.revision())?;
                    partition.put(entry.to_record());
                    partition = partition.at_revision(revision);
                    (true, Some(entry))
                }
            };

            let PartitionView {
                buckets,
                summary,
                diagnostics,
            } = project(&partition);
            Ok(AddSolvedOutcome {
                added,
                entry,
                buckets,
                summary,
                diagnostics,
            })
        })
    }

    /// Set the user's checkbox on a tracked entry.
    ///
    /// Never moves a stage. Writing the value already stored, or touching a
    /// Graduated entry, returns the entry as stored without a commit.
    pub fn set_checked(
        &self,
        user: &UserId,
        sheet: &SheetType,
        problem: &ProblemId,
        checked: bool,
    ) -> Result<Entry, RevisitError> {
        let key = partition_key(user, sheet)?;
        problem.validate()?;

        self.serialized(&key, || {
            let partition = self.store.get(&key)?;
            let entry = partition
                .get(problem)
                .ok_or_else(|| RevisitError::NotFound {
                    user: user.clone(),
                    sheet: sheet.clone(),
                    problem: problem.clone(),
                })?
                .decode()?;

            if entry.stage.is_terminal() || entry.checked == checked {
                return Ok(entry);
            }

            let updated = Entry { checked, ..entry };
            self.store
                .upsert(&key, updated.to_record(), partition.revision())?;
            Ok(updated)
        })
    }

    /// Advance every due entry of one partition by one rung.
    ///
    /// All entries are judged against a single clock reading. The resulting
    /// state is committed in one write, or not at all when nothing moved.
    /// Records with an unknown stage are skipped and listed in
    /// `diagnostics`; the rest still move.
    pub fn auto_move(
        &self,
        user: &UserId,
        sheet: &SheetType,
        simulate: bool,
    ) -> Result<AutoMoveReport, RevisitError> {
        let key = partition_key(user, sheet)?;
        if simulate && !self.allow_simulate {
            return Err(RevisitError::InvalidInput(
                "simulate is disabled for this deployment".to_string(),
            ));
        }

        self.serialized(&key, || {
            let now = self.clock.now();
            let mut partition = self.store.get(&key)?;

            let mut movements = Vec::new();
            let mut diagnostics = Vec::new();
            let mut advanced = Vec::new();
            for record in partition.ordered() {
                match self.scheduler.transition_record(record, now, simulate) {
                    Ok(transition) => {
                        if let Some(movement) = transition.movement {
                            movements.push(movement);
                            advanced.push(transition.entry.to_record());
                        }
                    }
                    Err(e) => diagnostics.push(Diagnostic {
                        problem_id: record.problem_id.clone(),
                        reason: e.to_string(),
                    }),
                }
            }

            if !advanced.is_empty() {
                for record in advanced {
                    partition.put(record);
                }
                let revision = self.store.commit(&partition)?;
                partition = partition.at_revision(revision);
            }

            Ok(AutoMoveReport {
                movements,
                summary: project(&partition).summary,
                diagnostics,
                evaluated_at: now,
            })
        })
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// Entries of one stage, in `stage_entered_at` order.
    pub fn get_by_stage(
        &self,
        user: &UserId,
        sheet: &SheetType,
        stage: StageName,
    ) -> Result<StageListing, RevisitError> {
        self.query()
            .get_by_stage(&partition_key(user, sheet)?, stage)
    }

    /// Every stage bucket plus the sparse summary.
    pub fn get_all(&self, user: &UserId, sheet: &SheetType) -> Result<PartitionView, RevisitError> {
        self.query().get_all(&partition_key(user, sheet)?)
    }

    /// Entries whose dwell has elapsed now.
    pub fn get_due(&self, user: &UserId, sheet: &SheetType) -> Result<DueListing, RevisitError> {
        self.query()
            .get_due(&partition_key(user, sheet)?, self.clock.now())
    }

    /// Partition and entry counts.
    pub fn status(&self) -> Result<StoreStatus, RevisitError> {
        self.query().status()
    }

    // -------------------------------------------------------------------------
    // Snapshots
    // -------------------------------------------------------------------------

    /// Encode every partition into one snapshot.
    pub fn export_snapshot(&self) -> Result<Vec<u8>, RevisitError> {
        snapshot_to_bytes(&self.store.snapshot()?)
    }

    /// Replace the whole store with a decoded snapshot.
    ///
    /// The snapshot is fully decoded and checked before anything is replaced.
    pub fn import_snapshot(&self, bytes: &[u8]) -> Result<StoreStatus, RevisitError> {
        let partitions = snapshot_from_bytes(bytes)?;
        for partition in &partitions {
            partition.key().validate()?;
            for record in partition.records() {
                record.problem_id.validate()?;
            }
        }
        self.store.restore(partitions)?;
        self.status()
    }

    // -------------------------------------------------------------------------
    // Locking
    // -------------------------------------------------------------------------

    /// Handle to the partition's mutex, created on first use.
    fn partition_lock(&self, key: &PartitionKey) -> Result<Arc<Mutex<()>>, RevisitError> {
        let mut locks = self.locks.lock().map_err(|_| RevisitError::LockPoisoned)?;
        Ok(Arc::clone(locks.entry(key.clone()).or_default()))
    }

    /// Drop the registry entry once no other call holds a handle to it.
    fn release_partition_lock(&self, key: &PartitionKey, lock: Arc<Mutex<()>>) {
        if let Ok(mut locks) = self.locks.lock() {
            // One handle in the registry, one here.
            if Arc::strong_count(&lock) <= 2 {
                locks.remove(key);
            }
        }
    }

    /// Run `attempt` under the partition mutex, re-running it on `Conflict`.
    fn serialized<T>(
        &self,
        key: &PartitionKey,
        mut attempt: impl FnMut() -> Result<T, RevisitError>,
    ) -> Result<T, RevisitError> {
        let lock = self.partition_lock(key)?;
        let result = match lock.lock() {
            Ok(_guard) => retry_on_conflict(&mut attempt),
            Err(_) => Err(RevisitError::LockPoisoned),
        };
        self.release_partition_lock(key, lock);
        result
    }
}

fn retry_on_conflict<T>(
    attempt: &mut impl FnMut() -> Result<T, RevisitError>,
) -> Result<T, RevisitError> {
    for _ in 1..MAX_COMMIT_ATTEMPTS {
        match attempt() {
            Err(RevisitError::Conflict(_)) => {}
            other => return other,
        }
    }
    attempt()
}

fn partition_key(user: &UserId, sheet: &SheetType) -> Result<PartitionKey, RevisitError> {
    let key = PartitionKey::new(user.clone(), sheet.clone());
    key.validate()?;
    Ok(key)
}

// =============================================================================
// TESTS
// =============================================================================
