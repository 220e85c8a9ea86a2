//! # revisit-core
//!
//! The deterministic spaced-review engine for Revisit - THE LOGIC.
//!
//! For each user and each practice sheet, this crate tracks solved problems
//! and walks them up a fixed ladder of review stages
//! (TODAY → TOMORROW → DAY3 → DAY7 → DAY14 → DAY30 → GRADUATED).
//! A problem advances one rung only when the user has checked it AND the
//! dwell time for its current stage has elapsed.
//!
//! ## Layout
//!
//! - `types` / `system`: identifiers, entries, the stage ladder and delays
//! - `store` / `storage`: the `StageStore` trait, memory and redb backends
//! - `scheduler`: pure due-ness and transition evaluation
//! - `progression`: the mutating entry points, serialized per partition
//! - `query`: read-only projections
//! - `formats`: versioned binary encodings
//!
//! ## Architectural Constraints
//!
//! The CORE:
//! - Has NO async, NO network dependencies (pure Rust)
//! - Never reads wall time directly; time comes from a [`Clock`]
//! - Never panics; every failure is a [`RevisitError`]
//! - Uses `BTreeMap` only, integer milliseconds only

// =============================================================================
// MODULES
// =============================================================================

pub mod clock;
pub mod formats;
pub mod primitives;
pub mod progression;
pub mod query;
pub mod scheduler;
pub mod storage;
pub mod store;
pub mod system;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Diagnostic, Entry, EntryRecord, Movement, PartitionKey, ProblemId, RevisitError, SheetType,
    Timestamp, UserId,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use clock::{Clock, ManualClock, SystemClock};
pub use progression::{
    AddSolvedOutcome, AutoMoveReport, ProgressionService, ServiceConfig,
};
pub use query::{
    Buckets, DueItem, DueListing, PartitionView, QueryFacade, StageListing, StageSummary,
    StoreStatus,
};
pub use scheduler::{StageScheduler, Transition};
pub use storage::{RedbStore, StorageBackend};
pub use store::{MemoryStore, Partition, StageStore};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{
    PersistenceHeader, partition_from_bytes, partition_to_bytes, snapshot_from_bytes,
    snapshot_to_bytes,
};

// =============================================================================
// RE-EXPORTS: System (from system module)
// =============================================================================

pub use system::{DelayTable, StageName};
