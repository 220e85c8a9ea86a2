//! # Core Type Definitions
//!
//! This module contains the shared vocabulary of the Revisit engine:
//! - Tenant identifiers (`UserId`, `SheetType`, `ProblemId`, `PartitionKey`)
//! - Time (`Timestamp`, integer milliseconds)
//! - Tracked progress (`Entry`, its stored shape `EntryRecord`, `Movement`)
//! - Error types (`RevisitError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer arithmetic only (no floating-point)
//! - Implement `Ord` where they key a `BTreeMap`
//! - Use saturating arithmetic for time offsets

use crate::primitives::MAX_IDENTIFIER_LENGTH;
use crate::system::StageName;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Validate an identifier: non-empty and at most `MAX_IDENTIFIER_LENGTH` bytes.
fn validate_identifier(kind: &str, value: &str) -> Result<(), RevisitError> {
    if value.is_empty() {
        return Err(RevisitError::InvalidInput(format!("{} must not be empty", kind)));
    }
    if value.len() > MAX_IDENTIFIER_LENGTH {
        return Err(RevisitError::InvalidInput(format!(
            "{} length {} exceeds maximum {} bytes",
            kind,
            value.len(),
            MAX_IDENTIFIER_LENGTH
        )));
    }
    Ok(())
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create a new identifier from a string.
            #[must_use]
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Get the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Check the identifier against the length limits.
            pub fn validate(&self) -> Result<(), RevisitError> {
                validate_identifier($kind, &self.0)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Opaque caller-supplied user identifier. Never authenticated here.
    UserId,
    "user_id"
);

string_id!(
    /// Name of a curated problem list. Each sheet is its own progress namespace.
    SheetType,
    "sheet_type"
);

string_id!(
    /// Identifier of a problem within a sheet.
    ProblemId,
    "problem_id"
);

/// The unit of ownership: one user's progress on one sheet.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartitionKey {
    pub user: UserId,
    pub sheet: SheetType,
}

impl PartitionKey {
    #[must_use]
    pub fn new(user: impl Into<UserId>, sheet: impl Into<SheetType>) -> Self {
        Self {
            user: user.into(),
            sheet: sheet.into(),
        }
    }

    /// Validate both halves of the key.
    pub fn validate(&self) -> Result<(), RevisitError> {
        self.user.validate()?;
        self.sheet.validate()
    }
}

impl std::fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.user, self.sheet)
    }
}

// =============================================================================
// TIME
// =============================================================================

/// Milliseconds since the Unix epoch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    #[must_use]
    pub const fn millis(self) -> i64 {
        self.0
    }

    /// Offset this timestamp forward, saturating at `i64::MAX`.
    #[must_use]
    pub const fn saturating_add(self, millis: i64) -> Self {
        Self(self.0.saturating_add(millis))
    }

    /// Milliseconds elapsed since `earlier`. Negative if the clock stepped back.
    #[must_use]
    pub const fn elapsed_since(self, earlier: Timestamp) -> i64 {
        self.0.saturating_sub(earlier.0)
    }
}

// =============================================================================
// ENTRY
// =============================================================================

/// One tracked problem inside a partition.
///
/// `due_at` is never stored; it is derived from `stage_entered_at` and the
/// delay table (see [`crate::StageScheduler::due_at`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub problem_id: ProblemId,
    pub sheet_type: SheetType,
    pub stage: StageName,
    pub checked: bool,
    pub stage_entered_at: Timestamp,
}

impl Entry {
    /// A freshly solved problem: stage TODAY, unchecked.
    #[must_use]
    pub fn solved(problem_id: ProblemId, sheet_type: SheetType, now: Timestamp) -> Self {
        Self {
            problem_id,
            sheet_type,
            stage: StageName::Today,
            checked: false,
            stage_entered_at: now,
        }
    }

    /// Convert to the stored representation.
    #[must_use]
    pub fn to_record(&self) -> EntryRecord {
        EntryRecord {
            problem_id: self.problem_id.clone(),
            sheet_type: self.sheet_type.clone(),
            stage: self.stage.code().to_string(),
            checked: self.checked,
            stage_entered_at: self.stage_entered_at,
        }
    }
}

/// The stored shape of an [`Entry`].
///
/// The stage is kept as its raw code so a corrupt or migrated value survives a
/// load and can be reported instead of poisoning the whole partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRecord {
    pub problem_id: ProblemId,
    pub sheet_type: SheetType,
    pub stage: String,
    pub checked: bool,
    pub stage_entered_at: Timestamp,
}

impl EntryRecord {
    /// Decode into a typed entry.
    ///
    /// Returns `RevisitError::InvalidStage` if the stage code is unknown.
    pub fn decode(&self) -> Result<Entry, RevisitError> {
        let stage = StageName::from_code(&self.stage)?;
        Ok(Entry {
            problem_id: self.problem_id.clone(),
            sheet_type: self.sheet_type.clone(),
            stage,
            checked: self.checked,
            stage_entered_at: self.stage_entered_at,
        })
    }
}

impl From<&Entry> for EntryRecord {
    fn from(entry: &Entry) -> Self {
        entry.to_record()
    }
}

// =============================================================================
// MOVEMENT & DIAGNOSTIC
// =============================================================================

/// A single stage transition recorded by an auto-move pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub problem_id: ProblemId,
    pub from: StageName,
    pub to: StageName,
}

/// A malformed entry that an auto-move pass skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub problem_id: ProblemId,
    pub reason: String,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Revisit engine.
///
/// - No silent failures
/// - Use `Result<T, RevisitError>` for fallible operations
/// - The CORE should never panic; all errors are values
#[derive(Debug, Error)]
pub enum RevisitError {
    /// The operation needed an existing entry that is not tracked.
    #[error("Entry not found: {problem} in {user}/{sheet}")]
    NotFound {
        user: UserId,
        sheet: SheetType,
        problem: ProblemId,
    },

    /// A stored stage code is not a member of the stage ladder.
    /// Signals storage corruption or a missed migration.
    #[error("Invalid stage value: {0:?}")]
    InvalidStage(String),

    /// The partition changed between read and commit.
    #[error("Concurrent modification of partition {0}")]
    Conflict(PartitionKey),

    /// Caller input was rejected before reaching storage.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A partition mutex was poisoned by a panicking holder.
    #[error("Partition lock poisoned")]
    LockPoisoned,

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================
