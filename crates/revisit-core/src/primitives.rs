//! # Engine Primitives
//!
//! Hardcoded runtime constants for the Revisit CORE.
//!
//! The stage ladder and the storage format are compiled into the binary.
//! Only the delay table is deployment-overridable (see [`crate::DelayTable`]).

/// One second in the engine's time unit (milliseconds).
pub const MILLIS_PER_SECOND: i64 = 1000;

/// One day in seconds.
pub const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// One day in milliseconds.
pub const MILLIS_PER_DAY: i64 = SECONDS_PER_DAY * MILLIS_PER_SECOND;

// =============================================================================
// DEFAULT DWELL TIMES (seconds spent in a stage before the next advance)
// =============================================================================

pub const DEFAULT_TODAY_DWELL_SECS: i64 = 0;
pub const DEFAULT_TOMORROW_DWELL_SECS: i64 = SECONDS_PER_DAY;
pub const DEFAULT_DAY3_DWELL_SECS: i64 = 3 * SECONDS_PER_DAY;
pub const DEFAULT_DAY7_DWELL_SECS: i64 = 7 * SECONDS_PER_DAY;
pub const DEFAULT_DAY14_DWELL_SECS: i64 = 14 * SECONDS_PER_DAY;
pub const DEFAULT_DAY30_DWELL_SECS: i64 = 30 * SECONDS_PER_DAY;

// =============================================================================
// STORAGE FORMAT
// =============================================================================

/// Magic bytes for the Revisit binary format header.
///
/// - Header = Magic Bytes ("RVST") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"RVST";

/// Current serialization format version.
///
/// Increment this when making breaking changes to the serialization format.
pub const FORMAT_VERSION: u8 = 1;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length for user, sheet and problem identifiers.
///
/// Longer identifiers are rejected before they reach storage.
pub const MAX_IDENTIFIER_LENGTH: usize = 256;

/// How many times a partition commit is retried after a revision conflict.
pub const MAX_COMMIT_ATTEMPTS: usize = 8;
