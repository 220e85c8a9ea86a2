//! # Review Stages
//!
//! The fixed ladder every tracked problem climbs, one hop at a time.
//!
//! ## Stage Definitions
//!
//! | Stage | Code | Default dwell | Next |
//! |-------|------|---------------|------|
//! | Today | `TODAY` | 0 | Tomorrow |
//! | Tomorrow | `TOMORROW` | 1 day | Day3 |
//! | Day 3 | `DAY3` | 3 days | Day7 |
//! | Day 7 | `DAY7` | 7 days | Day14 |
//! | Day 14 | `DAY14` | 14 days | Day30 |
//! | Day 30 | `DAY30` | 30 days | Graduated |
//! | Graduated | `GRADUATED` | - | (terminal) |
//!
//! The dwell is the minimum time spent *in* a stage before the next advance.
//! It is measured from the moment the entry entered that stage, never from the
//! original solve date.

use crate::primitives::{
    DEFAULT_DAY14_DWELL_SECS, DEFAULT_DAY30_DWELL_SECS, DEFAULT_DAY3_DWELL_SECS,
    DEFAULT_DAY7_DWELL_SECS, DEFAULT_TODAY_DWELL_SECS, DEFAULT_TOMORROW_DWELL_SECS,
    MILLIS_PER_SECOND,
};
use crate::RevisitError;
use serde::{Deserialize, Serialize};

// =============================================================================
// STAGE ENUM
// =============================================================================

/// Position of an entry on the review ladder.
///
/// Variant order is ladder order; `Ord` follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StageName {
    #[serde(rename = "TODAY")]
    Today,
    #[serde(rename = "TOMORROW")]
    Tomorrow,
    #[serde(rename = "DAY3")]
    Day3,
    #[serde(rename = "DAY7")]
    Day7,
    #[serde(rename = "DAY14")]
    Day14,
    #[serde(rename = "DAY30")]
    Day30,
    #[serde(rename = "GRADUATED")]
    Graduated,
}

impl StageName {
    /// The full ladder in order.
    pub const ALL: [StageName; 7] = [
        StageName::Today,
        StageName::Tomorrow,
        StageName::Day3,
        StageName::Day7,
        StageName::Day14,
        StageName::Day30,
        StageName::Graduated,
    ];

    /// Storage and wire code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            StageName::Today => "TODAY",
            StageName::Tomorrow => "TOMORROW",
            StageName::Day3 => "DAY3",
            StageName::Day7 => "DAY7",
            StageName::Day14 => "DAY14",
            StageName::Day30 => "DAY30",
            StageName::Graduated => "GRADUATED",
        }
    }

    /// Human-readable bucket label.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            StageName::Today => "Today",
            StageName::Tomorrow => "Tomorrow",
            StageName::Day3 => "Day 3",
            StageName::Day7 => "Day 7",
            StageName::Day14 => "Day 14",
            StageName::Day30 => "Day 30",
            StageName::Graduated => "Graduated",
        }
    }

    /// Parse a stage code, ignoring letter case.
    pub fn from_code(code: &str) -> Result<StageName, RevisitError> {
        StageName::ALL
            .iter()
            .copied()
            .find(|stage| stage.code().eq_ignore_ascii_case(code))
            .ok_or_else(|| RevisitError::InvalidStage(code.to_string()))
    }

    /// Successor on the ladder. Graduated maps to itself.
    #[must_use]
    pub fn next(&self) -> StageName {
        match self {
            StageName::Today => StageName::Tomorrow,
            StageName::Tomorrow => StageName::Day3,
            StageName::Day3 => StageName::Day7,
            StageName::Day7 => StageName::Day14,
            StageName::Day14 => StageName::Day30,
            StageName::Day30 | StageName::Graduated => StageName::Graduated,
        }
    }

    /// Check if this stage is terminal (Graduated).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, StageName::Graduated)
    }
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for StageName {
    type Err = RevisitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StageName::from_code(s)
    }
}

// =============================================================================
// DELAY TABLE
// =============================================================================

/// Minimum dwell per stage, in seconds.
///
/// Loaded from the `[delays]` section of the deployment config; any stage
/// left out keeps its default. Graduated has no dwell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DelayTable {
    pub today: i64,
    pub tomorrow: i64,
    pub day3: i64,
    pub day7: i64,
    pub day14: i64,
    pub day30: i64,
}

impl Default for DelayTable {
    fn default() -> Self {
        Self {
            today: DEFAULT_TODAY_DWELL_SECS,
            tomorrow: DEFAULT_TOMORROW_DWELL_SECS,
            day3: DEFAULT_DAY3_DWELL_SECS,
            day7: DEFAULT_DAY7_DWELL_SECS,
            day14: DEFAULT_DAY14_DWELL_SECS,
            day30: DEFAULT_DAY30_DWELL_SECS,
        }
    }
}

impl DelayTable {
    /// The same dwell for every stage. Mostly useful in tests.
    #[must_use]
    pub fn uniform(secs: i64) -> Self {
        Self {
            today: secs,
            tomorrow: secs,
            day3: secs,
            day7: secs,
            day14: secs,
            day30: secs,
        }
    }

    /// Reject negative dwell times.
    pub fn validate(&self) -> Result<(), RevisitError> {
        for stage in StageName::ALL {
            if let Some(secs) = self.dwell_secs(stage) {
                if secs < 0 {
                    return Err(RevisitError::InvalidInput(format!(
                        "delay for {} must not be negative (got {})",
                        stage, secs
                    )));
                }
            }
        }
        Ok(())
    }

    /// Dwell for `stage` in seconds. `None` for Graduated.
    #[must_use]
    pub fn dwell_secs(&self, stage: StageName) -> Option<i64> {
        match stage {
            StageName::Today => Some(self.today),
            StageName::Tomorrow => Some(self.tomorrow),
            StageName::Day3 => Some(self.day3),
            StageName::Day7 => Some(self.day7),
            StageName::Day14 => Some(self.day14),
            StageName::Day30 => Some(self.day30),
            StageName::Graduated => None,
        }
    }

    /// Dwell for `stage` in milliseconds. `None` for Graduated.
    #[must_use]
    pub fn dwell_millis(&self, stage: StageName) -> Option<i64> {
        self.dwell_secs(stage)
            .map(|secs| secs.saturating_mul(MILLIS_PER_SECOND))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::MILLIS_PER_DAY;

    #[test]
    fn stage_ordering_matches_ladder() {
        let mut sorted = StageName::ALL;
        sorted.sort();
        assert_eq!(sorted, StageName::ALL);
    }

    #[test]
    fn next_follows_ladder_order() {
        for pair in StageName::ALL.windows(2) {
            assert_eq!(pair[0].next(), pair[1]);
        }
        assert_eq!(StageName::Graduated.next(), StageName::Graduated);
    }

    #[test]
    fn from_code_ignores_case() {
        assert_eq!(StageName::from_code("day14").expect("parse"), StageName::Day14);
        assert_eq!("Graduated".parse::<StageName>().expect("parse"), StageName::Graduated);
        assert!(matches!(
            StageName::from_code("DAY2"),
            Err(RevisitError::InvalidStage(_))
        ));
    }

    #[test]
    fn default_delays_in_millis() {
        let table = DelayTable::default();
        assert_eq!(table.dwell_millis(StageName::Today), Some(0));
        assert_eq!(table.dwell_millis(StageName::Tomorrow), Some(MILLIS_PER_DAY));
        assert_eq!(table.dwell_millis(StageName::Day30), Some(30 * MILLIS_PER_DAY));
        assert_eq!(table.dwell_millis(StageName::Graduated), None);
    }

    #[test]
    fn negative_delay_rejected() {
        let table = DelayTable {
            day7: -1,
            ..DelayTable::default()
        };
        assert!(matches!(table.validate(), Err(RevisitError::InvalidInput(_))));
        assert!(DelayTable::uniform(0).validate().is_ok());
    }

    #[test]
    fn stage_display() {
        assert_eq!(format!("{}", StageName::Day3), "DAY3");
        assert_eq!(StageName::Day3.name(), "Day 3");
    }
}
