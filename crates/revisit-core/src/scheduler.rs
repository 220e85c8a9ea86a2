//! # Stage Scheduler
//!
//! Pure evaluation of one entry against one clock reading.
//!
//! An entry advances exactly one rung when it is *due*:
//! - the user has checked it, and
//! - it is not Graduated, and
//! - either `simulate` is set or the dwell for its current stage has elapsed
//!   since `stage_entered_at`.
//!
//! Advancing resets `checked` and stamps `stage_entered_at`. The stamp never
//! moves backwards, even if the clock does.

use crate::system::DelayTable;
use crate::{Entry, EntryRecord, Movement, RevisitError, Timestamp};

/// Outcome of evaluating one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// The entry after evaluation (unchanged if nothing moved).
    pub entry: Entry,
    /// The hop taken, if any.
    pub movement: Option<Movement>,
}

impl Transition {
    #[must_use]
    pub fn moved(&self) -> bool {
        self.movement.is_some()
    }
}

/// Stateless apart from its delay table.
#[derive(Debug, Clone, Default)]
pub struct StageScheduler {
    delays: DelayTable,
}

impl StageScheduler {
    /// Scheduler with the default delay table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scheduler with a custom delay table.
    pub fn with_delays(delays: DelayTable) -> Result<Self, RevisitError> {
        delays.validate()?;
        Ok(Self { delays })
    }

    #[must_use]
    pub fn delays(&self) -> &DelayTable {
        &self.delays
    }

    /// Whether `entry` may advance at `now`.
    #[must_use]
    pub fn is_due(&self, entry: &Entry, now: Timestamp, simulate: bool) -> bool {
        if !entry.checked || entry.stage.is_terminal() {
            return false;
        }
        simulate || self.dwell_elapsed(entry, now)
    }

    /// Whether the dwell for the entry's current stage has elapsed at `now`,
    /// regardless of `checked`. Always false for Graduated.
    #[must_use]
    pub fn dwell_elapsed(&self, entry: &Entry, now: Timestamp) -> bool {
        match self.delays.dwell_millis(entry.stage) {
            Some(dwell) => now.elapsed_since(entry.stage_entered_at) >= dwell,
            None => false,
        }
    }

    /// Earliest moment the entry may leave its stage. `None` for Graduated.
    #[must_use]
    pub fn due_at(&self, entry: &Entry) -> Option<Timestamp> {
        self.delays
            .dwell_millis(entry.stage)
            .map(|dwell| entry.stage_entered_at.saturating_add(dwell))
    }

    /// Evaluate `entry` and advance it one rung if due.
    #[must_use]
    pub fn transition(&self, entry: &Entry, now: Timestamp, simulate: bool) -> Transition {
        if !self.is_due(entry, now, simulate) {
            return Transition {
                entry: entry.clone(),
                movement: None,
            };
        }

        let to = entry.stage.next();
        let movement = Movement {
            problem_id: entry.problem_id.clone(),
            from: entry.stage,
            to,
        };
        let advanced = Entry {
            stage: to,
            checked: false,
            stage_entered_at: now.max(entry.stage_entered_at),
            ..entry.clone()
        };

        Transition {
            entry: advanced,
            movement: Some(movement),
        }
    }

    /// Decode a stored record, then evaluate it.
    ///
    /// Returns `RevisitError::InvalidStage` if the record holds an unknown
    /// stage code.
    pub fn transition_record(
        &self,
        record: &EntryRecord,
        now: Timestamp,
        simulate: bool,
    ) -> Result<Transition, RevisitError> {
        let entry = record.decode()?;
        Ok(self.transition(&entry, now, simulate))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::MILLIS_PER_DAY;
    use crate::system::StageName;
    use crate::{ProblemId, SheetType};

    fn entry_at(stage: StageName, checked: bool, entered: i64) -> Entry {
        Entry {
            problem_id: ProblemId::new("P1"),
            sheet_type: SheetType::new("apnaCollege"),
            stage,
            checked,
            stage_entered_at: Timestamp::from_millis(entered),
        }
    }

    #[test]
    fn unchecked_entry_never_moves() {
        let scheduler = StageScheduler::new();
        let entry = entry_at(StageName::Today, false, 0);
        let t = scheduler.transition(&entry, Timestamp::from_millis(i64::MAX), true);
        assert!(!t.moved());
        assert_eq!(t.entry, entry);
    }

    #[test]
    fn today_is_due_immediately_once_checked() {
        let scheduler = StageScheduler::new();
        let entry = entry_at(StageName::Today, true, 1_000);
        let t = scheduler.transition(&entry, Timestamp::from_millis(1_000), false);
        assert_eq!(t.entry.stage, StageName::Tomorrow);
        assert!(!t.entry.checked);
        assert_eq!(t.entry.stage_entered_at, Timestamp::from_millis(1_000));
    }

    #[test]
    fn dwell_gates_advance() {
        let scheduler = StageScheduler::new();
        let entry = entry_at(StageName::Day3, true, 0);
        let early = Timestamp::from_millis(3 * MILLIS_PER_DAY - 1);
        let on_time = Timestamp::from_millis(3 * MILLIS_PER_DAY);
        assert!(!scheduler.transition(&entry, early, false).moved());
        let t = scheduler.transition(&entry, on_time, false);
        assert_eq!(
            t.movement,
            Some(Movement {
                problem_id: ProblemId::new("P1"),
                from: StageName::Day3,
                to: StageName::Day7,
            })
        );
    }

    #[test]
    fn graduated_is_inert_even_when_checked() {
        let scheduler = StageScheduler::new();
        let entry = entry_at(StageName::Graduated, true, 0);
        let t = scheduler.transition(&entry, Timestamp::from_millis(i64::MAX), true);
        assert!(!t.moved());
        assert_eq!(scheduler.due_at(&entry), None);
    }

    #[test]
    fn stamp_never_moves_backwards() {
        let scheduler = StageScheduler::new();
        let entry = entry_at(StageName::Tomorrow, true, 5_000);
        let t = scheduler.transition(&entry, Timestamp::from_millis(1_000), true);
        assert_eq!(t.entry.stage, StageName::Day3);
        assert_eq!(t.entry.stage_entered_at, Timestamp::from_millis(5_000));
    }

    #[test]
    fn corrupt_record_fails_with_invalid_stage() {
        let scheduler = StageScheduler::new();
        let mut record = entry_at(StageName::Today, true, 0).to_record();
        record.stage = "LATER".to_string();
        let result = scheduler.transition_record(&record, Timestamp::default(), true);
        assert!(matches!(result, Err(RevisitError::InvalidStage(_))));
    }

    #[test]
    fn due_at_is_entered_plus_dwell() {
        let scheduler = StageScheduler::new();
        let entry = entry_at(StageName::Day7, false, 10);
        assert_eq!(
            scheduler.due_at(&entry),
            Some(Timestamp::from_millis(10 + 7 * MILLIS_PER_DAY))
        );
    }
}
