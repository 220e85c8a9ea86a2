//! # Property-Based Tests
//!
//! Invariants of the stage ladder and the progression service, checked
//! with proptest over arbitrary clocks, delays and call sequences.

use proptest::collection::vec;
use proptest::prelude::*;
use revisit_core::primitives::MILLIS_PER_SECOND;
use revisit_core::{
    DelayTable, Entry, ManualClock, MemoryStore, ProblemId, ProgressionService, ServiceConfig,
    SheetType, StageName, StageScheduler, Timestamp, UserId,
};
use std::sync::Arc;

fn entry(stage: StageName, checked: bool, entered: i64) -> Entry {
    Entry {
        problem_id: ProblemId::new("P1"),
        sheet_type: SheetType::new("apnaCollege"),
        stage,
        checked,
        stage_entered_at: Timestamp::from_millis(entered),
    }
}

fn stage_strategy() -> impl Strategy<Value = StageName> {
    prop::sample::select(StageName::ALL.to_vec())
}

fn service(delays: DelayTable, clock: &ManualClock) -> ProgressionService<MemoryStore> {
    ProgressionService::new(
        MemoryStore::new(),
        Arc::new(clock.clone()),
        ServiceConfig {
            delays,
            allow_simulate: true,
        },
    )
    .expect("service")
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Repeated checked transitions visit every stage exactly once, in order.
    #[test]
    fn ladder_is_monotonic(start in 0i64..1_000_000, steps in vec(0i64..10_000_000, 7)) {
        let scheduler = StageScheduler::new();
        let mut current = entry(StageName::Today, true, start);
        let mut now = start;
        let mut visited = vec![current.stage];

        for step in steps {
            now = now.saturating_add(step);
            let transition = scheduler.transition(&current, Timestamp::from_millis(now), true);
            if let Some(movement) = &transition.movement {
                prop_assert_eq!(movement.to, movement.from.next());
                visited.push(movement.to);
            }
            current = Entry { checked: true, ..transition.entry };
        }

        prop_assert_eq!(visited, StageName::ALL.to_vec());
        prop_assert_eq!(current.stage, StageName::Graduated);
    }

    /// Unchecked entries never move, whatever the clock or simulate flag.
    #[test]
    fn unchecked_never_moves(
        stage in stage_strategy(),
        entered in 0i64..1_000_000,
        elapsed in 0i64..i64::from(u32::MAX),
        simulate in any::<bool>()
    ) {
        let scheduler = StageScheduler::new();
        let e = entry(stage, false, entered);
        let transition = scheduler.transition(&e, Timestamp::from_millis(entered + elapsed), simulate);
        prop_assert!(transition.movement.is_none());
        prop_assert_eq!(transition.entry, e);
    }

    /// Without simulate, a checked entry moves iff its dwell has elapsed.
    #[test]
    fn time_gate_is_exact(
        stage in stage_strategy(),
        dwell_secs in 0i64..100_000,
        elapsed in 0i64..200_000_000
    ) {
        let scheduler = StageScheduler::with_delays(DelayTable::uniform(dwell_secs)).expect("delays");
        let e = entry(stage, true, 0);
        let transition = scheduler.transition(&e, Timestamp::from_millis(elapsed), false);

        let expected = !stage.is_terminal() && elapsed >= dwell_secs * MILLIS_PER_SECOND;
        prop_assert_eq!(transition.moved(), expected);
    }

    /// Simulate bypasses time but never the checkbox or the terminal stage.
    #[test]
    fn simulate_bypasses_time_only(stage in stage_strategy(), checked in any::<bool>()) {
        let scheduler = StageScheduler::with_delays(DelayTable::uniform(1_000_000)).expect("delays");
        let e = entry(stage, checked, 0);
        let transition = scheduler.transition(&e, Timestamp::from_millis(0), true);
        prop_assert_eq!(transition.moved(), checked && !stage.is_terminal());
    }

    /// A transition never moves stage_entered_at backwards.
    #[test]
    fn entered_at_never_decreases(entered in 0i64..1_000_000, now in 0i64..1_000_000) {
        let scheduler = StageScheduler::new();
        let e = entry(StageName::Day7, true, entered);
        let transition = scheduler.transition(&e, Timestamp::from_millis(now), true);
        prop_assert!(transition.entry.stage_entered_at >= e.stage_entered_at);
        prop_assert!(!transition.entry.checked);
    }

    /// Adding the same problems any number of times tracks each once.
    #[test]
    fn add_solved_is_idempotent(problems in vec(0u8..16, 1..40)) {
        let clock = ManualClock::default();
        let service = service(DelayTable::default(), &clock);
        let user = UserId::new("u1");
        let sheet = SheetType::new("apnaCollege");

        let mut distinct = std::collections::BTreeSet::new();
        for p in &problems {
            clock.advance(1);
            let outcome = service
                .add_solved(&user, &sheet, &ProblemId::new(format!("P{p}")))
                .expect("add");
            prop_assert_eq!(outcome.added, distinct.insert(*p));
        }

        let view = service.get_all(&user, &sheet).expect("get_all");
        prop_assert_eq!(view.summary.count(StageName::Today), distinct.len());
        prop_assert_eq!(view.summary.total(), distinct.len());
    }
}
