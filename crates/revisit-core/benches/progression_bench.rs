//! # Progression Benchmarks
//!
//! Performance benchmarks for revisit-core progression operations.
//!
//! Run with: `cargo bench -p revisit-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use revisit_core::{
    ManualClock, MemoryStore, ProblemId, ProgressionService, ServiceConfig, SheetType, StageName,
    Timestamp, UserId,
};
use std::hint::black_box;
use std::sync::Arc;

fn ids() -> (UserId, SheetType) {
    (UserId::new("bench"), SheetType::new("apnaCollege"))
}

/// A service with `size` tracked problems, every one checked.
fn checked_partition(size: usize) -> ProgressionService<MemoryStore> {
    let service = ProgressionService::new(
        MemoryStore::new(),
        Arc::new(ManualClock::new(Timestamp::from_millis(0))),
        ServiceConfig::default(),
    )
    .expect("service");
    let (user, sheet) = ids();
    for i in 0..size {
        let problem = ProblemId::new(format!("P{i}"));
        service.add_solved(&user, &sheet, &problem).expect("add");
        service
            .set_checked(&user, &sheet, &problem, true)
            .expect("check");
    }
    service
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_add_solved(c: &mut Criterion) {
    let mut group = c.benchmark_group("add_solved");

    for size in [100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let (user, sheet) = ids();
            b.iter(|| {
                let service = checked_partition(0);
                for i in 0..size {
                    let _ = service.add_solved(&user, &sheet, &ProblemId::new(format!("P{i}")));
                }
                black_box(service)
            });
        });
    }

    group.finish();
}

fn bench_auto_move(c: &mut Criterion) {
    let mut group = c.benchmark_group("auto_move");

    for size in [100, 1000, 5000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let (user, sheet) = ids();
            b.iter_batched(
                || checked_partition(size),
                |service| black_box(service.auto_move(&user, &sheet, false)),
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

fn bench_auto_move_nothing_due(c: &mut Criterion) {
    let mut group = c.benchmark_group("auto_move_idle");

    for size in [100, 1000, 5000].iter() {
        let service = checked_partition(*size);
        let (user, sheet) = ids();
        // After one pass everything sits unchecked in TOMORROW.
        let _ = service.auto_move(&user, &sheet, false);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(service.auto_move(&user, &sheet, false)));
        });
    }

    group.finish();
}

fn bench_get_by_stage(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_by_stage");

    for size in [100, 1000, 5000].iter() {
        let service = checked_partition(*size);
        let (user, sheet) = ids();

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(service.get_by_stage(&user, &sheet, StageName::Today)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_add_solved,
    bench_auto_move,
    bench_auto_move_nothing_due,
    bench_get_by_stage
);
criterion_main!(benches);
