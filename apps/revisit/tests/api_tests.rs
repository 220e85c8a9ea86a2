//! Integration tests for the Revisit HTTP API.
//!
//! Uses axum-test to test the API handlers without starting a real server.

// Allow unwrap and panic in tests - these are standard for test code
// Allow holding MutexGuard across await - tests touching env vars are
// serialized on ENV_TEST_MUTEX
#![allow(clippy::unwrap_used, clippy::panic, clippy::await_holding_lock)]

use axum_test::TestServer;
use base64::Engine;
use revisit::api::{
    AppState, DueResponse, EntryResponse, ExportResponse, HealthResponse, MoveResponse,
    ProgressResponse, SolvedResponse, StageResponse, StatusResponse, create_router,
};
use revisit_core::primitives::{MAGIC_BYTES, MILLIS_PER_DAY};
use revisit_core::{
    ManualClock, ProgressionService, ServiceConfig, StageName, StorageBackend, Timestamp,
};
use serde_json::json;
use std::sync::{Arc, Mutex};

/// Mutex to serialize tests since the router reads env vars.
static ENV_TEST_MUTEX: Mutex<()> = Mutex::new(());

const START: i64 = 1_700_000_000_000;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Guard wrapper that holds the mutex and clears env overrides on drop.
struct TestGuard {
    _guard: std::sync::MutexGuard<'static, ()>,
}

impl Drop for TestGuard {
    fn drop(&mut self) {
        // SAFETY: Tests run sequentially under ENV_TEST_MUTEX, so no concurrent env access.
        unsafe { std::env::remove_var("REVISIT_RATE_LIMIT") };
    }
}

fn lock_env() -> TestGuard {
    let guard = ENV_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    // SAFETY: Tests run sequentially under ENV_TEST_MUTEX, so no concurrent env access.
    unsafe { std::env::remove_var("REVISIT_RATE_LIMIT") };
    TestGuard { _guard: guard }
}

fn server_with(config: ServiceConfig) -> (TestServer, ManualClock) {
    let clock = ManualClock::new(Timestamp::from_millis(START));
    let service =
        ProgressionService::new(StorageBackend::default(), Arc::new(clock.clone()), config)
            .unwrap();
    let router = create_router(AppState::new(service));
    (TestServer::new(router).unwrap(), clock)
}

/// Create a test server over a fresh in-memory store and a manual clock.
/// Returns a guard that must be kept alive during the test.
fn create_test_server() -> (TestServer, ManualClock, TestGuard) {
    let guard = lock_env();
    let (server, clock) = server_with(ServiceConfig::default());
    (server, clock, guard)
}

async fn solve(server: &TestServer, problem: &str) -> SolvedResponse {
    server
        .post("/progress/solved")
        .json(&json!({
            "user_id": "u1",
            "sheet_type": "apnaCollege",
            "problem_id": problem,
        }))
        .await
        .json()
}

async fn check(server: &TestServer, problem: &str, checked: bool) -> EntryResponse {
    server
        .post("/progress/checked")
        .json(&json!({
            "user_id": "u1",
            "sheet_type": "apnaCollege",
            "problem_id": problem,
            "checked": checked,
        }))
        .await
        .json()
}

async fn auto_move(server: &TestServer, simulate: bool) -> MoveResponse {
    server
        .post("/progress/move")
        .json(&json!({
            "user_id": "u1",
            "sheet_type": "apnaCollege",
            "simulate": simulate,
        }))
        .await
        .json()
}

// =============================================================================
// HEALTH & STATUS
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (server, _clock, _guard) = create_test_server();

    let response = server.get("/health").await;

    response.assert_status_ok();
    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_status_counts_partitions() {
    let (server, _clock, _guard) = create_test_server();

    let status: StatusResponse = server.get("/status").await.json();
    assert!(status.success);
    assert_eq!(status.partitions, 0);
    assert!(!status.persistent);

    solve(&server, "P1").await;
    solve(&server, "P2").await;
    let status: StatusResponse = server.get("/status").await.json();
    assert_eq!(status.partitions, 1);
    assert_eq!(status.entries, 2);
}

// =============================================================================
// SOLVED
// =============================================================================

#[tokio::test]
async fn test_solved_creates_today_entry() {
    let (server, _clock, _guard) = create_test_server();

    let response = solve(&server, "two-sum").await;

    assert!(response.success);
    assert!(response.added);
    let entry = response.entry.unwrap();
    assert_eq!(entry.stage, StageName::Today);
    assert!(!entry.checked);
    assert_eq!(entry.stage_entered_at, Timestamp::from_millis(START));
    assert_eq!(response.summary.unwrap().count(StageName::Today), 1);
    assert_eq!(response.buckets.unwrap().0.len(), StageName::ALL.len());
}

#[tokio::test]
async fn test_solved_twice_is_idempotent() {
    let (server, clock, _guard) = create_test_server();

    let first = solve(&server, "P1").await;
    clock.advance(MILLIS_PER_DAY);
    let second = solve(&server, "P1").await;

    assert!(first.added);
    assert!(!second.added);
    assert_eq!(
        serde_json::to_value(&first.buckets).unwrap(),
        serde_json::to_value(&second.buckets).unwrap()
    );
}

#[tokio::test]
async fn test_solved_accepts_camel_case_fields() {
    let (server, _clock, _guard) = create_test_server();

    let response = server
        .post("/progress/solved")
        .json(&json!({
            "userId": "u1",
            "sheetType": "loveBabbar",
            "problemId": "P7",
        }))
        .await;

    response.assert_status_ok();
    let body: SolvedResponse = response.json();
    assert_eq!(body.entry.unwrap().sheet_type.as_str(), "loveBabbar");
}

#[tokio::test]
async fn test_solved_rejects_empty_identifier() {
    let (server, _clock, _guard) = create_test_server();

    let response = server
        .post("/progress/solved")
        .json(&json!({ "user_id": "", "sheet_type": "apnaCollege", "problem_id": "P1" }))
        .await;

    assert_eq!(response.status_code().as_u16(), 400);
    let body: SolvedResponse = response.json();
    assert!(!body.success);
    assert!(body.error.is_some());
}

#[tokio::test]
async fn test_solved_rejects_malformed_json() {
    let (server, _clock, _guard) = create_test_server();

    let response = server
        .post("/progress/solved")
        .content_type("application/json")
        .bytes(bytes::Bytes::from("not valid json"))
        .await;

    assert!(response.status_code().is_client_error());
}

// =============================================================================
// CHECKED
// =============================================================================

#[tokio::test]
async fn test_checked_unknown_problem_is_404() {
    let (server, _clock, _guard) = create_test_server();

    let response = server
        .post("/progress/checked")
        .json(&json!({
            "user_id": "u1",
            "sheet_type": "apnaCollege",
            "problem_id": "ghost",
            "checked": true,
        }))
        .await;

    assert_eq!(response.status_code().as_u16(), 404);
    let body: EntryResponse = response.json();
    assert!(!body.success);
}

#[tokio::test]
async fn test_checked_flips_flag_only() {
    let (server, _clock, _guard) = create_test_server();
    solve(&server, "P1").await;

    let body = check(&server, "P1", true).await;
    let entry = body.entry.unwrap();
    assert!(entry.checked);
    assert_eq!(entry.stage, StageName::Today);

    let body = check(&server, "P1", false).await;
    assert!(!body.entry.unwrap().checked);
}

// =============================================================================
// MOVE
// =============================================================================

#[tokio::test]
async fn test_move_requires_checkbox() {
    let (server, _clock, _guard) = create_test_server();
    solve(&server, "P1").await;

    let report = auto_move(&server, true).await;
    assert!(report.success);
    assert!(report.movements.is_empty());
}

#[tokio::test]
async fn test_move_waits_for_dwell() {
    let (server, clock, _guard) = create_test_server();
    solve(&server, "P1").await;
    check(&server, "P1", true).await;

    let report = auto_move(&server, false).await;
    assert_eq!(report.movements.len(), 1);
    assert_eq!(report.movements[0].to, StageName::Tomorrow);
    assert_eq!(report.evaluated_at, Some(Timestamp::from_millis(START)));

    check(&server, "P1", true).await;
    clock.advance(MILLIS_PER_DAY - 1);
    assert!(auto_move(&server, false).await.movements.is_empty());

    clock.advance(1);
    let report = auto_move(&server, false).await;
    assert_eq!(report.movements.len(), 1);
    assert_eq!(report.movements[0].from, StageName::Tomorrow);
    assert_eq!(report.movements[0].to, StageName::Day3);
}

#[tokio::test]
async fn test_simulated_walk_to_graduated() {
    let (server, _clock, _guard) = create_test_server();
    solve(&server, "P1").await;

    let mut reached = Vec::new();
    for _ in 0..6 {
        check(&server, "P1", true).await;
        let report = auto_move(&server, true).await;
        assert_eq!(report.movements.len(), 1);
        reached.push(report.movements[0].to);
    }
    assert_eq!(reached.last(), Some(&StageName::Graduated));

    check(&server, "P1", true).await;
    let last = auto_move(&server, true).await;
    assert!(last.success);
    assert!(last.movements.is_empty());

    let progress: ProgressResponse = server.get("/progress/u1/apnaCollege").await.json();
    let summary = progress.summary.unwrap();
    assert_eq!(summary.count(StageName::Graduated), 1);
    assert_eq!(summary.0.len(), 1);
}

#[tokio::test]
async fn test_simulate_rejected_when_disabled() {
    let _guard = lock_env();
    let (server, _clock) = server_with(ServiceConfig {
        allow_simulate: false,
        ..ServiceConfig::default()
    });

    let response = server
        .post("/progress/move")
        .json(&json!({ "user_id": "u1", "sheet_type": "apnaCollege", "simulate": true }))
        .await;

    assert_eq!(response.status_code().as_u16(), 400);
    let body: MoveResponse = response.json();
    assert!(!body.success);
}

// =============================================================================
// READS
// =============================================================================

#[tokio::test]
async fn test_progress_for_unknown_partition_is_empty() {
    let (server, _clock, _guard) = create_test_server();

    let response = server.get("/progress/nobody/nothing").await;

    response.assert_status_ok();
    let body: ProgressResponse = response.json();
    assert!(body.success);
    assert_eq!(body.summary.unwrap().total(), 0);
    assert!(body.buckets.unwrap().0.values().all(Vec::is_empty));
}

#[tokio::test]
async fn test_stage_endpoint_is_case_insensitive() {
    let (server, _clock, _guard) = create_test_server();
    solve(&server, "P1").await;
    solve(&server, "P2").await;

    let response = server.get("/progress/u1/apnaCollege/stage/today").await;

    response.assert_status_ok();
    let body: StageResponse = response.json();
    assert_eq!(body.stage.as_deref(), Some("TODAY"));
    assert_eq!(body.count, 2);
    assert_eq!(body.problems.len(), 2);
}

#[tokio::test]
async fn test_stage_endpoint_rejects_unknown_stage() {
    let (server, _clock, _guard) = create_test_server();

    let response = server.get("/progress/u1/apnaCollege/stage/DAY5").await;

    assert_eq!(response.status_code().as_u16(), 400);
    let body: StageResponse = response.json();
    assert!(!body.success);
}

#[tokio::test]
async fn test_due_lists_elapsed_entries() {
    let (server, clock, _guard) = create_test_server();
    solve(&server, "P1").await;
    check(&server, "P1", true).await;
    auto_move(&server, false).await;

    let due: DueResponse = server.get("/progress/u1/apnaCollege/due").await.json();
    assert_eq!(due.count, 0);

    clock.advance(MILLIS_PER_DAY);
    let due: DueResponse = server.get("/progress/u1/apnaCollege/due").await.json();
    assert_eq!(due.count, 1);
    assert_eq!(due.due[0].entry.stage, StageName::Tomorrow);
    assert!(!due.due[0].entry.checked);
    assert_eq!(
        due.due[0].due_at,
        Timestamp::from_millis(START + MILLIS_PER_DAY)
    );
}

// =============================================================================
// EXPORT
// =============================================================================

#[tokio::test]
async fn test_export_returns_snapshot() {
    let (server, _clock, _guard) = create_test_server();
    solve(&server, "P1").await;

    let response = server.get("/export").await;

    response.assert_status_ok();
    let body: ExportResponse = response.json();
    assert!(body.success);
    let data = base64::engine::general_purpose::STANDARD
        .decode(body.data.unwrap())
        .unwrap();
    assert_eq!(data.len(), body.size);
    assert_eq!(&data[0..4], MAGIC_BYTES);
    assert_eq!(revisit_core::snapshot_from_bytes(&data).unwrap().len(), 1);
}

// =============================================================================
// RATE LIMITING
// =============================================================================

#[tokio::test]
async fn test_rate_limit_returns_429() {
    let _guard = lock_env();
    // SAFETY: Tests run sequentially under ENV_TEST_MUTEX, so no concurrent env access.
    unsafe { std::env::set_var("REVISIT_RATE_LIMIT", "1") };
    let (server, _clock) = server_with(ServiceConfig::default());

    server.get("/health").await.assert_status_ok();
    let response = server.get("/health").await;

    assert_eq!(response.status_code().as_u16(), 429);
    let body: serde_json::Value = response.json();
    assert_eq!(body["success"], json!(false));
}
