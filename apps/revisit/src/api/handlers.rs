//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.
//!
//! The engine is synchronous and may block on its partition mutex or on
//! redb, so every call runs on the blocking pool.

use super::{
    AppState,
    types::{
        CheckedRequest, DueResponse, EntryResponse, ExportResponse, HealthResponse, MoveRequest,
        MoveResponse, ProgressResponse, SolvedRequest, SolvedResponse, StageResponse,
        StatusResponse,
    },
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use revisit_core::{ProgressionService, RevisitError, SheetType, StageName, UserId};
use std::sync::Arc;

// =============================================================================
// HELPERS
// =============================================================================

/// HTTP status for an engine error.
pub fn error_status(error: &RevisitError) -> StatusCode {
    match error {
        RevisitError::NotFound { .. } => StatusCode::NOT_FOUND,
        RevisitError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        RevisitError::Conflict(_) => StatusCode::CONFLICT,
        RevisitError::InvalidStage(_)
        | RevisitError::LockPoisoned
        | RevisitError::SerializationError(_)
        | RevisitError::DeserializationError(_)
        | RevisitError::IoError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Run an engine call on the blocking pool.
async fn with_service<T, F>(state: &AppState, f: F) -> Result<T, RevisitError>
where
    T: Send + 'static,
    F: FnOnce(&ProgressionService) -> Result<T, RevisitError> + Send + 'static,
{
    let service = Arc::clone(&state.service);
    tokio::task::spawn_blocking(move || f(&service))
        .await
        .map_err(|e| RevisitError::IoError(format!("Worker task failed: {}", e)))?
}

/// Log an engine failure at a level matching its status.
fn log_failure(operation: &str, error: &RevisitError) -> StatusCode {
    let status = error_status(error);
    if status.is_server_error() {
        tracing::error!(operation, %error, "request failed");
    } else {
        tracing::debug!(operation, %error, "request rejected");
    }
    status
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// STATUS HANDLER
// =============================================================================

/// Get store status.
pub async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    match with_service(&state, |service| {
        Ok((service.status()?, service.store().is_persistent()))
    })
    .await
    {
        Ok((status, persistent)) => (
            StatusCode::OK,
            Json(StatusResponse::success(status, persistent)),
        ),
        Err(e) => (
            log_failure("status", &e),
            Json(StatusResponse::error(e.to_string())),
        ),
    }
}

// =============================================================================
// SOLVED HANDLER
// =============================================================================

/// Record a solved problem.
pub async fn solved_handler(
    State(state): State<AppState>,
    Json(request): Json<SolvedRequest>,
) -> impl IntoResponse {
    let (user, sheet, problem) = request.ids();
    match with_service(&state, move |service| {
        service.add_solved(&user, &sheet, &problem)
    })
    .await
    {
        Ok(outcome) => {
            if outcome.added {
                tracing::info!(
                    user = %request.user_id,
                    sheet = %request.sheet_type,
                    problem = %request.problem_id,
                    "tracking solved problem"
                );
            }
            for diagnostic in &outcome.diagnostics {
                tracing::warn!(
                    problem = %diagnostic.problem_id,
                    reason = %diagnostic.reason,
                    "unreadable stored entry"
                );
            }
            (StatusCode::OK, Json(SolvedResponse::success(outcome)))
        }
        Err(e) => (
            log_failure("solved", &e),
            Json(SolvedResponse::error(e.to_string())),
        ),
    }
}

// =============================================================================
// CHECKED HANDLER
// =============================================================================

/// Set the review checkbox.
pub async fn checked_handler(
    State(state): State<AppState>,
    Json(request): Json<CheckedRequest>,
) -> impl IntoResponse {
    let (user, sheet, problem) = request.ids();
    let checked = request.checked;
    match with_service(&state, move |service| {
        service.set_checked(&user, &sheet, &problem, checked)
    })
    .await
    {
        Ok(entry) => (StatusCode::OK, Json(EntryResponse::success(entry))),
        Err(e) => (
            log_failure("checked", &e),
            Json(EntryResponse::error(e.to_string())),
        ),
    }
}

// =============================================================================
// MOVE HANDLER
// =============================================================================

/// Run one auto-move pass over a partition.
pub async fn move_handler(
    State(state): State<AppState>,
    Json(request): Json<MoveRequest>,
) -> impl IntoResponse {
    let user = UserId::new(&*request.user_id);
    let sheet = SheetType::new(&*request.sheet_type);
    let simulate = request.simulate;
    match with_service(&state, move |service| {
        service.auto_move(&user, &sheet, simulate)
    })
    .await
    {
        Ok(report) => {
            if !report.movements.is_empty() {
                tracing::info!(
                    user = %request.user_id,
                    sheet = %request.sheet_type,
                    moved = report.movements.len(),
                    simulate,
                    "auto-move committed"
                );
            }
            for diagnostic in &report.diagnostics {
                tracing::warn!(
                    user = %request.user_id,
                    sheet = %request.sheet_type,
                    problem = %diagnostic.problem_id,
                    reason = %diagnostic.reason,
                    "skipped malformed entry"
                );
            }
            (StatusCode::OK, Json(MoveResponse::success(report)))
        }
        Err(e) => (
            log_failure("move", &e),
            Json(MoveResponse::error(e.to_string())),
        ),
    }
}

// =============================================================================
// READ HANDLERS
// =============================================================================

/// Every bucket of a partition.
pub async fn progress_handler(
    State(state): State<AppState>,
    Path((user_id, sheet_type)): Path<(String, String)>,
) -> impl IntoResponse {
    let user = UserId::new(user_id);
    let sheet = SheetType::new(sheet_type);
    match with_service(&state, move |service| service.get_all(&user, &sheet)).await {
        Ok(view) => (StatusCode::OK, Json(ProgressResponse::success(view))),
        Err(e) => (
            log_failure("progress", &e),
            Json(ProgressResponse::error(e.to_string())),
        ),
    }
}

/// Entries of one stage. The stage name is case-insensitive.
pub async fn stage_handler(
    State(state): State<AppState>,
    Path((user_id, sheet_type, stage)): Path<(String, String, String)>,
) -> impl IntoResponse {
    let stage = match stage.parse::<StageName>() {
        Ok(stage) => stage,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(StageResponse::error(format!("Unknown stage: {}", e))),
            );
        }
    };

    let user = UserId::new(user_id);
    let sheet = SheetType::new(sheet_type);
    match with_service(&state, move |service| {
        service.get_by_stage(&user, &sheet, stage)
    })
    .await
    {
        Ok(listing) => (StatusCode::OK, Json(StageResponse::success(listing))),
        Err(e) => (
            log_failure("stage", &e),
            Json(StageResponse::error(e.to_string())),
        ),
    }
}

/// Entries whose dwell has elapsed.
pub async fn due_handler(
    State(state): State<AppState>,
    Path((user_id, sheet_type)): Path<(String, String)>,
) -> impl IntoResponse {
    let user = UserId::new(user_id);
    let sheet = SheetType::new(sheet_type);
    match with_service(&state, move |service| service.get_due(&user, &sheet)).await {
        Ok(listing) => (StatusCode::OK, Json(DueResponse::success(listing))),
        Err(e) => (
            log_failure("due", &e),
            Json(DueResponse::error(e.to_string())),
        ),
    }
}

// =============================================================================
// EXPORT HANDLER
// =============================================================================

/// Export the whole store as a base64 snapshot.
pub async fn export_handler(State(state): State<AppState>) -> impl IntoResponse {
    match with_service(&state, |service| service.export_snapshot()).await {
        Ok(data) => (StatusCode::OK, Json(ExportResponse::success(&data))),
        Err(e) => (
            log_failure("export", &e),
            Json(ExportResponse::error(format!("Export failed: {}", e))),
        ),
    }
}
