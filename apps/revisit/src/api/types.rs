//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.
//!
//! Request fields are snake_case; the camelCase spellings used by existing
//! web clients (`userId`, `sheetType`, `problemId`) are accepted as aliases.

use revisit_core::{
    AddSolvedOutcome, AutoMoveReport, Buckets, Diagnostic, DueItem, DueListing, Entry, Movement,
    PartitionView, ProblemId, SheetType, StageListing, StageSummary, StoreStatus, Timestamp,
    UserId,
};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// STATUS RESPONSE
// =============================================================================

/// Store status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub success: bool,
    pub partitions: usize,
    pub entries: usize,
    pub persistent: bool,
    pub error: Option<String>,
}

impl StatusResponse {
    pub fn success(status: StoreStatus, persistent: bool) -> Self {
        Self {
            success: true,
            partitions: status.partitions,
            entries: status.entries,
            persistent,
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            partitions: 0,
            entries: 0,
            persistent: false,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// SOLVED REQUEST/RESPONSE
// =============================================================================

/// "Problem solved" event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolvedRequest {
    #[serde(alias = "userId")]
    pub user_id: String,
    #[serde(alias = "sheetType")]
    pub sheet_type: String,
    #[serde(alias = "problemId")]
    pub problem_id: String,
}

impl SolvedRequest {
    pub fn ids(&self) -> (UserId, SheetType, ProblemId) {
        (
            UserId::new(&*self.user_id),
            SheetType::new(&*self.sheet_type),
            ProblemId::new(&*self.problem_id),
        )
    }
}

/// Result of recording a solved problem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolvedResponse {
    pub success: bool,
    pub added: bool,
    pub entry: Option<Entry>,
    pub buckets: Option<Buckets>,
    pub summary: Option<StageSummary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
    pub error: Option<String>,
}

impl SolvedResponse {
    pub fn success(outcome: AddSolvedOutcome) -> Self {
        Self {
            success: true,
            added: outcome.added,
            entry: outcome.entry,
            buckets: Some(outcome.buckets),
            summary: Some(outcome.summary),
            diagnostics: outcome.diagnostics,
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            added: false,
            entry: None,
            buckets: None,
            summary: None,
            diagnostics: vec![],
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// CHECKED REQUEST/RESPONSE
// =============================================================================

/// Checkbox update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckedRequest {
    #[serde(alias = "userId")]
    pub user_id: String,
    #[serde(alias = "sheetType")]
    pub sheet_type: String,
    #[serde(alias = "problemId")]
    pub problem_id: String,
    pub checked: bool,
}

impl CheckedRequest {
    pub fn ids(&self) -> (UserId, SheetType, ProblemId) {
        (
            UserId::new(&*self.user_id),
            SheetType::new(&*self.sheet_type),
            ProblemId::new(&*self.problem_id),
        )
    }
}

/// A single entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryResponse {
    pub success: bool,
    pub entry: Option<Entry>,
    pub error: Option<String>,
}

impl EntryResponse {
    pub fn success(entry: Entry) -> Self {
        Self {
            success: true,
            entry: Some(entry),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            entry: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// MOVE REQUEST/RESPONSE
// =============================================================================

/// Auto-move tick for one partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRequest {
    #[serde(alias = "userId")]
    pub user_id: String,
    #[serde(alias = "sheetType")]
    pub sheet_type: String,
    /// Skip the dwell-time gate (only if the deployment allows it).
    #[serde(default)]
    pub simulate: bool,
}

/// Result of an auto-move pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveResponse {
    pub success: bool,
    pub movements: Vec<Movement>,
    pub summary: Option<StageSummary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
    pub evaluated_at: Option<Timestamp>,
    pub error: Option<String>,
}

impl MoveResponse {
    pub fn success(report: AutoMoveReport) -> Self {
        Self {
            success: true,
            movements: report.movements,
            summary: Some(report.summary),
            diagnostics: report.diagnostics,
            evaluated_at: Some(report.evaluated_at),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            movements: vec![],
            summary: None,
            diagnostics: vec![],
            evaluated_at: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// PROGRESS RESPONSE (GET ALL)
// =============================================================================

/// Every bucket of one partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressResponse {
    pub success: bool,
    pub buckets: Option<Buckets>,
    pub summary: Option<StageSummary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
    pub error: Option<String>,
}

impl ProgressResponse {
    pub fn success(view: PartitionView) -> Self {
        Self {
            success: true,
            buckets: Some(view.buckets),
            summary: Some(view.summary),
            diagnostics: view.diagnostics,
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            buckets: None,
            summary: None,
            diagnostics: vec![],
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// STAGE RESPONSE
// =============================================================================

/// Entries of one stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResponse {
    pub success: bool,
    pub stage: Option<String>,
    pub problems: Vec<Entry>,
    pub count: usize,
    pub error: Option<String>,
}

impl StageResponse {
    pub fn success(listing: StageListing) -> Self {
        Self {
            success: true,
            stage: Some(listing.stage.code().to_string()),
            problems: listing.problems,
            count: listing.count,
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            stage: None,
            problems: vec![],
            count: 0,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// DUE RESPONSE
// =============================================================================

/// Entries ready for review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DueResponse {
    pub success: bool,
    pub due: Vec<DueItem>,
    pub count: usize,
    pub error: Option<String>,
}

impl DueResponse {
    pub fn success(listing: DueListing) -> Self {
        Self {
            success: true,
            due: listing.due,
            count: listing.count,
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            due: vec![],
            count: 0,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// EXPORT RESPONSE
// =============================================================================

/// Export response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResponse {
    pub success: bool,
    pub data: Option<String>, // Base64 encoded snapshot
    pub size: usize,
    pub error: Option<String>,
}

impl ExportResponse {
    pub fn success(data: &[u8]) -> Self {
        Self {
            success: true,
            data: Some(base64::Engine::encode(
                &base64::engine::general_purpose::STANDARD,
                data,
            )),
            size: data.len(),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            size: 0,
            error: Some(msg.into()),
        }
    }
}
