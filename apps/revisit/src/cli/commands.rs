//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use super::{Context, SheetArgs};
use crate::api::{self, AppState};
use crate::config::BackendKind;
use revisit_core::{
    Entry, MemoryStore, ProblemId, ProgressionService, RevisitError, SheetType, StageName,
    StorageBackend, SystemClock, UserId,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum snapshot file size (256 MB), matching the decoder's own limit.
const MAX_SNAPSHOT_FILE_SIZE: u64 = 256 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), RevisitError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| RevisitError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(RevisitError::InvalidInput(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Resolve an input path to an existing regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, RevisitError> {
    let canonical = path.canonicalize().map_err(|e| {
        RevisitError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(RevisitError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Resolve an output path whose parent directory must already exist.
fn validate_output_path(path: &Path) -> Result<PathBuf, RevisitError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        RevisitError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(RevisitError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| RevisitError::IoError("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

/// Pretty-print a JSON value.
fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_default()
    );
}

fn sheet_ids(sheet: &SheetArgs) -> (UserId, SheetType) {
    (UserId::new(&*sheet.user), SheetType::new(&*sheet.sheet))
}

fn print_entry(entry: &Entry) {
    println!(
        "  {:<32} {:<10} checked={:<5} entered_at={}",
        entry.problem_id.as_str(),
        entry.stage.code(),
        entry.checked,
        entry.stage_entered_at.millis()
    );
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(
    ctx: &Context,
    host: Option<String>,
    port: Option<u16>,
) -> Result<(), RevisitError> {
    let service = load_or_create_service(ctx)?;
    let host = host.unwrap_or_else(|| ctx.config.server.host.clone());
    let port = port.unwrap_or(ctx.config.server.port);

    println!("Revisit Progress Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:           {}", host);
    println!("  Port:           {}", port);
    println!("  Backend:        {}", ctx.backend);
    println!("  Database:       {:?}", ctx.database);
    println!("  Allow simulate: {}", service.allow_simulate());
    println!();
    println!("Endpoints:");
    println!("  POST /progress/solved  - Track a solved problem");
    println!("  POST /progress/checked - Set the review checkbox");
    println!("  POST /progress/move    - Advance due entries");
    println!("  GET  /progress/{{user_id}}/{{sheet_type}}[/stage/{{stage}}|/due]");
    println!("  GET  /status           - Store status");
    println!("  GET  /export           - Store snapshot");
    println!("  GET  /health           - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let state = AppState::new(service);
    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, state.clone(), api::shutdown_signal()).await?;

    // The file backend only reaches disk through an explicit save.
    save_service(&state.service, ctx)?;
    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show store status.
pub fn cmd_status(ctx: &Context) -> Result<(), RevisitError> {
    let service = load_or_create_service(ctx)?;
    let status = service.status()?;

    if ctx.json_mode {
        print_json(&serde_json::json!({
            "database": ctx.database.to_string_lossy(),
            "backend": ctx.backend.as_str(),
            "partitions": status.partitions,
            "entries": status.entries,
            "allow_simulate": service.allow_simulate(),
        }));
        return Ok(());
    }

    println!("Revisit Store Status");
    println!("====================");
    println!("Database: {:?}", ctx.database);
    println!("Backend:  {}", ctx.backend);
    println!();
    println!("Partitions: {}", status.partitions);
    println!("Entries:    {}", status.entries);

    if ctx.verbose {
        let delays = service.scheduler().delays();
        println!();
        println!("Delays (seconds):");
        for stage in StageName::ALL {
            if let Some(secs) = delays.dwell_secs(stage) {
                println!("  {:<10} {}", stage.code(), secs);
            }
        }
    }

    Ok(())
}

// =============================================================================
// SOLVED COMMAND
// =============================================================================

/// Start tracking a solved problem.
pub fn cmd_solved(ctx: &Context, sheet: &SheetArgs, problem: &str) -> Result<(), RevisitError> {
    let service = load_or_create_service(ctx)?;
    let (user_id, sheet_type) = sheet_ids(sheet);
    let outcome = service.add_solved(&user_id, &sheet_type, &ProblemId::new(problem))?;
    if outcome.added {
        save_service(&service, ctx)?;
    }

    for diagnostic in &outcome.diagnostics {
        tracing::warn!(
            problem = %diagnostic.problem_id,
            reason = %diagnostic.reason,
            "unreadable stored entry"
        );
    }

    if ctx.json_mode {
        print_json(&serde_json::json!({
            "added": outcome.added,
            "entry": outcome.entry,
            "summary": outcome.summary,
            "diagnostics": outcome.diagnostics,
        }));
        return Ok(());
    }

    match (&outcome.entry, outcome.added) {
        (Some(entry), true) => println!("Tracking {} at {}", problem, entry.stage.name()),
        (Some(entry), false) => println!(
            "{} is already tracked (stage {})",
            problem,
            entry.stage.name()
        ),
        (None, _) => println!("{} is already tracked but its record is unreadable", problem),
    }
    Ok(())
}

// =============================================================================
// CHECK COMMAND
// =============================================================================

/// Set or clear the review checkbox.
pub fn cmd_check(
    ctx: &Context,
    sheet: &SheetArgs,
    problem: &str,
    checked: bool,
) -> Result<(), RevisitError> {
    let service = load_or_create_service(ctx)?;
    let (user_id, sheet_type) = sheet_ids(sheet);
    let entry = service.set_checked(&user_id, &sheet_type, &ProblemId::new(problem), checked)?;
    save_service(&service, ctx)?;

    if ctx.json_mode {
        print_json(&serde_json::json!({ "entry": entry }));
        return Ok(());
    }

    println!(
        "{}: checked={} (stage {})",
        problem,
        entry.checked,
        entry.stage.name()
    );
    Ok(())
}

// =============================================================================
// MOVE COMMAND
// =============================================================================

/// Advance due entries of one sheet.
pub fn cmd_move(ctx: &Context, sheet: &SheetArgs, simulate: bool) -> Result<(), RevisitError> {
    let service = load_or_create_service(ctx)?;
    let (user_id, sheet_type) = sheet_ids(sheet);
    let report = service.auto_move(&user_id, &sheet_type, simulate)?;
    if !report.movements.is_empty() {
        save_service(&service, ctx)?;
        tracing::info!(
            user = %user_id,
            sheet = %sheet_type,
            moved = report.movements.len(),
            "auto-move committed"
        );
    }
    for diagnostic in &report.diagnostics {
        tracing::warn!(
            problem = %diagnostic.problem_id,
            reason = %diagnostic.reason,
            "skipped malformed entry"
        );
    }

    if ctx.json_mode {
        print_json(&serde_json::json!({
            "movements": report.movements,
            "summary": report.summary,
            "diagnostics": report.diagnostics,
            "evaluated_at": report.evaluated_at,
        }));
        return Ok(());
    }

    if report.movements.is_empty() {
        println!("Nothing is due.");
    } else {
        println!("Moved {} problem(s):", report.movements.len());
        for movement in &report.movements {
            println!(
                "  {:<32} {} -> {}",
                movement.problem_id.as_str(),
                movement.from.code(),
                movement.to.code()
            );
        }
    }
    if !report.diagnostics.is_empty() {
        println!("Skipped {} malformed entries", report.diagnostics.len());
    }
    Ok(())
}

// =============================================================================
// READ COMMANDS
// =============================================================================

/// List one stage bucket.
pub fn cmd_stage(ctx: &Context, sheet: &SheetArgs, name: &str) -> Result<(), RevisitError> {
    let stage: StageName = name
        .parse()
        .map_err(|e| RevisitError::InvalidInput(format!("Unknown stage: {}", e)))?;
    let service = load_or_create_service(ctx)?;
    let (user_id, sheet_type) = sheet_ids(sheet);
    let listing = service.get_by_stage(&user_id, &sheet_type, stage)?;

    if ctx.json_mode {
        print_json(&serde_json::json!({
            "stage": stage,
            "problems": listing.problems,
            "count": listing.count,
        }));
        return Ok(());
    }

    println!("{} ({})", stage.name(), listing.count);
    for entry in &listing.problems {
        print_entry(entry);
    }
    Ok(())
}

/// Show every stage bucket.
pub fn cmd_show(ctx: &Context, sheet: &SheetArgs) -> Result<(), RevisitError> {
    let service = load_or_create_service(ctx)?;
    let (user_id, sheet_type) = sheet_ids(sheet);
    let view = service.get_all(&user_id, &sheet_type)?;

    if ctx.json_mode {
        print_json(&serde_json::json!({
            "buckets": view.buckets,
            "summary": view.summary,
            "diagnostics": view.diagnostics,
        }));
        return Ok(());
    }

    println!("Progress for {}/{}", user_id, sheet_type);
    println!("==================");
    for stage in StageName::ALL {
        let entries = view.buckets.stage(stage);
        println!("{:<10} {}", stage.name(), entries.len());
        if ctx.verbose {
            for entry in entries {
                print_entry(entry);
            }
        }
    }
    for diagnostic in &view.diagnostics {
        println!("! {}: {}", diagnostic.problem_id, diagnostic.reason);
    }
    Ok(())
}

/// List entries ready for review.
pub fn cmd_due(ctx: &Context, sheet: &SheetArgs) -> Result<(), RevisitError> {
    let service = load_or_create_service(ctx)?;
    let (user_id, sheet_type) = sheet_ids(sheet);
    let listing = service.get_due(&user_id, &sheet_type)?;

    if ctx.json_mode {
        print_json(&serde_json::json!({
            "due": listing.due,
            "count": listing.count,
        }));
        return Ok(());
    }

    if listing.due.is_empty() {
        println!("Nothing to review.");
        return Ok(());
    }
    println!("{} problem(s) due for review:", listing.count);
    for item in &listing.due {
        println!(
            "  {:<32} {:<10} due_at={}{}",
            item.entry.problem_id.as_str(),
            item.entry.stage.code(),
            item.due_at.millis(),
            if item.entry.checked { "" } else { " (unchecked)" }
        );
    }
    Ok(())
}

// =============================================================================
// EXPORT COMMAND
// =============================================================================

/// Write a snapshot of the whole store.
pub fn cmd_export(ctx: &Context, output: &Path) -> Result<(), RevisitError> {
    let validated_output = validate_output_path(output)?;
    let service = load_or_create_service(ctx)?;
    let data = service.export_snapshot()?;

    std::fs::write(&validated_output, &data)
        .map_err(|e| RevisitError::IoError(format!("Write file: {}", e)))?;

    println!("Exported {} bytes to {:?}", data.len(), validated_output);
    Ok(())
}

// =============================================================================
// IMPORT COMMAND
// =============================================================================

/// Replace the whole store from a snapshot file.
pub fn cmd_import(ctx: &Context, input: &Path) -> Result<(), RevisitError> {
    let validated_path = validate_file_path(input)?;
    validate_file_size(&validated_path, MAX_SNAPSHOT_FILE_SIZE)?;

    let data = std::fs::read(&validated_path)
        .map_err(|e| RevisitError::IoError(format!("Read file: {}", e)))?;

    let service = load_or_create_service(ctx)?;
    let status = service.import_snapshot(&data)?;
    save_service(&service, ctx)?;

    println!(
        "Imported snapshot: {} partitions, {} entries",
        status.partitions, status.entries
    );
    Ok(())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new database.
pub fn cmd_init(ctx: &Context, force: bool) -> Result<(), RevisitError> {
    if ctx.backend == BackendKind::Memory {
        return Err(RevisitError::InvalidInput(
            "The memory backend has nothing to initialize.".to_string(),
        ));
    }
    if ctx.database.exists() {
        if !force {
            return Err(RevisitError::InvalidInput(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(&ctx.database)
            .map_err(|e| RevisitError::IoError(format!("Remove existing database: {}", e)))?;
    }

    let service = load_or_create_service(ctx)?;
    save_service(&service, ctx)?;
    println!(
        "Initialized new {} database at {:?}",
        ctx.backend, ctx.database
    );
    Ok(())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Open the configured store and wrap it in a service on the wall clock.
pub fn load_or_create_service(ctx: &Context) -> Result<ProgressionService, RevisitError> {
    let backend = match ctx.backend {
        BackendKind::Redb => StorageBackend::redb(&ctx.database)?,
        BackendKind::File | BackendKind::Memory => StorageBackend::InMemory(MemoryStore::new()),
    };
    let service = ProgressionService::new(
        backend,
        Arc::new(SystemClock),
        ctx.config.service_config(),
    )?;

    if ctx.backend == BackendKind::File && ctx.database.exists() {
        validate_file_size(&ctx.database, MAX_SNAPSHOT_FILE_SIZE)?;
        let data = std::fs::read(&ctx.database)
            .map_err(|e| RevisitError::IoError(format!("Read db: {}", e)))?;
        service.import_snapshot(&data)?;
    }

    Ok(service)
}

/// Persist the store if the backend needs an explicit save.
pub fn save_service(service: &ProgressionService, ctx: &Context) -> Result<(), RevisitError> {
    match ctx.backend {
        // redb commits on every write; memory is volatile by choice.
        BackendKind::Redb | BackendKind::Memory => Ok(()),
        BackendKind::File => {
            let data = service.export_snapshot()?;
            std::fs::write(&ctx.database, &data)
                .map_err(|e| RevisitError::IoError(format!("Write db: {}", e)))?;
            tracing::debug!("Saved {} bytes to {:?}", data.len(), ctx.database);
            Ok(())
        }
    }
}
