//! # Revisit CLI Module
//!
//! This module implements the CLI interface for Revisit.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `status` - Show store status
//! - `solved` - Start tracking a solved problem
//! - `check` - Set or clear the review checkbox
//! - `move` - Advance due entries of one sheet
//! - `stage` - List one stage bucket
//! - `show` - Show every bucket of one sheet
//! - `due` - List entries ready for review
//! - `export` - Write a store snapshot to a file
//! - `import` - Replace the store from a snapshot file
//! - `init` - Initialize a new database

mod commands;

use crate::config::{AppConfig, BackendKind};
use clap::{Parser, Subcommand};
use revisit_core::RevisitError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Revisit - spaced-review progress tracker
///
/// Walks solved problems through TODAY, TOMORROW, DAY3, DAY7, DAY14, DAY30
/// and GRADUATED, one checked review at a time.
#[derive(Parser, Debug)]
#[command(name = "revisit")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the progress database (overrides [storage] database)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend (overrides [storage] backend)
    #[arg(short = 'B', long, global = true, value_enum)]
    pub backend: Option<BackendKind>,

    /// Path to a TOML config file
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Arguments naming one partition.
#[derive(clap::Args, Debug, Clone)]
pub struct SheetArgs {
    /// User identifier
    #[arg(short, long)]
    pub user: String,

    /// Sheet (problem list) name
    #[arg(short, long)]
    pub sheet: String,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to (overrides [server] host)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides [server] port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show store status
    Status,

    /// Start tracking a solved problem
    Solved {
        #[command(flatten)]
        sheet: SheetArgs,

        /// Problem identifier
        #[arg(short, long)]
        problem: String,
    },

    /// Set the review checkbox of a tracked problem
    Check {
        #[command(flatten)]
        sheet: SheetArgs,

        /// Problem identifier
        #[arg(short, long)]
        problem: String,

        /// Clear the checkbox instead of setting it
        #[arg(long)]
        clear: bool,
    },

    /// Advance every due entry of a sheet by one stage
    Move {
        #[command(flatten)]
        sheet: SheetArgs,

        /// Ignore dwell time (checked entries still required)
        #[arg(long)]
        simulate: bool,
    },

    /// List the entries of one stage
    Stage {
        #[command(flatten)]
        sheet: SheetArgs,

        /// Stage code (TODAY, TOMORROW, DAY3, DAY7, DAY14, DAY30, GRADUATED)
        #[arg(short = 'n', long)]
        name: String,
    },

    /// Show every stage bucket of a sheet
    Show {
        #[command(flatten)]
        sheet: SheetArgs,
    },

    /// List entries whose review is due
    Due {
        #[command(flatten)]
        sheet: SheetArgs,
    },

    /// Write a snapshot of the whole store
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Replace the whole store from a snapshot
    Import {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },
}

// =============================================================================
// RUN CONTEXT
// =============================================================================

/// Settings shared by every command after flags and config are merged.
#[derive(Debug, Clone)]
pub struct Context {
    pub database: PathBuf,
    pub backend: BackendKind,
    pub json_mode: bool,
    pub verbose: bool,
    pub config: AppConfig,
}

impl Context {
    /// Merge command-line flags over the loaded config.
    pub fn from_cli(cli: &Cli) -> Result<Self, RevisitError> {
        let config = AppConfig::resolve(cli.config.as_deref())?;
        Ok(Self {
            database: cli
                .database
                .clone()
                .unwrap_or_else(|| config.storage.database.clone()),
            backend: cli.backend.unwrap_or(config.storage.backend),
            json_mode: cli.json_mode,
            verbose: cli.verbose,
            config,
        })
    }
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), RevisitError> {
    let ctx = Context::from_cli(&cli)?;

    match cli.command {
        Some(Commands::Server { host, port }) => cmd_server(&ctx, host, port).await,
        Some(Commands::Status) | None => cmd_status(&ctx),
        Some(Commands::Solved { sheet, problem }) => cmd_solved(&ctx, &sheet, &problem),
        Some(Commands::Check {
            sheet,
            problem,
            clear,
        }) => cmd_check(&ctx, &sheet, &problem, !clear),
        Some(Commands::Move { sheet, simulate }) => cmd_move(&ctx, &sheet, simulate),
        Some(Commands::Stage { sheet, name }) => cmd_stage(&ctx, &sheet, &name),
        Some(Commands::Show { sheet }) => cmd_show(&ctx, &sheet),
        Some(Commands::Due { sheet }) => cmd_due(&ctx, &sheet),
        Some(Commands::Export { output }) => cmd_export(&ctx, &output),
        Some(Commands::Import { input }) => cmd_import(&ctx, &input),
        Some(Commands::Init { force }) => cmd_init(&ctx, force),
    }
}
