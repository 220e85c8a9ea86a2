//! # Revisit - Spaced-Review Progress Server
//!
//! The main binary for the Revisit stage-based review engine.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for tracking, checking and moving problems
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────┐
//! │               apps/revisit (THE BINARY)            │
//! │                                                    │
//! │  ┌─────────────┐    ┌─────────────┐   ┌─────────┐  │
//! │  │   CLI       │    │   HTTP API  │   │ Config  │  │
//! │  │  (clap)     │    │   (axum)    │   │ (toml)  │  │
//! │  └──────┬──────┘    └──────┬──────┘   └────┬────┘  │
//! │         └──────────────────┼───────────────┘       │
//! │                            ▼                       │
//! │                    ┌───────────────┐               │
//! │                    │ revisit-core  │               │
//! │                    │ (THE LOGIC)   │               │
//! │                    └───────────────┘               │
//! └────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! revisit server --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! revisit solved -u alice -s apnaCollege -p two-sum
//! revisit check -u alice -s apnaCollege -p two-sum
//! revisit move -u alice -s apnaCollege
//! revisit show -u alice -s apnaCollege
//! ```

use clap::Parser;
use revisit::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // REVISIT_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("REVISIT_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "revisit=info,revisit_core=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Revisit startup banner.
fn print_banner() {
    println!(
        r#"
  ██████╗ ███████╗██╗   ██╗██╗███████╗██╗████████╗
  ██╔══██╗██╔════╝██║   ██║██║██╔════╝██║╚══██╔══╝
  ██████╔╝█████╗  ██║   ██║██║███████╗██║   ██║
  ██╔══██╗██╔══╝  ╚██╗ ██╔╝██║╚════██║██║   ██║
  ██║  ██║███████╗ ╚████╔╝ ██║███████║██║   ██║
  ╚═╝  ╚═╝╚══════╝  ╚═══╝  ╚═╝╚══════╝╚═╝   ╚═╝

  Spaced-Review Progress Server v{}

  Today • Tomorrow • Day 3 • Day 7 • Day 14 • Day 30
"#,
        env!("CARGO_PKG_VERSION")
    );
}
