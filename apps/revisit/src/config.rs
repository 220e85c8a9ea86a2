//! # Deployment Configuration
//!
//! TOML file loaded at startup. Every section is optional; anything left out
//! keeps its default.
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//!
//! [storage]
//! backend = "redb"        # redb | file | memory
//! database = "revisit.db"
//!
//! [schedule]
//! allow_simulate = false
//!
//! [delays]                # seconds spent in each stage
//! tomorrow = 86400
//! day3 = 259200
//! ```
//!
//! Lookup order: `--config`, then `REVISIT_CONFIG`, then `revisit.toml` in
//! the working directory. Command-line flags override file values.

use revisit_core::{DelayTable, RevisitError, ServiceConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "REVISIT_CONFIG";

/// Config file picked up from the working directory when nothing else is set.
pub const DEFAULT_CONFIG_FILE: &str = "revisit.toml";

/// Maximum accepted config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

// =============================================================================
// STORAGE BACKEND KIND
// =============================================================================

/// Which store the service runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// redb database file (ACID, persistent).
    #[default]
    Redb,
    /// In-memory store saved to a snapshot file after each change.
    File,
    /// In-memory store, lost on exit.
    Memory,
}

impl BackendKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Redb => "redb",
            Self::File => "file",
            Self::Memory => "memory",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// SECTIONS
// =============================================================================

/// `[server]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// `[storage]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSection {
    pub backend: BackendKind,
    pub database: PathBuf,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            database: PathBuf::from("revisit.db"),
        }
    }
}

/// `[schedule]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScheduleSection {
    /// Accept `simulate: true` on move requests.
    pub allow_simulate: bool,
}

impl Default for ScheduleSection {
    fn default() -> Self {
        Self {
            allow_simulate: true,
        }
    }
}

// =============================================================================
// APP CONFIG
// =============================================================================

/// The whole config file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub server: ServerSection,
    pub storage: StorageSection,
    pub schedule: ScheduleSection,
    pub delays: DelayTable,
}

impl AppConfig {
    /// Parse a TOML document and validate the delay table.
    pub fn from_toml_str(content: &str) -> Result<Self, RevisitError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| RevisitError::InvalidInput(format!("Invalid config: {}", e)))?;
        config.delays.validate()?;
        Ok(config)
    }

    /// Load a config file.
    pub fn load(path: &Path) -> Result<Self, RevisitError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            RevisitError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(RevisitError::InvalidInput(format!(
                "Config file size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            RevisitError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Find and load the config for this run.
    ///
    /// An explicitly named file (flag or env var) must exist. The implicit
    /// `revisit.toml` is optional; without it the defaults apply.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, RevisitError> {
        if let Some(path) = explicit {
            tracing::info!("Loading config from {}", path.display());
            return Self::load(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            tracing::info!("Loading config from {} ({})", path, CONFIG_ENV_VAR);
            return Self::load(Path::new(&path));
        }

        let implicit = Path::new(DEFAULT_CONFIG_FILE);
        if implicit.is_file() {
            tracing::info!("Loading config from {}", DEFAULT_CONFIG_FILE);
            return Self::load(implicit);
        }

        tracing::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Engine settings derived from `[schedule]` and `[delays]`.
    #[must_use]
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            delays: self.delays,
            allow_simulate: self.schedule.allow_simulate,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
