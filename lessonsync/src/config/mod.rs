//! Configuration for the `lessonsync` tool.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/lessonsync/config.toml`)
//! 4. Compiled defaults

use std::path::{Path, PathBuf};

use lessonsync_proto::Record;

use crate::lesson::Resolution;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    storage: StorageFileConfig,
    conflict: ConflictFileConfig,
    log: LogFileConfig,
}

/// `[storage]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct StorageFileConfig {
    path: Option<PathBuf>,
}

/// `[conflict]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConflictFileConfig {
    default: Option<Resolution>,
}

/// `[log]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct LogFileConfig {
    level: Option<String>,
}

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// CLI arguments for `lessonsync`.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Inspect and maintain a framework lesson change log")]
pub struct CliArgs {
    /// Path of the change log file.
    #[arg(short, long, env = "LESSONSYNC_STORE")]
    pub store: Option<PathBuf>,

    /// Path to config file (default: `~/.config/lessonsync/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, env = "LESSONSYNC_LOG")]
    pub log_level: Option<String>,

    /// What to do with the change log (default: `records`).
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Change log operations.
#[derive(clap::Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List every record with its number of changes.
    Records,
    /// Print the changes stored under one record.
    Show {
        /// Record handle, e.g. `#3` or `3`.
        record: Record,
    },
    /// Rewrite the log keeping only the latest frame of each record.
    Compact,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Fully resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Change log file.
    pub store_path: PathBuf,
    /// Answer to propagation conflicts when no resolver is supplied.
    pub default_resolution: Resolution,
    /// Log level filter string.
    pub log_level: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            default_resolution: Resolution::Keep,
            log_level: "info".to_string(),
        }
    }
}

impl SyncConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an error.
    /// If no `--config` is given, the default path is tried and a missing
    /// file is treated as empty config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Priority: CLI > file > default.
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            store_path: cli
                .store
                .clone()
                .or_else(|| file.storage.path.clone())
                .unwrap_or(defaults.store_path),
            default_resolution: file.conflict.default.unwrap_or(defaults.default_resolution),
            log_level: cli
                .log_level
                .clone()
                .or_else(|| file.log.level.clone())
                .unwrap_or(defaults.log_level),
        }
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// `<local data dir>/lessonsync/frameworkLessonHistory/storage`, or a
/// relative path when the platform has no data directory.
fn default_store_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_default()
        .join("lessonsync")
        .join("frameworkLessonHistory")
        .join("storage")
}

/// Load and parse a TOML config file.
fn load_config_file(explicit_path: Option<&Path>) -> Result<ConfigFile, ConfigError> {
    if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    }

    let Some(config_dir) = dirs::config_dir() else {
        return Ok(ConfigFile::default());
    };
    let path = config_dir.join("lessonsync").join("config.toml");

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
