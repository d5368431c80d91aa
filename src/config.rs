//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. The path given on the command line (`--config`)
//! 2. `$MAILHARVEST_CONFIG` (environment variable)
//! 3. `./mailharvest.toml` (working directory)
//! 4. `~/.config/mailharvest/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailharvest\config.toml` (Windows)
//! 5. Built-in defaults
//!
//! Components never read the environment themselves; the parsed [`Config`]
//! is handed down from `main`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{HarvestError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// What to search for.
    pub search: SearchConfig,
    /// Where and what to download.
    pub download: DownloadConfig,
    /// Subject-keyword folder routing.
    pub routing: RoutingConfig,
    /// Processed-id ledger location.
    pub ledger: LedgerConfig,
    /// General behavior settings.
    pub general: GeneralConfig,
}

/// Search window and subject keywords.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Subject keywords; one query is issued per keyword.
    /// Empty means a single unfiltered query.
    pub subjects: Vec<String>,
    /// Named date window: "today", "yesterday", "week", "month", "year",
    /// or "Nd" for the last N days. Empty means use the explicit dates.
    pub date_range: String,
    /// Explicit window start, `%Y/%m/%d`. Used only when `date_range` is
    /// empty and both dates are set.
    pub start_date: String,
    /// Explicit window end, `%Y/%m/%d`.
    pub end_date: String,
}

/// Download destination and filters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Root directory for all downloaded files.
    pub root: PathBuf,
    /// Attachment extension allow-list, compared case-insensitively.
    pub file_types: Vec<String>,
    /// Whether to write the `<id>_content.txt` body file per message.
    pub content: bool,
    /// Maximum messages to newly process per run.
    pub limit: usize,
}

/// Subject-keyword folder routing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Ordered `"keyword:folder"` rules; the first keyword found in a
    /// subject (case-insensitive) wins. Malformed entries are skipped.
    pub rules: Vec<String>,
}

/// Processed-id ledger location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Path of the append-only processed-id file.
    pub path: PathBuf,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override directory for the daily-rolling log file.
    pub log_dir: Option<PathBuf>,
    /// Write a daily-rolling log file in addition to stderr.
    pub log_to_file: bool,
}

// ── Default implementations ─────────────────────────────────────

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            subjects: Vec::new(),
            date_range: String::new(),
            start_date: String::new(),
            end_date: String::new(),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./downloads"),
            file_types: vec![
                "pdf".to_string(),
                "xls".to_string(),
                "xlsx".to_string(),
                "csv".to_string(),
            ],
            content: true,
            limit: 10,
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("already_parsed_mails.txt"),
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            log_dir: None,
            log_to_file: false,
        }
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration.
///
/// An explicitly given path must exist and parse; anything else is a hard
/// error. Without an explicit path the standard locations are searched and
/// a missing or unparseable file falls back to defaults with a warning.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    if let Some(path) = explicit {
        let contents =
            std::fs::read_to_string(path).map_err(|e| HarvestError::io(path, e))?;
        let cfg: Config = toml::from_str(&contents).map_err(|e| {
            HarvestError::Config(format!("{}: {e}", path.display()))
        })?;
        tracing::info!(path = %path.display(), "Loaded config");
        return Ok(cfg);
    }

    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return Ok(cfg);
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Ok(Config::default())
}

/// Determine the config file path (env var, working directory, then
/// standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    // 1. Environment variable override
    if let Ok(env_path) = std::env::var("MAILHARVEST_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    // 2. Working directory
    let local = PathBuf::from("mailharvest.toml");
    if local.exists() {
        return Some(local);
    }

    // 3. Standard config directory
    dirs::config_dir().map(|d| d.join("mailharvest").join("config.toml"))
}

/// Return the directory for the daily-rolling log file.
pub fn log_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.log_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailharvest")
}
