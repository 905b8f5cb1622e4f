//! Configuration for shelfsync paths and import limits.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (SHELFSYNC_HOME, SHELFSYNC_DB)
//! 2. Config file (.shelfsync/config.yaml)
//! 3. Defaults (~/.shelfsync)
//!
//! Config file discovery:
//! - Searches current directory and parents for .shelfsync/config.yaml
//! - Paths in config file are relative to the .shelfsync/ directory
//!
//! Remote credentials (TWITCH_CLIENT_ID, TWITCH_CLIENT_SECRET, STEAM_API_KEY)
//! are only ever read from the environment.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::ImportLimits;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub import: Option<ImportLimits>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Engine state directory (relative to .shelfsync/)
    pub home: Option<String>,
    /// Library database file (relative to .shelfsync/)
    pub database: Option<String>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Engine state directory (run logs)
    pub home: PathBuf,
    /// SQLite library database
    pub database: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    /// Import tunables
    pub limits: ImportLimits,
}

impl ResolvedConfig {
    pub fn runs_dir(&self) -> PathBuf {
        self.home.join("runs")
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".shelfsync").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to `base`
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Merge the config file (if any) with env overrides and defaults
fn resolve(
    default_home: PathBuf,
    config_file: Option<PathBuf>,
    file: Option<ConfigFile>,
    env_home: Option<String>,
    env_db: Option<String>,
) -> ResolvedConfig {
    let file_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .unwrap_or(Path::new("."));
    let paths = file.as_ref().map(|f| f.paths.clone()).unwrap_or_default();

    let home = match (env_home, paths.home) {
        (Some(env_home), _) => PathBuf::from(env_home),
        (None, Some(ref home)) => resolve_path(file_dir, home),
        (None, None) => default_home,
    };

    let database = match (env_db, paths.database) {
        (Some(env_db), _) => PathBuf::from(env_db),
        (None, Some(ref db)) => resolve_path(file_dir, db),
        (None, None) => home.join("library.db"),
    };

    let limits = file.and_then(|f| f.import).unwrap_or_default();

    ResolvedConfig {
        home,
        database,
        config_file,
        limits,
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".shelfsync");

    let config_file = find_config_file();
    let file = match config_file {
        Some(ref path) => Some(load_config_file(path)?),
        None => None,
    };

    Ok(resolve(
        default_home,
        config_file,
        file,
        std::env::var("SHELFSYNC_HOME").ok(),
        std::env::var("SHELFSYNC_DB").ok(),
    ))
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Get the runs directory ($SHELFSYNC_HOME/runs)
pub fn runs_dir() -> Result<PathBuf> {
    Ok(config()?.runs_dir())
}

/// Get the library database path
pub fn database_path() -> Result<PathBuf> {
    Ok(config()?.database.clone())
}

/// Get the configured import limits
pub fn import_limits() -> Result<ImportLimits> {
    Ok(config()?.limits.clone())
}
