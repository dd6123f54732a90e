//! Configuration for the triage engine.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (TRIAGE_LOG_ROOT, TRIAGE_ANNOTATION_ROOT,
//!    TRIAGE_ORACLE_URL, TRIAGE_ORACLE_MODEL)
//! 2. Config file (.triage/config.yaml)
//! 3. Defaults
//!
//! Config file discovery:
//! - Searches current directory and parents for .triage/config.yaml
//! - Relative paths in the config file are resolved against the project
//!   root (the directory holding .triage/)

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::adapters::ollama::{DEFAULT_ENDPOINT, DEFAULT_MODEL};
use crate::core::TriageLimits;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Default log root (where the pipeline engine writes attempt logs)
pub const DEFAULT_LOG_ROOT: &str = "/opt/airflow/logs";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub oracle: Option<OracleConfig>,
    #[serde(default)]
    pub limits: Option<TriageLimits>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Root of the per-attempt log tree
    pub log_root: Option<String>,
    /// Root of the annotation tree
    pub annotation_root: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OracleConfig {
    pub endpoint: Option<String>,
    pub model: Option<String>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Root of the per-attempt log tree
    pub log_root: PathBuf,
    /// Root of the annotation tree
    pub annotation_root: PathBuf,
    /// Oracle connection settings
    pub oracle: OracleSettings,
    /// Per-invocation bounds
    pub limits: TriageLimits,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleSettings {
    pub endpoint: String,
    pub model: String,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".triage").join("config.yaml");
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

/// Resolve a path that may be relative to the project root
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Merge file settings, environment and defaults.
///
/// `env` looks up a variable by name; `home` is the user's home directory.
fn resolve_config(
    file: Option<(&Path, ConfigFile)>,
    env: impl Fn(&str) -> Option<String>,
    home: Option<PathBuf>,
) -> Result<ResolvedConfig> {
    let (config_file, parsed) = match file {
        Some((path, parsed)) => (Some(path.to_path_buf()), Some(parsed)),
        None => (None, None),
    };

    // Base directory is the parent of .triage/ (i.e., grandparent of config.yaml)
    let base_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .and_then(Path::parent)
        .unwrap_or(Path::new("."))
        .to_path_buf();

    let paths = parsed.as_ref().map(|c| c.paths.clone()).unwrap_or_default();

    let log_root = match (env("TRIAGE_LOG_ROOT"), paths.log_root) {
        (Some(env_root), _) => PathBuf::from(env_root),
        (None, Some(root)) => resolve_path(&base_dir, &root),
        (None, None) => PathBuf::from(DEFAULT_LOG_ROOT),
    };

    let annotation_root = match (env("TRIAGE_ANNOTATION_ROOT"), paths.annotation_root) {
        (Some(env_root), _) => PathBuf::from(env_root),
        (None, Some(root)) => resolve_path(&base_dir, &root),
        (None, None) => home
            .context("Failed to determine home directory")?
            .join(".triage")
            .join("annotations"),
    };

    let file_oracle = parsed.as_ref().and_then(|c| c.oracle.clone());
    let defaults = OracleSettings::default();
    let oracle = OracleSettings {
        endpoint: env("TRIAGE_ORACLE_URL")
            .or_else(|| file_oracle.as_ref().and_then(|o| o.endpoint.clone()))
            .unwrap_or(defaults.endpoint),
        model: env("TRIAGE_ORACLE_MODEL")
            .or_else(|| file_oracle.as_ref().and_then(|o| o.model.clone()))
            .unwrap_or(defaults.model),
    };

    let limits = parsed.and_then(|c| c.limits).unwrap_or_default();

    Ok(ResolvedConfig {
        log_root,
        annotation_root,
        oracle,
        limits,
        config_file,
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let file = match find_config_file() {
        Some(path) => {
            let parsed = load_config_file(&path)?;
            Some((path, parsed))
        }
        None => None,
    };

    resolve_config(
        file.as_ref().map(|(path, parsed)| (path.as_path(), parsed.clone())),
        |name| std::env::var(name).ok(),
        dirs::home_dir(),
    )
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}
