//! Configuration loading and write-back
//!
//! TOML configuration with environment-variable overrides. The service reads
//! its config once at startup; settings changed at runtime are written back
//! to the TOML file on a best-effort basis.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Logging configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter ("trace", "debug", "info", "warn", "error")
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// TOML configuration file contents
///
/// All fields are optional so a partial file (or no file at all) still loads;
/// missing provider keys simply disable that provider for the run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// HTTP listen port (default 5731)
    pub port: Option<u16>,
    /// Logging section
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Business directory API key
    pub directory_api_key: Option<String>,
    /// Web search API key
    pub websearch_api_key: Option<String>,
    /// Professional graph API key
    pub graph_api_key: Option<String>,
    /// Analysis (LLM) API key
    pub analysis_api_key: Option<String>,
    /// Optional path to the sqlite result cache; absent disables caching
    pub cache_path: Option<String>,
}

/// Default configuration file path for the platform
///
/// Linux: `~/.config/dossier/dossier-en.toml`, falling back to
/// `/etc/dossier/dossier-en.toml` when no user config exists.
pub fn default_config_path() -> Result<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("dossier").join("dossier-en.toml"));

    if let Some(path) = user_config {
        if path.exists() {
            return Ok(path);
        }
        let system_config = PathBuf::from("/etc/dossier/dossier-en.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
        // Prefer the user path for creation even when it does not exist yet
        return Ok(path);
    }

    Err(Error::Config(
        "Could not determine config directory".to_string(),
    ))
}

/// Load TOML configuration from a path, tolerating a missing file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "No config file found, using defaults");
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    let config: TomlConfig =
        toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;

    tracing::info!(path = %path.display(), "Configuration loaded");
    Ok(config)
}

/// Write TOML configuration to a path
///
/// Writes to a temp file in the same directory, then renames over the target
/// so a crash mid-write never leaves a truncated config behind.
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::Config(format!("Create config dir failed: {}", e)))?;
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)
        .map_err(|e| Error::Config(format!("Write TOML failed: {}", e)))?;
    std::fs::rename(&tmp_path, path)
        .map_err(|e| Error::Config(format!("Rename TOML failed: {}", e)))?;

    Ok(())
}
