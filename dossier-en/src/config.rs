//! Configuration resolution for dossier-en
//!
//! Provider API keys resolve with ENV → TOML priority: an environment
//! variable always wins over the config file, and finding a key in both
//! places logs a warning so a stale file doesn't mask a rotated key.

use dossier_common::config::TomlConfig;
use tracing::{info, warn};

/// Resolved provider credentials for one process lifetime
#[derive(Debug, Clone, Default)]
pub struct ProviderKeys {
    pub directory: Option<String>,
    pub websearch: Option<String>,
    pub graph: Option<String>,
    pub analysis: Option<String>,
}

/// Resolve every provider key from ENV → TOML
pub fn resolve_provider_keys(toml_config: &TomlConfig) -> ProviderKeys {
    ProviderKeys {
        directory: resolve_api_key(
            "directory",
            "DOSSIER_DIRECTORY_API_KEY",
            toml_config.directory_api_key.as_deref(),
        ),
        websearch: resolve_api_key(
            "websearch",
            "DOSSIER_WEBSEARCH_API_KEY",
            toml_config.websearch_api_key.as_deref(),
        ),
        graph: resolve_api_key(
            "graph",
            "DOSSIER_GRAPH_API_KEY",
            toml_config.graph_api_key.as_deref(),
        ),
        analysis: resolve_api_key(
            "analysis",
            "DOSSIER_ANALYSIS_API_KEY",
            toml_config.analysis_api_key.as_deref(),
        ),
    }
}

/// Resolve one API key from ENV → TOML
///
/// A provider with no key anywhere is simply absent from runs; that is not
/// an error here.
pub fn resolve_api_key(
    provider: &str,
    env_var_name: &str,
    toml_key: Option<&str>,
) -> Option<String> {
    let env_key = std::env::var(env_var_name).ok().filter(|k| is_valid_key(k));
    let toml_key = toml_key.filter(|k| is_valid_key(k)).map(|k| k.to_string());

    if env_key.is_some() && toml_key.is_some() {
        warn!(
            provider,
            "API key found in both environment and TOML; using environment (highest priority)"
        );
    }

    if let Some(key) = env_key {
        info!(provider, "API key loaded from environment variable");
        return Some(key);
    }

    if let Some(key) = toml_key {
        info!(provider, "API key loaded from TOML config");
        return Some(key);
    }

    info!(provider, "No API key configured; provider disabled");
    None
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_is_valid_key() {
        assert!(is_valid_key("abc123"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("   "));
    }

    #[test]
    #[serial]
    fn test_env_beats_toml() {
        std::env::set_var("DOSSIER_TEST_KEY_A", "from-env");
        let resolved = resolve_api_key("test", "DOSSIER_TEST_KEY_A", Some("from-toml"));
        assert_eq!(resolved.as_deref(), Some("from-env"));
        std::env::remove_var("DOSSIER_TEST_KEY_A");
    }

    #[test]
    #[serial]
    fn test_toml_used_when_env_absent() {
        std::env::remove_var("DOSSIER_TEST_KEY_B");
        let resolved = resolve_api_key("test", "DOSSIER_TEST_KEY_B", Some("from-toml"));
        assert_eq!(resolved.as_deref(), Some("from-toml"));
    }

    #[test]
    #[serial]
    fn test_blank_keys_are_ignored() {
        std::env::set_var("DOSSIER_TEST_KEY_C", "   ");
        let resolved = resolve_api_key("test", "DOSSIER_TEST_KEY_C", Some(""));
        assert!(resolved.is_none());
        std::env::remove_var("DOSSIER_TEST_KEY_C");
    }
}
