use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::apollo::ApolloConfig;
use crate::enrichment::EnrichmentSettings;

/// Environment variable that overrides `apollo.apiKey`.
pub const API_KEY_ENV: &str = "APOLLO_API_KEY";

/// Contents of `~/.contact-enrichment/config.json`.
///
/// Every section and field is optional; missing values take their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub apollo: ApolloConfig,
    #[serde(default)]
    pub enrichment: EnrichmentSettings,
    /// Overrides the default database location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
}

/// Resolve the default config path: `~/.contact-enrichment/config.json`.
pub fn config_path() -> Result<PathBuf, String> {
    let home = dirs::home_dir().ok_or("Could not find home directory")?;
    Ok(home.join(".contact-enrichment").join("config.json"))
}

/// Load config from the default path, applying the environment override.
///
/// A missing file is not an error: defaults apply and the API key may still
/// come from the environment.
pub fn load_config() -> Result<Config, String> {
    let path = config_path()?;
    let mut config = if path.exists() {
        load_config_from(&path)?
    } else {
        log::debug!("No config at {}, using defaults", path.display());
        Config::default()
    };
    apply_api_key_override(&mut config, std::env::var(API_KEY_ENV).ok());
    Ok(config)
}

/// Load and validate config from an explicit path.
pub fn load_config_from(path: &Path) -> Result<Config, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config {}: {}", path.display(), e))?;
    let config: Config =
        serde_json::from_str(&content).map_err(|e| format!("Failed to parse config: {}", e))?;
    config.enrichment.validate()?;
    Ok(config)
}

/// A non-blank environment value wins over the file.
pub fn apply_api_key_override(config: &mut Config, env_value: Option<String>) {
    if let Some(key) = env_value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        config.apollo.api_key = Some(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(json: &str) -> PathBuf {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::mem::forget(dir);
        fs::write(&path, json).expect("write config");
        path
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = load_config_from(&write_config("{}")).expect("load");
        assert_eq!(config.enrichment, EnrichmentSettings::default());
        assert_eq!(config.apollo.request_timeout_secs, 30);
        assert!(config.apollo.api_key.is_none());
        assert!(config.database_path.is_none());
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let config = load_config_from(&write_config(
            r#"{ "apollo": { "apiKey": "k-123" }, "enrichment": { "throttleMs": 500 } }"#,
        ))
        .expect("load");
        assert_eq!(config.apollo.api_key.as_deref(), Some("k-123"));
        assert_eq!(config.apollo.base_url, "https://api.apollo.io/api/v1");
        assert_eq!(config.enrichment.throttle_ms, 500);
        assert_eq!(config.enrichment.staleness_days, 7);
    }

    #[test]
    fn test_invalid_thresholds_are_rejected() {
        let err = load_config_from(&write_config(
            r#"{ "enrichment": { "stalenessDays": 1, "retryCooldownHours": 48 } }"#,
        ))
        .expect_err("cooldown longer than staleness");
        assert!(err.contains("retryCooldownHours"));
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        let err = load_config_from(&write_config("{ not json")).expect_err("parse error");
        assert!(err.starts_with("Failed to parse config"));
    }

    #[test]
    fn test_env_override() {
        let mut config = Config::default();
        config.apollo.api_key = Some("from-file".to_string());

        apply_api_key_override(&mut config, Some("   ".to_string()));
        assert_eq!(config.apollo.api_key.as_deref(), Some("from-file"));

        apply_api_key_override(&mut config, Some("from-env".to_string()));
        assert_eq!(config.apollo.api_key.as_deref(), Some("from-env"));
    }
}
