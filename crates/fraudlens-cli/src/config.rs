//! CLI settings

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Where the CLI finds its inputs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliSettings {
    /// FraudLens YAML configuration; defaults apply when unset
    pub fraud_config: Option<PathBuf>,

    /// Directory of rule YAML files
    pub rules_dir: Option<PathBuf>,

    /// Directory of list files named `<blacklist|whitelist>_<kind>.txt`
    pub lists_dir: Option<PathBuf>,

    /// JSON array of prior transactions
    pub history_file: Option<PathBuf>,

    /// Base URL of an IP reputation service
    pub reputation_url: Option<String>,

    /// API key sent to the reputation service
    pub reputation_api_key: Option<String>,

    /// Reputation request timeout in milliseconds
    pub reputation_timeout_ms: Option<u64>,

    pub log_format: LogFormat,
}

impl CliSettings {
    /// Load settings from `config/fraudlens.*` and `FRAUDLENS_*` environment variables
    pub fn load() -> anyhow::Result<Self> {
        // Load .env file if exists
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            .add_source(config::File::with_name("config/fraudlens").required(false))
            .add_source(config::Environment::with_prefix("FRAUDLENS"))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to read settings: {}", e))?;

        settings
            .try_deserialize()
            .map_err(|e| anyhow::anyhow!("Failed to deserialize settings: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_default() {
        let settings = CliSettings::default();

        assert!(settings.fraud_config.is_none());
        assert!(settings.rules_dir.is_none());
        assert!(settings.reputation_url.is_none());
        assert_eq!(settings.log_format, LogFormat::Text);
    }

    #[test]
    fn test_settings_from_yaml() {
        let settings: CliSettings = serde_yaml::from_str(
            "rules_dir: rules\nlog_format: json\nreputation_timeout_ms: 500\n",
        )
        .unwrap();

        assert_eq!(settings.rules_dir, Some(PathBuf::from("rules")));
        assert_eq!(settings.log_format, LogFormat::Json);
        assert_eq!(settings.reputation_timeout_ms, Some(500));
        assert!(settings.lists_dir.is_none());
    }
}
