//! Configuration types for FraudDetector
//!
//! Every section has defaults, so an empty YAML document is a valid
//! configuration. Loading always validates.

use crate::error::{Result, SdkError};
use fraudlens_runtime::{
    BehavioralConfig, DeviceConfig, GeolocationConfig, RulesConfig, ScoringConfig, VelocityConfig,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Orchestration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Time budget of each signal generator, in milliseconds
    pub generator_timeout_ms: u64,
    /// Store every assessment in the assessment store
    pub record_assessments: bool,
    /// Add each assessed transaction to the transaction history
    pub record_transactions: bool,
    /// Prior user assessments read for scoring adjustments
    pub user_history_limit: usize,
    /// Prior merchant assessments read for scoring adjustments
    pub merchant_history_limit: usize,
    /// Window of the signal frequency boost, in hours
    pub signal_frequency_window_hours: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            generator_timeout_ms: 2000,
            record_assessments: true,
            record_transactions: false,
            user_history_limit: 50,
            merchant_history_limit: 100,
            signal_frequency_window_hours: 24,
        }
    }
}

impl DetectorConfig {
    pub fn generator_timeout(&self) -> Duration {
        Duration::from_millis(self.generator_timeout_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.generator_timeout_ms == 0 {
            return Err(SdkError::ConfigError(
                "detector.generator_timeout_ms must be positive".to_string(),
            ));
        }
        if self.signal_frequency_window_hours == 0 {
            return Err(SdkError::ConfigError(
                "detector.signal_frequency_window_hours must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Complete FraudLens configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FraudConfig {
    pub velocity: VelocityConfig,
    pub geolocation: GeolocationConfig,
    pub device: DeviceConfig,
    pub behavioral: BehavioralConfig,
    pub scoring: ScoringConfig,
    pub rules: RulesConfig,
    pub detector: DetectorConfig,
}

impl FraudConfig {
    /// Create a configuration with every default
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: FraudConfig = if yaml.trim().is_empty() {
            FraudConfig::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    /// Reject inconsistent settings
    pub fn validate(&self) -> Result<()> {
        self.velocity.validate()?;
        self.geolocation.validate()?;
        self.device.validate()?;
        self.behavioral.validate()?;
        self.scoring.validate()?;
        self.rules.validate()?;
        self.detector.validate()?;
        Ok(())
    }

    pub fn with_velocity(mut self, velocity: VelocityConfig) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_geolocation(mut self, geolocation: GeolocationConfig) -> Self {
        self.geolocation = geolocation;
        self
    }

    pub fn with_scoring(mut self, scoring: ScoringConfig) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn with_detector(mut self, detector: DetectorConfig) -> Self {
        self.detector = detector;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = FraudConfig::new();
        assert!(config.validate().is_ok());
        assert_eq!(config.detector.generator_timeout(), Duration::from_secs(2));
        assert_eq!(config.scoring.thresholds.high, 70.0);
    }

    #[test]
    fn test_empty_yaml_uses_defaults() {
        assert_eq!(FraudConfig::from_yaml_str("").unwrap(), FraudConfig::default());
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = r#"
geolocation:
  blacklisted_countries: [KP, IR]
  max_velocity_kmh: 900
scoring:
  thresholds:
    medium: 40
detector:
  generator_timeout_ms: 500
"#;
        let config = FraudConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.geolocation.blacklisted_countries, vec!["KP", "IR"]);
        assert_eq!(config.geolocation.max_velocity_kmh, 900.0);
        // Unspecified fields keep their defaults
        assert_eq!(config.geolocation.high_risk_ip_threshold, 75.0);
        assert_eq!(config.scoring.thresholds.medium, 40.0);
        assert_eq!(config.scoring.thresholds.critical, 90.0);
        assert_eq!(config.detector.generator_timeout_ms, 500);
    }

    #[test]
    fn test_non_increasing_levels_rejected() {
        let yaml = "scoring:\n  thresholds:\n    high: 40\n";
        assert!(FraudConfig::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_empty_velocity_windows_rejected() {
        let yaml = "velocity:\n  limits: []\n";
        assert!(FraudConfig::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_malformed_yaml() {
        let result = FraudConfig::from_yaml_str("scoring: [unclosed");
        assert!(matches!(result, Err(SdkError::YamlError(_))));
    }

    #[test]
    fn test_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fraudlens.yaml");
        std::fs::write(&path, "detector:\n  record_transactions: true\n").unwrap();

        let config = FraudConfig::from_yaml_file(&path).unwrap();
        assert!(config.detector.record_transactions);

        assert!(matches!(
            FraudConfig::from_yaml_file(dir.path().join("missing.yaml")),
            Err(SdkError::IoError(_))
        ));
    }
}
