//! FraudLens command line front end
//!
//! Wires a [`fraudlens_sdk::FraudDetector`] from settings and local files.

pub mod config;
pub mod loader;

use crate::config::CliSettings;
use anyhow::{Context, Result};
use fraudlens_runtime::HttpReputationProvider;
use fraudlens_sdk::{FraudConfig, FraudDetector, FraudDetectorBuilder, InMemoryTransactionHistory};
use std::sync::Arc;
use std::time::Duration;

/// Reputation request timeout when none is configured
const DEFAULT_REPUTATION_TIMEOUT_MS: u64 = 2000;

/// Read the FraudLens configuration named by the settings, or the defaults
pub fn load_fraud_config(settings: &CliSettings) -> Result<FraudConfig> {
    match &settings.fraud_config {
        Some(path) => FraudConfig::from_yaml_file(path)
            .with_context(|| format!("Invalid FraudLens configuration {}", path.display())),
        None => Ok(FraudConfig::default()),
    }
}

/// Build a detector from the settings
pub async fn build_detector(settings: &CliSettings) -> Result<FraudDetector> {
    let config = load_fraud_config(settings)?;
    let mut builder = FraudDetectorBuilder::new().with_config(config);

    if let Some(dir) = &settings.rules_dir {
        builder = builder.with_rules_dir(dir);
    }

    if let Some(dir) = &settings.lists_dir {
        builder = builder.with_list_checker(Arc::new(loader::load_lists(dir).await?));
    }

    let history = match &settings.history_file {
        Some(path) => InMemoryTransactionHistory::with_records(loader::load_history(path)?),
        None => InMemoryTransactionHistory::new(),
    };
    builder = builder.with_transaction_history(Arc::new(history));

    if let Some(url) = &settings.reputation_url {
        let timeout = Duration::from_millis(
            settings
                .reputation_timeout_ms
                .unwrap_or(DEFAULT_REPUTATION_TIMEOUT_MS),
        );
        let mut provider = HttpReputationProvider::new(url.clone(), timeout)?;
        if let Some(key) = &settings.reputation_api_key {
            provider = provider.with_api_key(key.clone());
        }
        builder = builder.with_reputation_provider(Arc::new(provider));
    }

    Ok(builder.build().await?)
}
