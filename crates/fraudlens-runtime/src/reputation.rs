//! IP reputation providers
//!
//! The geolocation analyzer asks an [`IpReputationProvider`] about the
//! transaction's IP address. Two adapters are provided: a static table for
//! tests and offline use, and an HTTP client for a JSON lookup service.

use crate::error::{Result, RuntimeError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Reputation and network classification of an IP address
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpReputation {
    pub ip: String,
    /// Risk score in [0, 100], higher is worse
    pub score: f64,
    pub is_malicious: bool,
    pub is_malware: bool,
    pub is_vpn: bool,
    pub is_proxy: bool,
    pub is_tor: bool,
    pub is_datacenter: bool,
    /// Country the IP resolves to (ISO code)
    pub country: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl IpReputation {
    /// Create a neutral record for an IP
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            ..Default::default()
        }
    }

    /// Set the score
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }

    /// Set the resolved location
    pub fn located(mut self, country: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        self.country = Some(country.into());
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    /// Resolved coordinates as (latitude, longitude)
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

/// Source of IP reputation data
#[async_trait]
pub trait IpReputationProvider: Send + Sync {
    /// Look up an IP; `None` when the provider knows nothing about it
    async fn lookup(&self, ip: &str) -> Result<Option<IpReputation>>;
}

/// Provider backed by a fixed table
#[derive(Debug, Clone, Default)]
pub struct StaticReputationProvider {
    entries: HashMap<String, IpReputation>,
}

impl StaticReputationProvider {
    /// Create an empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry keyed by its IP
    pub fn with_entry(mut self, reputation: IpReputation) -> Self {
        self.entries.insert(reputation.ip.clone(), reputation);
        self
    }

    /// Add an entry keyed by its IP
    pub fn insert(&mut self, reputation: IpReputation) {
        self.entries.insert(reputation.ip.clone(), reputation);
    }
}

#[async_trait]
impl IpReputationProvider for StaticReputationProvider {
    async fn lookup(&self, ip: &str) -> Result<Option<IpReputation>> {
        Ok(self.entries.get(ip).cloned())
    }
}

/// Provider calling a JSON lookup service at `GET {base_url}/{ip}`
///
/// A 404 response means "unknown IP"; other non-success statuses are errors.
pub struct HttpReputationProvider {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpReputationProvider {
    /// Create a provider with a request timeout
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                RuntimeError::ExternalCallFailed(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            client,
        })
    }

    /// Send `Authorization: Bearer <key>` with every request
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

#[async_trait]
impl IpReputationProvider for HttpReputationProvider {
    async fn lookup(&self, ip: &str) -> Result<Option<IpReputation>> {
        let url = format!("{}/{}", self.base_url, ip);
        debug!("Looking up IP reputation: {}", url);

        let mut request = self.client.get(&url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RuntimeError::ExternalCallFailed(format!("HTTP request failed: {}", e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(RuntimeError::ExternalCallFailed(format!(
                "Reputation lookup failed with status: {}",
                response.status()
            )));
        }

        let mut reputation: IpReputation = response
            .json()
            .await
            .map_err(|e| RuntimeError::ExternalCallFailed(format!("Failed to parse JSON: {}", e)))?;
        if reputation.ip.is_empty() {
            reputation.ip = ip.to_string();
        }

        Ok(Some(reputation))
    }
}
