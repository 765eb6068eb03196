//! Device fingerprint analysis
//!
//! Derives a stable fingerprint from client-reported attributes, scores the
//! device from its transaction history and flags bot-like characteristics.

use crate::error::{Result, RuntimeError};
use crate::storage::{HistoryDimension, TransactionFilter, TransactionHistory};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use fraudlens_core::{DeviceAttributes, FraudSignal, Transaction, Value};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Length of the hex fingerprint
pub const FINGERPRINT_LEN: usize = 32;

const BOT_MARKERS: &[&str] = &[
    "bot", "crawler", "spider", "curl", "wget", "python-requests", "httpclient", "okhttp",
    "go-http-client", "libwww",
];
const HEADLESS_MARKERS: &[&str] = &["headlesschrome", "phantomjs", "slimerjs"];
const AUTOMATION_MARKERS: &[&str] = &["selenium", "puppeteer", "playwright", "webdriver"];

/// Device analyzer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// How far back device history is read
    pub reputation_lookback_days: u32,
    /// More distinct users than this marks a shared device
    pub shared_device_user_threshold: usize,
    /// Fraud rate above which a device is high risk
    pub fraud_rate_threshold: f64,
    /// Devices younger than this are new
    pub new_device_hours: u32,
    /// More transactions than this on a new device is high activity
    pub new_device_activity_threshold: usize,
    pub malicious_threshold: f64,
    pub suspicious_threshold: f64,
    pub neutral_threshold: f64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            reputation_lookback_days: 90,
            shared_device_user_threshold: 3,
            fraud_rate_threshold: 0.10,
            new_device_hours: 24,
            new_device_activity_threshold: 10,
            malicious_threshold: 70.0,
            suspicious_threshold: 40.0,
            neutral_threshold: 15.0,
        }
    }
}

impl DeviceConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.reputation_lookback_days == 0 {
            return Err(RuntimeError::InvalidConfig(
                "device.reputation_lookback_days must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.fraud_rate_threshold) {
            return Err(RuntimeError::InvalidConfig(
                "device.fraud_rate_threshold must be within 0-1".to_string(),
            ));
        }
        if !(self.neutral_threshold < self.suspicious_threshold
            && self.suspicious_threshold < self.malicious_threshold)
        {
            return Err(RuntimeError::InvalidConfig(
                "device classification thresholds must be strictly increasing".to_string(),
            ));
        }
        Ok(())
    }
}

/// Device reputation class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClassification {
    Good,
    Neutral,
    Suspicious,
    Malicious,
}

impl fmt::Display for DeviceClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeviceClassification::Good => "good",
            DeviceClassification::Neutral => "neutral",
            DeviceClassification::Suspicious => "suspicious",
            DeviceClassification::Malicious => "malicious",
        };
        f.write_str(s)
    }
}

/// Reputation of a device derived from its history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceReputation {
    pub fingerprint: String,
    /// Internal score in [0, 100]
    pub score: f64,
    pub classification: DeviceClassification,
    pub unique_users: usize,
    pub transaction_count: usize,
    pub fraud_rate: f64,
    pub first_seen: Option<DateTime<Utc>>,
    /// Young device with many transactions
    pub new_high_activity: bool,
}

/// Outcome of analyzing one transaction's device
#[derive(Debug, Clone, Default)]
pub struct DeviceAnalysis {
    /// Reported fingerprint, or one derived from the attributes
    pub fingerprint: Option<String>,
    pub reputation: Option<DeviceReputation>,
    pub signals: Vec<FraudSignal>,
}

/// Compute the fingerprint of an attribute set
pub fn compute_fingerprint(device: &DeviceAttributes) -> String {
    let mut plugins = device.plugins.clone();
    plugins.sort();
    let mut fonts = device.fonts.clone();
    fonts.sort();

    let flag = |v: Option<bool>| v.map(|b| b.to_string()).unwrap_or_default();
    let text = |v: &Option<String>| v.clone().unwrap_or_default();

    let canonical = [
        text(&device.user_agent),
        text(&device.screen_resolution),
        text(&device.timezone),
        text(&device.language),
        text(&device.platform),
        flag(device.cookies_enabled),
        flag(device.java_enabled),
        plugins.join(","),
        fonts.join(","),
        text(&device.canvas_hash),
        text(&device.webgl_hash),
        text(&device.audio_hash),
    ]
    .join("|");

    let digest = format!("{:x}", Sha256::digest(canonical.as_bytes()));
    digest[..FINGERPRINT_LEN].to_string()
}

/// Device fingerprint analyzer
pub struct DeviceAnalyzer {
    history: Arc<dyn TransactionHistory>,
    config: DeviceConfig,
}

impl DeviceAnalyzer {
    pub fn new(history: Arc<dyn TransactionHistory>, config: DeviceConfig) -> Self {
        Self { history, config }
    }

    /// Reported fingerprint, else one derived from the device attributes
    pub fn resolve_fingerprint(tx: &Transaction) -> Option<String> {
        tx.metadata
            .device_fingerprint
            .clone()
            .filter(|fp| !fp.trim().is_empty())
            .or_else(|| tx.metadata.device.as_ref().map(compute_fingerprint))
    }

    /// Analyze the device of a transaction
    pub async fn analyze(&self, tx: &Transaction) -> Result<DeviceAnalysis> {
        let mut analysis = DeviceAnalysis {
            fingerprint: Self::resolve_fingerprint(tx),
            ..Default::default()
        };

        match &analysis.fingerprint {
            Some(fingerprint) => match self.reputation(fingerprint, tx).await {
                Ok(reputation) => {
                    analysis.signals.extend(self.reputation_signals(&reputation));
                    analysis.reputation = Some(reputation);
                }
                Err(e) => {
                    warn!(fingerprint = %fingerprint, error = %e, "Device history query failed")
                }
            },
            None => analysis.signals.push(FraudSignal::new(
                "device_missing_fingerprint",
                15.0,
                "No device fingerprint or attributes reported",
            )),
        }

        if let Some(device) = &tx.metadata.device {
            analysis.signals.extend(characteristic_signals(device));
        }

        debug!(
            transaction_id = %tx.id,
            fingerprint = ?analysis.fingerprint,
            count = analysis.signals.len(),
            "Device analysis complete"
        );
        Ok(analysis)
    }

    /// Reputation of a device from its history, relative to the transaction time
    pub async fn reputation(&self, fingerprint: &str, tx: &Transaction) -> Result<DeviceReputation> {
        let since = tx.created_at - ChronoDuration::days(i64::from(self.config.reputation_lookback_days));
        let filter = TransactionFilter::for_dimension(HistoryDimension::Device(fingerprint.to_string()))
            .since(since)
            .excluding(tx.id.clone());
        let records = self.history.find_transactions(&filter).await?;

        let mut users: HashSet<&str> = records.iter().filter_map(|r| r.user_id.as_deref()).collect();
        if let Some(user) = tx.user_id.as_deref() {
            users.insert(user);
        }

        let transaction_count = records.len();
        let flagged = records.iter().filter(|r| r.flagged_fraud).count();
        let fraud_rate = if transaction_count == 0 {
            0.0
        } else {
            flagged as f64 / transaction_count as f64
        };
        let first_seen = records.iter().map(|r| r.created_at).min();

        let new_high_activity = self.is_new_and_busy(first_seen, transaction_count, tx.created_at);

        let mut score: f64 = 0.0;
        if users.len() > self.config.shared_device_user_threshold {
            score += 30.0;
        }
        if fraud_rate > self.config.fraud_rate_threshold {
            score += 40.0;
        }
        if new_high_activity {
            score += 25.0;
        }
        let score = score.min(100.0);

        Ok(DeviceReputation {
            fingerprint: fingerprint.to_string(),
            score,
            classification: self.classify(score),
            unique_users: users.len(),
            transaction_count,
            fraud_rate,
            first_seen,
            new_high_activity,
        })
    }

    fn is_new_and_busy(
        &self,
        first_seen: Option<DateTime<Utc>>,
        transaction_count: usize,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(first_seen) = first_seen else {
            return false;
        };
        now - first_seen < ChronoDuration::hours(i64::from(self.config.new_device_hours))
            && transaction_count > self.config.new_device_activity_threshold
    }

    fn classify(&self, score: f64) -> DeviceClassification {
        if score >= self.config.malicious_threshold {
            DeviceClassification::Malicious
        } else if score >= self.config.suspicious_threshold {
            DeviceClassification::Suspicious
        } else if score >= self.config.neutral_threshold {
            DeviceClassification::Neutral
        } else {
            DeviceClassification::Good
        }
    }

    fn reputation_signals(&self, rep: &DeviceReputation) -> Vec<FraudSignal> {
        let mut signals = Vec::new();

        if rep.unique_users > self.config.shared_device_user_threshold {
            signals.push(
                FraudSignal::new(
                    "device_shared",
                    20.0,
                    format!("Device used by {} distinct users", rep.unique_users),
                )
                .with_value(rep.unique_users),
            );
        }
        if rep.fraud_rate > self.config.fraud_rate_threshold {
            signals.push(
                FraudSignal::new(
                    "device_high_fraud_rate",
                    35.0,
                    format!("{:.0}% of the device's transactions were fraudulent", rep.fraud_rate * 100.0),
                )
                .with_value(rep.fraud_rate),
            );
        }
        if rep.new_high_activity {
            signals.push(
                FraudSignal::new(
                    "device_new_high_activity",
                    20.0,
                    format!("New device with {} transactions", rep.transaction_count),
                )
                .with_value(rep.transaction_count),
            );
        }

        let payload = Value::object([
            ("score", Value::from(rep.score)),
            ("classification", Value::from(rep.classification.to_string())),
        ]);
        match rep.classification {
            DeviceClassification::Malicious => signals.push(
                FraudSignal::new("device_malicious", 50.0, "Device reputation is malicious")
                    .with_value(payload),
            ),
            DeviceClassification::Suspicious => signals.push(
                FraudSignal::new("device_suspicious", 30.0, "Device reputation is suspicious")
                    .with_value(payload),
            ),
            DeviceClassification::Neutral | DeviceClassification::Good => {}
        }

        signals
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Operating system family named by a user agent or platform string
fn os_family(raw: &str) -> Option<&'static str> {
    let raw = raw.to_lowercase();
    if raw.contains("iphone") || raw.contains("ipad") || raw.contains("ios") {
        Some("ios")
    } else if raw.contains("android") {
        Some("android")
    } else if contains_any(&raw, &["windows", "win32", "win64"]) {
        Some("windows")
    } else if raw.contains("mac") || raw.contains("darwin") {
        Some("mac")
    } else if raw.contains("linux") || raw.contains("x11") {
        Some("linux")
    } else {
        None
    }
}

fn characteristic_signals(device: &DeviceAttributes) -> Vec<FraudSignal> {
    let mut signals = Vec::new();
    let ua = device.user_agent.as_deref().unwrap_or("").to_lowercase();

    if ua.trim().is_empty() || contains_any(&ua, BOT_MARKERS) {
        signals.push(
            FraudSignal::new("device_suspicious_user_agent", 25.0, "User agent is missing or bot-like")
                .with_value(device.user_agent.clone()),
        );
    }

    if contains_any(&ua, HEADLESS_MARKERS) {
        signals.push(FraudSignal::new(
            "device_headless_browser",
            40.0,
            "Headless browser detected",
        ));
    }

    if device.webdriver == Some(true) || contains_any(&ua, AUTOMATION_MARKERS) {
        signals.push(FraudSignal::new(
            "device_automation",
            45.0,
            "Browser automation detected",
        ));
    }

    if let (Some(ua_os), Some(platform_os)) = (
        os_family(&ua),
        device.platform.as_deref().and_then(os_family),
    ) {
        // Android reports a Linux platform
        let compatible = ua_os == platform_os || (ua_os == "android" && platform_os == "linux");
        if !compatible {
            signals.push(
                FraudSignal::new(
                    "device_inconsistent_attributes",
                    20.0,
                    format!("User agent reports {} but platform reports {}", ua_os, platform_os),
                )
                .with_value(Value::object([
                    ("user_agent_os", Value::from(ua_os)),
                    ("platform_os", Value::from(platform_os)),
                ])),
            );
        }
    }

    if device.screen_resolution.is_some() {
        let unusual = match device.resolution() {
            Some((w, h)) => !(320..=7680).contains(&w) || !(240..=4320).contains(&h),
            None => true,
        };
        if unusual {
            signals.push(
                FraudSignal::new("device_unusual_resolution", 10.0, "Unusual screen resolution")
                    .with_value(device.screen_resolution.clone()),
            );
        }
    }

    signals
}
