//! Behavioral profile definitions

use crate::types::Value;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Statistical baseline of a user's transaction behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehavioralProfile {
    pub user_id: String,
    pub transaction_patterns: TransactionPatterns,
    pub payment_patterns: PaymentPatterns,
    pub location_patterns: LocationPatterns,
    pub device_patterns: DevicePatterns,
    pub risk_metrics: RiskMetrics,
    /// Confidence in [0, 1]
    pub profile_confidence: f64,
    /// Number of transactions the profile was built from
    pub sample_size: usize,
    pub last_updated: DateTime<Utc>,
}

/// Amount and timing patterns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionPatterns {
    pub average_amount: f64,
    /// Amounts that occur at least twice
    pub common_amounts: Vec<f64>,
    pub average_per_day: f64,
    /// Contiguous hour-of-day ranges with repeated activity
    pub common_hours: Vec<HourWindow>,
    /// Weekdays with repeated activity, 0 = Monday
    pub common_weekdays: Vec<u32>,
    /// Up to three most used currencies
    pub preferred_currencies: Vec<String>,
    pub average_interval_minutes: f64,
}

/// Inclusive hour-of-day range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourWindow {
    pub start: u32,
    pub end: u32,
}

impl HourWindow {
    /// Returns true if the hour falls into the window
    pub fn contains(&self, hour: u32) -> bool {
        hour >= self.start && hour <= self.end
    }
}

/// Payment method patterns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentPatterns {
    /// Up to three most used payment methods
    pub preferred_methods: Vec<String>,
    pub distinct_methods: usize,
    /// Share of consecutive transactions that changed payment method
    pub method_switch_rate: f64,
}

/// Location patterns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationPatterns {
    pub common_countries: Vec<String>,
    pub common_cities: Vec<String>,
    /// Share of transactions from the most common country
    pub location_stability: f64,
    /// Share of consecutive transactions that changed country
    pub country_switch_rate: f64,
}

/// Device patterns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DevicePatterns {
    pub known_devices: Vec<String>,
    pub primary_device: Option<String>,
    /// Share of transactions from the primary device
    pub device_stability: f64,
    /// Distinct devices per transaction
    pub new_device_adoption_rate: f64,
}

/// Direction of the historical risk score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RiskTrend {
    Increasing,
    Decreasing,
    #[default]
    Stable,
}

/// Historical risk metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub average_risk_score: f64,
    pub risk_trend: RiskTrend,
    pub fraud_incidents: usize,
    pub last_fraud_at: Option<DateTime<Utc>>,
}

/// Anomaly severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalySeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AnomalySeverity {
    /// Base risk of an anomaly with this severity
    pub fn base_risk(&self) -> f64 {
        match self {
            AnomalySeverity::Low => 10.0,
            AnomalySeverity::Medium => 20.0,
            AnomalySeverity::High => 30.0,
            AnomalySeverity::Critical => 40.0,
        }
    }
}

/// Deviation of a transaction from the user's profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehavioralAnomaly {
    /// Axis tag, e.g. `amount_anomaly`
    pub anomaly_type: String,
    pub severity: AnomalySeverity,
    /// Normalized deviation; 1.0 means a full-strength deviation
    pub deviation: f64,
    /// Confidence in [0, 1]
    pub confidence: f64,
    pub description: String,
    pub expected: Value,
    pub observed: Value,
}

impl BehavioralAnomaly {
    /// Risk contribution: base risk x confidence x min(1, deviation)
    pub fn risk_contribution(&self) -> f64 {
        self.severity.base_risk() * self.confidence * self.deviation.clamp(0.0, 1.0)
    }
}
