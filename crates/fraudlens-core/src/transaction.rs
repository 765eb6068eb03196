//! Transaction definitions
//!
//! `Transaction` is the immutable input of an assessment. `TransactionSummary`
//! is the compact record returned by the transaction-history collaborator.

use crate::error::{CoreError, Result};
use crate::types::Value;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Payment transaction submitted for assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction ID
    pub id: String,

    /// Paying user, if known
    #[serde(default)]
    pub user_id: Option<String>,

    /// Amount in major currency units
    pub amount: Decimal,

    /// ISO currency code (or crypto ticker)
    pub currency: String,

    /// Payment method identifier
    #[serde(default)]
    pub payment_method_id: Option<String>,

    /// Creation time; the reference instant for every sliding window
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    /// Client and context metadata
    #[serde(default)]
    pub metadata: TransactionMetadata,
}

/// Transaction metadata collected by the client integration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionMetadata {
    #[serde(default)]
    pub ip_address: Option<String>,

    #[serde(default)]
    pub device_fingerprint: Option<String>,

    /// Raw device attributes, used to derive a fingerprint when none is reported
    #[serde(default)]
    pub device: Option<DeviceAttributes>,

    #[serde(default)]
    pub geolocation: Option<Geolocation>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub merchant_id: Option<String>,

    #[serde(default)]
    pub behavioral_metrics: Option<BehavioralMetrics>,

    /// Free-form integration fields, reachable from rules as `metadata.custom.*`
    #[serde(default)]
    pub custom: HashMap<String, Value>,
}

/// Reported geolocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Geolocation {
    pub country: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub is_vpn: Option<bool>,
    #[serde(default)]
    pub is_tor: Option<bool>,
}

impl Geolocation {
    /// Create a geolocation for a country
    pub fn new(country: impl Into<String>) -> Self {
        Self {
            country: country.into(),
            ..Default::default()
        }
    }

    /// Set the city
    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    /// Set the coordinates
    pub fn with_coordinates(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    /// Coordinates as (latitude, longitude), when both are present
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

/// Client-reported device attributes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceAttributes {
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Screen resolution formatted as `WIDTHxHEIGHT`
    #[serde(default)]
    pub screen_resolution: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub cookies_enabled: Option<bool>,
    #[serde(default)]
    pub java_enabled: Option<bool>,
    #[serde(default)]
    pub plugins: Vec<String>,
    #[serde(default)]
    pub fonts: Vec<String>,
    #[serde(default)]
    pub canvas_hash: Option<String>,
    #[serde(default)]
    pub webgl_hash: Option<String>,
    #[serde(default)]
    pub audio_hash: Option<String>,
    /// `navigator.webdriver` as reported by the browser
    #[serde(default)]
    pub webdriver: Option<bool>,
}

impl DeviceAttributes {
    /// Parse `screen_resolution` into (width, height)
    pub fn resolution(&self) -> Option<(u32, u32)> {
        let raw = self.screen_resolution.as_deref()?;
        let (w, h) = raw.split_once(['x', 'X', '*'])?;
        Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
    }
}

/// Client-side interaction metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BehavioralMetrics {
    #[serde(default)]
    pub typing_speed_wpm: Option<f64>,
    #[serde(default)]
    pub mouse_movements: Option<u32>,
    #[serde(default)]
    pub session_duration_seconds: Option<f64>,
    #[serde(default)]
    pub copy_paste_events: Option<u32>,
    #[serde(default)]
    pub form_fill_seconds: Option<f64>,
}

impl Transaction {
    /// Create a new transaction created now
    pub fn new(id: impl Into<String>, amount: Decimal, currency: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user_id: None,
            amount,
            currency: currency.into(),
            payment_method_id: None,
            created_at: Utc::now(),
            metadata: TransactionMetadata::default(),
        }
    }

    /// Set the user
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set the payment method
    pub fn with_payment_method(mut self, payment_method_id: impl Into<String>) -> Self {
        self.payment_method_id = Some(payment_method_id.into());
        self
    }

    /// Set the creation time
    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Set the client IP address
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.metadata.ip_address = Some(ip.into());
        self
    }

    /// Set the reported device fingerprint
    pub fn with_device_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.metadata.device_fingerprint = Some(fingerprint.into());
        self
    }

    /// Set the raw device attributes
    pub fn with_device(mut self, device: DeviceAttributes) -> Self {
        self.metadata.device = Some(device);
        self
    }

    /// Set the reported geolocation
    pub fn with_geolocation(mut self, geolocation: Geolocation) -> Self {
        self.metadata.geolocation = Some(geolocation);
        self
    }

    /// Set the payer email
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.metadata.email = Some(email.into());
        self
    }

    /// Set the merchant
    pub fn with_merchant(mut self, merchant_id: impl Into<String>) -> Self {
        self.metadata.merchant_id = Some(merchant_id.into());
        self
    }

    /// Add a custom metadata field
    pub fn with_custom(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.custom.insert(key.into(), value.into());
        self
    }

    /// Reject transactions that cannot be assessed
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(CoreError::InvalidTransaction(
                "missing transaction id".to_string(),
            ));
        }
        if self.currency.trim().is_empty() {
            return Err(CoreError::InvalidTransaction(format!(
                "transaction {} has no currency",
                self.id
            )));
        }
        if self.amount < Decimal::ZERO {
            return Err(CoreError::InvalidValue(format!(
                "transaction {} has a negative amount",
                self.id
            )));
        }
        Ok(())
    }

    /// Amount as f64 for scoring arithmetic
    pub fn amount_f64(&self) -> f64 {
        self.amount.to_f64().unwrap_or(0.0)
    }

    /// Lower-cased domain part of the email, if any
    pub fn email_domain(&self) -> Option<String> {
        self.metadata
            .email
            .as_deref()
            .and_then(|email| email.rsplit_once('@'))
            .map(|(_, domain)| domain.to_lowercase())
            .filter(|domain| !domain.is_empty())
    }
}

/// Transaction lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    Refunded,
}

/// Historical transaction record returned by the history collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionSummary {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    #[serde(default)]
    pub payment_method_id: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub device_fingerprint: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    pub status: TransactionStatus,
    /// Risk score of the assessment made when the transaction was processed
    #[serde(default)]
    pub risk_score: Option<f64>,
    /// Confirmed fraud outcome
    #[serde(default)]
    pub flagged_fraud: bool,
    pub created_at: DateTime<Utc>,
}

impl TransactionSummary {
    /// Build a history record from a transaction
    pub fn from_transaction(transaction: &Transaction, status: TransactionStatus) -> Self {
        let geo = transaction.metadata.geolocation.as_ref();
        Self {
            id: transaction.id.clone(),
            user_id: transaction.user_id.clone(),
            amount: transaction.amount,
            currency: transaction.currency.clone(),
            payment_method_id: transaction.payment_method_id.clone(),
            ip_address: transaction.metadata.ip_address.clone(),
            device_fingerprint: transaction.metadata.device_fingerprint.clone(),
            country: geo.map(|g| g.country.clone()),
            city: geo.and_then(|g| g.city.clone()),
            latitude: geo.and_then(|g| g.latitude),
            longitude: geo.and_then(|g| g.longitude),
            status,
            risk_score: None,
            flagged_fraud: false,
            created_at: transaction.created_at,
        }
    }

    /// Amount as f64
    pub fn amount_f64(&self) -> f64 {
        self.amount.to_f64().unwrap_or(0.0)
    }

    /// Coordinates as (latitude, longitude), when both are present
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_builder() {
        let tx = Transaction::new("tx_1", Decimal::from(250), "USD")
            .with_user("user_1")
            .with_ip("10.0.0.1")
            .with_email("Alice@Example.COM")
            .with_geolocation(Geolocation::new("US").with_city("Austin"));

        assert_eq!(tx.user_id.as_deref(), Some("user_1"));
        assert_eq!(tx.amount_f64(), 250.0);
        assert_eq!(tx.email_domain().as_deref(), Some("example.com"));
        assert_eq!(
            tx.metadata.geolocation.as_ref().and_then(|g| g.city.as_deref()),
            Some("Austin")
        );
    }

    #[test]
    fn test_transaction_validate() {
        assert!(Transaction::new("tx_1", Decimal::from(5), "USD").validate().is_ok());
        assert!(matches!(
            Transaction::new(" ", Decimal::from(5), "USD").validate(),
            Err(CoreError::InvalidTransaction(_))
        ));
        assert!(matches!(
            Transaction::new("tx_1", Decimal::from(5), "").validate(),
            Err(CoreError::InvalidTransaction(_))
        ));
        assert!(matches!(
            Transaction::new("tx_1", Decimal::from(-5), "USD").validate(),
            Err(CoreError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_transaction_deserialize_with_defaults() {
        let json = r#"{
            "id": "tx_2",
            "amount": 15000,
            "currency": "BTC",
            "metadata": { "ip_address": "1.2.3.4", "custom": { "channel": "web" } }
        }"#;

        let tx: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.amount, Decimal::from(15000));
        assert!(tx.user_id.is_none());
        assert_eq!(tx.metadata.custom.get("channel"), Some(&Value::from("web")));
    }

    #[test]
    fn test_device_resolution_parsing() {
        let device = DeviceAttributes {
            screen_resolution: Some("1920x1080".to_string()),
            ..Default::default()
        };
        assert_eq!(device.resolution(), Some((1920, 1080)));

        let broken = DeviceAttributes {
            screen_resolution: Some("wide".to_string()),
            ..Default::default()
        };
        assert_eq!(broken.resolution(), None);
    }

    #[test]
    fn test_summary_from_transaction() {
        let tx = Transaction::new("tx_3", Decimal::from(10), "EUR")
            .with_user("u")
            .with_geolocation(Geolocation::new("FR").with_coordinates(48.85, 2.35));

        let summary = TransactionSummary::from_transaction(&tx, TransactionStatus::Succeeded);
        assert_eq!(summary.country.as_deref(), Some("FR"));
        assert_eq!(summary.coordinates(), Some((48.85, 2.35)));
        assert!(!summary.flagged_fraud);
    }
}
