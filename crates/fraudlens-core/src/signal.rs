//! Fraud signal definitions

use crate::types::Value;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A discrete piece of evidence produced by a signal generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudSignal {
    /// Type tag, e.g. `velocity_burst`; the prefix before the first `_` is the family
    pub signal_type: String,

    /// Diagnostic payload
    #[serde(default)]
    pub value: Value,

    /// Signed contribution to the risk score (negative for low-risk evidence)
    pub risk_contribution: f64,

    /// Human-readable explanation
    pub description: String,

    /// When the evidence was observed
    pub detected_at: DateTime<Utc>,
}

impl FraudSignal {
    /// Create a new signal observed now
    pub fn new(
        signal_type: impl Into<String>,
        risk_contribution: f64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            signal_type: signal_type.into(),
            value: Value::Null,
            risk_contribution,
            description: description.into(),
            detected_at: Utc::now(),
        }
    }

    /// Attach a diagnostic payload
    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = value.into();
        self
    }

    /// Set the observation time
    pub fn detected_at(mut self, detected_at: DateTime<Utc>) -> Self {
        self.detected_at = detected_at;
        self
    }

    /// Signal family used for weighting and diversity adjustments.
    ///
    /// Short aliases are folded into their canonical family
    /// (`geo` → `geolocation`, `behavior` → `behavioral`).
    pub fn family(&self) -> &str {
        let prefix = self
            .signal_type
            .split('_')
            .next()
            .unwrap_or(self.signal_type.as_str());
        match prefix {
            "geo" => "geolocation",
            "behavior" => "behavioral",
            other => other,
        }
    }
}
