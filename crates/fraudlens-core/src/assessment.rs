//! Assessment output types

use crate::rule::FraudRuleEvaluation;
use crate::signal::FraudSignal;
use crate::transaction::Geolocation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Action suggested by a rule, and the recommendation of an assessment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Let the payment through
    #[default]
    Allow,
    /// Ask the payer for additional verification
    Challenge,
    /// Route to manual review
    Review,
    /// Reject the payment
    Decline,
    /// Require step-up authentication (e.g. 3DS)
    StepUpAuth,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Allow => "allow",
            Action::Challenge => "challenge",
            Action::Review => "review",
            Action::Decline => "decline",
            Action::StepUpAuth => "step_up_auth",
        };
        f.write_str(s)
    }
}

/// Coarse risk bucket derived from the numeric score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Terminal result of assessing one transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudAssessment {
    pub id: String,
    pub transaction_id: String,
    /// Owning user, carried for history lookups
    #[serde(default)]
    pub user_id: Option<String>,
    /// Merchant, carried for merchant risk profiles
    #[serde(default)]
    pub merchant_id: Option<String>,
    /// Score in [0, 100]
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub recommendation: Action,
    #[serde(default)]
    pub rule_evaluations: Vec<FraudRuleEvaluation>,
    #[serde(default)]
    pub signals: Vec<FraudSignal>,
    #[serde(default)]
    pub device_fingerprint: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub geolocation: Option<Geolocation>,
    pub assessed_at: DateTime<Utc>,
}

impl FraudAssessment {
    /// Rule evaluations that matched
    pub fn matched_rules(&self) -> impl Iterator<Item = &FraudRuleEvaluation> {
        self.rule_evaluations.iter().filter(|e| e.matched)
    }

    /// Returns true if a signal of the given type is present
    pub fn has_signal(&self, signal_type: &str) -> bool {
        self.signals.iter().any(|s| s.signal_type == signal_type)
    }
}
