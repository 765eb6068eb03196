//! Outcome and statistics types for FraudDetector

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Confirmed result of a previously assessed transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOutcome {
    pub transaction_id: String,
    pub is_fraud: bool,
}

impl TransactionOutcome {
    /// The transaction turned out to be fraudulent
    pub fn fraud(transaction_id: impl Into<String>) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            is_fraud: true,
        }
    }

    /// The transaction turned out to be legitimate
    pub fn legitimate(transaction_id: impl Into<String>) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            is_fraud: false,
        }
    }
}

/// Occurrences of one signal type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalCount {
    pub signal_type: String,
    pub count: usize,
}

/// Aggregate view of recent assessments
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectorStatistics {
    pub period_days: u32,
    pub total_assessments: usize,
    /// Assessments per risk level
    pub by_level: BTreeMap<String, usize>,
    /// Assessments per recommendation
    pub by_recommendation: BTreeMap<String, usize>,
    /// Mean risk score, 0 when there were no assessments
    pub average_score: f64,
    /// Most frequent signal types, most frequent first
    pub top_signals: Vec<SignalCount>,
}
