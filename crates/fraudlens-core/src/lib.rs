//! FraudLens Core - Core types and definitions for the FraudLens risk pipeline
//!
//! This crate provides the fundamental types used across the FraudLens crates:
//! - Value types for rule conditions and diagnostic payloads
//! - Transaction and transaction-history records
//! - Rule definitions (conditions, operators, actions)
//! - Signals, behavioral profiles and assessments
//! - Error types

pub mod assessment;
pub mod error;
pub mod profile;
pub mod rule;
pub mod signal;
pub mod transaction;
pub mod types;

// Re-export commonly used types
pub use assessment::{Action, FraudAssessment, RiskLevel};
pub use error::CoreError;
pub use profile::{
    AnomalySeverity, BehavioralAnomaly, BehavioralProfile, DevicePatterns, HourWindow,
    LocationPatterns, PaymentPatterns, RiskMetrics, RiskTrend, TransactionPatterns,
};
pub use rule::{
    ConditionOperator, ConditionOutcome, FraudCondition, FraudRule, FraudRuleEvaluation,
    LogicalOperator, RuleUpdate,
};
pub use signal::FraudSignal;
pub use transaction::{
    BehavioralMetrics, DeviceAttributes, Geolocation, Transaction, TransactionMetadata,
    TransactionStatus, TransactionSummary,
};
pub use types::Value;
