//! FraudLens SDK
//!
//! High-level API for configuring a fraud detector and assessing transactions.

pub mod builder;
pub mod config;
pub mod detector;
pub mod error;

// Re-export main types
pub use builder::FraudDetectorBuilder;
pub use config::{DetectorConfig, FraudConfig};
pub use detector::{DetectorStatistics, FraudDetector, SignalCount, TransactionOutcome};
pub use error::{Result, SdkError};

// Re-export commonly used types from dependencies
pub use fraudlens_core::{
    Action, FraudAssessment, FraudRule, FraudSignal, RiskLevel, Transaction, TransactionStatus,
    TransactionSummary,
};
pub use fraudlens_runtime::{
    InMemoryAssessmentStore, InMemoryTransactionHistory, ListKind, ListService, ListType,
    MetricsCollector, RuleStatistics, StaticReputationProvider,
};
