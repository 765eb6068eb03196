//! FraudLens Runtime - Signal generators, rules engine and risk scoring
//!
//! This crate provides the building blocks of a fraud assessment:
//! - Declarative rules and the rules engine
//! - Velocity, amount, geolocation, device and behavioral signal generators
//! - The risk scorer
//! - Collaborator traits (transaction history, assessment store, lists, IP
//!   reputation) with in-memory, file and HTTP adapters

pub mod amount;
pub mod behavioral;
pub mod cache;
pub mod device;
pub mod error;
pub mod geo;
pub mod lists;
pub mod observability;
pub mod reputation;
pub mod rules;
pub mod scoring;
pub mod storage;
pub mod velocity;

// Re-export main types
pub use amount::AmountAnalyzer;
pub use behavioral::{BehavioralConfig, BehavioralProfiler};
pub use cache::{CacheStats, TtlCache};
pub use device::{
    compute_fingerprint, DeviceAnalysis, DeviceAnalyzer, DeviceClassification, DeviceConfig,
    DeviceReputation,
};
pub use error::{Result, RuntimeError};
pub use geo::{haversine_km, GeolocationAnalyzer, GeolocationConfig};
pub use lists::{
    FileBackend, ListBackend, ListCheckResult, ListChecker, ListKind, ListMatch, ListService,
    ListType, MemoryBackend,
};
pub use observability::{Metrics, MetricsCollector, MetricsSnapshot};
pub use reputation::{
    HttpReputationProvider, IpReputation, IpReputationProvider, StaticReputationProvider,
};
pub use rules::{ConditionEvaluator, FieldRegistry, RuleStatistics, RulesConfig, RulesEngine};
pub use scoring::{
    RiskScore, RiskScorer, RiskThresholds, ScoreAdjustment, ScoreBreakdown, ScoringConfig,
    ScoringContext,
};
pub use storage::{
    AssessmentStore, HistoryDimension, InMemoryAssessmentStore, InMemoryTransactionHistory,
    TransactionFilter, TransactionHistory,
};
pub use velocity::{VelocityCheck, VelocityChecker, VelocityConfig, VelocityLimit, WindowStats};
