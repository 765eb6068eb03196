//! FraudDetector - Main API for assessing transactions
//!
//! The module is organized into:
//! - `types`: outcome feedback and statistics types
//! - `engine`: the `FraudDetector` orchestrator
//! - `tests`: unit tests (test-only)

mod engine;
mod types;

pub use engine::FraudDetector;
pub use types::{DetectorStatistics, SignalCount, TransactionOutcome};

#[cfg(test)]
mod tests;
