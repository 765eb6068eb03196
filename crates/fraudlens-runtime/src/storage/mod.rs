//! Storage collaborators for historical data
//!
//! Provides async interfaces for querying transaction history (velocity,
//! travel, device reputation, behavioral profiles) and prior assessments
//! (scoring adjustments, frequency boost, statistics).

mod assessments;
mod history;

pub use assessments::{AssessmentStore, InMemoryAssessmentStore};
pub use history::{HistoryDimension, InMemoryTransactionHistory, TransactionFilter, TransactionHistory};
