//! Core trait definitions for rule persistence
//!
//! [`RuleRepository`] is the CRUD interface the rules engine depends on. The
//! engine owns ordering, filtering and caching; repositories only store.
//!
//! # Example
//!
//! ```no_run
//! use fraudlens_core::{Action, FraudRule};
//! use fraudlens_repository::{MemoryRuleRepository, RuleRepository};
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let repo = MemoryRuleRepository::new();
//! repo.create_rule(FraudRule::new("high_amount", "High amount", Action::Review, 40.0))
//!     .await?;
//!
//! let rule = repo.get_rule("high_amount").await?;
//! assert!(rule.is_some());
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use fraudlens_core::FraudRule;

use crate::RepositoryResult;

/// CRUD interface for fraud rules
///
/// All implementations must be `Send + Sync` for use across async tasks.
#[async_trait]
pub trait RuleRepository: Send + Sync {
    /// Load every stored rule, active or not, in no particular order
    async fn list_rules(&self) -> RepositoryResult<Vec<FraudRule>>;

    /// Load a rule by ID
    async fn get_rule(&self, id: &str) -> RepositoryResult<Option<FraudRule>>;

    /// Store a new rule; fails with `AlreadyExists` if the ID is taken
    async fn create_rule(&self, rule: FraudRule) -> RepositoryResult<FraudRule>;

    /// Replace an existing rule; fails with `NotFound` if absent
    async fn update_rule(&self, rule: FraudRule) -> RepositoryResult<FraudRule>;

    /// Delete a rule; fails with `NotFound` if absent
    async fn delete_rule(&self, id: &str) -> RepositoryResult<()>;
}
