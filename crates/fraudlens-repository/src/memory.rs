//! In-memory rule repository
//!
//! Suitable for tests and for embedding the engine with rules supplied by
//! the host application. Data is lost when the process restarts.

use async_trait::async_trait;
use fraudlens_core::FraudRule;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::{RepositoryError, RepositoryResult, RuleRepository};

/// In-memory rule repository
#[derive(Default)]
pub struct MemoryRuleRepository {
    rules: RwLock<HashMap<String, FraudRule>>,
}

impl MemoryRuleRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a repository seeded with rules (later duplicates win)
    pub fn with_rules(rules: Vec<FraudRule>) -> Self {
        let map = rules.into_iter().map(|r| (r.id.clone(), r)).collect();
        Self {
            rules: RwLock::new(map),
        }
    }
}

#[async_trait]
impl RuleRepository for MemoryRuleRepository {
    async fn list_rules(&self) -> RepositoryResult<Vec<FraudRule>> {
        Ok(self.rules.read().await.values().cloned().collect())
    }

    async fn get_rule(&self, id: &str) -> RepositoryResult<Option<FraudRule>> {
        Ok(self.rules.read().await.get(id).cloned())
    }

    async fn create_rule(&self, rule: FraudRule) -> RepositoryResult<FraudRule> {
        let mut rules = self.rules.write().await;
        if rules.contains_key(&rule.id) {
            return Err(RepositoryError::AlreadyExists { id: rule.id });
        }
        rules.insert(rule.id.clone(), rule.clone());
        Ok(rule)
    }

    async fn update_rule(&self, rule: FraudRule) -> RepositoryResult<FraudRule> {
        let mut rules = self.rules.write().await;
        match rules.get_mut(&rule.id) {
            Some(existing) => {
                *existing = rule.clone();
                Ok(rule)
            }
            None => Err(RepositoryError::NotFound { id: rule.id }),
        }
    }

    async fn delete_rule(&self, id: &str) -> RepositoryResult<()> {
        self.rules
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound { id: id.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fraudlens_core::Action;

    #[tokio::test]
    async fn test_memory_repository_crud() {
        let repo = MemoryRuleRepository::new();
        let rule = FraudRule::new("r1", "Rule one", Action::Review, 30.0);

        repo.create_rule(rule.clone()).await.unwrap();
        assert!(matches!(
            repo.create_rule(rule.clone()).await,
            Err(RepositoryError::AlreadyExists { .. })
        ));

        let mut updated = rule.clone();
        updated.risk_score = 60.0;
        repo.update_rule(updated).await.unwrap();
        assert_eq!(repo.get_rule("r1").await.unwrap().unwrap().risk_score, 60.0);

        repo.delete_rule("r1").await.unwrap();
        assert!(repo.get_rule("r1").await.unwrap().is_none());
        assert!(matches!(
            repo.delete_rule("r1").await,
            Err(RepositoryError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_missing_rule() {
        let repo = MemoryRuleRepository::new();
        let result = repo
            .update_rule(FraudRule::new("missing", "Missing", Action::Allow, 0.0))
            .await;
        assert!(matches!(result, Err(RepositoryError::NotFound { .. })));
    }
}
