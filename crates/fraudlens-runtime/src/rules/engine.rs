//! Rules engine
//!
//! Holds the fraud rules (through a [`RuleRepository`]), caches the active
//! set, and evaluates rules against transactions.
//!
//! Evaluation walks the conditions left to right with a rolling logical
//! operator: each condition's `logical_operator` decides how the *next*
//! condition is combined with the running result. An `or` combination that
//! yields true ends the evaluation early.

use super::condition::ConditionEvaluator;
use super::field::FieldRegistry;
use crate::cache::TtlCache;
use crate::error::{Result, RuntimeError};
use crate::storage::AssessmentStore;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use fraudlens_core::{
    ConditionOperator, FraudRule, FraudRuleEvaluation, LogicalOperator, RuleUpdate, Transaction,
};
use fraudlens_repository::{RepositoryError, RuleRepository};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Cache key for the unfiltered active rule set
const ALL_RULES_KEY: &str = "*";

/// Rules engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Lifetime of the cached active rule sets, in seconds
    pub cache_ttl_secs: u64,
    /// Weight applied to matched rule risk scores by the scorer
    pub rules_weight: f64,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 300,
            rules_weight: 1.0,
        }
    }
}

impl RulesConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.cache_ttl_secs == 0 {
            return Err(RuntimeError::InvalidConfig(
                "rules.cache_ttl_secs must be positive".to_string(),
            ));
        }
        if self.rules_weight.is_nan() || self.rules_weight < 0.0 {
            return Err(RuntimeError::InvalidConfig(
                "rules.rules_weight must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Hit counts of one rule over a period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleStatistics {
    pub rule_id: String,
    pub rule_name: String,
    pub is_active: bool,
    /// Assessments that evaluated the rule
    pub evaluations: usize,
    /// Assessments in which the rule matched
    pub matches: usize,
    /// matches / evaluations, 0 when never evaluated
    pub hit_rate: f64,
    pub last_matched_at: Option<DateTime<Utc>>,
}

/// Rules engine
pub struct RulesEngine {
    repository: Arc<dyn RuleRepository>,
    evaluator: ConditionEvaluator,
    cache: TtlCache<String, Arc<Vec<FraudRule>>>,
    assessments: Option<Arc<dyn AssessmentStore>>,
}

impl RulesEngine {
    /// Create an engine over a rule repository
    pub fn new(repository: Arc<dyn RuleRepository>, config: &RulesConfig) -> Self {
        Self {
            repository,
            evaluator: ConditionEvaluator::default(),
            cache: TtlCache::new(Duration::from_secs(config.cache_ttl_secs)),
            assessments: None,
        }
    }

    /// Use a custom field registry
    pub fn with_registry(mut self, registry: Arc<FieldRegistry>) -> Self {
        self.evaluator = ConditionEvaluator::new(registry);
        self
    }

    /// Attach the assessment store used by [`RulesEngine::rule_statistics`]
    pub fn with_assessment_store(mut self, store: Arc<dyn AssessmentStore>) -> Self {
        self.assessments = Some(store);
        self
    }

    /// Field registry used to resolve condition paths
    pub fn registry(&self) -> &FieldRegistry {
        self.evaluator.registry()
    }

    /// Validate and store a new rule. An empty ID is replaced by a UUID.
    pub async fn create_rule(&self, mut rule: FraudRule) -> Result<FraudRule> {
        if rule.id.trim().is_empty() {
            rule.id = uuid::Uuid::new_v4().to_string();
        }
        self.validate_rule(&rule)?;

        let now = Utc::now();
        rule.created_at = now;
        rule.updated_at = now;

        let created = self.repository.create_rule(rule).await?;
        self.cache.clear();
        info!(rule_id = %created.id, "Created fraud rule");
        Ok(created)
    }

    /// Apply a partial update to a stored rule
    pub async fn update_rule(&self, id: &str, update: RuleUpdate) -> Result<FraudRule> {
        let mut rule = self
            .repository
            .get_rule(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound { id: id.to_string() })?;

        update.apply(&mut rule);
        self.validate_rule(&rule)?;

        let updated = self.repository.update_rule(rule).await?;
        self.cache.clear();
        info!(rule_id = %id, "Updated fraud rule");
        Ok(updated)
    }

    /// Delete a stored rule
    pub async fn delete_rule(&self, id: &str) -> Result<()> {
        self.repository.delete_rule(id).await?;
        self.cache.clear();
        info!(rule_id = %id, "Deleted fraud rule");
        Ok(())
    }

    /// Load one rule
    pub async fn get_rule(&self, id: &str) -> Result<Option<FraudRule>> {
        Ok(self.repository.get_rule(id).await?)
    }

    /// All stored rules, active or not, in evaluation order
    pub async fn list_rules(&self) -> Result<Vec<FraudRule>> {
        let mut rules = self.repository.list_rules().await?;
        sort_rules(&mut rules);
        Ok(rules)
    }

    /// Active rules in evaluation order (priority desc, then oldest first),
    /// optionally restricted to one rule type. Cached per type.
    pub async fn active_rules(&self, rule_type: Option<&str>) -> Result<Arc<Vec<FraudRule>>> {
        let key = rule_type.unwrap_or(ALL_RULES_KEY).to_string();
        let repository = Arc::clone(&self.repository);
        let wanted = rule_type.map(str::to_string);

        self.cache
            .get_or_compute(key, || async move {
                let mut rules: Vec<FraudRule> = repository
                    .list_rules()
                    .await?
                    .into_iter()
                    .filter(|r| r.is_active)
                    .filter(|r| wanted.as_deref().map_or(true, |t| r.rule_type == t))
                    .collect();
                sort_rules(&mut rules);
                debug!(count = rules.len(), rule_type = ?wanted, "Loaded active rules");
                Ok::<_, RuntimeError>(Arc::new(rules))
            })
            .await
    }

    /// Drop the cached rule sets
    pub fn invalidate_cache(&self) {
        self.cache.clear();
    }

    /// Evaluate one rule. Never fails.
    pub fn evaluate_rule(&self, rule: &FraudRule, tx: &Transaction) -> FraudRuleEvaluation {
        let Some((first, rest)) = rule.conditions.split_first() else {
            return FraudRuleEvaluation::unmatched(rule, Vec::new());
        };

        let mut details = Vec::with_capacity(rule.conditions.len());
        let outcome = self.evaluator.evaluate(0, first, tx);
        let mut matched = outcome.met;
        details.push(outcome);
        let mut operator = first.logical_operator;

        for (offset, condition) in rest.iter().enumerate() {
            let outcome = self.evaluator.evaluate(offset + 1, condition, tx);
            let met = outcome.met;
            details.push(outcome);

            matched = match operator {
                LogicalOperator::Or => matched || met,
                LogicalOperator::And => matched && met,
            };

            if operator == LogicalOperator::Or && matched {
                break;
            }
            operator = condition.logical_operator;
        }

        debug!(rule_id = %rule.id, matched, "Evaluated rule");

        if matched {
            FraudRuleEvaluation::matched(rule, details)
        } else {
            FraudRuleEvaluation::unmatched(rule, details)
        }
    }

    /// Evaluate every active rule in order
    pub async fn evaluate_rules(&self, tx: &Transaction) -> Result<Vec<FraudRuleEvaluation>> {
        let rules = self.active_rules(None).await?;
        Ok(rules.iter().map(|rule| self.evaluate_rule(rule, tx)).collect())
    }

    /// Validate a candidate rule and evaluate it against a sample transaction
    /// without storing it
    pub fn test_rule(&self, candidate: &FraudRule, sample: &Transaction) -> Result<FraudRuleEvaluation> {
        self.validate_rule(candidate)?;
        Ok(self.evaluate_rule(candidate, sample))
    }

    /// Check a rule for structural problems
    pub fn validate_rule(&self, rule: &FraudRule) -> Result<()> {
        let mut problems = Vec::new();

        if rule.name.trim().is_empty() {
            problems.push("name must not be empty".to_string());
        }
        if !(0.0..=100.0).contains(&rule.risk_score) {
            problems.push(format!("risk_score {} must be within 0-100", rule.risk_score));
        }
        if rule.conditions.is_empty() {
            problems.push("at least one condition is required".to_string());
        }
        for (i, condition) in rule.conditions.iter().enumerate() {
            if !self.registry().is_known(&condition.field) {
                problems.push(format!("condition {}: unknown field '{}'", i, condition.field));
            }
            if condition.operator == ConditionOperator::Unknown {
                problems.push(format!("condition {}: unknown operator", i));
            }
            if condition.operator.is_membership() && condition.value.as_array().is_none() {
                problems.push(format!(
                    "condition {}: operator '{}' requires an array value",
                    i, condition.operator
                ));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(RuntimeError::InvalidRule(problems.join("; ")))
        }
    }

    /// Per-rule hit counts over the last `days` days of stored assessments
    pub async fn rule_statistics(&self, days: u32) -> Result<Vec<RuleStatistics>> {
        let store = self.assessments.as_ref().ok_or_else(|| {
            RuntimeError::InvalidOperation("No assessment store configured".to_string())
        })?;

        let since = Utc::now() - ChronoDuration::days(i64::from(days));
        let assessments = store.assessments_since(since).await?;

        let mut stats: HashMap<String, RuleStatistics> = self
            .list_rules()
            .await?
            .into_iter()
            .map(|rule| {
                (
                    rule.id.clone(),
                    RuleStatistics {
                        rule_id: rule.id,
                        rule_name: rule.name,
                        is_active: rule.is_active,
                        evaluations: 0,
                        matches: 0,
                        hit_rate: 0.0,
                        last_matched_at: None,
                    },
                )
            })
            .collect();

        for assessment in &assessments {
            for evaluation in &assessment.rule_evaluations {
                let entry = stats
                    .entry(evaluation.rule_id.clone())
                    .or_insert_with(|| RuleStatistics {
                        rule_id: evaluation.rule_id.clone(),
                        rule_name: evaluation.rule_name.clone(),
                        is_active: false,
                        evaluations: 0,
                        matches: 0,
                        hit_rate: 0.0,
                        last_matched_at: None,
                    });
                entry.evaluations += 1;
                if evaluation.matched {
                    entry.matches += 1;
                    if entry.last_matched_at.map_or(true, |t| t < assessment.assessed_at) {
                        entry.last_matched_at = Some(assessment.assessed_at);
                    }
                }
            }
        }

        let mut result: Vec<RuleStatistics> = stats
            .into_values()
            .map(|mut s| {
                if s.evaluations > 0 {
                    s.hit_rate = s.matches as f64 / s.evaluations as f64;
                }
                s
            })
            .collect();
        result.sort_by(|a, b| b.matches.cmp(&a.matches).then_with(|| a.rule_id.cmp(&b.rule_id)));
        Ok(result)
    }
}

/// Priority descending, then creation ascending, then ID for stability
fn sort_rules(rules: &mut [FraudRule]) {
    rules.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });
}
