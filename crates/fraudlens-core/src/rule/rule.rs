//! Rule definitions

use super::condition::{ConditionOutcome, FraudCondition};
use crate::assessment::Action;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Fraud rule definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudRule {
    /// Unique rule ID (assigned on creation when empty)
    #[serde(default)]
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Rule category, used to select subsets of rules (e.g. "velocity", "amount")
    #[serde(default)]
    pub rule_type: String,

    /// Inactive rules are never evaluated by the engine
    #[serde(default = "default_true")]
    pub is_active: bool,

    /// Higher priority rules are evaluated first
    #[serde(default)]
    pub priority: i32,

    /// Ordered conditions
    #[serde(default)]
    pub conditions: Vec<FraudCondition>,

    /// Action suggested when the rule matches
    #[serde(default)]
    pub action: Action,

    /// Risk contribution (0-100) when the rule matches
    #[serde(default)]
    pub risk_score: f64,

    /// Optional description
    #[serde(default)]
    pub description: Option<String>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl FraudRule {
    /// Create a new active rule
    pub fn new(id: impl Into<String>, name: impl Into<String>, action: Action, risk_score: f64) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            rule_type: String::new(),
            is_active: true,
            priority: 0,
            conditions: Vec::new(),
            action,
            risk_score,
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the rule type
    pub fn with_type(mut self, rule_type: impl Into<String>) -> Self {
        self.rule_type = rule_type.into();
        self
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Add a condition
    pub fn add_condition(mut self, condition: FraudCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Replace all conditions
    pub fn with_conditions(mut self, conditions: Vec<FraudCondition>) -> Self {
        self.conditions = conditions;
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Mark the rule inactive
    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// Partial update applied to an existing rule
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub rule_type: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub conditions: Option<Vec<FraudCondition>>,
    #[serde(default)]
    pub action: Option<Action>,
    #[serde(default)]
    pub risk_score: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
}

impl RuleUpdate {
    /// Apply the update, bumping `updated_at`
    pub fn apply(self, rule: &mut FraudRule) {
        if let Some(name) = self.name {
            rule.name = name;
        }
        if let Some(rule_type) = self.rule_type {
            rule.rule_type = rule_type;
        }
        if let Some(is_active) = self.is_active {
            rule.is_active = is_active;
        }
        if let Some(priority) = self.priority {
            rule.priority = priority;
        }
        if let Some(conditions) = self.conditions {
            rule.conditions = conditions;
        }
        if let Some(action) = self.action {
            rule.action = action;
        }
        if let Some(risk_score) = self.risk_score {
            rule.risk_score = risk_score;
        }
        if let Some(description) = self.description {
            rule.description = Some(description);
        }
        rule.updated_at = Utc::now();
    }
}

/// Result of evaluating one rule against one transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudRuleEvaluation {
    pub rule_id: String,
    pub rule_name: String,
    pub matched: bool,
    /// Rule risk score when matched, otherwise 0
    pub risk_score: f64,
    /// Rule action when matched, otherwise `allow`
    pub action: Action,
    /// Evaluated conditions in order; conditions skipped by short-circuit are absent
    #[serde(default)]
    pub details: Vec<ConditionOutcome>,
}

impl FraudRuleEvaluation {
    /// Evaluation that did not match
    pub fn unmatched(rule: &FraudRule, details: Vec<ConditionOutcome>) -> Self {
        Self {
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            matched: false,
            risk_score: 0.0,
            action: Action::Allow,
            details,
        }
    }

    /// Evaluation that matched
    pub fn matched(rule: &FraudRule, details: Vec<ConditionOutcome>) -> Self {
        Self {
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            matched: true,
            risk_score: rule.risk_score,
            action: rule.action,
            details,
        }
    }
}
