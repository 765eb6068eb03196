//! Condition definitions

use super::operator::{ConditionOperator, LogicalOperator};
use crate::types::Value;
use serde::{Deserialize, Serialize};

/// One field comparison inside a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudCondition {
    /// Dot path into the transaction, e.g. `metadata.geolocation.country`
    pub field: String,

    /// Comparison operator
    pub operator: ConditionOperator,

    /// Expected operand
    #[serde(default)]
    pub value: Value,

    /// Combination with the next condition in sequence
    #[serde(default)]
    pub logical_operator: LogicalOperator,
}

impl FraudCondition {
    /// Create a new condition combined with AND
    pub fn new(field: impl Into<String>, operator: ConditionOperator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
            logical_operator: LogicalOperator::And,
        }
    }

    /// Combine this condition with the next one using OR
    pub fn or(mut self) -> Self {
        self.logical_operator = LogicalOperator::Or;
        self
    }
}

/// Diagnostic record of one evaluated condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionOutcome {
    /// Position in the rule's condition list
    pub index: usize,
    pub field: String,
    pub operator: ConditionOperator,
    pub expected: Value,
    pub actual: Value,
    pub met: bool,
}
