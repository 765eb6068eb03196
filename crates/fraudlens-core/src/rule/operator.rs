//! Operators for rule conditions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Field comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    /// Strict equality
    Equals,
    /// Strict inequality
    NotEquals,
    /// Numeric greater than
    GreaterThan,
    /// Numeric less than
    LessThan,
    /// Case-insensitive substring
    Contains,
    /// Membership in an array operand
    In,
    /// Non-membership in an array operand
    NotIn,
    /// Any operator name this version does not know; always evaluates to false
    #[serde(other)]
    Unknown,
}

impl ConditionOperator {
    /// Returns true if the operator coerces both sides to numbers
    pub fn is_numeric(&self) -> bool {
        matches!(self, ConditionOperator::GreaterThan | ConditionOperator::LessThan)
    }

    /// Returns true if the operator expects an array operand
    pub fn is_membership(&self) -> bool {
        matches!(self, ConditionOperator::In | ConditionOperator::NotIn)
    }
}

impl fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConditionOperator::Equals => "equals",
            ConditionOperator::NotEquals => "not_equals",
            ConditionOperator::GreaterThan => "greater_than",
            ConditionOperator::LessThan => "less_than",
            ConditionOperator::Contains => "contains",
            ConditionOperator::In => "in",
            ConditionOperator::NotIn => "not_in",
            ConditionOperator::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// How a condition combines with the one that follows it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_deserialize() {
        let op: ConditionOperator = serde_json::from_str("\"greater_than\"").unwrap();
        assert_eq!(op, ConditionOperator::GreaterThan);
        assert!(op.is_numeric());

        let unknown: ConditionOperator = serde_json::from_str("\"matches_regex\"").unwrap();
        assert_eq!(unknown, ConditionOperator::Unknown);
    }

    #[test]
    fn test_logical_operator_default() {
        assert_eq!(LogicalOperator::default(), LogicalOperator::And);
        let or: LogicalOperator = serde_json::from_str("\"or\"").unwrap();
        assert_eq!(or, LogicalOperator::Or);
    }

    #[test]
    fn test_membership() {
        assert!(ConditionOperator::In.is_membership());
        assert!(ConditionOperator::NotIn.is_membership());
        assert!(!ConditionOperator::Contains.is_membership());
    }
}
