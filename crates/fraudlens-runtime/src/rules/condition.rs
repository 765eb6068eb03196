//! Condition evaluation

use super::field::FieldRegistry;
use crate::error::{Result, RuntimeError};
use fraudlens_core::{ConditionOperator, ConditionOutcome, FraudCondition, Transaction, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Evaluates single field-comparison conditions against a transaction
#[derive(Clone)]
pub struct ConditionEvaluator {
    registry: Arc<FieldRegistry>,
}

impl ConditionEvaluator {
    /// Create an evaluator over a field registry
    pub fn new(registry: Arc<FieldRegistry>) -> Self {
        Self { registry }
    }

    /// Field registry used for path resolution
    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    /// Evaluate one condition and record its diagnostics.
    ///
    /// Never fails: evaluation errors are logged and count as not met.
    pub fn evaluate(&self, index: usize, condition: &FraudCondition, tx: &Transaction) -> ConditionOutcome {
        let actual = self.registry.resolve(tx, &condition.field);

        let met = match compare(&actual, condition.operator, &condition.value) {
            Ok(met) => met,
            Err(e) => {
                warn!(
                    field = %condition.field,
                    operator = %condition.operator,
                    error = %e,
                    "Condition evaluation failed, treating as not met"
                );
                false
            }
        };

        debug!(
            field = %condition.field,
            operator = %condition.operator,
            met,
            "Evaluated condition"
        );

        ConditionOutcome {
            index,
            field: condition.field.clone(),
            operator: condition.operator,
            expected: condition.value.clone(),
            actual,
            met,
        }
    }
}

impl Default for ConditionEvaluator {
    fn default() -> Self {
        Self::new(Arc::new(FieldRegistry::standard()))
    }
}

/// Compare an extracted value with a condition operand
pub fn compare(actual: &Value, operator: ConditionOperator, expected: &Value) -> Result<bool> {
    match operator {
        ConditionOperator::Equals => Ok(actual == expected),
        ConditionOperator::NotEquals => Ok(actual != expected),
        ConditionOperator::GreaterThan => Ok(numeric(actual, expected, |a, e| a > e)),
        ConditionOperator::LessThan => Ok(numeric(actual, expected, |a, e| a < e)),
        ConditionOperator::Contains => {
            if actual.is_null() {
                return Ok(false);
            }
            let haystack = actual.to_display_string().to_lowercase();
            let needle = expected.to_display_string().to_lowercase();
            Ok(haystack.contains(&needle))
        }
        ConditionOperator::In | ConditionOperator::NotIn => {
            let items = expected.as_array().ok_or_else(|| {
                RuntimeError::InvalidValue(format!(
                    "Operator '{}' requires an array operand, got {:?}",
                    operator, expected
                ))
            })?;
            let found = items.contains(actual);
            Ok(if operator == ConditionOperator::In { found } else { !found })
        }
        ConditionOperator::Unknown => {
            warn!("Unknown condition operator, treating as not met");
            Ok(false)
        }
    }
}

fn numeric(actual: &Value, expected: &Value, cmp: impl Fn(f64, f64) -> bool) -> bool {
    match (actual.as_number(), expected.as_number()) {
        (Some(a), Some(e)) => cmp(a, e),
        _ => false,
    }
}
