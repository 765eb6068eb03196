//! Rule definitions
//!
//! A `FraudRule` is a named, priority-ordered list of field conditions. The
//! rule engine in `fraudlens-runtime` interprets these definitions.

mod condition;
mod operator;
#[allow(clippy::module_inception)]
mod rule;

pub use condition::{ConditionOutcome, FraudCondition};
pub use operator::{ConditionOperator, LogicalOperator};
pub use rule::{FraudRule, FraudRuleEvaluation, RuleUpdate};
