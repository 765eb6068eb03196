//! Declarative fraud rules
//!
//! - [`FieldRegistry`]: dot-path access to transaction fields
//! - [`ConditionEvaluator`]: single condition comparison
//! - [`RulesEngine`]: rule CRUD, active-set cache and rule evaluation

pub mod condition;
pub mod engine;
pub mod field;


pub use condition::ConditionEvaluator;
pub use engine::{RuleStatistics, RulesConfig, RulesEngine};
pub use field::FieldRegistry;
