//! Condition expression language shared by grants and security policies

pub mod condition;

pub use condition::{ConditionContext, ConditionEvaluator, ConditionNode, JsonConditionEvaluator};
