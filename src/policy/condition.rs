//! Opaque condition expressions: a tagged-variant AST with a small, total
//! evaluator over a request context.
//!
//! Expressions are stored as JSON strings on grants and policies. An
//! expression that fails to parse is treated as never satisfied by callers,
//! not as a fatal error.

use crate::domain::AccessRequest;
use crate::error::{EngineError, Result};
use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::IpAddr;
use std::str::FromStr;

/// Condition AST. `untagged` keeps the stored JSON shape minimal:
/// `{"all":[...]}`, `{"any":[...]}`, `{"not":{...}}`, or a predicate
/// `{"var":"subject.user_id","op":"eq","value":"..."}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ConditionNode {
    All {
        all: Vec<ConditionNode>,
    },
    Any {
        any: Vec<ConditionNode>,
    },
    Not {
        not: Box<ConditionNode>,
    },
    Predicate {
        var: String,
        op: String,
        #[serde(default)]
        value: Value,
    },
}

/// Context object predicates are evaluated against.
#[derive(Debug, Clone, Default)]
pub struct ConditionContext {
    values: HashMap<String, Value>,
}

impl ConditionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Build the standard context for an access check.
    pub fn from_access(request: &AccessRequest, now: DateTime<Utc>) -> Self {
        let mut ctx = Self::new();
        ctx.insert("subject.user_id", json!(request.principal_id.to_string()));
        ctx.insert("subject.device_id", json!(request.device_id));
        ctx.insert("request.ip", json!(request.ip_address));
        ctx.insert("request.resource", json!(request.resource));
        ctx.insert("request.action", json!(request.action));
        if let Some(group_id) = request.group_id {
            ctx.insert("subject.group_id", json!(group_id.to_string()));
        }
        ctx.insert("env.now_utc", json!(now.to_rfc3339()));
        ctx.insert("env.hour", json!(now.hour()));
        ctx.insert("env.weekday", json!(now.weekday().number_from_monday()));
        ctx
    }
}

/// Seam for evaluating opaque condition expressions; injected into the
/// GrantStore and PolicyEvaluator.
#[cfg_attr(test, mockall::automock)]
pub trait ConditionEvaluator: Send + Sync {
    /// Evaluate an expression against a context. Returns
    /// `EngineError::ConditionEvaluationFailed` when the expression cannot be
    /// parsed; callers treat that as an unmet condition.
    fn evaluate(&self, expression: &str, ctx: &ConditionContext) -> Result<bool>;
}

/// Default evaluator: parses expressions as the JSON AST above.
#[derive(Debug, Clone, Default)]
pub struct JsonConditionEvaluator;

impl ConditionEvaluator for JsonConditionEvaluator {
    fn evaluate(&self, expression: &str, ctx: &ConditionContext) -> Result<bool> {
        let node: ConditionNode = serde_json::from_str(expression)
            .map_err(|e| EngineError::ConditionEvaluationFailed(e.to_string()))?;
        Ok(eval_condition(&node, ctx))
    }
}

fn eval_condition(node: &ConditionNode, ctx: &ConditionContext) -> bool {
    match node {
        ConditionNode::All { all } => all.iter().all(|n| eval_condition(n, ctx)),
        ConditionNode::Any { any } => any.iter().any(|n| eval_condition(n, ctx)),
        ConditionNode::Not { not } => !eval_condition(not, ctx),
        ConditionNode::Predicate { var, op, value } => eval_predicate(var, op, value, ctx),
    }
}

fn value_to_vec(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(v) => v.clone(),
        _ => vec![value.clone()],
    }
}

fn compare_numbers(left: &Value, right: &Value, op: &str) -> bool {
    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => match op {
            "gt" => a > b,
            "gte" => a >= b,
            "lt" => a < b,
            "lte" => a <= b,
            _ => false,
        },
        _ => false,
    }
}

fn ip_in_cidr(left: &Value, expected: &Value) -> bool {
    let Some(ip) = left.as_str().and_then(|raw| IpAddr::from_str(raw).ok()) else {
        return false;
    };
    let cidr = expected.as_str().unwrap_or_default();
    let Some((base, prefix)) = cidr.split_once('/') else {
        return false;
    };
    let (Ok(base_ip), Ok(prefix_len)) = (IpAddr::from_str(base), prefix.parse::<u8>()) else {
        return false;
    };
    match (ip, base_ip) {
        (IpAddr::V4(ipv4), IpAddr::V4(basev4)) => {
            if prefix_len > 32 {
                return false;
            }
            let mask = if prefix_len == 0 {
                0
            } else {
                u32::MAX << (32 - prefix_len)
            };
            (u32::from(ipv4) & mask) == (u32::from(basev4) & mask)
        }
        _ => false,
    }
}

fn eval_predicate(var: &str, op: &str, expected: &Value, ctx: &ConditionContext) -> bool {
    let left = match ctx.get(var) {
        Some(v) => v,
        None => return op == "exists" && expected == &json!(false),
    };

    match op {
        "exists" => expected.as_bool().unwrap_or(true),
        "eq" => left == expected,
        "neq" => left != expected,
        "contains" => match left {
            Value::Array(arr) => arr.contains(expected),
            Value::String(s) => expected
                .as_str()
                .map(|needle| s.contains(needle))
                .unwrap_or(false),
            _ => false,
        },
        "starts_with" => left
            .as_str()
            .and_then(|s| expected.as_str().map(|p| s.starts_with(p)))
            .unwrap_or(false),
        "in" => value_to_vec(expected).contains(left),
        "not_in" => !value_to_vec(expected).contains(left),
        "gt" | "gte" | "lt" | "lte" => compare_numbers(left, expected, op),
        "ip_in_cidr" => ip_in_cidr(left, expected),
        _ => false,
    }
}
