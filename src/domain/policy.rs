//! Security policy domain models and the access decision type

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Closed severity enumeration, validated at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicySeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// Closed policy category enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyCategory {
    AccessControl,
    Authentication,
    DeviceCompliance,
    Network,
}

/// A zero-trust gating policy, tenant-scoped (`group_id = None` is global).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityPolicy {
    pub id: Uuid,
    pub group_id: Option<Uuid>,
    pub name: String,
    pub category: PolicyCategory,
    /// Structured rule document, opaque to the engine core.
    pub rules: serde_json::Value,
    /// Opaque condition expression gating applicability.
    pub conditions: Option<String>,
    /// Minimum composite trust score required when the policy applies.
    pub minimum_trust_score: u8,
    pub severity: PolicySeverity,
    /// Unenforced policies produce Conditional decisions instead of Deny.
    pub is_enforced: bool,
    pub priority: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a security policy
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateSecurityPolicyInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub group_id: Option<Uuid>,
    pub category: PolicyCategory,
    #[serde(default)]
    pub rules: serde_json::Value,
    pub conditions: Option<String>,
    #[validate(range(max = 100))]
    pub minimum_trust_score: u8,
    pub severity: PolicySeverity,
    #[serde(default = "default_true")]
    pub is_enforced: bool,
    #[serde(default)]
    pub priority: i32,
}

fn default_true() -> bool {
    true
}

/// Immutable record of a failed policy check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyViolation {
    pub id: Uuid,
    pub policy_id: Uuid,
    pub user_id: Uuid,
    pub group_id: Option<Uuid>,
    pub resource: String,
    pub action: String,
    /// Effective trust score at violation time (stale snapshots count as 0).
    pub trust_score: u8,
    pub severity: PolicySeverity,
    pub detail: String,
    pub occurred_at: DateTime<Utc>,
}

/// Remediation a caller can perform to upgrade a Conditional decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationStep {
    Reauthenticate,
    StepUpMfa,
    DeviceAttestation,
}

/// Final access decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Deny { reason: String },
    Conditional { steps: Vec<RemediationStep> },
}

impl Decision {
    pub fn is_allow(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Decision::Deny {
            reason: reason.into(),
        }
    }
}
