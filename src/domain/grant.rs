//! Per-user permission overrides and merged grant decision sets

use super::permission::WildcardPattern;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Explicit grant polarity. Deny always outranks any Allow derived from roles
/// or wildcards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrantKind {
    Allow,
    Deny,
}

/// Explicit per-user grant or deny, optionally wildcarded and time-bounded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPermission {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Exactly one of `permission_id` / `permission_pattern` is set.
    pub permission_id: Option<Uuid>,
    pub permission_pattern: Option<String>,
    pub kind: GrantKind,
    pub group_id: Option<Uuid>,
    pub conditions: Option<String>,
    pub valid_from: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub granted_at: DateTime<Utc>,
    pub granted_by: Option<Uuid>,
    /// Optimistic concurrency token, bumped on every mutation.
    pub version: u64,
}

impl UserPermission {
    /// Whether `now` falls inside `[valid_from, expires_at)`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        if let Some(from) = self.valid_from {
            if now < from {
                return false;
            }
        }
        if let Some(until) = self.expires_at {
            if now >= until {
                return false;
            }
        }
        true
    }
}

/// Input for creating a per-user override
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserPermissionInput {
    pub user_id: Uuid,
    pub permission_id: Option<Uuid>,
    pub permission_pattern: Option<String>,
    pub kind: GrantKind,
    pub group_id: Option<Uuid>,
    pub conditions: Option<String>,
    pub valid_from: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub granted_by: Option<Uuid>,
}

/// Where an effective grant came from; decides merge precedence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrantSource {
    /// Explicit per-user override
    User { user_permission_id: Uuid },
    /// Derived from a role in the user's hierarchy
    Role { role_id: Uuid },
}

/// What an effective grant applies to.
#[derive(Debug, Clone)]
pub enum GrantTarget {
    /// A concrete permission node
    Exact {
        permission_id: Uuid,
        resource: String,
        action: String,
    },
    /// A compiled wildcard pattern. Patterns are evaluated at decision time,
    /// so denies match permissions created after the deny was written.
    Pattern(WildcardPattern),
}

impl GrantTarget {
    pub fn matches(&self, resource: &str, action: &str) -> bool {
        match self {
            GrantTarget::Exact {
                resource: r,
                action: a,
                ..
            } => r.eq_ignore_ascii_case(resource) && a.eq_ignore_ascii_case(action),
            GrantTarget::Pattern(pattern) => pattern.matches(resource, action),
        }
    }

    pub fn permission_id(&self) -> Option<Uuid> {
        match self {
            GrantTarget::Exact { permission_id, .. } => Some(*permission_id),
            GrantTarget::Pattern(_) => None,
        }
    }
}

/// One entry of a merged decision set.
#[derive(Debug, Clone)]
pub struct EffectiveGrant {
    pub kind: GrantKind,
    pub source: GrantSource,
    pub target: GrantTarget,
    pub priority: i32,
}

/// Result of an access-permission lookup against a `DecisionSet`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantDecision {
    Allow { matched_permission_id: Option<Uuid> },
    Deny,
}

/// Merged, condition- and window-filtered grants for one `(user, group)` at a
/// fixed instant. Built by the GrantStore; pure data afterwards.
#[derive(Debug, Clone, Default)]
pub struct DecisionSet {
    pub entries: Vec<EffectiveGrant>,
    /// Grants that matched but were outside their validity window; surfaced
    /// for observability, never contributing to Allow.
    pub expired_grant_ids: Vec<Uuid>,
    pub computed_at: DateTime<Utc>,
}

impl DecisionSet {
    /// Resolve the decision for a requested `(resource, action)`.
    ///
    /// Precedence: user-level Deny, then user-level Allow, then role-derived
    /// grants (highest priority first), then fail-closed Deny.
    pub fn decision_for(&self, resource: &str, action: &str) -> GrantDecision {
        // 1. Explicit user denies veto everything.
        if self.entries.iter().any(|g| {
            g.kind == GrantKind::Deny
                && matches!(g.source, GrantSource::User { .. })
                && g.target.matches(resource, action)
        }) {
            return GrantDecision::Deny;
        }

        // 2. Explicit user allows override role-derived state.
        if let Some(grant) = self
            .entries
            .iter()
            .filter(|g| {
                g.kind == GrantKind::Allow
                    && matches!(g.source, GrantSource::User { .. })
                    && g.target.matches(resource, action)
            })
            .max_by_key(|g| g.priority)
        {
            return GrantDecision::Allow {
                matched_permission_id: grant.target.permission_id(),
            };
        }

        // 3. Role-derived grants.
        if let Some(grant) = self
            .entries
            .iter()
            .filter(|g| {
                g.kind == GrantKind::Allow
                    && matches!(g.source, GrantSource::Role { .. })
                    && g.target.matches(resource, action)
            })
            .max_by_key(|g| g.priority)
        {
            return GrantDecision::Allow {
                matched_permission_id: grant.target.permission_id(),
            };
        }

        // 4. Fail closed.
        GrantDecision::Deny
    }
}
