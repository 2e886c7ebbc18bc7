//! Grant store: merges role-derived grants and per-user overrides into a
//! decision set for one request.

use crate::cache::TtlCache;
use crate::config::CacheConfig;
use crate::domain::{
    AccessRequest, CreateUserPermissionInput, DecisionSet, EffectiveGrant, GrantKind, GrantSource,
    GrantTarget, Permission, Role, RolePermission, UserPermission, WildcardPattern,
};
use crate::error::Result;
use crate::policy::{ConditionContext, ConditionEvaluator};
use crate::repository::{PermissionRepository, RoleRepository, UserPermissionRepository};
use crate::service::catalog::PermissionCatalog;
use crate::service::hierarchy::RoleHierarchyResolver;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Seam the evaluator depends on: resolve the merged decision set for a
/// request at a fixed instant.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GrantResolver: Send + Sync {
    async fn decision_set(
        &self,
        request: &AccessRequest,
        now: DateTime<Utc>,
    ) -> Result<DecisionSet>;
}

/// Raw grant material for one `(user, group)`, cached before time-window and
/// condition filtering. Filtering is per-call: a cached entry must still
/// produce correct decisions as grants age into or out of their windows.
#[derive(Clone)]
struct RawGrants {
    overrides: Vec<UserPermission>,
    role_grants: Vec<(Role, RolePermission)>,
}

pub struct GrantStore<PR, RR, UP>
where
    PR: PermissionRepository,
    RR: RoleRepository,
    UP: UserPermissionRepository,
{
    catalog: Arc<PermissionCatalog<PR>>,
    hierarchy: Arc<RoleHierarchyResolver<RR>>,
    user_permissions: Arc<UP>,
    conditions: Arc<dyn ConditionEvaluator>,
    raw_cache: TtlCache<(Uuid, Option<Uuid>), RawGrants>,
}

impl<PR, RR, UP> GrantStore<PR, RR, UP>
where
    PR: PermissionRepository,
    RR: RoleRepository,
    UP: UserPermissionRepository,
{
    pub fn new(
        catalog: Arc<PermissionCatalog<PR>>,
        hierarchy: Arc<RoleHierarchyResolver<RR>>,
        user_permissions: Arc<UP>,
        conditions: Arc<dyn ConditionEvaluator>,
        config: &CacheConfig,
    ) -> Self {
        Self {
            catalog,
            hierarchy,
            user_permissions,
            conditions,
            raw_cache: TtlCache::new(
                "grants",
                config.capacity,
                Duration::from_secs(config.grants_ttl_secs),
            ),
        }
    }

    pub async fn grant_user_permission(
        &self,
        input: &CreateUserPermissionInput,
    ) -> Result<UserPermission> {
        let grant = self.user_permissions.grant(input).await?;
        self.invalidate_user(grant.user_id);
        Ok(grant)
    }

    pub async fn revoke_user_permission(&self, id: Uuid, expected_version: u64) -> Result<()> {
        let user_id = self
            .user_permissions
            .find_by_id(id)
            .await?
            .map(|g| g.user_id);
        self.user_permissions.revoke(id, expected_version).await?;
        if let Some(user_id) = user_id {
            self.invalidate_user(user_id);
        }
        Ok(())
    }

    /// Drop cached grant material for a user across all groups.
    pub fn invalidate_user(&self, user_id: Uuid) {
        self.raw_cache.invalidate_where(|(user, _)| *user == user_id);
    }

    /// Drop cached grant material for everyone in a tenant. Role mutations
    /// fan out through here.
    pub fn invalidate_group(&self, group_id: Uuid) {
        self.raw_cache
            .invalidate_where(|(_, group)| *group == Some(group_id));
        self.hierarchy.invalidate_group(group_id);
    }

    pub fn invalidate_all(&self) {
        self.raw_cache.clear();
        self.hierarchy.invalidate_all();
    }

    async fn raw_grants(&self, user_id: Uuid, group_id: Option<Uuid>) -> Result<RawGrants> {
        if let Some(cached) = self.raw_cache.get(&(user_id, group_id)) {
            return Ok(cached);
        }

        let overrides = self.user_permissions.find_for_user(user_id, group_id).await?;

        let mut role_grants = Vec::new();
        let assignments = self
            .hierarchy
            .repository()
            .assignments_for_user(user_id, group_id)
            .await?;
        for assignment in assignments {
            let merged = self
                .hierarchy
                .effective_role_permissions(assignment.role_id, group_id)
                .await?;
            role_grants.extend(merged);
        }

        let raw = RawGrants {
            overrides,
            role_grants,
        };
        self.raw_cache.insert((user_id, group_id), raw.clone());
        Ok(raw)
    }

    fn conditions_met(&self, conditions: Option<&str>, ctx: &ConditionContext) -> bool {
        match conditions {
            None => true,
            // An unparseable or failing expression is an unmet condition.
            Some(expr) => match self.conditions.evaluate(expr, ctx) {
                Ok(met) => met,
                Err(e) => {
                    warn!(error = %e, "grant condition could not be evaluated; treating as unmet");
                    false
                }
            },
        }
    }

    fn override_target(&self, grant: &UserPermission, permission: Option<&Permission>) -> Option<GrantTarget> {
        if let Some(raw) = grant.permission_pattern.as_deref() {
            return WildcardPattern::parse(raw).ok().map(GrantTarget::Pattern);
        }
        let permission = permission?;
        if !permission.is_active {
            return None;
        }
        Some(GrantTarget::Exact {
            permission_id: permission.id,
            resource: permission.resource.clone(),
            action: permission.action.clone(),
        })
    }
}

#[async_trait]
impl<PR, RR, UP> GrantResolver for GrantStore<PR, RR, UP>
where
    PR: PermissionRepository,
    RR: RoleRepository,
    UP: UserPermissionRepository,
{
    async fn decision_set(
        &self,
        request: &AccessRequest,
        now: DateTime<Utc>,
    ) -> Result<DecisionSet> {
        let raw = self.raw_grants(request.principal_id, request.group_id).await?;
        let ctx = ConditionContext::from_access(request, now);

        let mut entries = Vec::new();
        let mut expired_grant_ids = Vec::new();

        for grant in &raw.overrides {
            if !grant.is_active_at(now) {
                expired_grant_ids.push(grant.id);
                continue;
            }
            if !self.conditions_met(grant.conditions.as_deref(), &ctx) {
                continue;
            }
            let permission = match grant.permission_id {
                Some(id) => self.catalog.resolve(id).await.ok(),
                None => None,
            };
            let Some(target) = self.override_target(grant, permission.as_ref()) else {
                continue;
            };
            let priority = permission.map(|p| p.priority).unwrap_or_default();
            entries.push(EffectiveGrant {
                kind: grant.kind,
                source: GrantSource::User {
                    user_permission_id: grant.id,
                },
                target,
                priority,
            });
        }

        for (role, grant) in &raw.role_grants {
            if !grant.is_active_at(now) {
                continue;
            }
            if !self.conditions_met(grant.conditions.as_deref(), &ctx) {
                continue;
            }
            let Ok(permission) = self.catalog.resolve(grant.permission_id).await else {
                debug!(
                    permission_id = %grant.permission_id,
                    role_id = %role.id,
                    "role grant references a missing permission"
                );
                continue;
            };
            if !permission.is_active {
                continue;
            }
            let target = if permission.is_wildcard {
                match permission.compiled_pattern() {
                    Ok(pattern) => GrantTarget::Pattern(pattern),
                    Err(_) => continue,
                }
            } else {
                GrantTarget::Exact {
                    permission_id: permission.id,
                    resource: permission.resource.clone(),
                    action: permission.action.clone(),
                }
            };
            entries.push(EffectiveGrant {
                kind: GrantKind::Allow,
                source: GrantSource::Role { role_id: role.id },
                target,
                priority: permission.priority,
            });
        }

        Ok(DecisionSet {
            entries,
            expired_grant_ids,
            computed_at: now,
        })
    }
}
