//! Per-user permission override store

use crate::domain::{CreateUserPermissionInput, UserPermission, WildcardPattern};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserPermissionRepository: Send + Sync {
    async fn grant(&self, input: &CreateUserPermissionInput) -> Result<UserPermission>;
    /// Revoke an override. `expected_version` must match the stored version
    /// token or the call fails with `VersionConflict`.
    async fn revoke(&self, id: Uuid, expected_version: u64) -> Result<()>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserPermission>>;
    /// All overrides for a user visible in a group scope (tenant-scoped plus
    /// global), including expired ones. Window filtering happens at decision
    /// time.
    async fn find_for_user(
        &self,
        user_id: Uuid,
        group_id: Option<Uuid>,
    ) -> Result<Vec<UserPermission>>;
}

/// In-memory override store
#[derive(Default)]
pub struct InMemoryUserPermissionRepository {
    grants: RwLock<HashMap<Uuid, UserPermission>>,
}

impl InMemoryUserPermissionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserPermissionRepository for InMemoryUserPermissionRepository {
    async fn grant(&self, input: &CreateUserPermissionInput) -> Result<UserPermission> {
        match (&input.permission_id, &input.permission_pattern) {
            (Some(_), Some(_)) | (None, None) => {
                return Err(EngineError::Validation(
                    "Exactly one of permission_id or permission_pattern must be set".to_string(),
                ));
            }
            (None, Some(raw)) => {
                WildcardPattern::parse(raw)?;
            }
            (Some(_), None) => {}
        }
        if let (Some(from), Some(until)) = (input.valid_from, input.expires_at) {
            if until <= from {
                return Err(EngineError::Validation(
                    "expires_at must be after valid_from".to_string(),
                ));
            }
        }

        let grant = UserPermission {
            id: Uuid::new_v4(),
            user_id: input.user_id,
            permission_id: input.permission_id,
            permission_pattern: input.permission_pattern.clone(),
            kind: input.kind,
            group_id: input.group_id,
            conditions: input.conditions.clone(),
            valid_from: input.valid_from,
            expires_at: input.expires_at,
            granted_at: Utc::now(),
            granted_by: input.granted_by,
            version: 1,
        };
        self.grants.write().await.insert(grant.id, grant.clone());
        Ok(grant)
    }

    async fn revoke(&self, id: Uuid, expected_version: u64) -> Result<()> {
        let mut grants = self.grants.write().await;
        let found = grants
            .get(&id)
            .ok_or_else(|| EngineError::NotFound(format!("User permission {id} not found")))?;
        if found.version != expected_version {
            return Err(EngineError::VersionConflict {
                expected: expected_version,
                found: found.version,
            });
        }
        grants.remove(&id);
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserPermission>> {
        Ok(self.grants.read().await.get(&id).cloned())
    }

    async fn find_for_user(
        &self,
        user_id: Uuid,
        group_id: Option<Uuid>,
    ) -> Result<Vec<UserPermission>> {
        let grants = self.grants.read().await;
        Ok(grants
            .values()
            .filter(|g| {
                g.user_id == user_id && (g.group_id.is_none() || g.group_id == group_id)
            })
            .cloned()
            .collect())
    }
}
