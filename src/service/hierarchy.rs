//! Role hierarchy resolution: upward inheritance walk with cycle protection

use crate::cache::TtlCache;
use crate::config::CacheConfig;
use crate::domain::{Role, RolePermission};
use crate::error::{EngineError, Result};
use crate::repository::RoleRepository;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

/// Resolves the inheritance chain for a role and the permissions it carries.
///
/// The walk is iterative with a visited set; a repeated id means the stored
/// hierarchy is corrupt and resolution fails with `CycleDetected` instead of
/// hanging.
pub struct RoleHierarchyResolver<R: RoleRepository> {
    repo: Arc<R>,
    chain_cache: TtlCache<(Uuid, Option<Uuid>), Arc<Vec<Role>>>,
}

impl<R: RoleRepository> RoleHierarchyResolver<R> {
    pub fn new(repo: Arc<R>, config: &CacheConfig) -> Self {
        Self {
            repo,
            chain_cache: TtlCache::new(
                "hierarchy",
                config.capacity,
                Duration::from_secs(config.hierarchy_ttl_secs),
            ),
        }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repo
    }

    /// The role itself plus every active ancestor it inherits from, leaf
    /// first. Inactive ancestors are skipped but the walk continues through
    /// them; a role with `inherit_permissions = false` ends the walk at
    /// itself.
    pub async fn resolve_chain(
        &self,
        role_id: Uuid,
        group_id: Option<Uuid>,
    ) -> Result<Arc<Vec<Role>>> {
        if let Some(cached) = self.chain_cache.get(&(role_id, group_id)) {
            return Ok(cached);
        }

        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        let mut cursor = Some(role_id);

        while let Some(current_id) = cursor {
            if !visited.insert(current_id) {
                warn!(role_id = %current_id, "cycle in stored role hierarchy");
                return Err(EngineError::CycleDetected(current_id));
            }
            let role = self
                .repo
                .find_role_by_id(current_id)
                .await?
                .ok_or_else(|| EngineError::NotFound(format!("Role {current_id} not found")))?;

            let stop = !role.inherit_permissions;
            cursor = role.parent_role_id;
            if role.is_active {
                chain.push(role);
            }
            if stop {
                break;
            }
        }

        let chain = Arc::new(chain);
        self.chain_cache.insert((role_id, group_id), chain.clone());
        Ok(chain)
    }

    /// Every `(role, grant)` pair a role carries through its chain within a
    /// group scope. Validity windows and conditions are left to the caller;
    /// this is the structural merge only.
    pub async fn effective_role_permissions(
        &self,
        role_id: Uuid,
        group_id: Option<Uuid>,
    ) -> Result<Vec<(Role, RolePermission)>> {
        let chain = self.resolve_chain(role_id, group_id).await?;
        let mut merged = Vec::new();
        for role in chain.iter() {
            let grants = self.repo.find_role_permissions(role.id, group_id).await?;
            for grant in grants {
                merged.push((role.clone(), grant));
            }
        }
        Ok(merged)
    }

    /// Drop cached chains touching a role. Called after role mutations.
    pub fn invalidate_role(&self, role_id: Uuid) {
        self.chain_cache.invalidate_where(|(id, _)| *id == role_id);
    }

    /// Drop every cached chain for a tenant.
    pub fn invalidate_group(&self, group_id: Uuid) {
        self.chain_cache
            .invalidate_where(|(_, group)| *group == Some(group_id));
    }

    pub fn invalidate_all(&self) {
        self.chain_cache.clear();
    }
}
