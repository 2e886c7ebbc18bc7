//! Permission store

use crate::domain::{CreatePermissionInput, Permission, WildcardPattern};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;
use validator::Validate;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PermissionRepository: Send + Sync {
    async fn create(&self, input: &CreatePermissionInput) -> Result<Permission>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Permission>>;
    /// All active permissions, in creation order.
    async fn list_active(&self) -> Result<Vec<Permission>>;
    /// Move a permission under a new parent, revalidating the hierarchy and
    /// recomputing `path`/`level` for the whole affected subtree.
    async fn reparent(&self, id: Uuid, new_parent: Option<Uuid>) -> Result<Permission>;
    async fn deactivate(&self, id: Uuid) -> Result<()>;
}

/// In-memory permission store. Production deployments implement
/// `PermissionRepository` against their own persistence.
#[derive(Default)]
pub struct InMemoryPermissionRepository {
    permissions: RwLock<HashMap<Uuid, Permission>>,
    seq: AtomicU64,
}

impl InMemoryPermissionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn materialize_path(parent: Option<&Permission>, id: Uuid) -> (String, u8) {
        match parent {
            Some(parent) => (format!("{}/{}", parent.path, id), parent.level + 1),
            None => (id.to_string(), 0),
        }
    }
}

#[async_trait]
impl PermissionRepository for InMemoryPermissionRepository {
    async fn create(&self, input: &CreatePermissionInput) -> Result<Permission> {
        input.validate()?;

        // A pattern that cannot be compiled is rejected at the boundary.
        if let Some(raw) = input.wildcard_pattern.as_deref() {
            WildcardPattern::parse(raw)?;
        }

        let mut permissions = self.permissions.write().await;

        let id = Uuid::new_v4();
        let parent = match input.parent_id {
            Some(parent_id) => Some(
                permissions
                    .get(&parent_id)
                    .cloned()
                    .ok_or_else(|| EngineError::NotFound(format!("Parent permission {parent_id} not found")))?,
            ),
            None => None,
        };
        let (path, level) = Self::materialize_path(parent.as_ref(), id);

        let permission = Permission {
            id,
            service_id: input.service_id,
            name: input.name.clone(),
            resource: input.resource.clone(),
            action: input.action.clone(),
            parent_id: input.parent_id,
            path,
            level,
            priority: input.priority,
            is_wildcard: input.wildcard_pattern.is_some(),
            wildcard_pattern: input.wildcard_pattern.clone(),
            inherits_from_parent: input.inherits_from_parent,
            is_implicit: input.is_implicit,
            is_active: true,
            created_at: Utc::now(),
            created_seq: self.seq.fetch_add(1, Ordering::Relaxed),
        };

        permissions.insert(id, permission.clone());
        Ok(permission)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Permission>> {
        Ok(self.permissions.read().await.get(&id).cloned())
    }

    async fn list_active(&self) -> Result<Vec<Permission>> {
        let permissions = self.permissions.read().await;
        let mut active: Vec<Permission> = permissions
            .values()
            .filter(|p| p.is_active)
            .cloned()
            .collect();
        active.sort_by_key(|p| p.created_seq);
        Ok(active)
    }

    async fn reparent(&self, id: Uuid, new_parent: Option<Uuid>) -> Result<Permission> {
        if new_parent == Some(id) {
            return Err(EngineError::CycleDetected(id));
        }

        let mut permissions = self.permissions.write().await;
        if !permissions.contains_key(&id) {
            return Err(EngineError::NotFound(format!("Permission {id} not found")));
        }

        // Walk the proposed ancestor chain with a visited set; reaching the
        // node itself (or a repeated id) means the move would create a cycle.
        let mut visited = std::collections::HashSet::new();
        visited.insert(id);
        let mut cursor = new_parent;
        while let Some(ancestor_id) = cursor {
            if !visited.insert(ancestor_id) {
                return Err(EngineError::CycleDetected(ancestor_id));
            }
            cursor = permissions
                .get(&ancestor_id)
                .ok_or_else(|| EngineError::NotFound(format!("Parent permission {ancestor_id} not found")))?
                .parent_id;
        }

        let parent = new_parent.and_then(|pid| permissions.get(&pid)).cloned();
        let (path, level) = Self::materialize_path(parent.as_ref(), id);
        if let Some(entry) = permissions.get_mut(&id) {
            entry.parent_id = new_parent;
            entry.path = path;
            entry.level = level;
        }

        // Recompute the materialized path for every descendant, breadth-first.
        let mut frontier = vec![id];
        while let Some(current) = frontier.pop() {
            let (current_path, current_level) = {
                let node = &permissions[&current];
                (node.path.clone(), node.level)
            };
            let children: Vec<Uuid> = permissions
                .values()
                .filter(|p| p.parent_id == Some(current) && p.id != current)
                .map(|p| p.id)
                .collect();
            for child in children {
                if let Some(entry) = permissions.get_mut(&child) {
                    entry.path = format!("{}/{}", current_path, child);
                    entry.level = current_level + 1;
                }
                frontier.push(child);
            }
        }

        Ok(permissions[&id].clone())
    }

    async fn deactivate(&self, id: Uuid) -> Result<()> {
        let mut permissions = self.permissions.write().await;
        let permission = permissions
            .get_mut(&id)
            .ok_or_else(|| EngineError::NotFound(format!("Permission {id} not found")))?;
        permission.is_active = false;
        Ok(())
    }
}
