//! Role store: hierarchy, role-permission grants, and user assignments

use crate::domain::{
    AssignRoleInput, CreateRoleInput, GrantRolePermissionInput, Role, RoleAssignment,
    RolePermission, MAX_HIERARCHY_LEVEL,
};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;
use validator::Validate;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn create_role(&self, input: &CreateRoleInput) -> Result<Role>;
    async fn find_role_by_id(&self, id: Uuid) -> Result<Option<Role>>;
    /// Move a role under a new parent, rejecting cycles and over-deep chains,
    /// and recomputing `hierarchy_level`/`hierarchy_path` for the subtree.
    async fn reparent_role(&self, id: Uuid, new_parent: Option<Uuid>) -> Result<Role>;
    async fn deactivate_role(&self, id: Uuid) -> Result<()>;

    async fn grant_permission(&self, input: &GrantRolePermissionInput) -> Result<RolePermission>;
    async fn revoke_permission(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
        group_id: Option<Uuid>,
    ) -> Result<()>;
    /// Grants attached directly to a role, scoped to a group. Global grants
    /// (`group_id = None`) are visible from every group.
    async fn find_role_permissions(
        &self,
        role_id: Uuid,
        group_id: Option<Uuid>,
    ) -> Result<Vec<RolePermission>>;

    async fn assign_role(&self, input: &AssignRoleInput) -> Result<RoleAssignment>;
    async fn remove_assignment(
        &self,
        user_id: Uuid,
        role_id: Uuid,
        group_id: Option<Uuid>,
    ) -> Result<()>;
    async fn assignments_for_user(
        &self,
        user_id: Uuid,
        group_id: Option<Uuid>,
    ) -> Result<Vec<RoleAssignment>>;
}

#[derive(Default)]
struct RoleState {
    roles: HashMap<Uuid, Role>,
    // keyed by (role_id, permission_id, group_id)
    role_permissions: HashMap<(Uuid, Uuid, Option<Uuid>), RolePermission>,
    assignments: Vec<RoleAssignment>,
}

/// In-memory role store
#[derive(Default)]
pub struct InMemoryRoleRepository {
    state: RwLock<RoleState>,
}

impl InMemoryRoleRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn scope_matches(entry: Option<Uuid>, requested: Option<Uuid>) -> bool {
    entry.is_none() || entry == requested
}

#[async_trait]
impl RoleRepository for InMemoryRoleRepository {
    async fn create_role(&self, input: &CreateRoleInput) -> Result<Role> {
        input.validate()?;
        let mut state = self.state.write().await;

        let id = Uuid::new_v4();
        let now = Utc::now();
        let (level, path) = match input.parent_role_id {
            Some(parent_id) => {
                let parent = state
                    .roles
                    .get(&parent_id)
                    .ok_or_else(|| EngineError::NotFound(format!("Parent role {parent_id} not found")))?;
                if !parent.is_active {
                    return Err(EngineError::Validation(
                        "Parent role is not active".to_string(),
                    ));
                }
                // A tenant role can hang off a global parent, never off another
                // tenant's role.
                if parent.group_id.is_some() && parent.group_id != input.group_id {
                    return Err(EngineError::GroupMismatch);
                }
                let level = parent.hierarchy_level + 1;
                if level > MAX_HIERARCHY_LEVEL {
                    return Err(EngineError::Validation(format!(
                        "Role hierarchy deeper than {MAX_HIERARCHY_LEVEL} levels"
                    )));
                }
                (level, format!("{}/{}", parent.hierarchy_path, id))
            }
            None => (0, id.to_string()),
        };

        let role = Role {
            id,
            group_id: input.group_id,
            parent_role_id: input.parent_role_id,
            name: input.name.clone(),
            hierarchy_level: level,
            hierarchy_path: path,
            inherit_permissions: input.inherit_permissions,
            priority: input.priority,
            is_system_role: input.is_system_role,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        state.roles.insert(id, role.clone());
        Ok(role)
    }

    async fn find_role_by_id(&self, id: Uuid) -> Result<Option<Role>> {
        Ok(self.state.read().await.roles.get(&id).cloned())
    }

    async fn reparent_role(&self, id: Uuid, new_parent: Option<Uuid>) -> Result<Role> {
        if new_parent == Some(id) {
            return Err(EngineError::CycleDetected(id));
        }
        let mut state = self.state.write().await;
        if !state.roles.contains_key(&id) {
            return Err(EngineError::NotFound(format!("Role {id} not found")));
        }

        let mut visited = HashSet::new();
        visited.insert(id);
        let mut cursor = new_parent;
        while let Some(ancestor_id) = cursor {
            if !visited.insert(ancestor_id) {
                return Err(EngineError::CycleDetected(ancestor_id));
            }
            cursor = state
                .roles
                .get(&ancestor_id)
                .ok_or_else(|| EngineError::NotFound(format!("Parent role {ancestor_id} not found")))?
                .parent_role_id;
        }

        let parent = new_parent.and_then(|pid| state.roles.get(&pid)).cloned();
        let (level, path) = match parent {
            Some(parent) => (
                parent.hierarchy_level + 1,
                format!("{}/{}", parent.hierarchy_path, id),
            ),
            None => (0, id.to_string()),
        };
        // Depth check covers the deepest descendant, before any mutation.
        let mut subtree_depth = 0u8;
        let mut frontier = vec![(id, 0u8)];
        while let Some((current, depth)) = frontier.pop() {
            subtree_depth = subtree_depth.max(depth);
            for child in state
                .roles
                .values()
                .filter(|r| r.parent_role_id == Some(current) && r.id != current)
            {
                frontier.push((child.id, depth + 1));
            }
        }
        if level + subtree_depth > MAX_HIERARCHY_LEVEL {
            return Err(EngineError::Validation(format!(
                "Role hierarchy deeper than {MAX_HIERARCHY_LEVEL} levels"
            )));
        }
        if let Some(entry) = state.roles.get_mut(&id) {
            entry.parent_role_id = new_parent;
            entry.hierarchy_level = level;
            entry.hierarchy_path = path;
            entry.updated_at = Utc::now();
        }

        // Recompute the subtree below the moved role.
        let mut frontier = vec![id];
        while let Some(current) = frontier.pop() {
            let (current_path, current_level) = match state.roles.get(&current) {
                Some(node) => (node.hierarchy_path.clone(), node.hierarchy_level),
                None => continue,
            };
            let children: Vec<Uuid> = state
                .roles
                .values()
                .filter(|r| r.parent_role_id == Some(current) && r.id != current)
                .map(|r| r.id)
                .collect();
            for child in children {
                if let Some(entry) = state.roles.get_mut(&child) {
                    entry.hierarchy_path = format!("{}/{}", current_path, child);
                    entry.hierarchy_level = current_level + 1;
                    entry.updated_at = Utc::now();
                }
                frontier.push(child);
            }
        }

        state
            .roles
            .get(&id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("Role {id} not found")))
    }

    async fn deactivate_role(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.write().await;
        let role = state
            .roles
            .get_mut(&id)
            .ok_or_else(|| EngineError::NotFound(format!("Role {id} not found")))?;
        role.is_active = false;
        role.updated_at = Utc::now();
        Ok(())
    }

    async fn grant_permission(&self, input: &GrantRolePermissionInput) -> Result<RolePermission> {
        let mut state = self.state.write().await;
        if !state.roles.contains_key(&input.role_id) {
            return Err(EngineError::NotFound(format!(
                "Role {} not found",
                input.role_id
            )));
        }
        let key = (input.role_id, input.permission_id, input.group_id);
        if state.role_permissions.contains_key(&key) {
            return Err(EngineError::Validation(
                "Permission already granted to role in this scope".to_string(),
            ));
        }
        let grant = RolePermission {
            role_id: input.role_id,
            permission_id: input.permission_id,
            group_id: input.group_id,
            granted_at: Utc::now(),
            conditions: input.conditions.clone(),
            valid_from: input.valid_from,
            valid_until: input.valid_until,
        };
        state.role_permissions.insert(key, grant.clone());
        Ok(grant)
    }

    async fn revoke_permission(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
        group_id: Option<Uuid>,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .role_permissions
            .remove(&(role_id, permission_id, group_id))
            .map(|_| ())
            .ok_or_else(|| EngineError::NotFound("Role permission grant not found".to_string()))
    }

    async fn find_role_permissions(
        &self,
        role_id: Uuid,
        group_id: Option<Uuid>,
    ) -> Result<Vec<RolePermission>> {
        let state = self.state.read().await;
        Ok(state
            .role_permissions
            .values()
            .filter(|rp| rp.role_id == role_id && scope_matches(rp.group_id, group_id))
            .cloned()
            .collect())
    }

    async fn assign_role(&self, input: &AssignRoleInput) -> Result<RoleAssignment> {
        let mut state = self.state.write().await;
        let role = state
            .roles
            .get(&input.role_id)
            .ok_or_else(|| EngineError::NotFound(format!("Role {} not found", input.role_id)))?;
        // A tenant-scoped role is only assignable inside its own group.
        if role.group_id.is_some() && role.group_id != input.group_id {
            return Err(EngineError::GroupMismatch);
        }
        let duplicate = state.assignments.iter().any(|a| {
            a.is_active
                && a.user_id == input.user_id
                && a.role_id == input.role_id
                && a.group_id == input.group_id
        });
        if duplicate {
            return Err(EngineError::Validation(
                "Role already assigned to user in this scope".to_string(),
            ));
        }
        let assignment = RoleAssignment {
            id: Uuid::new_v4(),
            user_id: input.user_id,
            role_id: input.role_id,
            group_id: input.group_id,
            granted_at: Utc::now(),
            granted_by: input.granted_by,
            is_active: true,
        };
        state.assignments.push(assignment.clone());
        Ok(assignment)
    }

    async fn remove_assignment(
        &self,
        user_id: Uuid,
        role_id: Uuid,
        group_id: Option<Uuid>,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let found = state.assignments.iter_mut().find(|a| {
            a.is_active && a.user_id == user_id && a.role_id == role_id && a.group_id == group_id
        });
        match found {
            Some(assignment) => {
                assignment.is_active = false;
                Ok(())
            }
            None => Err(EngineError::NotFound("Role assignment not found".to_string())),
        }
    }

    async fn assignments_for_user(
        &self,
        user_id: Uuid,
        group_id: Option<Uuid>,
    ) -> Result<Vec<RoleAssignment>> {
        let state = self.state.read().await;
        Ok(state
            .assignments
            .iter()
            .filter(|a| a.is_active && a.user_id == user_id && scope_matches(a.group_id, group_id))
            .cloned()
            .collect())
    }
}
