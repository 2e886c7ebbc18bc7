//! Role domain models: hierarchy, role-permission grants, assignments

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Maximum depth of the role hierarchy (levels 0 through 10).
pub const MAX_HIERARCHY_LEVEL: u8 = 10;

/// Role entity: a named, hierarchical bundle of permissions assignable to
/// users within a tenant (group). `group_id = None` means a global role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub group_id: Option<Uuid>,
    /// Parent role for inheritance. `id == parent_role_id` is rejected on write.
    pub parent_role_id: Option<Uuid>,
    pub name: String,
    /// Strictly increases root to leaf; must equal parent's level + 1.
    pub hierarchy_level: u8,
    /// Materialized `/`-joined ancestor chain, recomputed on write.
    pub hierarchy_path: String,
    /// When false, this role stops the upward permission walk.
    pub inherit_permissions: bool,
    pub priority: i32,
    pub is_system_role: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Role {
    fn default() -> Self {
        let now = Utc::now();
        let id = Uuid::new_v4();
        Self {
            id,
            group_id: None,
            parent_role_id: None,
            name: String::new(),
            hierarchy_level: 0,
            hierarchy_path: id.to_string(),
            inherit_permissions: true,
            priority: 0,
            is_system_role: false,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Role-Permission grant with composite key `(role_id, permission_id, group_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolePermission {
    pub role_id: Uuid,
    pub permission_id: Uuid,
    pub group_id: Option<Uuid>,
    pub granted_at: DateTime<Utc>,
    /// Opaque condition expression, evaluated at decision time.
    pub conditions: Option<String>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
}

impl RolePermission {
    /// Whether `now` falls inside this grant's validity window.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        if let Some(from) = self.valid_from {
            if now < from {
                return false;
            }
        }
        if let Some(until) = self.valid_until {
            if now >= until {
                return false;
            }
        }
        true
    }
}

/// A user's role assignment within a group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub group_id: Option<Uuid>,
    pub granted_at: DateTime<Utc>,
    pub granted_by: Option<Uuid>,
    pub is_active: bool,
}

/// Input for creating a role
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRoleInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub group_id: Option<Uuid>,
    pub parent_role_id: Option<Uuid>,
    #[serde(default = "default_true")]
    pub inherit_permissions: bool,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub is_system_role: bool,
}

fn default_true() -> bool {
    true
}

/// Input for granting a permission to a role
#[derive(Debug, Clone, Deserialize)]
pub struct GrantRolePermissionInput {
    pub role_id: Uuid,
    pub permission_id: Uuid,
    pub group_id: Option<Uuid>,
    pub conditions: Option<String>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
}

/// Input for assigning a role to a user in a group
#[derive(Debug, Clone, Deserialize)]
pub struct AssignRoleInput {
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub group_id: Option<Uuid>,
    pub granted_by: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use validator::Validate;

    #[test]
    fn test_role_default() {
        let role = Role::default();
        assert_eq!(role.hierarchy_level, 0);
        assert_eq!(role.hierarchy_path, role.id.to_string());
        assert!(role.inherit_permissions);
        assert!(role.is_active);
    }

    #[test]
    fn test_role_permission_window() {
        let now = Utc::now();
        let grant = RolePermission {
            role_id: Uuid::new_v4(),
            permission_id: Uuid::new_v4(),
            group_id: None,
            granted_at: now,
            conditions: None,
            valid_from: Some(now - Duration::hours(1)),
            valid_until: Some(now + Duration::hours(1)),
        };
        assert!(grant.is_active_at(now));
        assert!(!grant.is_active_at(now - Duration::hours(2)));
        assert!(!grant.is_active_at(now + Duration::hours(2)));
        // valid_until is exclusive
        assert!(!grant.is_active_at(now + Duration::hours(1)));
    }

    #[test]
    fn test_role_permission_unbounded_window() {
        let grant = RolePermission {
            role_id: Uuid::new_v4(),
            permission_id: Uuid::new_v4(),
            group_id: None,
            granted_at: Utc::now(),
            conditions: None,
            valid_from: None,
            valid_until: None,
        };
        assert!(grant.is_active_at(Utc::now()));
        assert!(grant.is_active_at(Utc::now() + Duration::days(365)));
    }

    #[test]
    fn test_create_role_input_validation() {
        let input = CreateRoleInput {
            name: "Admin".to_string(),
            group_id: Some(Uuid::new_v4()),
            parent_role_id: None,
            inherit_permissions: true,
            priority: 10,
            is_system_role: false,
        };
        assert!(input.validate().is_ok());

        let bad = CreateRoleInput {
            name: String::new(),
            ..input
        };
        assert!(bad.validate().is_err());
    }
}
