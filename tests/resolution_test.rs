//! Catalog, hierarchy, and grant resolution integration tests

mod common;

use common::*;
use chrono::Utc;
use trustgate::domain::{
    AssignRoleInput, CreateRoleInput, GrantDecision, GrantRolePermissionInput,
};
use trustgate::repository::RoleRepository;
use trustgate::service::GrantResolver;
use uuid::Uuid;

#[tokio::test]
async fn test_inherited_role_permission_grants_access() {
    let engine = build_engine();
    let user_id = Uuid::new_v4();
    let perm = seed_permission(&engine, "users", "read").await;

    // Permission hangs off the parent role; the user only holds the child.
    let parent = engine
        .roles
        .create_role(&CreateRoleInput {
            name: "admin".to_string(),
            group_id: None,
            parent_role_id: None,
            inherit_permissions: true,
            priority: 0,
            is_system_role: false,
        })
        .await
        .unwrap();
    let child = engine
        .roles
        .create_role(&CreateRoleInput {
            name: "operator".to_string(),
            group_id: None,
            parent_role_id: Some(parent.id),
            inherit_permissions: true,
            priority: 0,
            is_system_role: false,
        })
        .await
        .unwrap();
    engine
        .roles
        .grant_permission(&GrantRolePermissionInput {
            role_id: parent.id,
            permission_id: perm.id,
            group_id: None,
            conditions: None,
            valid_from: None,
            valid_until: None,
        })
        .await
        .unwrap();
    engine
        .roles
        .assign_role(&AssignRoleInput {
            user_id,
            role_id: child.id,
            group_id: None,
            granted_by: None,
        })
        .await
        .unwrap();

    let response = engine
        .evaluator
        .evaluate(&access_request(user_id, "users", "read"))
        .await
        .unwrap();
    assert!(response.decision.is_allow());
    assert_eq!(response.matched_permission_id, Some(perm.id));
}

#[tokio::test]
async fn test_group_scoped_grant_invisible_to_other_tenants() {
    let engine = build_engine();
    let user_id = Uuid::new_v4();
    let group_a = Uuid::new_v4();
    let perm = seed_permission(&engine, "users", "read").await;

    let role = engine
        .roles
        .create_role(&CreateRoleInput {
            name: "a-viewer".to_string(),
            group_id: Some(group_a),
            parent_role_id: None,
            inherit_permissions: true,
            priority: 0,
            is_system_role: false,
        })
        .await
        .unwrap();
    engine
        .roles
        .grant_permission(&GrantRolePermissionInput {
            role_id: role.id,
            permission_id: perm.id,
            group_id: Some(group_a),
            conditions: None,
            valid_from: None,
            valid_until: None,
        })
        .await
        .unwrap();
    engine
        .roles
        .assign_role(&AssignRoleInput {
            user_id,
            role_id: role.id,
            group_id: Some(group_a),
            granted_by: None,
        })
        .await
        .unwrap();

    let mut in_group = access_request(user_id, "users", "read");
    in_group.group_id = Some(group_a);
    assert!(engine
        .evaluator
        .evaluate(&in_group)
        .await
        .unwrap()
        .decision
        .is_allow());

    let mut other_group = access_request(user_id, "users", "read");
    other_group.group_id = Some(Uuid::new_v4());
    let response = engine.evaluator.evaluate(&other_group).await.unwrap();
    assert_eq!(response.reason.as_deref(), Some("insufficient permission"));
}

#[tokio::test]
async fn test_wildcard_role_grant_covers_multiple_actions() {
    let engine = build_engine();
    let user_id = Uuid::new_v4();
    let wildcard = seed_wildcard_permission(&engine, "reports:*").await;
    seed_role_grant(&engine, user_id, wildcard.id).await;

    for action in ["read", "export", "delete"] {
        let set = engine
            .grants
            .decision_set(&access_request(user_id, "reports", action), Utc::now())
            .await
            .unwrap();
        assert!(
            matches!(set.decision_for("reports", action), GrantDecision::Allow { .. }),
            "expected allow for reports:{action}"
        );
    }

    let set = engine
        .grants
        .decision_set(&access_request(user_id, "users", "read"), Utc::now())
        .await
        .unwrap();
    assert_eq!(set.decision_for("users", "read"), GrantDecision::Deny);
}

#[tokio::test]
async fn test_best_match_is_stable_across_calls() {
    let engine = build_engine();
    seed_wildcard_permission(&engine, "users:**").await;
    let concrete = seed_permission(&engine, "users", "read").await;
    seed_wildcard_permission(&engine, "users:*").await;

    for _ in 0..5 {
        let best = engine
            .catalog
            .best_match("users", "read")
            .await
            .unwrap()
            .unwrap();
        // Concrete beats wildcards at equal priority.
        assert_eq!(best.id, concrete.id);
    }
}

#[tokio::test]
async fn test_deactivated_permission_stops_granting() {
    let engine = build_engine();
    let user_id = Uuid::new_v4();
    let perm = seed_permission(&engine, "users", "read").await;
    seed_role_grant(&engine, user_id, perm.id).await;

    assert!(engine
        .evaluator
        .evaluate(&access_request(user_id, "users", "read"))
        .await
        .unwrap()
        .decision
        .is_allow());

    engine.catalog.deactivate(perm.id).await.unwrap();
    engine.grants.invalidate_user(user_id);

    let response = engine
        .evaluator
        .evaluate(&access_request(user_id, "users", "read"))
        .await
        .unwrap();
    assert_eq!(response.reason.as_deref(), Some("insufficient permission"));
}
