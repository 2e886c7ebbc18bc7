//! End-to-end evaluation tests over the fully wired engine

mod common;

use common::*;
use chrono::Duration as ChronoDuration;
use chrono::Utc;
use trustgate::domain::{
    AuditQuery, CreateUserPermissionInput, Decision, GrantKind, TrustEvent,
};
use trustgate::repository::{AuditSink, PolicyViolationRepository};
use uuid::Uuid;

#[tokio::test]
async fn test_role_grant_allows_without_policies() {
    let engine = build_engine();
    let user_id = Uuid::new_v4();
    let perm = seed_permission(&engine, "users", "read").await;
    seed_role_grant(&engine, user_id, perm.id).await;

    let request = access_request(user_id, "users", "read");
    let response = engine.evaluator.evaluate(&request).await.unwrap();

    assert!(response.decision.is_allow());
    assert_eq!(response.matched_permission_id, Some(perm.id));
    assert_eq!(response.trust_score, None);

    // Exactly one audit event for the call.
    let events = engine.audit.find(&AuditQuery::default()).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].request_id, request.request_id);
}

#[tokio::test]
async fn test_user_deny_vetoes_role_allow() {
    let engine = build_engine();
    let user_id = Uuid::new_v4();
    let perm = seed_permission(&engine, "users", "read").await;
    seed_role_grant(&engine, user_id, perm.id).await;
    seed_user_deny(&engine, user_id, "users:*").await;

    let response = engine
        .evaluator
        .evaluate(&access_request(user_id, "users", "read"))
        .await
        .unwrap();
    assert_eq!(response.reason.as_deref(), Some("insufficient permission"));
}

#[tokio::test]
async fn test_wildcard_grant_with_low_trust_denies() {
    let engine = build_engine();
    let user_id = Uuid::new_v4();
    let perm = seed_wildcard_permission(&engine, "reports:*").await;
    seed_role_grant(&engine, user_id, perm.id).await;
    seed_trust_policy(&engine, 70, true).await;

    let request = access_request(user_id, "reports", "export");
    establish_trust(&engine, &subject_for(&request), weak_signals()).await;

    let response = engine.evaluator.evaluate(&request).await.unwrap();
    assert_eq!(response.reason.as_deref(), Some("insufficient trust"));
    assert!(response.trust_score.unwrap() < 70);
    assert!(response.policy_id.is_some());

    // The violation was recorded synchronously.
    let count = engine
        .violations
        .count_since(user_id, Utc::now() - ChronoDuration::hours(1))
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_strong_trust_passes_policy() {
    let engine = build_engine();
    let user_id = Uuid::new_v4();
    let perm = seed_permission(&engine, "reports", "export").await;
    seed_role_grant(&engine, user_id, perm.id).await;
    seed_trust_policy(&engine, 70, true).await;

    let request = access_request(user_id, "reports", "export");
    establish_trust(&engine, &subject_for(&request), strong_signals()).await;

    let response = engine.evaluator.evaluate(&request).await.unwrap();
    assert!(response.decision.is_allow());
    assert!(response.trust_score.unwrap() >= 70);
}

#[tokio::test]
async fn test_no_trust_snapshot_counts_as_zero() {
    let engine = build_engine();
    let user_id = Uuid::new_v4();
    let perm = seed_permission(&engine, "users", "read").await;
    seed_role_grant(&engine, user_id, perm.id).await;
    seed_trust_policy(&engine, 10, true).await;

    // No trust snapshot was ever computed for this subject.
    let response = engine
        .evaluator
        .evaluate(&access_request(user_id, "users", "read"))
        .await
        .unwrap();
    assert_eq!(response.reason.as_deref(), Some("insufficient trust"));
    assert_eq!(response.trust_score, Some(0));
}

#[tokio::test]
async fn test_invalidation_revokes_access_immediately() {
    let engine = build_engine();
    let user_id = Uuid::new_v4();
    let perm = seed_permission(&engine, "users", "read").await;
    seed_role_grant(&engine, user_id, perm.id).await;
    seed_trust_policy(&engine, 50, true).await;

    let request = access_request(user_id, "users", "read");
    let subject = subject_for(&request);
    establish_trust(&engine, &subject, strong_signals()).await;
    assert!(engine.evaluator.evaluate(&request).await.unwrap().decision.is_allow());

    engine
        .trust
        .handle_event(&TrustEvent::Invalidation {
            subject,
            reason: "device reported stolen".to_string(),
        })
        .await
        .unwrap();

    let response = engine.evaluator.evaluate(&request).await.unwrap();
    assert_eq!(response.reason.as_deref(), Some("insufficient trust"));
    assert_eq!(response.trust_score, Some(0));
}

#[tokio::test]
async fn test_future_dated_override_not_yet_active() {
    let engine = build_engine();
    let user_id = Uuid::new_v4();
    let perm = seed_permission(&engine, "users", "read").await;
    engine
        .grants
        .grant_user_permission(&CreateUserPermissionInput {
            user_id,
            permission_id: Some(perm.id),
            permission_pattern: None,
            kind: GrantKind::Allow,
            group_id: None,
            conditions: None,
            valid_from: Some(Utc::now() + ChronoDuration::hours(1)),
            expires_at: None,
            granted_by: None,
        })
        .await
        .unwrap();

    let response = engine
        .evaluator
        .evaluate(&access_request(user_id, "users", "read"))
        .await
        .unwrap();
    assert_eq!(response.reason.as_deref(), Some("insufficient permission"));
}

#[tokio::test]
async fn test_unenforced_policy_returns_conditional() {
    let engine = build_engine();
    let user_id = Uuid::new_v4();
    let perm = seed_permission(&engine, "users", "read").await;
    seed_role_grant(&engine, user_id, perm.id).await;
    seed_trust_policy(&engine, 70, false).await;

    let request = access_request(user_id, "users", "read");
    establish_trust(&engine, &subject_for(&request), weak_signals()).await;

    let response = engine.evaluator.evaluate(&request).await.unwrap();
    match response.decision {
        Decision::Conditional { ref steps } => assert!(!steps.is_empty()),
        ref other => panic!("expected conditional, got {other:?}"),
    }
}

#[tokio::test]
async fn test_replayed_request_audits_once() {
    let engine = build_engine();
    let user_id = Uuid::new_v4();
    let perm = seed_permission(&engine, "users", "read").await;
    seed_role_grant(&engine, user_id, perm.id).await;

    let request = access_request(user_id, "users", "read");
    engine.evaluator.evaluate(&request).await.unwrap();
    engine.evaluator.evaluate(&request).await.unwrap();

    assert_eq!(engine.audit.count(&AuditQuery::default()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_denied_evaluation_is_audited_with_reason() {
    let engine = build_engine();
    let user_id = Uuid::new_v4();

    let request = access_request(user_id, "users", "read");
    engine.evaluator.evaluate(&request).await.unwrap();

    let events = engine
        .audit
        .find(&AuditQuery {
            actor_id: Some(user_id),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0].decision, Decision::Deny { .. }));
    assert_eq!(events[0].reason.as_deref(), Some("insufficient permission"));
}
