//! Common test utilities

#![allow(dead_code)]

use std::sync::Arc;

use trustgate::config::Config;
use trustgate::domain::{
    AccessRequest, AlertCategory, AlertRule, AlertSeverity, AssignRoleInput,
    CreatePermissionInput, CreateRoleInput, CreateSecurityPolicyInput, CreateUserPermissionInput,
    GrantKind, GrantRolePermissionInput, Permission, PolicyCategory, PolicySeverity, Role,
    TrustEvent, TrustSignals, TrustSubject, UserPermission,
};
use trustgate::policy::JsonConditionEvaluator;
use trustgate::repository::{
    InMemoryAlertRuleRepository, InMemoryAuditSink, InMemoryPermissionRepository,
    InMemoryPolicyViolationRepository, InMemoryRoleRepository, InMemorySecurityAlertRepository,
    InMemorySecurityPolicyRepository, InMemoryTrustScoreRepository,
    AlertRuleRepository, InMemoryUserPermissionRepository, RoleRepository,
    SecurityPolicyRepository, StaticIdentityProvider,
};
use trustgate::service::{
    AlertCorrelator, GrantStore, PermissionCatalog, PolicyEvaluator, RoleHierarchyResolver,
    TrustScoreEngine,
};
use chrono::Utc;
use uuid::Uuid;

pub type TestGrantStore = GrantStore<
    InMemoryPermissionRepository,
    InMemoryRoleRepository,
    InMemoryUserPermissionRepository,
>;
pub type TestTrustEngine = TrustScoreEngine<InMemoryTrustScoreRepository, StaticIdentityProvider>;
pub type TestCorrelator =
    AlertCorrelator<InMemoryAlertRuleRepository, InMemorySecurityAlertRepository>;
pub type TestEvaluator = PolicyEvaluator<
    TestGrantStore,
    TestTrustEngine,
    InMemorySecurityPolicyRepository,
    InMemoryPolicyViolationRepository,
    InMemoryAuditSink,
>;

/// A fully wired engine over in-memory stores.
pub struct TestEngine {
    pub catalog: Arc<PermissionCatalog<InMemoryPermissionRepository>>,
    pub roles: Arc<InMemoryRoleRepository>,
    pub grants: Arc<TestGrantStore>,
    pub identity: Arc<StaticIdentityProvider>,
    pub trust: Arc<TestTrustEngine>,
    pub policies: Arc<InMemorySecurityPolicyRepository>,
    pub violations: Arc<InMemoryPolicyViolationRepository>,
    pub audit: Arc<InMemoryAuditSink>,
    pub alert_rules: Arc<InMemoryAlertRuleRepository>,
    pub correlator: Arc<TestCorrelator>,
    pub evaluator: TestEvaluator,
}

pub fn build_engine() -> TestEngine {
    let config = Config::default();

    let catalog = Arc::new(PermissionCatalog::new(
        Arc::new(InMemoryPermissionRepository::new()),
        &config.cache,
    ));
    let roles = Arc::new(InMemoryRoleRepository::new());
    let hierarchy = Arc::new(RoleHierarchyResolver::new(roles.clone(), &config.cache));
    let conditions = Arc::new(JsonConditionEvaluator);
    let grants = Arc::new(GrantStore::new(
        catalog.clone(),
        hierarchy,
        Arc::new(InMemoryUserPermissionRepository::new()),
        conditions.clone(),
        &config.cache,
    ));

    let identity = Arc::new(StaticIdentityProvider::new());
    let trust = Arc::new(TrustScoreEngine::new(
        Arc::new(InMemoryTrustScoreRepository::new()),
        identity.clone(),
        config.trust.clone(),
    ));

    let policies = Arc::new(InMemorySecurityPolicyRepository::new());
    let violations = Arc::new(InMemoryPolicyViolationRepository::new());
    let audit = Arc::new(InMemoryAuditSink::new());

    let alert_rules = Arc::new(InMemoryAlertRuleRepository::new());
    let correlator = Arc::new(AlertCorrelator::new(
        alert_rules.clone(),
        Arc::new(InMemorySecurityAlertRepository::new()),
    ));

    let evaluator = PolicyEvaluator::new(
        grants.clone(),
        trust.clone(),
        policies.clone(),
        violations.clone(),
        audit.clone(),
        correlator.clone(),
        conditions,
        config.evaluation.lookup_timeout,
    );

    TestEngine {
        catalog,
        roles,
        grants,
        identity,
        trust,
        policies,
        violations,
        audit,
        alert_rules,
        correlator,
        evaluator,
    }
}

pub fn access_request(user_id: Uuid, resource: &str, action: &str) -> AccessRequest {
    AccessRequest {
        principal_id: user_id,
        device_id: "laptop-7".to_string(),
        ip_address: "198.51.100.4".to_string(),
        group_id: None,
        resource: resource.to_string(),
        action: action.to_string(),
        request_id: Uuid::new_v4(),
    }
}

pub fn subject_for(request: &AccessRequest) -> TrustSubject {
    TrustSubject {
        user_id: request.principal_id,
        device_id: request.device_id.clone(),
        ip_address: request.ip_address.clone(),
    }
}

pub async fn seed_permission(engine: &TestEngine, resource: &str, action: &str) -> Permission {
    engine
        .catalog
        .create(&CreatePermissionInput {
            service_id: Uuid::new_v4(),
            name: format!("{resource} {action}"),
            resource: resource.to_string(),
            action: action.to_string(),
            parent_id: None,
            priority: 0,
            wildcard_pattern: None,
            inherits_from_parent: true,
            is_implicit: false,
        })
        .await
        .unwrap()
}

pub async fn seed_wildcard_permission(engine: &TestEngine, pattern: &str) -> Permission {
    engine
        .catalog
        .create(&CreatePermissionInput {
            service_id: Uuid::new_v4(),
            name: format!("wildcard {pattern}"),
            resource: "any".to_string(),
            action: "any".to_string(),
            parent_id: None,
            priority: 0,
            wildcard_pattern: Some(pattern.to_string()),
            inherits_from_parent: true,
            is_implicit: false,
        })
        .await
        .unwrap()
}

/// Create a role, grant it a permission, and assign it to the user.
pub async fn seed_role_grant(engine: &TestEngine, user_id: Uuid, permission_id: Uuid) -> Role {
    let role = engine
        .roles
        .create_role(&CreateRoleInput {
            name: format!("role-{}", Uuid::new_v4()),
            group_id: None,
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
            permission_id,
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
            role_id: role.id,
            group_id: None,
            granted_by: None,
        })
        .await
        .unwrap();
    engine.grants.invalidate_user(user_id);
    role
}

pub async fn seed_user_deny(engine: &TestEngine, user_id: Uuid, pattern: &str) -> UserPermission {
    engine
        .grants
        .grant_user_permission(&CreateUserPermissionInput {
            user_id,
            permission_id: None,
            permission_pattern: Some(pattern.to_string()),
            kind: GrantKind::Deny,
            group_id: None,
            conditions: None,
            valid_from: None,
            expires_at: None,
            granted_by: None,
        })
        .await
        .unwrap()
}

pub async fn seed_trust_policy(engine: &TestEngine, minimum: u8, enforced: bool) -> Uuid {
    engine
        .policies
        .create(&CreateSecurityPolicyInput {
            name: format!("minimum trust {minimum}"),
            group_id: None,
            category: PolicyCategory::AccessControl,
            rules: serde_json::json!({}),
            conditions: None,
            minimum_trust_score: minimum,
            severity: PolicySeverity::High,
            is_enforced: enforced,
            priority: 0,
        })
        .await
        .unwrap()
        .id
}

pub async fn seed_alert_rule(engine: &TestEngine, cooldown_secs: i64, max_per_hour: u32) -> Uuid {
    let rule = AlertRule {
        id: Uuid::new_v4(),
        name: "policy violation alerts".to_string(),
        category: AlertCategory::PolicyViolation,
        severity: AlertSeverity::High,
        cooldown_secs,
        max_alerts_per_hour: max_per_hour,
        auto_resolve_secs: None,
        is_active: true,
        created_at: Utc::now(),
    };
    engine.alert_rules.upsert(&rule).await.unwrap();
    rule.id
}

/// Push signals for a subject and trigger a recompute so a fresh snapshot
/// exists before evaluation.
pub async fn establish_trust(engine: &TestEngine, subject: &TrustSubject, signals: TrustSignals) {
    engine.identity.set(subject.clone(), signals).await;
    engine
        .trust
        .handle_event(&TrustEvent::Authentication {
            subject: subject.clone(),
            mfa_used: true,
        })
        .await
        .unwrap();
}

pub fn strong_signals() -> TrustSignals {
    use trustgate::domain::{
        AuthenticationSignals, BehaviorSignals, DeviceSignals, LocationSignals, MfaStrength,
        NetworkSignals,
    };
    TrustSignals {
        device: DeviceSignals {
            managed: true,
            compliant: true,
            os_patched: true,
            jailbroken: false,
        },
        network: NetworkSignals {
            ip_reputation: 100,
            known_network: true,
            anonymizing_proxy: false,
        },
        behavior: BehaviorSignals { anomaly_score: 0 },
        authentication: AuthenticationSignals {
            mfa_strength: MfaStrength::Hardware,
            last_authenticated_at: Some(Utc::now()),
            recent_failures: 0,
        },
        location: LocationSignals {
            known_location: true,
            geovelocity_violation: false,
        },
    }
}

pub fn weak_signals() -> TrustSignals {
    use trustgate::domain::{
        AuthenticationSignals, BehaviorSignals, DeviceSignals, LocationSignals, MfaStrength,
        NetworkSignals,
    };
    TrustSignals {
        device: DeviceSignals {
            managed: false,
            compliant: false,
            os_patched: true,
            jailbroken: false,
        },
        network: NetworkSignals {
            ip_reputation: 40,
            known_network: false,
            anonymizing_proxy: false,
        },
        behavior: BehaviorSignals { anomaly_score: 60 },
        authentication: AuthenticationSignals {
            mfa_strength: MfaStrength::None,
            last_authenticated_at: None,
            recent_failures: 2,
        },
        location: LocationSignals {
            known_location: false,
            geovelocity_violation: false,
        },
    }
}
