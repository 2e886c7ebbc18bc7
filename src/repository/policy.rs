//! Security policy and violation stores

use crate::domain::{CreateSecurityPolicyInput, PolicyViolation, SecurityPolicy};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;
use validator::Validate;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SecurityPolicyRepository: Send + Sync {
    async fn create(&self, input: &CreateSecurityPolicyInput) -> Result<SecurityPolicy>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<SecurityPolicy>>;
    /// Active policies applicable to a group: tenant-scoped plus global,
    /// highest priority first.
    async fn find_applicable(&self, group_id: Option<Uuid>) -> Result<Vec<SecurityPolicy>>;
    async fn deactivate(&self, id: Uuid) -> Result<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PolicyViolationRepository: Send + Sync {
    async fn record(&self, violation: &PolicyViolation) -> Result<()>;
    /// Violations for a user, newest first.
    async fn list_for_user(&self, user_id: Uuid, limit: usize) -> Result<Vec<PolicyViolation>>;
    async fn count_since(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<u64>;
}

/// In-memory policy store
#[derive(Default)]
pub struct InMemorySecurityPolicyRepository {
    policies: RwLock<HashMap<Uuid, SecurityPolicy>>,
}

impl InMemorySecurityPolicyRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecurityPolicyRepository for InMemorySecurityPolicyRepository {
    async fn create(&self, input: &CreateSecurityPolicyInput) -> Result<SecurityPolicy> {
        input.validate()?;
        let policy = SecurityPolicy {
            id: Uuid::new_v4(),
            group_id: input.group_id,
            name: input.name.clone(),
            category: input.category,
            rules: input.rules.clone(),
            conditions: input.conditions.clone(),
            minimum_trust_score: input.minimum_trust_score,
            severity: input.severity,
            is_enforced: input.is_enforced,
            priority: input.priority,
            is_active: true,
            created_at: Utc::now(),
        };
        self.policies.write().await.insert(policy.id, policy.clone());
        Ok(policy)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<SecurityPolicy>> {
        Ok(self.policies.read().await.get(&id).cloned())
    }

    async fn find_applicable(&self, group_id: Option<Uuid>) -> Result<Vec<SecurityPolicy>> {
        let policies = self.policies.read().await;
        let mut applicable: Vec<SecurityPolicy> = policies
            .values()
            .filter(|p| p.is_active && (p.group_id.is_none() || p.group_id == group_id))
            .cloned()
            .collect();
        applicable.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(applicable)
    }

    async fn deactivate(&self, id: Uuid) -> Result<()> {
        let mut policies = self.policies.write().await;
        let policy = policies
            .get_mut(&id)
            .ok_or_else(|| EngineError::NotFound(format!("Policy {id} not found")))?;
        policy.is_active = false;
        Ok(())
    }
}

/// In-memory violation log
#[derive(Default)]
pub struct InMemoryPolicyViolationRepository {
    violations: RwLock<Vec<PolicyViolation>>,
}

impl InMemoryPolicyViolationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PolicyViolationRepository for InMemoryPolicyViolationRepository {
    async fn record(&self, violation: &PolicyViolation) -> Result<()> {
        self.violations.write().await.push(violation.clone());
        Ok(())
    }

    async fn list_for_user(&self, user_id: Uuid, limit: usize) -> Result<Vec<PolicyViolation>> {
        let violations = self.violations.read().await;
        Ok(violations
            .iter()
            .rev()
            .filter(|v| v.user_id == user_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count_since(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<u64> {
        let violations = self.violations.read().await;
        Ok(violations
            .iter()
            .filter(|v| v.user_id == user_id && v.occurred_at >= since)
            .count() as u64)
    }
}
