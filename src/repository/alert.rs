//! Alert rule and security alert stores

use crate::domain::{
    AlertCategory, AlertRule, AlertStatus, CreateSecurityAlertInput, SecurityAlert,
};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AlertRuleRepository: Send + Sync {
    async fn upsert(&self, rule: &AlertRule) -> Result<()>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<AlertRule>>;
    async fn list_active(&self) -> Result<Vec<AlertRule>>;
    async fn list_active_by_category(&self, category: AlertCategory) -> Result<Vec<AlertRule>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SecurityAlertRepository: Send + Sync {
    async fn create(&self, input: &CreateSecurityAlertInput) -> Result<SecurityAlert>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<SecurityAlert>>;
    /// Transition an alert's status, enforcing the lifecycle state machine.
    async fn set_status(
        &self,
        id: Uuid,
        next: AlertStatus,
        actor: Option<Uuid>,
    ) -> Result<SecurityAlert>;
    /// Most recent alert for a `(rule, user, resource)` triple created at or
    /// after `since`; used for cooldown dedup.
    async fn find_recent(
        &self,
        rule_id: Uuid,
        user_id: Uuid,
        resource: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<SecurityAlert>>;
    /// Alerts created for a rule at or after `since`; used for hourly caps.
    async fn count_for_rule_since(&self, rule_id: Uuid, since: DateTime<Utc>) -> Result<u64>;
    async fn list_unresolved_for_rule(&self, rule_id: Uuid) -> Result<Vec<SecurityAlert>>;
    /// Unresolved alerts, newest first, paged.
    async fn list_unresolved(&self, offset: usize, limit: usize) -> Result<Vec<SecurityAlert>>;
    async fn count_unresolved(&self) -> Result<u64>;
}

/// In-memory alert rule store
#[derive(Default)]
pub struct InMemoryAlertRuleRepository {
    rules: RwLock<HashMap<Uuid, AlertRule>>,
}

impl InMemoryAlertRuleRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AlertRuleRepository for InMemoryAlertRuleRepository {
    async fn upsert(&self, rule: &AlertRule) -> Result<()> {
        if rule.cooldown_secs < 0 {
            return Err(EngineError::Validation(
                "Alert rule cooldown must not be negative".to_string(),
            ));
        }
        self.rules.write().await.insert(rule.id, rule.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<AlertRule>> {
        Ok(self.rules.read().await.get(&id).cloned())
    }

    async fn list_active(&self) -> Result<Vec<AlertRule>> {
        let rules = self.rules.read().await;
        Ok(rules.values().filter(|r| r.is_active).cloned().collect())
    }

    async fn list_active_by_category(&self, category: AlertCategory) -> Result<Vec<AlertRule>> {
        let rules = self.rules.read().await;
        Ok(rules
            .values()
            .filter(|r| r.is_active && r.category == category)
            .cloned()
            .collect())
    }
}

/// In-memory alert store
#[derive(Default)]
pub struct InMemorySecurityAlertRepository {
    alerts: RwLock<Vec<SecurityAlert>>,
}

impl InMemorySecurityAlertRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecurityAlertRepository for InMemorySecurityAlertRepository {
    async fn create(&self, input: &CreateSecurityAlertInput) -> Result<SecurityAlert> {
        let alert = SecurityAlert {
            id: Uuid::new_v4(),
            rule_id: input.rule_id,
            user_id: input.user_id,
            group_id: input.group_id,
            resource: input.resource.clone(),
            severity: input.severity,
            status: AlertStatus::New,
            details: input.details.clone(),
            created_at: Utc::now(),
            acknowledged_at: None,
            acknowledged_by: None,
            resolved_at: None,
            resolved_by: None,
        };
        self.alerts.write().await.push(alert.clone());
        Ok(alert)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<SecurityAlert>> {
        let alerts = self.alerts.read().await;
        Ok(alerts.iter().find(|a| a.id == id).cloned())
    }

    async fn set_status(
        &self,
        id: Uuid,
        next: AlertStatus,
        actor: Option<Uuid>,
    ) -> Result<SecurityAlert> {
        let mut alerts = self.alerts.write().await;
        let alert = alerts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| EngineError::NotFound(format!("Alert {id} not found")))?;
        if !alert.status.can_transition_to(next) {
            return Err(EngineError::Validation(format!(
                "Invalid alert transition {:?} -> {:?}",
                alert.status, next
            )));
        }
        let now = Utc::now();
        alert.status = next;
        match next {
            AlertStatus::Acknowledged => {
                alert.acknowledged_at = Some(now);
                alert.acknowledged_by = actor;
            }
            AlertStatus::Resolved => {
                alert.resolved_at = Some(now);
                alert.resolved_by = actor;
            }
            AlertStatus::New => {}
        }
        Ok(alert.clone())
    }

    async fn find_recent(
        &self,
        rule_id: Uuid,
        user_id: Uuid,
        resource: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<SecurityAlert>> {
        let alerts = self.alerts.read().await;
        Ok(alerts
            .iter()
            .rev()
            .find(|a| {
                a.rule_id == rule_id
                    && a.user_id == user_id
                    && a.resource == resource
                    && a.created_at >= since
            })
            .cloned())
    }

    async fn count_for_rule_since(&self, rule_id: Uuid, since: DateTime<Utc>) -> Result<u64> {
        let alerts = self.alerts.read().await;
        Ok(alerts
            .iter()
            .filter(|a| a.rule_id == rule_id && a.created_at >= since)
            .count() as u64)
    }

    async fn list_unresolved_for_rule(&self, rule_id: Uuid) -> Result<Vec<SecurityAlert>> {
        let alerts = self.alerts.read().await;
        Ok(alerts
            .iter()
            .filter(|a| a.rule_id == rule_id && a.status != AlertStatus::Resolved)
            .cloned()
            .collect())
    }

    async fn list_unresolved(&self, offset: usize, limit: usize) -> Result<Vec<SecurityAlert>> {
        let alerts = self.alerts.read().await;
        Ok(alerts
            .iter()
            .rev()
            .filter(|a| a.status != AlertStatus::Resolved)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count_unresolved(&self) -> Result<u64> {
        let alerts = self.alerts.read().await;
        Ok(alerts
            .iter()
            .filter(|a| a.status != AlertStatus::Resolved)
            .count() as u64)
    }
}
