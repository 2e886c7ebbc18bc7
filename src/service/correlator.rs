//! Alert correlation: dedup, throttling, lifecycle, and auto-resolution

use crate::domain::{
    AlertCategory, AlertStatus, CreateSecurityAlertInput, PolicyViolation, SecurityAlert,
};
use crate::error::Result;
use crate::repository::{AlertRuleRepository, SecurityAlertRepository};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use metrics::counter;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Seam the evaluator notifies after recording a violation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ViolationSink: Send + Sync {
    /// Correlate a violation into zero or more alerts.
    async fn on_violation(&self, violation: PolicyViolation) -> Result<Vec<SecurityAlert>>;
}

/// Turns policy violations into deduplicated, throttled security alerts.
///
/// Dedup and cap checks run under a per-`(rule, user)` async lock so two
/// concurrent violations for the same principal cannot both pass the
/// cooldown check and double-fire.
pub struct AlertCorrelator<AR, SA>
where
    AR: AlertRuleRepository,
    SA: SecurityAlertRepository,
{
    rules: Arc<AR>,
    alerts: Arc<SA>,
    locks: Mutex<HashMap<(Uuid, Uuid), Arc<AsyncMutex<()>>>>,
}

impl<AR, SA> AlertCorrelator<AR, SA>
where
    AR: AlertRuleRepository + 'static,
    SA: SecurityAlertRepository + 'static,
{
    pub fn new(rules: Arc<AR>, alerts: Arc<SA>) -> Self {
        Self {
            rules,
            alerts,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn key_lock(&self, rule_id: Uuid, user_id: Uuid) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry((rule_id, user_id))
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    pub async fn acknowledge(&self, alert_id: Uuid, actor: Uuid) -> Result<SecurityAlert> {
        self.alerts
            .set_status(alert_id, AlertStatus::Acknowledged, Some(actor))
            .await
    }

    pub async fn resolve(&self, alert_id: Uuid, actor: Uuid) -> Result<SecurityAlert> {
        self.alerts
            .set_status(alert_id, AlertStatus::Resolved, Some(actor))
            .await
    }

    pub async fn list_unresolved(&self, offset: usize, limit: usize) -> Result<Vec<SecurityAlert>> {
        self.alerts.list_unresolved(offset, limit).await
    }

    /// One pass of the auto-resolve sweep: resolve unresolved alerts older
    /// than their rule's TTL. Returns how many were resolved.
    pub async fn sweep_auto_resolve(&self) -> Result<u64> {
        let now = Utc::now();
        let mut resolved = 0u64;
        for rule in self.rules.list_active().await? {
            let Some(ttl) = rule.auto_resolve_after() else {
                continue;
            };
            let cutoff = now - ttl;
            for alert in self.alerts.list_unresolved_for_rule(rule.id).await? {
                if alert.created_at <= cutoff {
                    self.alerts
                        .set_status(alert.id, AlertStatus::Resolved, None)
                        .await?;
                    resolved += 1;
                }
            }
        }
        if resolved > 0 {
            info!(resolved, "auto-resolved aged alerts");
        }
        Ok(resolved)
    }

    /// Run the sweep on a fixed interval until the task is aborted.
    pub fn spawn_sweeper(self: Arc<Self>, interval_secs: u64) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(std::time::Duration::from_secs(interval_secs.max(1)));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Err(e) = self.sweep_auto_resolve().await {
                    warn!(error = %e, "alert auto-resolve sweep failed");
                }
            }
        })
    }
}

#[async_trait]
impl<AR, SA> ViolationSink for AlertCorrelator<AR, SA>
where
    AR: AlertRuleRepository + 'static,
    SA: SecurityAlertRepository + 'static,
{
    async fn on_violation(&self, violation: PolicyViolation) -> Result<Vec<SecurityAlert>> {
        let now = Utc::now();
        let mut created = Vec::new();

        for rule in self
            .rules
            .list_active_by_category(AlertCategory::PolicyViolation)
            .await?
        {
            let lock = self.key_lock(rule.id, violation.user_id);
            let _guard = lock.lock().await;

            // Cooldown dedup on (rule, user, resource).
            let window_start = now - rule.cooldown();
            if let Some(existing) = self
                .alerts
                .find_recent(rule.id, violation.user_id, &violation.resource, window_start)
                .await?
            {
                debug!(
                    alert_id = %existing.id,
                    rule_id = %rule.id,
                    "violation within cooldown, suppressed"
                );
                counter!("trustgate_alerts_suppressed_total", "cause" => "cooldown").increment(1);
                continue;
            }

            // Hourly cap per rule.
            let recent = self
                .alerts
                .count_for_rule_since(rule.id, now - Duration::hours(1))
                .await?;
            if recent >= rule.max_alerts_per_hour as u64 {
                warn!(rule_id = %rule.id, recent, "alert rule hourly cap reached");
                counter!("trustgate_alerts_suppressed_total", "cause" => "hourly_cap").increment(1);
                continue;
            }

            let alert = self
                .alerts
                .create(&CreateSecurityAlertInput {
                    rule_id: rule.id,
                    user_id: violation.user_id,
                    group_id: violation.group_id,
                    resource: violation.resource.clone(),
                    severity: rule.severity,
                    details: Some(serde_json::json!({
                        "policy_id": violation.policy_id,
                        "action": violation.action,
                        "trust_score": violation.trust_score,
                        "detail": violation.detail,
                    })),
                })
                .await?;
            counter!("trustgate_alerts_created_total").increment(1);
            info!(alert_id = %alert.id, rule_id = %rule.id, user_id = %violation.user_id, "security alert created");
            created.push(alert);
        }

        Ok(created)
    }
}
