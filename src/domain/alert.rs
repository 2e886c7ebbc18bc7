//! Alert rules, security alerts, and the alert state machine

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed alert severity enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// Closed alert category enumeration; violations are matched to rules by
/// category, never by free-form strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCategory {
    PolicyViolation,
    HighRiskAccess,
    PrivilegeEscalation,
}

/// Correlation rule with cooldown and hourly throttling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRule {
    pub id: Uuid,
    pub name: String,
    pub category: AlertCategory,
    pub severity: AlertSeverity,
    /// Dedup window: repeated violations for the same `(rule, user, resource)`
    /// within this window produce no new alert.
    pub cooldown_secs: i64,
    pub max_alerts_per_hour: u32,
    /// Alerts auto-resolve after this TTL via the background sweep.
    pub auto_resolve_secs: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl AlertRule {
    pub fn cooldown(&self) -> Duration {
        Duration::seconds(self.cooldown_secs)
    }

    pub fn auto_resolve_after(&self) -> Option<Duration> {
        self.auto_resolve_secs.map(Duration::seconds)
    }
}

/// Alert lifecycle: `New -> Acknowledged -> Resolved`, transitions only via
/// explicit operator action (auto-resolution is a background sweep).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    New,
    Acknowledged,
    Resolved,
}

impl AlertStatus {
    pub fn can_transition_to(&self, next: AlertStatus) -> bool {
        matches!(
            (self, next),
            (AlertStatus::New, AlertStatus::Acknowledged)
                | (AlertStatus::New, AlertStatus::Resolved)
                | (AlertStatus::Acknowledged, AlertStatus::Resolved)
        )
    }
}

/// A correlated security alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityAlert {
    pub id: Uuid,
    pub rule_id: Uuid,
    pub user_id: Uuid,
    pub group_id: Option<Uuid>,
    pub resource: String,
    pub severity: AlertSeverity,
    pub status: AlertStatus,
    pub details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub acknowledged_by: Option<Uuid>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<Uuid>,
}

impl Default for SecurityAlert {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            rule_id: Uuid::nil(),
            user_id: Uuid::nil(),
            group_id: None,
            resource: String::new(),
            severity: AlertSeverity::Low,
            status: AlertStatus::New,
            details: None,
            created_at: Utc::now(),
            acknowledged_at: None,
            acknowledged_by: None,
            resolved_at: None,
            resolved_by: None,
        }
    }
}

/// Input for creating an alert
#[derive(Debug, Clone)]
pub struct CreateSecurityAlertInput {
    pub rule_id: Uuid,
    pub user_id: Uuid,
    pub group_id: Option<Uuid>,
    pub resource: String,
    pub severity: AlertSeverity,
    pub details: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_machine_allowed_transitions() {
        assert!(AlertStatus::New.can_transition_to(AlertStatus::Acknowledged));
        assert!(AlertStatus::New.can_transition_to(AlertStatus::Resolved));
        assert!(AlertStatus::Acknowledged.can_transition_to(AlertStatus::Resolved));
    }

    #[test]
    fn test_state_machine_forbidden_transitions() {
        assert!(!AlertStatus::Resolved.can_transition_to(AlertStatus::New));
        assert!(!AlertStatus::Resolved.can_transition_to(AlertStatus::Acknowledged));
        assert!(!AlertStatus::Acknowledged.can_transition_to(AlertStatus::New));
        assert!(!AlertStatus::New.can_transition_to(AlertStatus::New));
    }

    #[test]
    fn test_rule_durations() {
        let rule = AlertRule {
            id: Uuid::new_v4(),
            name: "repeat policy violations".to_string(),
            category: AlertCategory::PolicyViolation,
            severity: AlertSeverity::High,
            cooldown_secs: 600,
            max_alerts_per_hour: 4,
            auto_resolve_secs: Some(86400),
            is_active: true,
            created_at: Utc::now(),
        };
        assert_eq!(rule.cooldown(), Duration::seconds(600));
        assert_eq!(rule.auto_resolve_after(), Some(Duration::seconds(86400)));
    }

    #[test]
    fn test_alert_default_is_new() {
        let alert = SecurityAlert::default();
        assert_eq!(alert.status, AlertStatus::New);
        assert!(alert.resolved_at.is_none());
    }
}
