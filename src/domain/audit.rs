//! Audit event domain models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::policy::Decision;

/// Append-only audit event, immutable once written. Keyed by `request_id`
/// for idempotent replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub request_id: Uuid,
    pub actor_id: Uuid,
    pub group_id: Option<Uuid>,
    pub resource: String,
    pub action: String,
    pub decision: Decision,
    pub reason: Option<String>,
    /// Before/after value snapshots for mutating operations.
    pub old_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
    pub correlation_id: Option<Uuid>,
    pub recorded_at: DateTime<Utc>,
}

/// Audit query parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditQuery {
    pub actor_id: Option<Uuid>,
    pub resource: Option<String>,
    pub action: Option<String>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl AuditQuery {
    /// Whether an event satisfies every set filter.
    pub fn matches(&self, event: &AuditEvent) -> bool {
        if let Some(actor_id) = self.actor_id {
            if event.actor_id != actor_id {
                return false;
            }
        }
        if let Some(ref resource) = self.resource {
            if &event.resource != resource {
                return false;
            }
        }
        if let Some(ref action) = self.action {
            if &event.action != action {
                return false;
            }
        }
        if let Some(from) = self.from_date {
            if event.recorded_at < from {
                return false;
            }
        }
        if let Some(to) = self.to_date {
            if event.recorded_at > to {
                return false;
            }
        }
        true
    }
}
