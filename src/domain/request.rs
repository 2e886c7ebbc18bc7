//! Access-check request and response types (the engine's API boundary)

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::policy::Decision;

/// An access-check request submitted by an upstream service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessRequest {
    pub principal_id: Uuid,
    pub device_id: String,
    pub ip_address: String,
    pub group_id: Option<Uuid>,
    pub resource: String,
    pub action: String,
    /// Caller-supplied idempotency key; audit writes replay safely under it.
    pub request_id: Uuid,
}

/// The structured decision returned to callers. Only `policy_id` and
/// `matched_permission_id` cross the boundary as internal identifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessResponse {
    pub decision: Decision,
    pub reason: Option<String>,
    pub matched_permission_id: Option<Uuid>,
    /// Effective trust score used for the decision, when one was consulted.
    pub trust_score: Option<u8>,
    pub policy_id: Option<Uuid>,
}

impl AccessResponse {
    pub fn deny(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            decision: Decision::Deny {
                reason: reason.clone(),
            },
            reason: Some(reason),
            matched_permission_id: None,
            trust_score: None,
            policy_id: None,
        }
    }
}
