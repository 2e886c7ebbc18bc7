//! Unified error handling for the Trustgate engine

use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Engine-wide result type
pub type Result<T> = std::result::Result<T, EngineError>;

/// Engine error taxonomy.
///
/// Everything except `CycleDetected` and `Timeout` is an expected, recoverable
/// condition that resolves to a Deny/Conditional decision. Those two indicate
/// data corruption or infrastructure degradation; they are logged as
/// operational faults and still resolve to Deny. The engine never fails open.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Cycle detected in hierarchy at {0}")]
    CycleDetected(Uuid),

    #[error("Permission {0} not found")]
    PermissionNotFound(Uuid),

    #[error("Grant expired at {0}")]
    ExpiredGrant(DateTime<Utc>),

    #[error("Grant is scoped to a different group than the request")]
    GroupMismatch,

    #[error("Trust score {score} below required minimum {required}")]
    InsufficientTrust { score: u8, required: u8 },

    #[error("Policy violation: {0}")]
    PolicyViolation(String),

    #[error("Lookup timed out after {0:?}")]
    Timeout(Duration),

    #[error("Condition evaluation failed: {0}")]
    ConditionEvaluationFailed(String),

    #[error("Version conflict: expected {expected}, found {found}")]
    VersionConflict { expected: u64, found: u64 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl EngineError {
    /// True for errors that indicate data corruption or infrastructure
    /// degradation rather than an expected authorization outcome.
    pub fn is_operational_fault(&self) -> bool {
        matches!(self, EngineError::CycleDetected(_) | EngineError::Timeout(_))
    }

    /// Human-readable denial reason safe to expose across the API boundary.
    /// No stack traces or internal identifiers leak through here.
    pub fn deny_reason(&self) -> String {
        match self {
            EngineError::InsufficientTrust { .. } => "insufficient trust".to_string(),
            EngineError::Timeout(_) => "authorization lookup timed out".to_string(),
            EngineError::CycleDetected(_) => "authorization data unavailable".to_string(),
            EngineError::PermissionNotFound(_)
            | EngineError::ExpiredGrant(_)
            | EngineError::GroupMismatch => "insufficient permission".to_string(),
            _ => "access denied".to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for EngineError {
    fn from(errors: validator::ValidationErrors) -> Self {
        EngineError::Validation(errors.to_string())
    }
}
