//! Identity/device signal provider seam
//!
//! Trust sub-scores are derived from raw posture signals owned by an external
//! identity and device-management plane. The engine only sees this trait.

use crate::domain::{TrustSignals, TrustSubject};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve the current posture signals for a subject. Unknown subjects
    /// get the maximally distrustful default, not an error.
    async fn trust_signals(&self, subject: &TrustSubject) -> Result<TrustSignals>;
}

/// Fixed-signal provider for embedding and tests.
#[derive(Default)]
pub struct StaticIdentityProvider {
    default_signals: TrustSignals,
    overrides: RwLock<HashMap<TrustSubject, TrustSignals>>,
}

impl StaticIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(default_signals: TrustSignals) -> Self {
        Self {
            default_signals,
            overrides: RwLock::new(HashMap::new()),
        }
    }

    pub async fn set(&self, subject: TrustSubject, signals: TrustSignals) {
        self.overrides.write().await.insert(subject, signals);
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn trust_signals(&self, subject: &TrustSubject) -> Result<TrustSignals> {
        let overrides = self.overrides.read().await;
        Ok(overrides
            .get(subject)
            .cloned()
            .unwrap_or_else(|| self.default_signals.clone()))
    }
}
