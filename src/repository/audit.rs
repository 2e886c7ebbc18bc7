//! Append-only audit sink

use crate::domain::{AuditEvent, AuditQuery};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::RwLock;
use uuid::Uuid;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Record an audit event. Idempotent on `request_id`: a replayed event is
    /// silently dropped, never duplicated.
    async fn record(&self, event: &AuditEvent) -> Result<()>;
    /// Query events, newest first, honoring offset/limit paging.
    async fn find(&self, query: &AuditQuery) -> Result<Vec<AuditEvent>>;
    async fn count(&self, query: &AuditQuery) -> Result<u64>;
}

/// In-memory audit log
#[derive(Default)]
pub struct InMemoryAuditSink {
    events: RwLock<Vec<AuditEvent>>,
    seen: RwLock<HashSet<Uuid>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn record(&self, event: &AuditEvent) -> Result<()> {
        let mut seen = self.seen.write().await;
        if !seen.insert(event.request_id) {
            return Ok(());
        }
        self.events.write().await.push(event.clone());
        Ok(())
    }

    async fn find(&self, query: &AuditQuery) -> Result<Vec<AuditEvent>> {
        let events = self.events.read().await;
        Ok(events
            .iter()
            .rev()
            .filter(|e| query.matches(e))
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(100))
            .cloned()
            .collect())
    }

    async fn count(&self, query: &AuditQuery) -> Result<u64> {
        let events = self.events.read().await;
        Ok(events.iter().filter(|e| query.matches(e)).count() as u64)
    }
}
