//! Trust score snapshot and history store

use crate::domain::{TrustScore, TrustScoreHistory, TrustSubject};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrustScoreRepository: Send + Sync {
    /// The most recent snapshot for a subject, stale or not. Staleness is the
    /// caller's concern.
    async fn latest(&self, subject: &TrustSubject) -> Result<Option<TrustScore>>;
    /// Append a new snapshot. Snapshots are immutable; a recompute appends,
    /// it never rewrites.
    async fn insert(&self, score: &TrustScore) -> Result<()>;
    async fn append_history(&self, entry: &TrustScoreHistory) -> Result<()>;
    /// History entries for a user, newest first.
    async fn history_for_user(&self, user_id: Uuid, limit: usize)
        -> Result<Vec<TrustScoreHistory>>;
}

/// In-memory trust store
#[derive(Default)]
pub struct InMemoryTrustScoreRepository {
    snapshots: RwLock<HashMap<TrustSubject, Vec<TrustScore>>>,
    history: RwLock<Vec<TrustScoreHistory>>,
}

impl InMemoryTrustScoreRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TrustScoreRepository for InMemoryTrustScoreRepository {
    async fn latest(&self, subject: &TrustSubject) -> Result<Option<TrustScore>> {
        let snapshots = self.snapshots.read().await;
        Ok(snapshots
            .get(subject)
            .and_then(|rows| rows.last())
            .cloned())
    }

    async fn insert(&self, score: &TrustScore) -> Result<()> {
        let mut snapshots = self.snapshots.write().await;
        snapshots
            .entry(score.subject.clone())
            .or_default()
            .push(score.clone());
        Ok(())
    }

    async fn append_history(&self, entry: &TrustScoreHistory) -> Result<()> {
        self.history.write().await.push(entry.clone());
        Ok(())
    }

    async fn history_for_user(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<TrustScoreHistory>> {
        let history = self.history.read().await;
        Ok(history
            .iter()
            .rev()
            .filter(|h| h.subject.user_id == user_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SubScores;
    use chrono::{Duration, Utc};

    fn subject(user_id: Uuid) -> TrustSubject {
        TrustSubject {
            user_id,
            device_id: "device-1".to_string(),
            ip_address: "203.0.113.10".to_string(),
        }
    }

    fn snapshot(subject: TrustSubject, score: u8) -> TrustScore {
        let now = Utc::now();
        TrustScore {
            subject,
            score,
            sub_scores: SubScores::default(),
            factors: vec![],
            risks: vec![],
            recommendations: vec![],
            calculated_at: now,
            valid_until: now + Duration::minutes(15),
        }
    }

    #[tokio::test]
    async fn test_latest_is_the_most_recent_insert() {
        let repo = InMemoryTrustScoreRepository::new();
        let s = subject(Uuid::new_v4());
        repo.insert(&snapshot(s.clone(), 40)).await.unwrap();
        repo.insert(&snapshot(s.clone(), 75)).await.unwrap();

        let latest = repo.latest(&s).await.unwrap().unwrap();
        assert_eq!(latest.score, 75);
    }

    #[tokio::test]
    async fn test_subjects_are_isolated() {
        let repo = InMemoryTrustScoreRepository::new();
        let user = Uuid::new_v4();
        let laptop = subject(user);
        let phone = TrustSubject {
            device_id: "phone-1".to_string(),
            ..laptop.clone()
        };
        repo.insert(&snapshot(laptop.clone(), 90)).await.unwrap();

        assert!(repo.latest(&phone).await.unwrap().is_none());
        assert_eq!(repo.latest(&laptop).await.unwrap().unwrap().score, 90);
    }

    #[tokio::test]
    async fn test_history_newest_first_with_limit() {
        let repo = InMemoryTrustScoreRepository::new();
        let s = subject(Uuid::new_v4());
        for (prev, new) in [(None, 40u8), (Some(40), 60), (Some(60), 75)] {
            repo.append_history(&TrustScoreHistory {
                subject: s.clone(),
                previous_score: prev,
                new_score: new,
                change_reason: "authentication with mfa".to_string(),
                recorded_at: Utc::now(),
            })
            .await
            .unwrap();
        }

        let recent = repo.history_for_user(s.user_id, 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].new_score, 75);
        assert_eq!(recent[1].new_score, 60);
    }
}
