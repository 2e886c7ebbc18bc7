//! Trust score engine: weighted sub-scores over identity and device signals

use crate::config::TrustConfig;
use crate::domain::{
    MfaStrength, SubScores, TrustEvent, TrustFactor, TrustScore, TrustScoreHistory, TrustSignals,
    TrustSubject,
};
use crate::error::Result;
use crate::repository::{IdentityProvider, TrustScoreRepository};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Read seam the evaluator depends on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrustReader: Send + Sync {
    /// The latest stored snapshot for a subject, stale or not.
    async fn current_score(&self, subject: &TrustSubject) -> Result<Option<TrustScore>>;
}

pub struct TrustScoreEngine<R, I>
where
    R: TrustScoreRepository,
    I: IdentityProvider,
{
    repo: Arc<R>,
    identity: Arc<I>,
    config: TrustConfig,
}

impl<R, I> TrustScoreEngine<R, I>
where
    R: TrustScoreRepository,
    I: IdentityProvider,
{
    pub fn new(repo: Arc<R>, identity: Arc<I>, config: TrustConfig) -> Self {
        Self {
            repo,
            identity,
            config,
        }
    }

    /// Recompute a subject's score in response to an event and persist the
    /// new immutable snapshot plus a history row.
    pub async fn handle_event(&self, event: &TrustEvent) -> Result<TrustScore> {
        let subject = event.subject();
        let now = Utc::now();

        let snapshot = match event {
            TrustEvent::Invalidation { reason, .. } => self.zero_snapshot(subject, reason, now),
            _ => {
                let signals = self.identity.trust_signals(subject).await?;
                self.compute(subject, &signals, now)
            }
        };

        let previous = self.repo.latest(subject).await?.map(|s| s.score);
        self.repo.insert(&snapshot).await?;
        self.repo
            .append_history(&TrustScoreHistory {
                subject: subject.clone(),
                previous_score: previous,
                new_score: snapshot.score,
                change_reason: event.change_reason(),
                recorded_at: now,
            })
            .await?;

        info!(
            user_id = %subject.user_id,
            device_id = %subject.device_id,
            previous = ?previous,
            score = snapshot.score,
            reason = %event.change_reason(),
            "trust score recomputed"
        );
        metrics::histogram!("trustgate_trust_score").record(snapshot.score as f64);
        Ok(snapshot)
    }

    /// Compute a snapshot without persisting it.
    pub fn compute(
        &self,
        subject: &TrustSubject,
        signals: &TrustSignals,
        now: DateTime<Utc>,
    ) -> TrustScore {
        let sub_scores = SubScores {
            device: device_score(signals),
            network: network_score(signals),
            behavior: behavior_score(signals),
            authentication: authentication_score(signals, now),
            location: location_score(signals),
        };

        let weights = &self.config.weights;
        let composite = sub_scores.device as f64 * weights.device
            + sub_scores.network as f64 * weights.network
            + sub_scores.behavior as f64 * weights.behavior
            + sub_scores.authentication as f64 * weights.authentication
            + sub_scores.location as f64 * weights.location;
        let score = composite.round().clamp(0.0, 100.0) as u8;

        let factors = vec![
            factor("device", sub_scores.device, weights.device),
            factor("network", sub_scores.network, weights.network),
            factor("behavior", sub_scores.behavior, weights.behavior),
            factor("authentication", sub_scores.authentication, weights.authentication),
            factor("location", sub_scores.location, weights.location),
        ];

        let (risks, recommendations) = assess_risks(signals);

        TrustScore {
            subject: subject.clone(),
            score,
            sub_scores,
            factors,
            risks,
            recommendations,
            calculated_at: now,
            valid_until: now + Duration::seconds(self.config.validity_secs),
        }
    }

    pub async fn history(&self, user_id: Uuid, limit: usize) -> Result<Vec<TrustScoreHistory>> {
        self.repo.history_for_user(user_id, limit).await
    }

    fn zero_snapshot(&self, subject: &TrustSubject, reason: &str, now: DateTime<Utc>) -> TrustScore {
        TrustScore {
            subject: subject.clone(),
            score: 0,
            sub_scores: SubScores::default(),
            factors: vec![],
            risks: vec![format!("invalidated: {reason}")],
            recommendations: vec!["re-authenticate".to_string()],
            calculated_at: now,
            valid_until: now + Duration::seconds(self.config.validity_secs),
        }
    }
}

#[async_trait]
impl<R, I> TrustReader for TrustScoreEngine<R, I>
where
    R: TrustScoreRepository,
    I: IdentityProvider,
{
    async fn current_score(&self, subject: &TrustSubject) -> Result<Option<TrustScore>> {
        self.repo.latest(subject).await
    }
}

fn factor(name: &str, value: u8, weight: f64) -> TrustFactor {
    TrustFactor {
        name: name.to_string(),
        value,
        weight,
    }
}

fn device_score(signals: &TrustSignals) -> u8 {
    // A jailbroken device floors the sub-score regardless of posture.
    if signals.device.jailbroken {
        return 0;
    }
    let mut score = 0u32;
    if signals.device.managed {
        score += 30;
    }
    if signals.device.compliant {
        score += 40;
    }
    if signals.device.os_patched {
        score += 30;
    }
    score.min(100) as u8
}

fn network_score(signals: &TrustSignals) -> u8 {
    if signals.network.anonymizing_proxy {
        return 0;
    }
    let mut score = (signals.network.ip_reputation.min(100) as u32) * 70 / 100;
    if signals.network.known_network {
        score += 30;
    }
    score.min(100) as u8
}

fn behavior_score(signals: &TrustSignals) -> u8 {
    100u8.saturating_sub(signals.behavior.anomaly_score.min(100))
}

fn authentication_score(signals: &TrustSignals, now: DateTime<Utc>) -> u8 {
    let base: u32 = match signals.authentication.mfa_strength {
        MfaStrength::None => 20,
        MfaStrength::Otp => 60,
        MfaStrength::Push => 75,
        MfaStrength::Hardware => 95,
    };
    let recency: u32 = match signals.authentication.last_authenticated_at {
        Some(at) if now - at <= Duration::hours(1) => 5,
        Some(at) if now - at <= Duration::hours(12) => 2,
        _ => 0,
    };
    let penalty = signals.authentication.recent_failures.min(10) * 10;
    (base + recency).saturating_sub(penalty).min(100) as u8
}

fn location_score(signals: &TrustSignals) -> u8 {
    if signals.location.geovelocity_violation {
        return 0;
    }
    if signals.location.known_location {
        90
    } else {
        40
    }
}

fn assess_risks(signals: &TrustSignals) -> (Vec<String>, Vec<String>) {
    let mut risks = Vec::new();
    let mut recommendations = Vec::new();

    if signals.device.jailbroken {
        risks.push("jailbroken device".to_string());
        recommendations.push("block device until re-enrolled".to_string());
    } else if !signals.device.compliant {
        risks.push("device out of compliance".to_string());
        recommendations.push("remediate device posture".to_string());
    }
    if signals.network.anonymizing_proxy {
        risks.push("anonymizing proxy detected".to_string());
        recommendations.push("require a trusted network".to_string());
    }
    if signals.behavior.anomaly_score > 70 {
        risks.push("anomalous behavior".to_string());
        recommendations.push("step up authentication".to_string());
    }
    if signals.authentication.mfa_strength == MfaStrength::None {
        risks.push("no multi-factor authentication".to_string());
        recommendations.push("enroll in mfa".to_string());
    }
    if signals.location.geovelocity_violation {
        risks.push("impossible travel".to_string());
        recommendations.push("re-authenticate".to_string());
    }

    (risks, recommendations)
}
