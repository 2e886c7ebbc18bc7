//! Trust score domain models: snapshots, history, events, and input signals

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Key for a trust score: the `(user, device, network)` tuple being scored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrustSubject {
    pub user_id: Uuid,
    pub device_id: String,
    pub ip_address: String,
}

/// The five weighted sub-scores, each independently bounded to [0, 100].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubScores {
    pub device: u8,
    pub network: u8,
    pub behavior: u8,
    pub authentication: u8,
    pub location: u8,
}

/// One named contribution to the composite score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustFactor {
    pub name: String,
    pub value: u8,
    pub weight: f64,
}

/// Immutable trust score snapshot. Superseded by a new row on recompute,
/// never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustScore {
    pub subject: TrustSubject,
    /// Composite score, clamped to [0, 100].
    pub score: u8,
    pub sub_scores: SubScores,
    pub factors: Vec<TrustFactor>,
    pub risks: Vec<String>,
    pub recommendations: Vec<String>,
    pub calculated_at: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

impl TrustScore {
    /// Whether this snapshot has passed its validity horizon. The evaluator
    /// treats stale snapshots as score 0 (fail closed) rather than reusing
    /// them silently.
    pub fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
        now > self.valid_until
    }
}

/// Transition record written on every recompute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustScoreHistory {
    pub subject: TrustSubject,
    pub previous_score: Option<u8>,
    pub new_score: u8,
    pub change_reason: String,
    pub recorded_at: DateTime<Utc>,
}

/// Events that trigger a trust recompute.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrustEvent {
    Authentication {
        subject: TrustSubject,
        mfa_used: bool,
    },
    DeviceActivity {
        subject: TrustSubject,
    },
    Invalidation {
        subject: TrustSubject,
        reason: String,
    },
}

impl TrustEvent {
    pub fn subject(&self) -> &TrustSubject {
        match self {
            TrustEvent::Authentication { subject, .. }
            | TrustEvent::DeviceActivity { subject }
            | TrustEvent::Invalidation { subject, .. } => subject,
        }
    }

    pub fn change_reason(&self) -> String {
        match self {
            TrustEvent::Authentication { mfa_used: true, .. } => {
                "authentication with mfa".to_string()
            }
            TrustEvent::Authentication { mfa_used: false, .. } => {
                "authentication without mfa".to_string()
            }
            TrustEvent::DeviceActivity { .. } => "device activity".to_string(),
            TrustEvent::Invalidation { reason, .. } => format!("invalidated: {reason}"),
        }
    }
}

/// Strength of the most recent MFA challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MfaStrength {
    None,
    Otp,
    Push,
    Hardware,
}

/// Raw signals resolved by the identity/device provider, from which the
/// engine derives sub-scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustSignals {
    pub device: DeviceSignals,
    pub network: NetworkSignals,
    pub behavior: BehaviorSignals,
    pub authentication: AuthenticationSignals,
    pub location: LocationSignals,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSignals {
    pub managed: bool,
    pub compliant: bool,
    pub os_patched: bool,
    pub jailbroken: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSignals {
    /// Provider-reported reputation, already bounded to [0, 100].
    pub ip_reputation: u8,
    pub known_network: bool,
    pub anonymizing_proxy: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorSignals {
    /// Anomaly measure where 0 is nominal and 100 is maximally anomalous.
    pub anomaly_score: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticationSignals {
    pub mfa_strength: MfaStrength,
    pub last_authenticated_at: Option<DateTime<Utc>>,
    pub recent_failures: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationSignals {
    pub known_location: bool,
    pub geovelocity_violation: bool,
}

impl Default for TrustSignals {
    fn default() -> Self {
        Self {
            device: DeviceSignals {
                managed: false,
                compliant: false,
                os_patched: false,
                jailbroken: false,
            },
            network: NetworkSignals {
                ip_reputation: 0,
                known_network: false,
                anonymizing_proxy: false,
            },
            behavior: BehaviorSignals { anomaly_score: 100 },
            authentication: AuthenticationSignals {
                mfa_strength: MfaStrength::None,
                last_authenticated_at: None,
                recent_failures: 0,
            },
            location: LocationSignals {
                known_location: false,
                geovelocity_violation: true,
            },
        }
    }
}
