//! Zero-trust policy evaluator: the single decision path for access checks.
//!
//! Every external lookup is bounded by a timeout, and every failure mode maps
//! to Deny. The evaluator writes exactly one audit event per call; audit
//! failure fails the call rather than producing an unaudited decision.

use crate::domain::{
    AccessRequest, AccessResponse, AuditEvent, Decision, GrantDecision, PolicyCategory,
    PolicyViolation, RemediationStep, SecurityPolicy, TrustSubject,
};
use crate::error::{EngineError, Result};
use crate::policy::{ConditionContext, ConditionEvaluator};
use crate::repository::{AuditSink, PolicyViolationRepository, SecurityPolicyRepository};
use crate::service::correlator::ViolationSink;
use crate::service::grants::GrantResolver;
use crate::service::trust::TrustReader;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, instrument};
use uuid::Uuid;

pub struct PolicyEvaluator<G, T, P, V, A>
where
    G: GrantResolver,
    T: TrustReader,
    P: SecurityPolicyRepository,
    V: PolicyViolationRepository,
    A: AuditSink,
{
    grants: Arc<G>,
    trust: Arc<T>,
    policies: Arc<P>,
    violations: Arc<V>,
    audit: Arc<A>,
    correlator: Arc<dyn ViolationSink>,
    conditions: Arc<dyn ConditionEvaluator>,
    lookup_timeout: Duration,
}

impl<G, T, P, V, A> PolicyEvaluator<G, T, P, V, A>
where
    G: GrantResolver + 'static,
    T: TrustReader + 'static,
    P: SecurityPolicyRepository + 'static,
    V: PolicyViolationRepository + 'static,
    A: AuditSink + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        grants: Arc<G>,
        trust: Arc<T>,
        policies: Arc<P>,
        violations: Arc<V>,
        audit: Arc<A>,
        correlator: Arc<dyn ViolationSink>,
        conditions: Arc<dyn ConditionEvaluator>,
        lookup_timeout: Duration,
    ) -> Self {
        Self {
            grants,
            trust,
            policies,
            violations,
            audit,
            correlator,
            conditions,
            lookup_timeout,
        }
    }

    /// Evaluate an access request end to end.
    #[instrument(skip(self, request), fields(request_id = %request.request_id, resource = %request.resource, action = %request.action))]
    pub async fn evaluate(&self, request: &AccessRequest) -> Result<AccessResponse> {
        let started = Instant::now();
        let now = Utc::now();

        let response = match self.decide(request, now).await {
            Ok(response) => response,
            Err(e) => {
                if e.is_operational_fault() {
                    error!(error = %e, "evaluation failed; denying");
                } else {
                    debug!(error = %e, "evaluation resolved to deny");
                }
                AccessResponse::deny(e.deny_reason())
            }
        };

        // The one audit write for this call. A failed write fails the call.
        self.audit
            .record(&AuditEvent {
                request_id: request.request_id,
                actor_id: request.principal_id,
                group_id: request.group_id,
                resource: request.resource.clone(),
                action: request.action.clone(),
                decision: response.decision.clone(),
                reason: response.reason.clone(),
                old_value: None,
                new_value: None,
                correlation_id: None,
                recorded_at: now,
            })
            .await?;

        let outcome = match &response.decision {
            Decision::Allow => "allow",
            Decision::Deny { .. } => "deny",
            Decision::Conditional { .. } => "conditional",
        };
        counter!("trustgate_decisions_total", "outcome" => outcome).increment(1);
        histogram!("trustgate_evaluation_seconds").record(started.elapsed().as_secs_f64());

        Ok(response)
    }

    async fn decide(&self, request: &AccessRequest, now: DateTime<Utc>) -> Result<AccessResponse> {
        let set = self
            .bounded(self.grants.decision_set(request, now))
            .await?;

        let matched_permission_id = match set.decision_for(&request.resource, &request.action) {
            GrantDecision::Deny => {
                return Ok(AccessResponse::deny("insufficient permission"));
            }
            GrantDecision::Allow {
                matched_permission_id,
            } => matched_permission_id,
        };

        let applicable = self.applicable_policies(request, now).await?;
        if applicable.is_empty() {
            return Ok(AccessResponse {
                decision: Decision::Allow,
                reason: None,
                matched_permission_id,
                trust_score: None,
                policy_id: None,
            });
        }

        let subject = TrustSubject {
            user_id: request.principal_id,
            device_id: request.device_id.clone(),
            ip_address: request.ip_address.clone(),
        };
        let snapshot = self.bounded(self.trust.current_score(&subject)).await?;
        // A missing or stale snapshot is zero trust, never a free pass.
        let effective_score = match snapshot {
            Some(ref s) if !s.is_stale_at(now) => s.score,
            _ => 0,
        };

        let mut enforced_failure: Option<&SecurityPolicy> = None;
        let mut steps: Vec<RemediationStep> = Vec::new();
        let mut first_failure: Option<&SecurityPolicy> = None;

        for policy in &applicable {
            if effective_score >= policy.minimum_trust_score {
                continue;
            }

            let violation = PolicyViolation {
                id: Uuid::new_v4(),
                policy_id: policy.id,
                user_id: request.principal_id,
                group_id: request.group_id,
                resource: request.resource.clone(),
                action: request.action.clone(),
                trust_score: effective_score,
                severity: policy.severity,
                detail: format!(
                    "trust score {} below policy minimum {}",
                    effective_score, policy.minimum_trust_score
                ),
                occurred_at: now,
            };
            self.violations.record(&violation).await?;
            counter!("trustgate_policy_violations_total").increment(1);

            let correlator = self.correlator.clone();
            tokio::spawn(async move {
                if let Err(e) = correlator.on_violation(violation).await {
                    error!(error = %e, "alert correlation failed");
                }
            });

            first_failure.get_or_insert(policy);
            if policy.is_enforced {
                enforced_failure.get_or_insert(policy);
            } else {
                for step in remediation_steps(policy.category) {
                    if !steps.contains(&step) {
                        steps.push(step);
                    }
                }
            }
        }

        if let Some(policy) = enforced_failure {
            return Ok(AccessResponse {
                decision: Decision::deny("insufficient trust"),
                reason: Some("insufficient trust".to_string()),
                matched_permission_id,
                trust_score: Some(effective_score),
                policy_id: Some(policy.id),
            });
        }
        if let Some(policy) = first_failure {
            return Ok(AccessResponse {
                decision: Decision::Conditional { steps },
                reason: Some("remediation required".to_string()),
                matched_permission_id,
                trust_score: Some(effective_score),
                policy_id: Some(policy.id),
            });
        }

        Ok(AccessResponse {
            decision: Decision::Allow,
            reason: None,
            matched_permission_id,
            trust_score: Some(effective_score),
            policy_id: None,
        })
    }

    /// Active policies whose applicability conditions hold for this request,
    /// highest priority first. A condition that cannot be evaluated counts as
    /// applicable.
    async fn applicable_policies(
        &self,
        request: &AccessRequest,
        now: DateTime<Utc>,
    ) -> Result<Vec<SecurityPolicy>> {
        let policies = self
            .bounded(self.policies.find_applicable(request.group_id))
            .await?;
        let ctx = ConditionContext::from_access(request, now);
        Ok(policies
            .into_iter()
            .filter(|p| match p.conditions.as_deref() {
                None => true,
                Some(expr) => self.conditions.evaluate(expr, &ctx).unwrap_or(true),
            })
            .collect())
    }

    async fn bounded<O>(&self, fut: impl Future<Output = Result<O>>) -> Result<O> {
        tokio::time::timeout(self.lookup_timeout, fut)
            .await
            .map_err(|_| EngineError::Timeout(self.lookup_timeout))?
    }
}

fn remediation_steps(category: PolicyCategory) -> Vec<RemediationStep> {
    match category {
        PolicyCategory::Authentication => {
            vec![RemediationStep::Reauthenticate, RemediationStep::StepUpMfa]
        }
        PolicyCategory::DeviceCompliance => vec![RemediationStep::DeviceAttestation],
        PolicyCategory::Network => vec![RemediationStep::Reauthenticate],
        PolicyCategory::AccessControl => vec![RemediationStep::StepUpMfa],
    }
}
