//! Metric registration
//!
//! Metrics are emitted through the `metrics` facade; the embedding process
//! installs whatever recorder it wants (or none).

use metrics::{describe_counter, describe_histogram, Unit};

/// Register metric descriptions once at startup.
pub fn describe() {
    describe_counter!(
        "trustgate_decisions_total",
        "Access decisions by outcome (allow/deny/conditional)"
    );
    describe_histogram!(
        "trustgate_evaluation_seconds",
        Unit::Seconds,
        "End-to-end evaluation latency"
    );
    describe_counter!(
        "trustgate_policy_violations_total",
        "Policy violations recorded by the evaluator"
    );
    describe_counter!(
        "trustgate_alerts_created_total",
        "Security alerts created by the correlator"
    );
    describe_counter!(
        "trustgate_alerts_suppressed_total",
        "Alerts suppressed by cooldown or hourly caps"
    );
    describe_histogram!("trustgate_trust_score", "Computed composite trust scores");
    describe_counter!("trustgate_cache_hits_total", "Cache hits by cache name");
    describe_counter!("trustgate_cache_misses_total", "Cache misses by cache name");
}
