//! Configuration management for the Trustgate engine

use anyhow::{bail, Context, Result};
use std::env;
use std::time::Duration;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Cache configuration
    pub cache: CacheConfig,
    /// Evaluation path configuration
    pub evaluation: EvaluationConfig,
    /// Trust score configuration
    pub trust: TrustConfig,
    /// Alert correlation configuration
    pub alerts: AlertConfig,
    /// Log format: "text" or "json"
    pub log_format: String,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum entries per cache partition
    pub capacity: usize,
    /// TTL for compiled permission catalogs, per tenant
    pub catalog_ttl_secs: u64,
    /// TTL for resolved role hierarchies, per (role, tenant)
    pub hierarchy_ttl_secs: u64,
    /// TTL for merged user grant sets, per (user, tenant)
    pub grants_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 4096,
            catalog_ttl_secs: 60,
            hierarchy_ttl_secs: 60,
            grants_ttl_secs: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EvaluationConfig {
    /// Bound on every external lookup made by the evaluator. An elapsed
    /// timeout maps to Deny, never Allow.
    pub lookup_timeout: Duration,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            lookup_timeout: Duration::from_millis(250),
        }
    }
}

/// Weights for the five trust sub-scores. Must sum to 1.0.
#[derive(Debug, Clone)]
pub struct TrustWeights {
    pub device: f64,
    pub network: f64,
    pub behavior: f64,
    pub authentication: f64,
    pub location: f64,
}

impl Default for TrustWeights {
    fn default() -> Self {
        Self {
            device: 0.25,
            network: 0.20,
            behavior: 0.20,
            authentication: 0.25,
            location: 0.10,
        }
    }
}

impl TrustWeights {
    pub fn sum(&self) -> f64 {
        self.device + self.network + self.behavior + self.authentication + self.location
    }
}

#[derive(Debug, Clone)]
pub struct TrustConfig {
    pub weights: TrustWeights,
    /// How long a computed trust score stays valid. Past this, the evaluator
    /// treats the score as 0.
    pub validity_secs: i64,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            weights: TrustWeights::default(),
            validity_secs: 900,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AlertConfig {
    /// Interval for the background auto-resolve sweep
    pub sweep_interval_secs: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 300,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            evaluation: EvaluationConfig::default(),
            trust: TrustConfig::default(),
            alerts: AlertConfig::default(),
            log_format: "text".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let config = Self {
            cache: CacheConfig {
                capacity: parse_env("TRUSTGATE_CACHE_CAPACITY", 4096)?,
                catalog_ttl_secs: parse_env("TRUSTGATE_CATALOG_TTL_SECS", 60)?,
                hierarchy_ttl_secs: parse_env("TRUSTGATE_HIERARCHY_TTL_SECS", 60)?,
                grants_ttl_secs: parse_env("TRUSTGATE_GRANTS_TTL_SECS", 30)?,
            },
            evaluation: EvaluationConfig {
                lookup_timeout: Duration::from_millis(parse_env(
                    "TRUSTGATE_LOOKUP_TIMEOUT_MS",
                    250,
                )?),
            },
            trust: TrustConfig {
                weights: TrustWeights {
                    device: parse_env("TRUSTGATE_WEIGHT_DEVICE", 0.25)?,
                    network: parse_env("TRUSTGATE_WEIGHT_NETWORK", 0.20)?,
                    behavior: parse_env("TRUSTGATE_WEIGHT_BEHAVIOR", 0.20)?,
                    authentication: parse_env("TRUSTGATE_WEIGHT_AUTHENTICATION", 0.25)?,
                    location: parse_env("TRUSTGATE_WEIGHT_LOCATION", 0.10)?,
                },
                validity_secs: parse_env("TRUSTGATE_TRUST_VALIDITY_SECS", 900)?,
            },
            alerts: AlertConfig {
                sweep_interval_secs: parse_env("TRUSTGATE_ALERT_SWEEP_SECS", 300)?,
            },
            log_format: env::var("TRUSTGATE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field invariants
    pub fn validate(&self) -> Result<()> {
        let sum = self.trust.weights.sum();
        if (sum - 1.0).abs() > 1e-6 {
            bail!("trust weights must sum to 1.0, got {}", sum);
        }
        if self.cache.capacity == 0 {
            bail!("cache capacity must be non-zero");
        }
        if self.evaluation.lookup_timeout.is_zero() {
            bail!("lookup timeout must be non-zero");
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("invalid value for {}", key)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache.catalog_ttl_secs, 60);
        assert_eq!(config.evaluation.lookup_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        let weights = TrustWeights::default();
        assert!((weights.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_unbalanced_weights_rejected() {
        let mut config = Config::default();
        config.trust.weights.device = 0.9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = Config::default();
        config.evaluation.lookup_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
