//! Numeric configuration for the router crate, plus the
//! `FEDERATION_PROVIDER_{ID}_{KEY}` environment-override mechanics
//! (`FEDERATION_PROVIDER_OPENAI_ENABLED=false`,
//! `FEDERATION_PROVIDER_DEEPSEEK_QUALITY_SCORE=0.92`, ...). There is no
//! `FederationConfig::load(path)` — only the numeric knobs and the override
//! scheme, applied to providers already present in a `Registry` rather than
//! parsed from a file.

use std::env;

use federation_core::optimizer::{
    DEFAULT_EXPLORATION_CONSTANT, DEFAULT_EXPLORATION_RATE, DEFAULT_MIN_SAMPLES_BEFORE_EXPLOIT,
};
use federation_core::registry::{DEFAULT_COOLDOWN, DEFAULT_FAILURE_THRESHOLD};
use federation_core::registry::Registry;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::health::DEFAULT_HEALTH_CHECK_INTERVAL;

/// Bandit tuning knobs, mirroring `Optimizer`'s builder methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BanditConfig {
    pub exploration_constant: f64,
    pub exploration_rate: f64,
    pub min_samples_before_exploit: u64,
}

impl Default for BanditConfig {
    fn default() -> Self {
        BanditConfig {
            exploration_constant: DEFAULT_EXPLORATION_CONSTANT,
            exploration_rate: DEFAULT_EXPLORATION_RATE,
            min_samples_before_exploit: DEFAULT_MIN_SAMPLES_BEFORE_EXPLOIT,
        }
    }
}

/// Circuit-breaker tuning knobs, mirroring `Registry`'s builder methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub cooldown_seconds: i64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        CircuitBreakerConfig {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            cooldown_seconds: DEFAULT_COOLDOWN.num_seconds(),
        }
    }
}

/// Top-level numeric configuration for a federation-router deployment. Never
/// carries a provider list, an HTTP server section, auth, caching, or
/// plugins — those have no counterpart in this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FederationConfig {
    pub bandit: BanditConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    /// Months of per-provider spend history `CostEstimator` retains.
    pub budget_retention_months: i64,
    pub health_check_interval_secs: u64,
}

impl Default for FederationConfig {
    fn default() -> Self {
        FederationConfig {
            bandit: BanditConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            budget_retention_months: federation_core::cost::BUDGET_RETENTION_MONTHS,
            health_check_interval_secs: DEFAULT_HEALTH_CHECK_INTERVAL.as_secs(),
        }
    }
}

impl FederationConfig {
    /// Starts from defaults and applies whichever of the known
    /// `FEDERATION_BANDIT_*` / `FEDERATION_CIRCUIT_*` / `FEDERATION_BUDGET_*`
    /// / `FEDERATION_HEALTH_*` variables are set.
    pub fn from_env() -> Self {
        let mut config = FederationConfig::default();

        if let Ok(v) = env::var("FEDERATION_BANDIT_EXPLORATION_CONSTANT") {
            if let Ok(parsed) = v.parse() {
                config.bandit.exploration_constant = parsed;
            }
        }
        if let Ok(v) = env::var("FEDERATION_BANDIT_EXPLORATION_RATE") {
            if let Ok(parsed) = v.parse() {
                config.bandit.exploration_rate = parsed;
            }
        }
        if let Ok(v) = env::var("FEDERATION_BANDIT_MIN_SAMPLES_BEFORE_EXPLOIT") {
            if let Ok(parsed) = v.parse() {
                config.bandit.min_samples_before_exploit = parsed;
            }
        }
        if let Ok(v) = env::var("FEDERATION_CIRCUIT_FAILURE_THRESHOLD") {
            if let Ok(parsed) = v.parse() {
                config.circuit_breaker.failure_threshold = parsed;
            }
        }
        if let Ok(v) = env::var("FEDERATION_CIRCUIT_COOLDOWN_SECONDS") {
            if let Ok(parsed) = v.parse() {
                config.circuit_breaker.cooldown_seconds = parsed;
            }
        }
        if let Ok(v) = env::var("FEDERATION_BUDGET_RETENTION_MONTHS") {
            if let Ok(parsed) = v.parse() {
                config.budget_retention_months = parsed;
            }
        }
        if let Ok(v) = env::var("FEDERATION_HEALTH_CHECK_INTERVAL_SECS") {
            if let Ok(parsed) = v.parse() {
                config.health_check_interval_secs = parsed;
            }
        }

        config
    }
}

/// A single `FEDERATION_PROVIDER_{ID}_{KEY}` value, type-inferred in order:
/// bool-like tokens first, then int, then float, then fall through to the
/// raw string.
#[derive(Debug, Clone, PartialEq)]
enum OverrideValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

fn parse_override_value(raw: &str) -> OverrideValue {
    match raw.to_lowercase().as_str() {
        "true" | "yes" => return OverrideValue::Bool(true),
        "false" | "no" => return OverrideValue::Bool(false),
        _ => {}
    }
    if let Ok(i) = raw.parse::<i64>() {
        return OverrideValue::Int(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return OverrideValue::Float(f);
    }
    OverrideValue::String(raw.to_string())
}

const PROVIDER_ENV_PREFIX: &str = "FEDERATION_PROVIDER_";

/// Reads every `FEDERATION_PROVIDER_{ID}_{KEY}` variable currently set,
/// applies the recognized ones to the matching provider already present in
/// `registry`, and saves the result. Providers not yet in the registry, and
/// keys this function doesn't recognize, are logged and skipped rather than
/// erroring — matching the original loader's tolerant behavior.
///
/// Returns the number of providers updated.
pub async fn apply_provider_env_overrides(registry: &Registry) -> usize {
    let mut updated = 0;

    for (key, raw_value) in env::vars() {
        let Some(rest) = key.strip_prefix(PROVIDER_ENV_PREFIX) else {
            continue;
        };
        let mut parts = rest.splitn(2, '_');
        let (Some(provider_id), Some(config_key)) = (parts.next(), parts.next()) else {
            continue;
        };
        let provider_id = provider_id.to_lowercase();
        let config_key = config_key.to_lowercase();

        let Some(mut provider) = registry.get(&provider_id).await else {
            warn!(provider_id, "env override for unknown provider ignored");
            continue;
        };

        let value = parse_override_value(&raw_value);
        let applied = match (config_key.as_str(), &value) {
            ("enabled", OverrideValue::Bool(b)) => {
                provider.enabled = *b;
                true
            }
            ("quality_score", OverrideValue::Float(f)) => {
                provider.quality_score = Some(*f);
                true
            }
            ("quality_score", OverrideValue::Int(i)) => {
                provider.quality_score = Some(*i as f64);
                true
            }
            ("reliability_score", OverrideValue::Float(f)) => {
                provider.reliability_score = Some(*f);
                true
            }
            ("reliability_score", OverrideValue::Int(i)) => {
                provider.reliability_score = Some(*i as f64);
                true
            }
            ("api_base", OverrideValue::String(s)) => {
                provider.api_base = s.clone();
                true
            }
            _ => {
                warn!(provider_id, config_key, "unrecognized provider env override ignored");
                false
            }
        };

        if applied {
            debug!(provider_id, config_key, "applied provider env override");
            if registry.save(provider).await.is_ok() {
                updated += 1;
            }
        }
    }

    updated
}
