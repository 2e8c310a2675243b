//! # Registry (C1)
//!
//! The authoritative in-memory provider set, backed by a pluggable
//! [`RegistryStore`](crate::store::RegistryStore) for configuration and
//! health-history persistence. The in-memory map is the hot path consulted
//! on every `route()` call; the store is eventual — a write failure there
//! never blocks a reader.
//!
//! Concurrency follows the copy-on-write discipline the rest of this crate
//! uses for read-dominant shared state: `get_all`/`get` hand back a clone of
//! an `Arc<HashMap<..>>` snapshot that remains valid even if a writer swaps
//! the map out from under it a moment later.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::FederationError;
use crate::models::{Provider, ProviderHealth, ProviderStatus};
use crate::store::RegistryStore;

/// Consecutive failures before the circuit opens.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
/// How long the circuit stays open once tripped.
pub const DEFAULT_COOLDOWN: Duration = Duration::seconds(60);
/// EMA smoothing factor applied to latency on every health update.
pub const LATENCY_EMA_ALPHA: f64 = 0.1;

type ProviderMap = Arc<HashMap<String, Provider>>;

/// Holds the provider set and mediates all mutation through the store.
pub struct Registry {
    providers: RwLock<ProviderMap>,
    store: Arc<dyn RegistryStore>,
    failure_threshold: u32,
    cooldown: Duration,
}

impl Registry {
    pub fn new(store: Arc<dyn RegistryStore>) -> Self {
        Registry {
            providers: RwLock::new(Arc::new(HashMap::new())),
            store,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            cooldown: DEFAULT_COOLDOWN,
        }
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// A consistent snapshot of the full provider set. Safe to hold and
    /// iterate even while a concurrent writer replaces the underlying map.
    pub async fn get_all(&self) -> ProviderMap {
        Arc::clone(&*self.providers.read().await)
    }

    pub async fn get(&self, id: &str) -> Option<Provider> {
        self.providers.read().await.get(id).cloned()
    }

    /// Upsert a provider: bumps `updated_at`, replaces the in-memory map via
    /// copy-on-write, then persists to the store.
    pub async fn save(&self, mut provider: Provider) -> Result<(), FederationError> {
        provider.updated_at = Utc::now();
        {
            let mut guard = self.providers.write().await;
            let mut next = HashMap::clone(&guard);
            next.insert(provider.id.clone(), provider.clone());
            *guard = Arc::new(next);
        }
        self.store.save_provider(&provider).await?;
        Ok(())
    }

    /// Merge a fresh health sample into the provider's rolling state:
    /// latency EMA (`alpha = 0.1`), status recomputed from the merged
    /// snapshot, and a health-history entry pushed to the store.
    pub async fn update_health(
        &self,
        id: &str,
        sample_latency_ms: f64,
        sample_error_rate_24h: f64,
        observed_status: ProviderStatus,
    ) -> Result<(), FederationError> {
        let mut guard = self.providers.write().await;
        let mut next = HashMap::clone(&guard);
        let Some(provider) = next.get_mut(id) else {
            return Ok(());
        };

        let health = &mut provider.health;
        health.avg_latency_ms = if health.avg_latency_ms == 0.0 {
            sample_latency_ms
        } else {
            LATENCY_EMA_ALPHA * sample_latency_ms + (1.0 - LATENCY_EMA_ALPHA) * health.avg_latency_ms
        };
        health.error_rate_24h = sample_error_rate_24h;
        health.status = observed_status;

        self.store
            .save_health(id, health.clone())
            .await
            .unwrap_or_else(|e| warn!(provider_id = id, error = %e, "health history write failed"));

        *guard = Arc::new(next);
        Ok(())
    }

    /// Record a successful call: resets the failure streak. If the circuit
    /// was open, it remains open until `circuit_open_until` elapses even on
    /// success (closing is exclusively time-driven, per the circuit-breaker
    /// state machine).
    pub async fn record_success(&self, id: &str) {
        let mut guard = self.providers.write().await;
        let mut next = HashMap::clone(&guard);
        if let Some(provider) = next.get_mut(id) {
            provider.health.consecutive_failures = 0;
        }
        *guard = Arc::new(next);
    }

    /// Record a failed call: increments the failure streak and opens the
    /// circuit once it crosses `failure_threshold`.
    pub async fn record_failure(&self, id: &str) {
        let mut guard = self.providers.write().await;
        let mut next = HashMap::clone(&guard);
        if let Some(provider) = next.get_mut(id) {
            provider.health.consecutive_failures += 1;
            if provider.health.consecutive_failures >= self.failure_threshold
                && !provider.health.circuit_open
            {
                provider.health.circuit_open = true;
                provider.health.circuit_open_until = Some(Utc::now() + self.cooldown);
                info!(provider_id = id, "circuit breaker opened");
            }
        }
        *guard = Arc::new(next);
    }

    /// Close any circuit whose cooldown has elapsed and reset its failure
    /// streak. Cheap enough to call at the top of every `route()`.
    pub async fn close_expired_circuits(&self, now: DateTime<Utc>) {
        let mut guard = self.providers.write().await;
        let mut changed = false;
        let mut next = HashMap::clone(&guard);
        for provider in next.values_mut() {
            if provider.health.circuit_open {
                if let Some(until) = provider.health.circuit_open_until {
                    if now >= until {
                        provider.health.circuit_open = false;
                        provider.health.circuit_open_until = None;
                        provider.health.consecutive_failures = 0;
                        changed = true;
                        debug!(provider_id = %provider.id, "circuit breaker closed");
                    }
                }
            }
        }
        if changed {
            *guard = Arc::new(next);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProviderCapabilities, ProviderCost, ProviderTier};
    use crate::store::InMemoryStore;
    use std::collections::HashSet;

    fn provider(id: &str) -> Provider {
        Provider {
            id: id.to_string(),
            name: id.to_string(),
            tier: ProviderTier::Cloud,
            emoji: None,
            api_base: "https://example.invalid".into(),
            api_key_env: "X".into(),
            capabilities: ProviderCapabilities {
                max_context: 8192,
                supports_functions: false,
                supports_vision: false,
                supports_json_mode: false,
                supports_streaming: true,
                supports_batch: false,
                specialties: HashSet::new(),
                typical_latency_ms: Some(500),
                throughput_tpm: None,
                soc2_compliant: false,
                gdpr_compliant: false,
                hipaa_compliant: false,
                data_residency: HashSet::new(),
            },
            cost: ProviderCost {
                input_per_1m: 1.0,
                output_per_1m: 2.0,
                context_cache_hit_discount: None,
                batch_discount: None,
            },
            quality_score: None,
            reliability_score: None,
            health: ProviderHealth {
                status: ProviderStatus::Healthy,
                ..ProviderHealth::default()
            },
            enabled: true,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn save_and_get_round_trips_all_fields() {
        let registry = Registry::new(Arc::new(InMemoryStore::new()));
        registry.save(provider("openai")).await.unwrap();
        let fetched = registry.get("openai").await.unwrap();
        assert_eq!(fetched.id, "openai");
        assert_eq!(fetched.cost.input_per_1m, 1.0);
    }

    #[tokio::test]
    async fn circuit_opens_after_threshold_failures() {
        let registry = Registry::new(Arc::new(InMemoryStore::new())).with_failure_threshold(3);
        registry.save(provider("flaky")).await.unwrap();
        for _ in 0..3 {
            registry.record_failure("flaky").await;
        }
        let p = registry.get("flaky").await.unwrap();
        assert!(p.health.circuit_open);
        assert!(!p.is_available(Utc::now()));
    }

    #[tokio::test]
    async fn circuit_closes_after_cooldown_elapses() {
        let registry = Registry::new(Arc::new(InMemoryStore::new()))
            .with_failure_threshold(1)
            .with_cooldown(Duration::seconds(0));
        registry.save(provider("flaky")).await.unwrap();
        registry.record_failure("flaky").await;
        assert!(registry.get("flaky").await.unwrap().health.circuit_open);

        registry
            .close_expired_circuits(Utc::now() + Duration::seconds(1))
            .await;
        let p = registry.get("flaky").await.unwrap();
        assert!(!p.health.circuit_open);
        assert_eq!(p.health.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn snapshot_remains_valid_after_concurrent_write() {
        let registry = Registry::new(Arc::new(InMemoryStore::new()));
        registry.save(provider("a")).await.unwrap();
        let snapshot = registry.get_all().await;
        registry.save(provider("b")).await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains_key("a"));
    }

    #[tokio::test]
    async fn health_update_applies_latency_ema() {
        let registry = Registry::new(Arc::new(InMemoryStore::new()));
        registry.save(provider("a")).await.unwrap();
        registry
            .update_health("a", 1000.0, 0.0, ProviderStatus::Healthy)
            .await
            .unwrap();
        registry
            .update_health("a", 0.0, 0.0, ProviderStatus::Healthy)
            .await
            .unwrap();
        let p = registry.get("a").await.unwrap();
        assert!((p.health.avg_latency_ms - 900.0).abs() < 1e-9);
    }
}
