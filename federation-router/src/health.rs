//! Background health-refresh loop over the registry.
//!
//! Periodically calls `Adapter::health_check` for every registered provider
//! that has a matching adapter, and folds the result into the registry's
//! rolling health state (`Registry::update_health`, `record_success`/
//! `record_failure`) the same way a live request would.

use std::sync::Arc;
use std::time::{Duration, Instant};

use federation_core::models::ProviderStatus;
use federation_core::providers::{AdapterFactory, AdapterHealthStatus};
use federation_core::registry::Registry;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Default interval between full health-check sweeps, matching the
/// teacher's `RoutingConfig::health_check_interval` default of 30s.
pub const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);

fn provider_status(status: AdapterHealthStatus) -> ProviderStatus {
    match status {
        AdapterHealthStatus::Healthy => ProviderStatus::Healthy,
        AdapterHealthStatus::Degraded => ProviderStatus::Degraded,
        AdapterHealthStatus::Unhealthy => ProviderStatus::Unhealthy,
    }
}

/// Runs one sweep over every provider in `registry` that has a matching
/// entry in `adapters`, updating health state from each adapter's
/// `health_check()` result. Providers with no registered adapter are left
/// untouched. Per-provider checks run concurrently — a sweep over N
/// providers takes as long as the slowest single check, not the sum, which
/// matters once the registry holds more than a couple of adapters.
pub async fn refresh_once(registry: &Registry, adapters: &AdapterFactory) {
    let providers = registry.get_all().await;
    let checks = providers.keys().filter_map(|provider_id| {
        let adapter = adapters.get(provider_id)?;
        let provider_id = provider_id.clone();
        Some(async move {
            let start = Instant::now();
            (provider_id, adapter.health_check().await, start.elapsed())
        })
    });

    let results = join_all(checks).await;
    for (provider_id, result, elapsed) in results {
        match result {
            Ok(check) => {
                let latency_ms = if check.latency_ms > 0 {
                    check.latency_ms as f64
                } else {
                    elapsed.as_millis() as f64
                };
                let error_rate = if check.status == AdapterHealthStatus::Unhealthy {
                    1.0
                } else {
                    0.0
                };
                if let Err(e) = registry
                    .update_health(&provider_id, latency_ms, error_rate, provider_status(check.status))
                    .await
                {
                    warn!(provider_id = %provider_id, error = %e, "health refresh write failed");
                }
                if check.status == AdapterHealthStatus::Unhealthy {
                    registry.record_failure(&provider_id).await;
                } else {
                    registry.record_success(&provider_id).await;
                }
                debug!(provider_id = %provider_id, status = ?check.status, latency_ms, "health refresh completed");
            }
            Err(e) => {
                warn!(provider_id = %provider_id, error = %e, "health check failed");
                registry.record_failure(&provider_id).await;
            }
        }
    }
}

/// Spawns the periodic refresh loop. Stops cleanly when `cancellation` is
/// triggered, so the caller can shut the loop down alongside an in-flight
/// `route()` call sharing the same token.
pub fn spawn_health_loop(
    registry: Arc<Registry>,
    adapters: Arc<AdapterFactory>,
    interval: Duration,
    cancellation: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = cancellation.cancelled() => {
                    debug!("health refresh loop cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    refresh_once(&registry, &adapters).await;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use chrono::Utc;
    use federation_core::models::{Provider, ProviderCapabilities, ProviderCost, ProviderHealth, ProviderTier};
    use federation_core::providers::mock::MockAdapter;
    use federation_core::store::in_memory;

    fn provider(id: &str) -> Provider {
        Provider {
            id: id.to_string(),
            name: id.to_string(),
            tier: ProviderTier::Frontier,
            emoji: None,
            api_base: "http://localhost".to_string(),
            api_key_env: format!("{}_API_KEY", id.to_uppercase()),
            capabilities: ProviderCapabilities {
                max_context: 8192,
                supports_functions: false,
                supports_vision: false,
                supports_json_mode: false,
                supports_streaming: false,
                supports_batch: false,
                specialties: HashSet::new(),
                typical_latency_ms: None,
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
            quality_score: Some(0.9),
            reliability_score: Some(0.9),
            health: ProviderHealth::default(),
            enabled: true,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn refresh_marks_unhealthy_adapter_as_failed() {
        let registry = Registry::new(in_memory());
        registry.save(provider("down")).await.unwrap();

        let mut adapters = AdapterFactory::new();
        adapters.register(Arc::new(MockAdapter::with_health(
            "down",
            AdapterHealthStatus::Unhealthy,
        )));

        refresh_once(&registry, &adapters).await;

        let updated = registry.get("down").await.unwrap();
        assert_eq!(updated.health.status, ProviderStatus::Unhealthy);
        assert_eq!(updated.health.consecutive_failures, 1);
    }

    #[tokio::test]
    async fn refresh_leaves_providers_without_an_adapter_untouched() {
        let registry = Registry::new(in_memory());
        registry.save(provider("no-adapter")).await.unwrap();
        let adapters = AdapterFactory::new();

        refresh_once(&registry, &adapters).await;

        let unchanged = registry.get("no-adapter").await.unwrap();
        assert_eq!(unchanged.health.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn health_loop_stops_on_cancellation() {
        let registry = Arc::new(Registry::new(in_memory()));
        let adapters = Arc::new(AdapterFactory::new());
        let token = CancellationToken::new();

        let handle = spawn_health_loop(registry, adapters, Duration::from_millis(10), token.clone());
        token.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("loop should exit promptly after cancellation")
            .unwrap();
    }
}
