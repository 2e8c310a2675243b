//! Deterministic in-process [`Adapter`] for tests: no network I/O, fixed
//! latency and token counts, health forced by the caller.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::AdapterError;
use crate::providers::{Adapter, AdapterHealthCheck, AdapterHealthStatus, AdapterRequest, AdapterResponse};

pub struct MockAdapter {
    provider_id: String,
    health: AdapterHealthStatus,
    latency_ms: u64,
    calls: AtomicU64,
}

impl MockAdapter {
    pub fn healthy(provider_id: impl Into<String>) -> Self {
        MockAdapter {
            provider_id: provider_id.into(),
            health: AdapterHealthStatus::Healthy,
            latency_ms: 50,
            calls: AtomicU64::new(0),
        }
    }

    pub fn with_health(provider_id: impl Into<String>, health: AdapterHealthStatus) -> Self {
        MockAdapter {
            provider_id: provider_id.into(),
            health,
            latency_ms: 50,
            calls: AtomicU64::new(0),
        }
    }

    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl Adapter for MockAdapter {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    async fn authenticate(&self) -> Result<bool, AdapterError> {
        Ok(self.health != AdapterHealthStatus::Unhealthy)
    }

    async fn complete(&self, request: AdapterRequest) -> Result<AdapterResponse, AdapterError> {
        if self.health == AdapterHealthStatus::Unhealthy {
            return Err(AdapterError::Timeout);
        }
        self.calls.fetch_add(1, Ordering::Relaxed);
        let input_tokens = (request.prompt.len() as u64 / 4).max(1);
        let output_tokens = 64;
        Ok(AdapterResponse {
            content: format!("mock response to: {}", request.prompt),
            model: request.model.unwrap_or_else(|| "mock-model".to_string()),
            provider: self.provider_id.clone(),
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
            cost_usd: 0.0,
            response_id: Some(request.task_id),
            finish_reason: Some("stop".to_string()),
            latency_ms: self.latency_ms,
            raw: None,
        })
    }

    async fn health_check(&self) -> Result<AdapterHealthCheck, AdapterError> {
        Ok(AdapterHealthCheck {
            status: self.health,
            latency_ms: self.latency_ms,
            authenticated: self.health != AdapterHealthStatus::Unhealthy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn healthy_adapter_completes_and_counts_calls() {
        let adapter = MockAdapter::healthy("test-provider");
        let response = adapter
            .complete(AdapterRequest {
                prompt: "hello".into(),
                system_prompt: None,
                messages: None,
                model: None,
                temperature: None,
                max_tokens: None,
                stream: false,
                json_mode: false,
                task_id: "t1".into(),
            })
            .await
            .unwrap();
        assert_eq!(response.provider, "test-provider");
        assert_eq!(adapter.call_count(), 1);
    }

    #[tokio::test]
    async fn unhealthy_adapter_fails_requests() {
        let adapter = MockAdapter::with_health("down", AdapterHealthStatus::Unhealthy);
        let result = adapter
            .complete(AdapterRequest {
                prompt: "hello".into(),
                system_prompt: None,
                messages: None,
                model: None,
                temperature: None,
                max_tokens: None,
                stream: false,
                json_mode: false,
                task_id: "t1".into(),
            })
            .await;
        assert!(result.is_err());
    }
}
