//! Reference [`Adapter`] implementation against a local Ollama-compatible
//! endpoint. Exercises the contract end to end without needing a live
//! third-party API key; `provider_id` is expected to resolve to an entry in
//! the registry whose `api_base` defaults to `http://localhost:11434`.

use std::time::Instant;

use reqwest::Client;
use serde_json::json;

use crate::error::AdapterError;
use crate::providers::{Adapter, AdapterHealthCheck, AdapterHealthStatus, AdapterRequest, AdapterResponse};

pub struct OllamaAdapter {
    provider_id: String,
    base_url: String,
    model: String,
    client: Client,
}

impl OllamaAdapter {
    pub fn new(provider_id: impl Into<String>, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        OllamaAdapter {
            provider_id: provider_id.into(),
            base_url: base_url.into(),
            model: model.into(),
            client: Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl Adapter for OllamaAdapter {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    async fn authenticate(&self) -> Result<bool, AdapterError> {
        // Ollama has no API key; reachability stands in for authentication.
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await?;
        Ok(response.status().is_success())
    }

    async fn complete(&self, request: AdapterRequest) -> Result<AdapterResponse, AdapterError> {
        let start = Instant::now();
        let model = request.model.clone().unwrap_or_else(|| self.model.clone());

        let body = json!({
            "model": model,
            "prompt": request.prompt,
            "system": request.system_prompt,
            "stream": false,
            "options": {
                "temperature": request.temperature.unwrap_or(0.7),
                "num_predict": request.max_tokens,
            }
        });

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let code = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(AdapterError::Api { code, message });
        }

        let payload: serde_json::Value = response.json().await?;
        let latency_ms = start.elapsed().as_millis() as u64;

        let content = payload["response"].as_str().unwrap_or_default().to_string();
        let input_tokens = payload["prompt_eval_count"].as_u64().unwrap_or(0);
        let output_tokens = payload["eval_count"].as_u64().unwrap_or(0);

        Ok(AdapterResponse {
            content,
            model,
            provider: self.provider_id.clone(),
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
            cost_usd: 0.0,
            response_id: Some(uuid::Uuid::new_v4().to_string()),
            finish_reason: if payload["done"].as_bool().unwrap_or(false) {
                Some("stop".to_string())
            } else {
                None
            },
            latency_ms,
            raw: Some(payload),
        })
    }

    async fn health_check(&self) -> Result<AdapterHealthCheck, AdapterError> {
        let start = Instant::now();
        let result = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(response) if response.status().is_success() => Ok(AdapterHealthCheck {
                status: AdapterHealthStatus::Healthy,
                latency_ms,
                authenticated: true,
            }),
            Ok(_) => Ok(AdapterHealthCheck {
                status: AdapterHealthStatus::Degraded,
                latency_ms,
                authenticated: true,
            }),
            Err(_) => Ok(AdapterHealthCheck {
                status: AdapterHealthStatus::Unhealthy,
                latency_ms,
                authenticated: false,
            }),
        }
    }
}
