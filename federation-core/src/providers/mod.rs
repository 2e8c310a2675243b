//! # Adapter Contract
//!
//! The boundary to out-of-scope provider code. An [`Adapter`] is the thing
//! actually invoked to serve a request once the router has picked a
//! `provider_id`; everything upstream of this module (registry, classifier,
//! scoring, bandit) only ever reasons about `Provider` metadata, never about
//! how a completion is actually produced.
//!
//! Building adapters for every provider tier (OpenAI, Anthropic, DeepSeek,
//! Groq, ...) is out of scope here — those are external collaborators the
//! core only needs a contract for. Two reference adapters exercise the
//! contract: [`mock::MockAdapter`] for deterministic tests, and
//! [`ollama::OllamaAdapter`] for the local fallback provider named
//! throughout the routing examples.

pub mod mock;
pub mod ollama;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AdapterError;

/// A single turn in a multi-message conversation, used when `messages` is
/// supplied instead of a bare `prompt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterMessage {
    pub role: String,
    pub content: String,
}

/// Request shape passed to an adapter. `prompt` and `messages` are mutually
/// exclusive in practice; adapters that only support one should ignore the
/// other (bare `prompt` is what the router constructs by default).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterRequest {
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub messages: Option<Vec<AdapterMessage>>,
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub stream: bool,
    pub json_mode: bool,
    pub task_id: String,
}

/// Response shape returned by an adapter's `complete`/`stream`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterResponse {
    pub content: String,
    pub model: String,
    pub provider: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub cost_usd: f64,
    pub response_id: Option<String>,
    pub finish_reason: Option<String>,
    pub latency_ms: u64,
    pub raw: Option<serde_json::Value>,
}

/// Health status reported directly by an adapter, distinct from the
/// registry's derived `ProviderHealth` (which folds in circuit-breaker
/// state the adapter itself knows nothing about).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterHealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone)]
pub struct AdapterHealthCheck {
    pub status: AdapterHealthStatus,
    pub latency_ms: u64,
    pub authenticated: bool,
}

/// The boundary contract every provider integration implements.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Provider id this adapter serves requests for.
    fn provider_id(&self) -> &str;

    /// Verify credentials are valid without issuing a full request.
    async fn authenticate(&self) -> Result<bool, AdapterError>;

    /// Issue a non-streaming completion.
    async fn complete(&self, request: AdapterRequest) -> Result<AdapterResponse, AdapterError>;

    /// Issue a streaming completion. Adapters that don't support streaming
    /// report it rather than silently falling back to a single chunk.
    async fn stream(
        &self,
        _request: AdapterRequest,
    ) -> Result<Vec<AdapterResponse>, AdapterError> {
        Err(AdapterError::StreamingUnsupported)
    }

    /// Lightweight liveness probe, independent of `authenticate`.
    async fn health_check(&self) -> Result<AdapterHealthCheck, AdapterError>;
}

/// Dynamic dispatch over configured adapters, keyed by `provider_id`. Never
/// reflects over adapter types at runtime; callers look the adapter up by
/// id and invoke the trait object.
#[derive(Clone, Default)]
pub struct AdapterFactory {
    adapters: HashMap<String, Arc<dyn Adapter>>,
}

impl AdapterFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, adapter: Arc<dyn Adapter>) {
        self.adapters.insert(adapter.provider_id().to_string(), adapter);
    }

    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn Adapter>> {
        self.adapters.get(provider_id).cloned()
    }
}
