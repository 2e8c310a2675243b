//! # Domain Model
//!
//! The record types the rest of the crate operates on: `Provider` (the
//! registry's central record), `Task` (the router's input), `RoutingDecision`
//! (its output), and `RoutingOutcome` (the learning feedback recorded after
//! a call completes).
//!
//! All wire-facing types derive `Serialize`/`Deserialize` so they can cross
//! a process boundary unchanged; enums use `#[serde(rename_all =
//! "snake_case")]` so the on-wire tag matches the tag used throughout this
//! document (`code_implementation`, not `CodeImplementation`).

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Informational classification of a provider's place in the market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderTier {
    Frontier,
    ChineseFrontier,
    Aggregator,
    Cloud,
    Specialized,
    Opensource,
    Emerging,
}

/// Observed health state of a provider, recomputed on every health update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Unknown,
    Disabled,
}

impl Default for ProviderStatus {
    fn default() -> Self {
        ProviderStatus::Unknown
    }
}

/// Declarative capability set a provider advertises.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCapabilities {
    pub max_context: u32,
    #[serde(default)]
    pub supports_functions: bool,
    #[serde(default)]
    pub supports_vision: bool,
    #[serde(default)]
    pub supports_json_mode: bool,
    #[serde(default)]
    pub supports_streaming: bool,
    #[serde(default)]
    pub supports_batch: bool,
    #[serde(default)]
    pub specialties: HashSet<String>,
    pub typical_latency_ms: Option<u32>,
    pub throughput_tpm: Option<u32>,
    #[serde(default)]
    pub soc2_compliant: bool,
    #[serde(default)]
    pub gdpr_compliant: bool,
    #[serde(default)]
    pub hipaa_compliant: bool,
    #[serde(default)]
    pub data_residency: HashSet<String>,
}

/// Per-1M-token pricing. `estimate` matches the registry's estimate formula
/// exactly: linear in tokens, rounded to four decimal places.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProviderCost {
    pub input_per_1m: f64,
    pub output_per_1m: f64,
    pub context_cache_hit_discount: Option<f64>,
    pub batch_discount: Option<f64>,
}

impl ProviderCost {
    pub fn estimate(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        let raw = (input_tokens as f64 / 1_000_000.0) * self.input_per_1m
            + (output_tokens as f64 / 1_000_000.0) * self.output_per_1m;
        (raw * 10_000.0).round() / 10_000.0
    }
}

/// Rolling health record, updated by `Registry::update_health` and the
/// circuit-breaker transition helpers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderHealth {
    pub status: ProviderStatus,
    pub avg_latency_ms: f64,
    pub error_rate_24h: f64,
    pub consecutive_failures: u32,
    pub circuit_open: bool,
    pub circuit_open_until: Option<DateTime<Utc>>,
}

impl Default for ProviderHealth {
    fn default() -> Self {
        ProviderHealth {
            status: ProviderStatus::Unknown,
            avg_latency_ms: 0.0,
            error_rate_24h: 0.0,
            consecutive_failures: 0,
            circuit_open: false,
            circuit_open_until: None,
        }
    }
}

/// A single upstream LLM backend and everything the router needs to
/// consider it: capabilities, pricing, health and an admin kill-switch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    pub name: String,
    pub tier: ProviderTier,
    pub emoji: Option<String>,
    pub api_base: String,
    pub api_key_env: String,
    pub capabilities: ProviderCapabilities,
    pub cost: ProviderCost,
    pub quality_score: Option<f64>,
    pub reliability_score: Option<f64>,
    pub health: ProviderHealth,
    pub enabled: bool,
    pub updated_at: DateTime<Utc>,
}

impl Provider {
    /// `true` iff the provider may currently be selected: enabled, in a
    /// usable health status, and not presently inside a circuit-open window.
    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        let status_ok = matches!(
            self.health.status,
            ProviderStatus::Healthy | ProviderStatus::Degraded
        );
        let circuit_blocking = self.health.circuit_open
            && self
                .health
                .circuit_open_until
                .map(|until| now < until)
                .unwrap_or(true);
        self.enabled && status_ok && !circuit_blocking
    }

    pub fn quality_score_or_default(&self) -> f64 {
        self.quality_score.unwrap_or(0.8)
    }

    pub fn reliability_score_or_default(&self) -> f64 {
        self.reliability_score.unwrap_or(0.95)
    }
}

/// Closed set of task classifications the intent classifier (C2) assigns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskIntent {
    CodeImplementation,
    CodeReview,
    CodeDebugging,
    CodeDocumentation,
    Research,
    Analysis,
    Synthesis,
    Documentation,
    CreativeWriting,
    TechnicalWriting,
    ProblemSolving,
    Planning,
    DecisionSupport,
    ImageGeneration,
    VisionAnalysis,
    QuestionAnswering,
    Summarization,
    Translation,
    Unknown,
}

impl TaskIntent {
    /// Output-token multiplier applied over the input-token estimate when a
    /// task doesn't supply its own `estimated_output_tokens`. Carries the
    /// full table from the reference implementation rather than spec.md's
    /// shorthand (`code`/`research`/`summary`/default), since documentation
    /// and question-answering have their own tuned multipliers there too.
    pub fn output_token_multiplier(&self) -> f64 {
        match self {
            TaskIntent::CodeImplementation => 3.0,
            TaskIntent::Research => 4.0,
            TaskIntent::Documentation => 3.0,
            TaskIntent::Summarization => 0.5,
            TaskIntent::QuestionAnswering => 1.0,
            _ => 2.0,
        }
    }
}

impl Default for TaskIntent {
    fn default() -> Self {
        TaskIntent::Unknown
    }
}

/// Relative urgency of a task; informational, not used in scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Critical = 1,
    High = 2,
    Normal = 3,
    Low = 4,
    Background = 5,
}

impl Default for TaskPriority {
    fn default() -> Self {
        TaskPriority::Normal
    }
}

/// Hard filters a candidate provider must clear before it is scored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskRequirements {
    pub max_cost: Option<f64>,
    pub max_latency_ms: Option<u32>,
    #[serde(default)]
    pub streaming_required: bool,
    pub min_quality_score: Option<f64>,
    pub min_context: Option<u32>,
    #[serde(default)]
    pub specialties_required: HashSet<String>,
    pub data_residency: Option<String>,
    #[serde(default)]
    pub soc2_required: bool,
    #[serde(default)]
    pub gdpr_required: bool,
    #[serde(default)]
    pub hipaa_required: bool,
    #[serde(default)]
    pub functions_required: bool,
    #[serde(default)]
    pub vision_required: bool,
    #[serde(default)]
    pub json_mode_required: bool,
    pub governance_policy: Option<String>,
}

/// The router's input: a prompt plus enough context to classify, filter and
/// score against the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub session_id: Option<String>,
    pub tenant_id: Option<String>,
    pub user_id: Option<String>,
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub intent: Option<TaskIntent>,
    pub estimated_input_tokens: Option<u64>,
    pub estimated_output_tokens: Option<u64>,
    #[serde(default)]
    pub requirements: TaskRequirements,
    #[serde(default)]
    pub priority: TaskPriority,
    pub deadline: Option<DateTime<Utc>>,
}

impl Task {
    /// Rough `chars/4` token estimate, used when the caller hasn't already
    /// supplied one. Output tokens scale off the input estimate by the
    /// intent's multiplier (see `TaskIntent::output_token_multiplier`).
    pub fn estimate_tokens(&self) -> (u64, u64) {
        let text_len = self.system_prompt.as_deref().unwrap_or("").len() + self.prompt.len();
        let input = self
            .estimated_input_tokens
            .unwrap_or_else(|| (text_len / 4).max(1) as u64);
        let output = self.estimated_output_tokens.unwrap_or_else(|| {
            let intent = self.intent.unwrap_or(TaskIntent::Unknown);
            ((input as f64) * intent.output_token_multiplier()) as u64
        });
        (input, output)
    }
}

/// Per-candidate score vector plus the provider identity it was computed
/// for; used both for the winning selection and for the runner-up list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub provider_id: String,
    pub quality_score: f64,
    pub speed_score: f64,
    pub cost_score: f64,
    pub reliability_score: f64,
    pub overall_score: f64,
}

/// The router's output: exactly one selected provider plus the scoring
/// trail that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub task_id: String,
    pub provider_id: String,
    pub model: Option<String>,
    pub quality_score: f64,
    pub speed_score: f64,
    pub cost_score: f64,
    pub reliability_score: f64,
    pub overall_score: f64,
    pub confidence: f64,
    pub estimated_cost: f64,
    pub estimated_latency_ms: u32,
    pub alternatives: Vec<ScoredCandidate>,
    pub reasoning: String,
    pub decision_time_ms: u64,
    pub routed_at: DateTime<Utc>,
}

/// Final disposition of an executed call, used by C4/C5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    Partial,
    Failure,
    Timeout,
    Error,
    Cancelled,
}

impl OutcomeStatus {
    /// Outcomes that count against a provider's failure streak.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            OutcomeStatus::Failure | OutcomeStatus::Error | OutcomeStatus::Timeout
        )
    }
}

/// Learning feedback recorded once a routed call completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingOutcome {
    pub outcome_id: String,
    pub decision_id: String,
    pub task_id: String,
    pub provider_id: String,
    pub status: OutcomeStatus,
    pub actual_cost: f64,
    pub actual_latency_ms: u32,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub quality_score: Option<f64>,
    pub correctness_score: Option<f64>,
    pub helpfulness_score: Option<f64>,
    pub estimated_cost: f64,
    pub estimated_latency_ms: u32,
    pub task_intent: TaskIntent,
    pub task_complexity: Option<String>,
    pub error_type: Option<String>,
    pub error_message: Option<String>,
    pub routed_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl RoutingOutcome {
    pub fn cost_delta(&self) -> f64 {
        self.actual_cost - self.estimated_cost
    }

    pub fn latency_delta(&self) -> i64 {
        self.actual_latency_ms as i64 - self.estimated_latency_ms as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_estimate_matches_spec_formula() {
        let cost = ProviderCost {
            input_per_1m: 2.50,
            output_per_1m: 10.00,
            context_cache_hit_discount: None,
            batch_discount: None,
        };
        assert_eq!(cost.estimate(1_000_000, 0), 2.5);
        assert_eq!(cost.estimate(0, 1_000_000), 10.0);
    }

    #[test]
    fn cost_estimate_is_linear_in_tokens() {
        let cost = ProviderCost {
            input_per_1m: 0.59,
            output_per_1m: 0.79,
            context_cache_hit_discount: None,
            batch_discount: None,
        };
        let a = cost.estimate(100, 300);
        let b = cost.estimate(50, 150);
        assert!((a - 2.0 * b).abs() < 1e-9);
    }

    #[test]
    fn zero_cost_provider_estimates_to_zero() {
        let cost = ProviderCost {
            input_per_1m: 0.0,
            output_per_1m: 0.0,
            context_cache_hit_discount: None,
            batch_discount: None,
        };
        assert_eq!(cost.estimate(100_000, 100_000), 0.0);
    }

    #[test]
    fn output_multiplier_matches_intent_table() {
        assert_eq!(TaskIntent::CodeImplementation.output_token_multiplier(), 3.0);
        assert_eq!(TaskIntent::Research.output_token_multiplier(), 4.0);
        assert_eq!(TaskIntent::Summarization.output_token_multiplier(), 0.5);
        assert_eq!(TaskIntent::Unknown.output_token_multiplier(), 2.0);
    }

    #[test]
    fn is_available_respects_circuit_breaker_window() {
        let mut provider = sample_provider();
        provider.health.status = ProviderStatus::Healthy;
        provider.health.circuit_open = true;
        let now = Utc::now();
        provider.health.circuit_open_until = Some(now + chrono::Duration::seconds(30));
        assert!(!provider.is_available(now));
        assert!(provider.is_available(now + chrono::Duration::seconds(31)));
    }

    fn sample_provider() -> Provider {
        Provider {
            id: "test".into(),
            name: "Test".into(),
            tier: ProviderTier::Cloud,
            emoji: None,
            api_base: "https://example.invalid".into(),
            api_key_env: "TEST_API_KEY".into(),
            capabilities: ProviderCapabilities {
                max_context: 8192,
                supports_functions: false,
                supports_vision: false,
                supports_json_mode: false,
                supports_streaming: true,
                supports_batch: false,
                specialties: HashSet::new(),
                typical_latency_ms: Some(1000),
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
            health: ProviderHealth::default(),
            enabled: true,
            updated_at: Utc::now(),
        }
    }
}
