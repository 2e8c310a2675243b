//! # Router (C6)
//!
//! The orchestrator: `route(Task) -> RoutingDecision`. Ties together the
//! registry (C1), classifier (C2), cost estimator (C3), and bandit (C5)
//! into the single call external callers make. Never returns an error for
//! "no good provider" — that case produces a confidence-0 fallback decision
//! naming the local `ollama` provider, per the no-error-terminates-the-call
//! contract.

use std::time::Instant;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::classifier::classify;
use crate::cost::CostEstimator;
use crate::error::FederationError;
use crate::models::{Provider, ProviderStatus, RoutingDecision, ScoredCandidate, Task, TaskIntent};
use crate::optimizer::{Optimizer, SelectionReason};
use crate::registry::Registry;

const FALLBACK_PROVIDER_ID: &str = "ollama";
const DEFAULT_ESTIMATED_LATENCY_MS: u32 = 1500;

fn specialty_for_intent(intent: TaskIntent) -> Option<&'static str> {
    match intent {
        TaskIntent::CodeImplementation | TaskIntent::CodeReview => Some("code"),
        TaskIntent::Research | TaskIntent::Analysis => Some("reasoning"),
        TaskIntent::Documentation => Some("documentation"),
        _ => None,
    }
}

fn quality_score(provider: &Provider, intent: TaskIntent) -> f64 {
    let mut score = provider.quality_score_or_default();
    if let Some(specialty) = specialty_for_intent(intent) {
        if provider.capabilities.specialties.contains(specialty) {
            score += 0.05;
        }
    }
    score.min(1.0)
}

fn speed_score(provider: &Provider) -> f64 {
    match provider.capabilities.typical_latency_ms {
        None => 0.6,
        Some(latency) => {
            let latency = latency as f64;
            if latency < 300.0 {
                1.0
            } else if latency > 5000.0 {
                0.3
            } else {
                1.0 - (latency - 300.0) / 4700.0
            }
        }
    }
}

fn cost_score(provider: &Provider) -> f64 {
    let avg = (provider.cost.input_per_1m + provider.cost.output_per_1m) / 2.0;
    if avg == 0.0 {
        1.0
    } else if avg < 0.50 {
        1.0
    } else if avg > 10.0 {
        0.2
    } else {
        1.0 - (avg.log10() - 0.5_f64.log10()) / 2.0
    }
}

fn reliability_score(provider: &Provider) -> f64 {
    let mut score = provider.reliability_score_or_default() - provider.health.error_rate_24h;
    match provider.health.status {
        ProviderStatus::Degraded => score -= 0.1,
        ProviderStatus::Unhealthy => score = 0.0,
        _ => {}
    }
    score.clamp(0.0, 1.0)
}

fn overall_score(quality: f64, speed: f64, cost: f64, reliability: f64) -> f64 {
    0.5 * quality + 0.3 * speed + 0.1 * cost + 0.1 * reliability
}

fn passes_hard_constraints(provider: &Provider, task: &Task) -> bool {
    let req = &task.requirements;

    if let Some(min_context) = req.min_context {
        if min_context > provider.capabilities.max_context {
            return false;
        }
    }
    if req.functions_required && !provider.capabilities.supports_functions {
        return false;
    }
    if req.vision_required && !provider.capabilities.supports_vision {
        return false;
    }
    if req.json_mode_required && !provider.capabilities.supports_json_mode {
        return false;
    }
    if req.streaming_required && !provider.capabilities.supports_streaming {
        return false;
    }
    if req.soc2_required && !provider.capabilities.soc2_compliant {
        return false;
    }
    if req.gdpr_required && !provider.capabilities.gdpr_compliant {
        return false;
    }
    if req.hipaa_required && !provider.capabilities.hipaa_compliant {
        return false;
    }
    if let Some(residency) = &req.data_residency {
        if !provider.capabilities.data_residency.contains(residency) {
            return false;
        }
    }
    if !req.specialties_required.is_empty()
        && provider
            .capabilities
            .specialties
            .is_disjoint(&req.specialties_required)
    {
        return false;
    }
    if let Some(min_quality) = req.min_quality_score {
        if provider.quality_score_or_default() < min_quality {
            return false;
        }
    }

    true
}

fn fallback_decision(task: &Task, decision_time_ms: u64) -> RoutingDecision {
    RoutingDecision {
        task_id: task.id.clone(),
        provider_id: FALLBACK_PROVIDER_ID.to_string(),
        model: None,
        quality_score: 0.0,
        speed_score: 0.0,
        cost_score: 0.0,
        reliability_score: 0.0,
        overall_score: 0.0,
        confidence: 0.0,
        estimated_cost: 0.0,
        estimated_latency_ms: DEFAULT_ESTIMATED_LATENCY_MS,
        alternatives: Vec::new(),
        reasoning: "no eligible candidate; falling back to local provider".to_string(),
        decision_time_ms,
        routed_at: Utc::now(),
    }
}

fn build_reasoning(provider: &Provider, candidate: &ScoredCandidate, intent: TaskIntent, reason: &SelectionReason) -> String {
    let mut reasons = Vec::new();
    if candidate.quality_score > 0.9 {
        reasons.push("high quality".to_string());
    }
    if candidate.speed_score > 0.8 {
        reasons.push("low latency".to_string());
    }
    if candidate.cost_score > 0.9 {
        reasons.push("cost efficient".to_string());
    }
    if candidate.reliability_score > 0.95 {
        reasons.push("highly reliable".to_string());
    }
    if let Some(specialty) = specialty_for_intent(intent) {
        if provider.capabilities.specialties.contains(specialty) {
            reasons.push(format!("specializes in {specialty}"));
        }
    }
    match reason {
        SelectionReason::Exploration => reasons.push("selected via exploration".to_string()),
        SelectionReason::UcbOptimization { .. } => reasons.push("selected via learned performance".to_string()),
        SelectionReason::InsufficientDataForOptimization => {}
    }

    let emoji = provider.emoji.as_deref().unwrap_or("");
    let label = format!("{emoji} {}", provider.name).trim().to_string();
    if reasons.is_empty() {
        format!("{label}: selected as the best-scoring available candidate")
    } else {
        format!("{label}: {}", reasons.join(", "))
    }
}

/// Ties the registry, classifier, cost estimator and bandit together behind
/// a single `route` call.
pub struct Router {
    registry: Registry,
    cost_estimator: CostEstimator,
    optimizer: Optimizer,
}

impl Router {
    pub fn new(registry: Registry, cost_estimator: CostEstimator, optimizer: Optimizer) -> Self {
        Router {
            registry,
            cost_estimator,
            optimizer,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn cost_estimator(&self) -> &CostEstimator {
        &self.cost_estimator
    }

    /// Route `task` to the best-available provider. `cancellation`, if
    /// supplied, is checked once before scoring begins; a token that has
    /// already fired aborts before any work is done.
    pub async fn route(
        &self,
        mut task: Task,
        cancellation: Option<&CancellationToken>,
    ) -> Result<RoutingDecision, FederationError> {
        let start = Instant::now();
        let now = Utc::now();

        if let Some(token) = cancellation {
            if token.is_cancelled() {
                return Err(FederationError::Cancelled);
            }
        }

        self.registry.close_expired_circuits(now).await;

        let intent = match task.intent {
            Some(intent) => intent,
            None => {
                let classification = classify(task.system_prompt.as_deref(), &task.prompt);
                task.intent = Some(classification);
                classification
            }
        };

        let providers = self.registry.get_all().await;
        let mut candidates: Vec<&Provider> = providers
            .values()
            .filter(|p| p.is_available(now))
            .filter(|p| passes_hard_constraints(p, &task))
            .collect();
        candidates.sort_by(|a, b| a.id.cmp(&b.id));

        let (input_tokens, output_tokens) = task.estimate_tokens();
        if let Some(max_cost) = task.requirements.max_cost {
            candidates.retain(|p| self.cost_estimator.estimate(p, input_tokens, output_tokens) <= max_cost);
        }

        if candidates.is_empty() {
            let decision_time_ms = start.elapsed().as_millis() as u64;
            return Ok(fallback_decision(&task, decision_time_ms));
        }

        let mut scored: Vec<(&Provider, ScoredCandidate)> = candidates
            .iter()
            .map(|provider| {
                let quality = quality_score(provider, intent);
                let speed = speed_score(provider);
                let cost = cost_score(provider);
                let reliability = reliability_score(provider);
                let overall = overall_score(quality, speed, cost, reliability);
                (
                    *provider,
                    ScoredCandidate {
                        provider_id: provider.id.clone(),
                        quality_score: quality,
                        speed_score: speed,
                        cost_score: cost,
                        reliability_score: reliability,
                        overall_score: overall,
                    },
                )
            })
            .collect();
        scored.sort_by(|a, b| {
            b.1.overall_score
                .partial_cmp(&a.1.overall_score)
                .unwrap()
                .then_with(|| a.0.id.cmp(&b.0.id))
        });

        let base_scores: Vec<(String, f64)> = scored
            .iter()
            .map(|(p, c)| (p.id.clone(), c.overall_score))
            .collect();
        let (winner_id, reason) = self
            .optimizer
            .select(&base_scores, intent, now)
            .expect("candidates non-empty");

        let winner_index = scored
            .iter()
            .position(|(p, _)| p.id == winner_id)
            .unwrap_or(0);
        let (winner_provider, winner_candidate) = scored[winner_index].clone();

        let estimated_cost = self
            .cost_estimator
            .estimate(winner_provider, input_tokens, output_tokens);
        let estimated_latency_ms = winner_provider
            .capabilities
            .typical_latency_ms
            .unwrap_or(DEFAULT_ESTIMATED_LATENCY_MS);

        let alternatives: Vec<ScoredCandidate> = scored
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != winner_index)
            .take(3)
            .map(|(_, (_, candidate))| candidate.clone())
            .collect();

        let reasoning = build_reasoning(winner_provider, &winner_candidate, intent, &reason);
        let confidence = winner_candidate.overall_score;

        let decision_time_ms = start.elapsed().as_millis() as u64;

        Ok(RoutingDecision {
            task_id: task.id.clone(),
            provider_id: winner_provider.id.clone(),
            model: None,
            quality_score: winner_candidate.quality_score,
            speed_score: winner_candidate.speed_score,
            cost_score: winner_candidate.cost_score,
            reliability_score: winner_candidate.reliability_score,
            overall_score: winner_candidate.overall_score,
            confidence,
            estimated_cost,
            estimated_latency_ms,
            alternatives,
            reasoning,
            decision_time_ms,
            routed_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProviderCapabilities, ProviderCost, ProviderHealth, ProviderTier, TaskRequirements};
    use crate::rng::StdRngSource;
    use crate::store::InMemoryStore;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn provider(
        id: &str,
        quality: f64,
        latency_ms: u32,
        input_per_1m: f64,
        output_per_1m: f64,
        specialties: &[&str],
    ) -> Provider {
        Provider {
            id: id.to_string(),
            name: id.to_string(),
            tier: ProviderTier::Cloud,
            emoji: Some("\u{1f916}".to_string()),
            api_base: "https://example.invalid".into(),
            api_key_env: "X".into(),
            capabilities: ProviderCapabilities {
                max_context: 128_000,
                supports_functions: false,
                supports_vision: false,
                supports_json_mode: false,
                supports_streaming: true,
                supports_batch: false,
                specialties: specialties.iter().map(|s| s.to_string()).collect(),
                typical_latency_ms: Some(latency_ms),
                throughput_tpm: None,
                soc2_compliant: false,
                gdpr_compliant: false,
                hipaa_compliant: false,
                data_residency: HashSet::new(),
            },
            cost: ProviderCost {
                input_per_1m,
                output_per_1m,
                context_cache_hit_discount: None,
                batch_discount: None,
            },
            quality_score: Some(quality),
            reliability_score: Some(0.95),
            health: ProviderHealth {
                status: ProviderStatus::Healthy,
                ..ProviderHealth::default()
            },
            enabled: true,
            updated_at: Utc::now(),
        }
    }

    fn task(prompt: &str) -> Task {
        Task {
            id: "t1".into(),
            session_id: None,
            tenant_id: None,
            user_id: None,
            prompt: prompt.to_string(),
            system_prompt: None,
            intent: None,
            estimated_input_tokens: None,
            estimated_output_tokens: None,
            requirements: TaskRequirements::default(),
            priority: Default::default(),
            deadline: None,
        }
    }

    async fn router_with(providers: Vec<Provider>) -> Router {
        let registry = Registry::new(Arc::new(InMemoryStore::new()));
        for p in providers {
            registry.save(p).await.unwrap();
        }
        let cost_estimator = CostEstimator::new();
        let optimizer = Optimizer::new(
            Arc::new(crate::outcomes::OutcomeTracker::new()),
            Arc::new(StdRngSource::from_seed(1)),
        );
        Router::new(registry, cost_estimator, optimizer)
    }

    #[tokio::test]
    async fn fibonacci_prompt_selects_groq_by_overall_score() {
        let router = router_with(vec![
            provider("openai", 0.95, 1200, 2.50, 10.00, &["code", "reasoning"]),
            provider("deepseek", 0.88, 2100, 0.14, 0.28, &["code", "cost_efficient"]),
            provider("groq", 0.85, 300, 0.59, 0.79, &["speed"]),
        ])
        .await;

        let decision = router
            .route(task("Implement a function to calculate fibonacci"), None)
            .await
            .unwrap();
        assert_eq!(decision.provider_id, "groq");
    }

    #[tokio::test]
    async fn max_cost_filter_drops_expensive_candidate() {
        let router = router_with(vec![
            provider("openai", 0.95, 1200, 2.50, 10.00, &["code"]),
            provider("deepseek", 0.88, 2100, 0.14, 0.28, &["code"]),
            provider("groq", 0.85, 300, 0.59, 0.79, &["speed"]),
        ])
        .await;

        let mut t = task("Implement a function to calculate fibonacci");
        t.estimated_input_tokens = Some(100);
        t.estimated_output_tokens = Some(300);
        t.requirements.max_cost = Some(0.001);

        let decision = router.route(t, None).await.unwrap();
        assert_eq!(decision.provider_id, "groq");
    }

    #[tokio::test]
    async fn local_data_residency_isolates_ollama() {
        let mut ollama = provider("ollama", 0.7, 200, 0.0, 0.0, &[]);
        ollama.capabilities.data_residency.insert("local".to_string());
        let router = router_with(vec![
            provider("openai", 0.95, 1200, 2.50, 10.00, &["code"]),
            ollama,
        ])
        .await;

        let mut t = task("anything");
        t.requirements.data_residency = Some("local".to_string());
        let decision = router.route(t, None).await.unwrap();
        assert_eq!(decision.provider_id, "ollama");
        assert_eq!(decision.estimated_cost, 0.0);
    }

    #[tokio::test]
    async fn empty_candidates_fall_back_to_ollama_with_zero_confidence() {
        let router = router_with(vec![provider("openai", 0.95, 1200, 2.50, 10.00, &["code"])]).await;
        let mut t = task("anything");
        t.requirements.min_context = Some(10_000_000);
        let decision = router.route(t, None).await.unwrap();
        assert_eq!(decision.provider_id, "ollama");
        assert_eq!(decision.confidence, 0.0);
    }

    #[tokio::test]
    async fn cancellation_token_aborts_before_scoring() {
        let router = router_with(vec![provider("openai", 0.95, 1200, 2.50, 10.00, &["code"])]).await;
        let token = CancellationToken::new();
        token.cancel();
        let result = router.route(task("anything"), Some(&token)).await;
        assert!(matches!(result, Err(FederationError::Cancelled)));
    }
}
