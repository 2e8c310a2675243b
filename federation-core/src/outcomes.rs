//! # Outcome Tracker (C4)
//!
//! Append-only record of decision outcomes plus the derived per-provider
//! (and per-provider-per-intent) statistics the bandit (C5) reads. Stat
//! rows are independent per provider, so this is a `DashMap` rather than a
//! single map behind one lock.

use dashmap::DashMap;

use crate::models::{RoutingOutcome, TaskIntent};

#[derive(Debug, Clone, Default)]
struct IntentStats {
    count: u64,
    success: u64,
}

#[derive(Debug, Default)]
struct ProviderStats {
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    total_cost: f64,
    total_latency_ms: u64,
    quality_scores: Vec<f64>,
    by_intent: std::collections::HashMap<TaskIntent, IntentStats>,
}

/// Derived performance numbers for a provider, optionally scoped to one
/// intent.
#[derive(Debug, Clone)]
pub struct Performance {
    pub success_rate: f64,
    pub error_rate: f64,
    pub avg_cost: f64,
    pub avg_latency_ms: f64,
    pub avg_quality_score: Option<f64>,
    pub intent_success_rate: Option<f64>,
}

#[derive(Default)]
pub struct OutcomeTracker {
    stats: DashMap<String, ProviderStats>,
}

impl OutcomeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a completed outcome into the provider's rolling statistics.
    pub fn record(&self, outcome: &RoutingOutcome) {
        let mut stats = self.stats.entry(outcome.provider_id.clone()).or_default();
        stats.total_requests += 1;
        if matches!(outcome.status, crate::models::OutcomeStatus::Success) {
            stats.successful_requests += 1;
        } else if outcome.status.is_failure() {
            stats.failed_requests += 1;
        }
        stats.total_cost += outcome.actual_cost;
        stats.total_latency_ms += outcome.actual_latency_ms as u64;
        if let Some(q) = outcome.quality_score {
            stats.quality_scores.push(q);
        }

        let intent_entry = stats.by_intent.entry(outcome.task_intent).or_default();
        intent_entry.count += 1;
        if matches!(outcome.status, crate::models::OutcomeStatus::Success) {
            intent_entry.success += 1;
        }
    }

    /// Performance summary for a provider, optionally narrowed to a single
    /// intent's success rate.
    pub fn performance(&self, provider_id: &str, intent: Option<TaskIntent>) -> Option<Performance> {
        let stats = self.stats.get(provider_id)?;
        if stats.total_requests == 0 {
            return None;
        }
        let total = stats.total_requests as f64;
        let success_rate = stats.successful_requests as f64 / total;
        let error_rate = stats.failed_requests as f64 / total;
        let avg_cost = stats.total_cost / total;
        let avg_latency_ms = stats.total_latency_ms as f64 / total;
        let avg_quality_score = if stats.quality_scores.is_empty() {
            None
        } else {
            Some(stats.quality_scores.iter().sum::<f64>() / stats.quality_scores.len() as f64)
        };
        let intent_success_rate = intent.and_then(|i| {
            stats.by_intent.get(&i).and_then(|s| {
                if s.count == 0 {
                    None
                } else {
                    Some(s.success as f64 / s.count as f64)
                }
            })
        });

        Some(Performance {
            success_rate,
            error_rate,
            avg_cost,
            avg_latency_ms,
            avg_quality_score,
            intent_success_rate,
        })
    }

    /// Trials and successes recorded for `(provider_id, intent)`, the raw
    /// inputs the bandit (C5) turns into a UCB score.
    pub fn trials_and_successes(&self, provider_id: &str, intent: TaskIntent) -> (u64, u64) {
        self.stats
            .get(provider_id)
            .and_then(|stats| stats.by_intent.get(&intent).map(|s| (s.count, s.success)))
            .unwrap_or((0, 0))
    }

    /// The provider with the highest intent-specific success rate, among
    /// those with at least `min_samples` trials for that intent. `nil` if
    /// none qualify.
    pub fn best_for_intent(&self, intent: TaskIntent, min_samples: u64) -> Option<String> {
        self.stats
            .iter()
            .filter_map(|entry| {
                let stats = entry.value().by_intent.get(&intent)?;
                if stats.count < min_samples {
                    return None;
                }
                Some((entry.key().clone(), stats.success as f64 / stats.count as f64))
            })
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap().then_with(|| b.0.cmp(&a.0)))
            .map(|(id, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OutcomeStatus;
    use chrono::Utc;

    fn outcome(provider_id: &str, intent: TaskIntent, status: OutcomeStatus) -> RoutingOutcome {
        RoutingOutcome {
            outcome_id: "o1".into(),
            decision_id: "d1".into(),
            task_id: "t1".into(),
            provider_id: provider_id.to_string(),
            status,
            actual_cost: 0.01,
            actual_latency_ms: 500,
            input_tokens: 100,
            output_tokens: 100,
            quality_score: Some(0.9),
            correctness_score: None,
            helpfulness_score: None,
            estimated_cost: 0.01,
            estimated_latency_ms: 500,
            task_intent: intent,
            task_complexity: None,
            error_type: None,
            error_message: None,
            routed_at: Utc::now(),
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn success_and_error_rate_never_exceed_one_combined() {
        let tracker = OutcomeTracker::new();
        tracker.record(&outcome("a", TaskIntent::CodeImplementation, OutcomeStatus::Success));
        tracker.record(&outcome("a", TaskIntent::CodeImplementation, OutcomeStatus::Failure));
        tracker.record(&outcome("a", TaskIntent::CodeImplementation, OutcomeStatus::Partial));
        let perf = tracker.performance("a", None).unwrap();
        assert!(perf.success_rate + perf.error_rate <= 1.0 + 1e-9);
    }

    #[test]
    fn best_for_intent_requires_minimum_samples() {
        let tracker = OutcomeTracker::new();
        for _ in 0..15 {
            tracker.record(&outcome("deepseek", TaskIntent::CodeImplementation, OutcomeStatus::Success));
        }
        for i in 0..5 {
            let status = if i < 5 { OutcomeStatus::Success } else { OutcomeStatus::Failure };
            tracker.record(&outcome("groq", TaskIntent::CodeImplementation, status));
        }
        assert_eq!(
            tracker.best_for_intent(TaskIntent::CodeImplementation, 5),
            Some("deepseek".to_string())
        );
    }

    #[test]
    fn best_for_intent_none_when_no_provider_meets_threshold() {
        let tracker = OutcomeTracker::new();
        tracker.record(&outcome("a", TaskIntent::Research, OutcomeStatus::Success));
        assert_eq!(tracker.best_for_intent(TaskIntent::Research, 5), None);
    }
}
