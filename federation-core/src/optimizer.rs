//! # Optimizer / Bandit (C5)
//!
//! UCB1 selection over the outcome tracker's per-`(provider, intent)`
//! statistics, with a minimum-sample floor before exploiting and an
//! epsilon-exploration branch on top. The score cache refreshes from C4 at
//! most once per five minutes; refreshes coalesce behind a single lock so
//! concurrent callers never trigger more than one refresh per window.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

use crate::models::TaskIntent;
use crate::outcomes::OutcomeTracker;
use crate::rng::RandomSource;

/// Exploration constant `c` in `win_rate + c * sqrt((2*sqrt(N)) / sqrt(n))`.
pub const DEFAULT_EXPLORATION_CONSTANT: f64 = 1.414;
pub const DEFAULT_EXPLORATION_RATE: f64 = 0.05;
pub const DEFAULT_MIN_SAMPLES_BEFORE_EXPLOIT: u64 = 10;
const REFRESH_INTERVAL: Duration = Duration::minutes(5);

#[derive(Debug, Clone, Copy)]
struct ProviderScore {
    trials: u64,
    successes: u64,
}

impl ProviderScore {
    fn win_rate(&self) -> f64 {
        if self.trials == 0 {
            0.0
        } else {
            self.successes as f64 / self.trials as f64
        }
    }

    /// `+inf` for an untested arm, per spec: untested pairs are always
    /// selected first when exploiting.
    fn ucb_score(&self, total_trials: u64, exploration_constant: f64) -> f64 {
        if self.trials == 0 {
            return f64::INFINITY;
        }
        let exploitation = self.win_rate();
        let exploration = exploration_constant
            * ((2.0 * (total_trials as f64).sqrt()) / (self.trials as f64).sqrt()).sqrt();
        exploitation + exploration
    }
}

/// Why the optimizer picked the candidate it did; surfaced in the router's
/// reasoning trail and useful for debugging exploration behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionReason {
    InsufficientDataForOptimization,
    Exploration,
    UcbOptimization { trials: u64, win_rate_pct: u32 },
}

struct ScoreCache {
    scores: HashMap<(String, TaskIntent), ProviderScore>,
    last_update: DateTime<Utc>,
}

/// UCB1 bandit over candidate providers for a given intent, backed by the
/// outcome tracker's running statistics.
pub struct Optimizer {
    outcomes: Arc<OutcomeTracker>,
    rng: Arc<dyn RandomSource>,
    cache: Mutex<ScoreCache>,
    exploration_constant: f64,
    exploration_rate: f64,
    min_samples_before_exploit: u64,
}

impl Optimizer {
    pub fn new(outcomes: Arc<OutcomeTracker>, rng: Arc<dyn RandomSource>) -> Self {
        Optimizer {
            outcomes,
            rng,
            cache: Mutex::new(ScoreCache {
                scores: HashMap::new(),
                last_update: DateTime::<Utc>::MIN_UTC,
            }),
            exploration_constant: DEFAULT_EXPLORATION_CONSTANT,
            exploration_rate: DEFAULT_EXPLORATION_RATE,
            min_samples_before_exploit: DEFAULT_MIN_SAMPLES_BEFORE_EXPLOIT,
        }
    }

    pub fn with_exploration_rate(mut self, rate: f64) -> Self {
        self.exploration_rate = rate;
        self
    }

    pub fn with_exploration_constant(mut self, c: f64) -> Self {
        self.exploration_constant = c;
        self
    }

    pub fn with_min_samples_before_exploit(mut self, min_samples: u64) -> Self {
        self.min_samples_before_exploit = min_samples;
        self
    }

    /// Pull fresh trial/success counts from the outcome tracker for every
    /// candidate, unless the cache was refreshed within the last five
    /// minutes (idempotent within that window: repeated calls don't churn
    /// the cache contents).
    fn refresh_scores(&self, candidates: &[String], intent: TaskIntent, now: DateTime<Utc>) {
        let mut cache = self.cache.lock().expect("optimizer cache poisoned");
        if now - cache.last_update < REFRESH_INTERVAL {
            return;
        }
        for provider_id in candidates {
            let (trials, successes) = self.outcomes.trials_and_successes(provider_id, intent);
            cache
                .scores
                .insert((provider_id.clone(), intent), ProviderScore { trials, successes });
        }
        cache.last_update = now;
    }

    /// Select a candidate from `candidates` (already sorted by base score,
    /// descending), given the base `overall_score` for each, indexed the
    /// same way. Returns the chosen provider id and the reason it won.
    pub fn select(
        &self,
        candidates: &[(String, f64)],
        intent: TaskIntent,
        now: DateTime<Utc>,
    ) -> Option<(String, SelectionReason)> {
        if candidates.is_empty() {
            return None;
        }
        let ids: Vec<String> = candidates.iter().map(|(id, _)| id.clone()).collect();
        self.refresh_scores(&ids, intent, now);

        let cache = self.cache.lock().expect("optimizer cache poisoned");
        let total_trials: u64 = ids
            .iter()
            .filter_map(|id| cache.scores.get(&(id.clone(), intent)))
            .map(|s| s.trials)
            .sum();

        if total_trials < self.min_samples_before_exploit {
            let (best_id, _) = candidates
                .iter()
                .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap())?
                .clone();
            return Some((best_id, SelectionReason::InsufficientDataForOptimization));
        }

        if self.rng.next_f64() < self.exploration_rate {
            let idx = self.rng.next_index(candidates.len());
            return Some((candidates[idx].0.clone(), SelectionReason::Exploration));
        }

        let mut best: Option<(&str, f64, ProviderScore)> = None;
        for (id, _) in candidates {
            let score = cache
                .scores
                .get(&(id.clone(), intent))
                .copied()
                .unwrap_or(ProviderScore { trials: 0, successes: 0 });
            let ucb = score.ucb_score(total_trials, self.exploration_constant);
            let better = match &best {
                None => true,
                Some((_, best_ucb, _)) => ucb > *best_ucb,
            };
            if better {
                best = Some((id, ucb, score));
            }
        }
        let (id, _, score) = best?;
        Some((
            id.to_string(),
            SelectionReason::UcbOptimization {
                trials: score.trials,
                win_rate_pct: (score.win_rate() * 100.0).round() as u32,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OutcomeStatus;
    use crate::rng::StdRngSource;

    fn make_success(provider_id: &str, intent: TaskIntent) -> crate::models::RoutingOutcome {
        crate::models::RoutingOutcome {
            outcome_id: "o".into(),
            decision_id: "d".into(),
            task_id: "t".into(),
            provider_id: provider_id.to_string(),
            status: OutcomeStatus::Success,
            actual_cost: 0.0,
            actual_latency_ms: 0,
            input_tokens: 0,
            output_tokens: 0,
            quality_score: None,
            correctness_score: None,
            helpfulness_score: None,
            estimated_cost: 0.0,
            estimated_latency_ms: 0,
            task_intent: intent,
            task_complexity: None,
            error_type: None,
            error_message: None,
            routed_at: Utc::now(),
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn insufficient_data_falls_back_to_base_score_argmax() {
        let outcomes = Arc::new(OutcomeTracker::new());
        let rng = Arc::new(StdRngSource::from_seed(1));
        let optimizer = Optimizer::new(outcomes, rng);
        let candidates = vec![("a".to_string(), 0.5), ("b".to_string(), 0.9)];
        let (id, reason) = optimizer
            .select(&candidates, TaskIntent::CodeImplementation, Utc::now())
            .unwrap();
        assert_eq!(id, "b");
        assert_eq!(reason, SelectionReason::InsufficientDataForOptimization);
    }

    #[test]
    fn untested_arm_wins_ucb_once_past_sample_floor() {
        let outcomes = Arc::new(OutcomeTracker::new());
        for _ in 0..20 {
            outcomes.record(&make_success("seasoned", TaskIntent::CodeImplementation));
        }
        let rng = Arc::new(StdRngSource::from_seed(1));
        // exploration_rate=0 removes the randomized branch so the test is deterministic.
        let optimizer = Optimizer::new(outcomes, rng).with_exploration_rate(0.0);
        let candidates = vec![
            ("seasoned".to_string(), 0.5),
            ("untested".to_string(), 0.5),
        ];
        let (id, reason) = optimizer
            .select(&candidates, TaskIntent::CodeImplementation, Utc::now())
            .unwrap();
        assert_eq!(id, "untested");
        assert_eq!(reason, SelectionReason::UcbOptimization { trials: 0, win_rate_pct: 0 });
    }

    #[test]
    fn refresh_is_idempotent_within_five_minute_window() {
        let outcomes = Arc::new(OutcomeTracker::new());
        let rng = Arc::new(StdRngSource::from_seed(1));
        let optimizer = Optimizer::new(outcomes.clone(), rng);
        let now = Utc::now();
        optimizer.refresh_scores(&["a".to_string()], TaskIntent::Research, now);
        outcomes.record(&make_success("a", TaskIntent::Research));
        // Within the window, the cache should not observe the new record.
        optimizer.refresh_scores(&["a".to_string()], TaskIntent::Research, now + Duration::seconds(10));
        let cache = optimizer.cache.lock().unwrap();
        let score = cache.scores.get(&("a".to_string(), TaskIntent::Research)).unwrap();
        assert_eq!(score.trials, 0);
    }
}
