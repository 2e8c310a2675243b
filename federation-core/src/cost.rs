//! # Cost Estimator (C3)
//!
//! Token-count to monetary estimate, cheapest-candidate comparison, and a
//! per-tenant budget tracker with day/month windows and threshold alerts.
//! Budget maps are `dashmap::DashMap` keyed by `tenant_id` so independent
//! tenants never contend on the same lock.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::models::Provider;

/// Months of day/month budget history retained per tenant before the
/// oldest keys are pruned on write (Design Note: "Budget cache unbounded
/// growth").
pub const BUDGET_RETENTION_MONTHS: i64 = 13;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetPeriod {
    Daily,
    Monthly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Warning,
    Critical,
}

#[derive(Debug, Clone)]
pub struct BudgetAlert {
    pub level: AlertLevel,
    pub period: BudgetPeriod,
    pub current_spend: f64,
    pub threshold: f64,
}

#[derive(Debug, Clone)]
pub struct CostComparison {
    pub provider_id: String,
    pub estimated_cost: f64,
}

#[derive(Debug, Clone)]
pub struct CostRecommendation {
    pub provider_id: String,
    pub estimated_cost: f64,
    pub savings_absolute: f64,
    pub savings_percentage: f64,
}

#[derive(Default)]
struct TenantSpend {
    by_day: HashMap<String, f64>,
    by_month: HashMap<String, f64>,
}

/// Per-1M-token pricing to monetary-estimate conversion, comparison across
/// candidates, and a per-tenant budget ledger.
#[derive(Default)]
pub struct CostEstimator {
    spend: DashMap<String, TenantSpend>,
}

impl CostEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn estimate(&self, provider: &Provider, input_tokens: u64, output_tokens: u64) -> f64 {
        provider.cost.estimate(input_tokens, output_tokens)
    }

    /// Candidates sorted ascending by estimated cost.
    pub fn compare<'a>(
        &self,
        providers: impl IntoIterator<Item = &'a Provider>,
        input_tokens: u64,
        output_tokens: u64,
    ) -> Vec<CostComparison> {
        let mut out: Vec<CostComparison> = providers
            .into_iter()
            .map(|p| CostComparison {
                provider_id: p.id.clone(),
                estimated_cost: self.estimate(p, input_tokens, output_tokens),
            })
            .collect();
        out.sort_by(|a, b| {
            a.estimated_cost
                .partial_cmp(&b.estimated_cost)
                .unwrap()
                .then_with(|| a.provider_id.cmp(&b.provider_id))
        });
        out
    }

    /// Record realized spend against both the day and month windows for a
    /// tenant, pruning entries outside the retention policy as a side
    /// effect of the write.
    pub fn track(&self, tenant_id: &str, cost: f64, timestamp: DateTime<Utc>) {
        let day_key = timestamp.format("%Y-%m-%d").to_string();
        let month_key = timestamp.format("%Y-%m").to_string();
        let mut entry = self.spend.entry(tenant_id.to_string()).or_default();
        *entry.by_day.entry(day_key).or_insert(0.0) += cost;
        *entry.by_month.entry(month_key.clone()).or_insert(0.0) += cost;
        prune_retention(&mut entry, &month_key);
    }

    pub fn get_spend(&self, tenant_id: &str, period: BudgetPeriod, key: &str) -> f64 {
        self.spend
            .get(tenant_id)
            .map(|entry| match period {
                BudgetPeriod::Daily => entry.by_day.get(key).copied().unwrap_or(0.0),
                BudgetPeriod::Monthly => entry.by_month.get(key).copied().unwrap_or(0.0),
            })
            .unwrap_or(0.0)
    }

    /// Alerts for the current day/month, compared against the supplied
    /// limits (either may be omitted to skip that check).
    pub fn check_budget(
        &self,
        tenant_id: &str,
        daily_limit: Option<f64>,
        monthly_limit: Option<f64>,
        now: DateTime<Utc>,
    ) -> Vec<BudgetAlert> {
        let mut alerts = Vec::new();
        if let Some(limit) = daily_limit {
            let spend = self.get_spend(tenant_id, BudgetPeriod::Daily, &now.format("%Y-%m-%d").to_string());
            if let Some(alert) = budget_alert(spend, limit, BudgetPeriod::Daily) {
                alerts.push(alert);
            }
        }
        if let Some(limit) = monthly_limit {
            let spend = self.get_spend(tenant_id, BudgetPeriod::Monthly, &now.format("%Y-%m").to_string());
            if let Some(alert) = budget_alert(spend, limit, BudgetPeriod::Monthly) {
                alerts.push(alert);
            }
        }
        alerts
    }

    /// Cheapest candidate clearing `min_quality`, with savings computed
    /// against the most expensive candidate that *also* clears `min_quality`
    /// (not the most expensive of all candidates).
    pub fn recommend<'a>(
        &self,
        providers: impl IntoIterator<Item = &'a Provider>,
        input_tokens: u64,
        output_tokens: u64,
        min_quality: f64,
    ) -> Option<CostRecommendation> {
        let qualifying: Vec<&Provider> = providers
            .into_iter()
            .filter(|p| p.quality_score_or_default() >= min_quality)
            .collect();
        if qualifying.is_empty() {
            return None;
        }
        let ranked = self.compare(qualifying, input_tokens, output_tokens);
        let cheapest = ranked.first()?;
        let most_expensive = ranked.last()?;

        let savings_absolute = most_expensive.estimated_cost - cheapest.estimated_cost;
        let savings_percentage = if most_expensive.estimated_cost > 0.0 {
            (savings_absolute / most_expensive.estimated_cost) * 100.0
        } else {
            0.0
        };

        Some(CostRecommendation {
            provider_id: cheapest.provider_id.clone(),
            estimated_cost: cheapest.estimated_cost,
            savings_absolute,
            savings_percentage,
        })
    }
}

fn budget_alert(spend: f64, limit: f64, period: BudgetPeriod) -> Option<BudgetAlert> {
    if limit <= 0.0 {
        return None;
    }
    if spend >= limit {
        Some(BudgetAlert {
            level: AlertLevel::Critical,
            period,
            current_spend: spend,
            threshold: limit,
        })
    } else if spend >= 0.8 * limit {
        Some(BudgetAlert {
            level: AlertLevel::Warning,
            period,
            current_spend: spend,
            threshold: limit,
        })
    } else {
        None
    }
}

/// Keep at most `BUDGET_RETENTION_MONTHS` of month keys and only days inside
/// the current and prior month.
fn prune_retention(entry: &mut TenantSpend, current_month_key: &str) {
    if entry.by_month.len() > BUDGET_RETENTION_MONTHS as usize {
        let mut months: Vec<String> = entry.by_month.keys().cloned().collect();
        months.sort();
        let excess = months.len() - BUDGET_RETENTION_MONTHS as usize;
        for month in months.into_iter().take(excess) {
            entry.by_month.remove(&month);
        }
    }

    let (year, month): (i32, u32) = {
        let mut parts = current_month_key.split('-');
        let y = parts.next().unwrap_or("1970").parse().unwrap_or(1970);
        let m = parts.next().unwrap_or("1").parse().unwrap_or(1);
        (y, m)
    };
    let prior = if month == 1 {
        format!("{:04}-12", year - 1)
    } else {
        format!("{:04}-{:02}", year, month - 1)
    };
    entry
        .by_day
        .retain(|day, _| day.starts_with(current_month_key) || day.starts_with(&prior));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProviderCapabilities, ProviderCost, ProviderHealth, ProviderTier};
    use std::collections::HashSet;

    fn provider(id: &str, input_per_1m: f64, output_per_1m: f64, quality: f64) -> Provider {
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
                typical_latency_ms: None,
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
            reliability_score: None,
            health: ProviderHealth::default(),
            enabled: true,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn compare_sorts_ascending_by_cost() {
        let estimator = CostEstimator::new();
        let providers = [provider("a", 5.0, 5.0, 0.9), provider("b", 0.5, 0.5, 0.9)];
        let ranked = estimator.compare(&providers, 1_000_000, 0);
        assert_eq!(ranked[0].provider_id, "b");
        assert_eq!(ranked[1].provider_id, "a");
    }

    #[test]
    fn budget_alerts_fire_at_thresholds() {
        let estimator = CostEstimator::new();
        let now = Utc::now();
        estimator.track("tenant-1", 80.0, now);
        let alerts = estimator.check_budget("tenant-1", Some(100.0), None, now);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].level, AlertLevel::Warning);

        estimator.track("tenant-1", 25.0, now);
        let alerts = estimator.check_budget("tenant-1", Some(100.0), None, now);
        assert_eq!(alerts[0].level, AlertLevel::Critical);
    }

    #[test]
    fn day_spend_never_exceeds_month_spend() {
        let estimator = CostEstimator::new();
        let now = Utc::now();
        estimator.track("tenant-1", 10.0, now);
        let day = estimator.get_spend("tenant-1", BudgetPeriod::Daily, &now.format("%Y-%m-%d").to_string());
        let month = estimator.get_spend("tenant-1", BudgetPeriod::Monthly, &now.format("%Y-%m").to_string());
        assert!(day <= month);
    }

    #[test]
    fn recommend_computes_savings_against_cheapest_qualifying_baseline() {
        let estimator = CostEstimator::new();
        let providers = [
            provider("premium", 5.0, 5.0, 0.95),
            provider("mid", 1.0, 1.0, 0.9),
            provider("low-quality-cheap", 0.01, 0.01, 0.4),
        ];
        let rec = estimator.recommend(&providers, 1_000_000, 0, 0.8).unwrap();
        assert_eq!(rec.provider_id, "mid");
        assert!(rec.savings_absolute > 0.0);
    }
}
