//! # Store Contract
//!
//! Persistence boundary for the registry: provider configuration, health
//! history, and routing-outcome statistics. The in-memory registry
//! (`crate::registry::Registry`) is the hot path; every implementation here
//! is the eventual-consistency backing store it writes through to.
//!
//! Two concrete backends are provided, matching the two store families the
//! original reference implementation ships: [`SqliteStore`] (embedded SQL,
//! via `sqlx`) and [`RedisStore`] (key-value, via `redis`). [`InMemoryStore`]
//! is a third, test-only implementation used wherever a `Registry` is
//! constructed in this crate's own test suite.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use crate::error::StoreError;
use crate::models::{Provider, ProviderHealth};

/// A recorded health sample, as returned by `get_health_history`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthHistoryEntry {
    pub checked_at: DateTime<Utc>,
    pub health: ProviderHealth,
}

/// Aggregate routing statistics over a trailing window, as returned by
/// `get_routing_stats`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RoutingStats {
    pub total: u64,
    pub successes: u64,
    pub avg_cost: f64,
    pub avg_latency_ms: f64,
}

/// A routing outcome row as persisted by the store (a thin projection of
/// `crate::models::RoutingOutcome` — only the fields the aggregate queries
/// need).
#[derive(Debug, Clone)]
pub struct OutcomeRow {
    pub provider_id: String,
    pub task_type: String,
    pub success: bool,
    pub quality_score: Option<f64>,
    pub cost: f64,
    pub latency_ms: u32,
    pub created_at: DateTime<Utc>,
}

/// Persistence boundary for the registry (C1's backing store).
#[async_trait]
pub trait RegistryStore: Send + Sync {
    async fn save_provider(&self, provider: &Provider) -> Result<(), StoreError>;
    async fn get_provider(&self, id: &str) -> Result<Option<Provider>, StoreError>;
    async fn get_all_providers(&self) -> Result<HashMap<String, Provider>, StoreError>;
    async fn save_health(&self, id: &str, health: ProviderHealth) -> Result<(), StoreError>;
    async fn get_health_history(
        &self,
        id: &str,
        limit: usize,
    ) -> Result<Vec<HealthHistoryEntry>, StoreError>;
    async fn save_routing_outcome(&self, row: OutcomeRow) -> Result<(), StoreError>;
    async fn get_routing_stats(&self, id: &str, days: i64) -> Result<Option<RoutingStats>, StoreError>;
}

/// In-process store with no external dependency, used by this crate's own
/// tests and as a default when no persistent backend is configured.
#[derive(Default)]
pub struct InMemoryStore {
    providers: DashMap<String, Provider>,
    health: DashMap<String, Vec<HealthHistoryEntry>>,
    outcomes: DashMap<String, Vec<OutcomeRow>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RegistryStore for InMemoryStore {
    async fn save_provider(&self, provider: &Provider) -> Result<(), StoreError> {
        self.providers.insert(provider.id.clone(), provider.clone());
        Ok(())
    }

    async fn get_provider(&self, id: &str) -> Result<Option<Provider>, StoreError> {
        Ok(self.providers.get(id).map(|p| p.clone()))
    }

    async fn get_all_providers(&self) -> Result<HashMap<String, Provider>, StoreError> {
        Ok(self
            .providers
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect())
    }

    async fn save_health(&self, id: &str, health: ProviderHealth) -> Result<(), StoreError> {
        self.health.entry(id.to_string()).or_default().push(HealthHistoryEntry {
            checked_at: Utc::now(),
            health,
        });
        Ok(())
    }

    async fn get_health_history(
        &self,
        id: &str,
        limit: usize,
    ) -> Result<Vec<HealthHistoryEntry>, StoreError> {
        let mut entries = self.health.get(id).map(|v| v.clone()).unwrap_or_default();
        entries.reverse();
        entries.truncate(limit);
        Ok(entries)
    }

    async fn save_routing_outcome(&self, row: OutcomeRow) -> Result<(), StoreError> {
        self.outcomes.entry(row.provider_id.clone()).or_default().push(row);
        Ok(())
    }

    async fn get_routing_stats(&self, id: &str, days: i64) -> Result<Option<RoutingStats>, StoreError> {
        let Some(rows) = self.outcomes.get(id) else {
            return Ok(None);
        };
        let cutoff = Utc::now() - chrono::Duration::days(days);
        let recent: Vec<_> = rows.iter().filter(|r| r.created_at >= cutoff).collect();
        if recent.is_empty() {
            return Ok(None);
        }
        let total = recent.len() as u64;
        let successes = recent.iter().filter(|r| r.success).count() as u64;
        let avg_cost = recent.iter().map(|r| r.cost).sum::<f64>() / total as f64;
        let avg_latency_ms = recent.iter().map(|r| r.latency_ms as f64).sum::<f64>() / total as f64;
        Ok(Some(RoutingStats {
            total,
            successes,
            avg_cost,
            avg_latency_ms,
        }))
    }
}

/// Embedded-SQL backend. Schema mirrors the reference implementation's
/// SQLite store exactly: three tables (`providers`, `health_checks`,
/// `routing_outcomes`) with indexes on the columns every time-windowed
/// query filters by.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        let store = SqliteStore { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS providers (
                id TEXT PRIMARY KEY,
                config TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS health_checks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                provider_id TEXT NOT NULL,
                status TEXT NOT NULL,
                latency_ms REAL NOT NULL,
                error_rate REAL NOT NULL,
                checked_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_health_provider ON health_checks (provider_id, checked_at)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS routing_outcomes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                provider_id TEXT NOT NULL,
                task_type TEXT NOT NULL,
                success INTEGER NOT NULL,
                quality_score REAL,
                cost REAL NOT NULL,
                latency_ms INTEGER NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_outcomes_provider ON routing_outcomes (provider_id, created_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl RegistryStore for SqliteStore {
    async fn save_provider(&self, provider: &Provider) -> Result<(), StoreError> {
        let config = serde_json::to_string(provider)?;
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO providers (id, config, created_at, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET config = excluded.config, updated_at = excluded.updated_at",
        )
        .bind(&provider.id)
        .bind(&config)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_provider(&self, id: &str) -> Result<Option<Provider>, StoreError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT config FROM providers WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some((config,)) => Ok(Some(serde_json::from_str(&config).map_err(|e| {
                StoreError::Corrupt {
                    provider_id: id.to_string(),
                    message: e.to_string(),
                }
            })?)),
            None => Ok(None),
        }
    }

    async fn get_all_providers(&self) -> Result<HashMap<String, Provider>, StoreError> {
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT id, config FROM providers")
            .fetch_all(&self.pool)
            .await?;
        let mut out = HashMap::with_capacity(rows.len());
        for (id, config) in rows {
            let provider: Provider =
                serde_json::from_str(&config).map_err(|e| StoreError::Corrupt {
                    provider_id: id.clone(),
                    message: e.to_string(),
                })?;
            out.insert(id, provider);
        }
        Ok(out)
    }

    async fn save_health(&self, id: &str, health: ProviderHealth) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO health_checks (provider_id, status, latency_ms, error_rate, checked_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(format!("{:?}", health.status))
        .bind(health.avg_latency_ms)
        .bind(health.error_rate_24h)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_health_history(
        &self,
        id: &str,
        limit: usize,
    ) -> Result<Vec<HealthHistoryEntry>, StoreError> {
        let rows: Vec<(String, f64, f64, String)> = sqlx::query_as(
            "SELECT status, latency_ms, error_rate, checked_at FROM health_checks
             WHERE provider_id = ? ORDER BY checked_at DESC LIMIT ?",
        )
        .bind(id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(_, latency, error_rate, checked_at)| {
                let checked_at = DateTime::parse_from_rfc3339(&checked_at).ok()?.with_timezone(&Utc);
                Some(HealthHistoryEntry {
                    checked_at,
                    health: ProviderHealth {
                        avg_latency_ms: latency,
                        error_rate_24h: error_rate,
                        ..ProviderHealth::default()
                    },
                })
            })
            .collect())
    }

    async fn save_routing_outcome(&self, row: OutcomeRow) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO routing_outcomes (provider_id, task_type, success, quality_score, cost, latency_ms, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&row.provider_id)
        .bind(&row.task_type)
        .bind(row.success)
        .bind(row.quality_score)
        .bind(row.cost)
        .bind(row.latency_ms)
        .bind(row.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_routing_stats(&self, id: &str, days: i64) -> Result<Option<RoutingStats>, StoreError> {
        let cutoff = (Utc::now() - chrono::Duration::days(days)).to_rfc3339();
        let row: Option<(i64, i64, f64, f64)> = sqlx::query_as(
            "SELECT COUNT(*), SUM(success), AVG(cost), AVG(latency_ms) FROM routing_outcomes
             WHERE provider_id = ? AND created_at >= ?",
        )
        .bind(id)
        .bind(&cutoff)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|(total, successes, avg_cost, avg_latency_ms)| {
            if total == 0 {
                None
            } else {
                Some(RoutingStats {
                    total: total as u64,
                    successes: successes as u64,
                    avg_cost,
                    avg_latency_ms,
                })
            }
        }))
    }
}

const REDIS_KEY_PREFIX: &str = "federation";
const MAX_HEALTH_HISTORY: isize = 10_000;

/// Key-value backend over Redis. Key scheme matches the reference
/// implementation: `federation:provider:{id}` for provider config,
/// `federation:providers` as the index set, `federation:health:{id}` as a
/// timestamp-sorted set trimmed to the last 10,000 entries.
pub struct RedisStore {
    client: redis::Client,
}

impl RedisStore {
    pub fn new(redis_url: &str) -> Result<Self, StoreError> {
        Ok(RedisStore {
            client: redis::Client::open(redis_url)?,
        })
    }

    fn key(parts: &[&str]) -> String {
        let mut key = REDIS_KEY_PREFIX.to_string();
        for part in parts {
            key.push(':');
            key.push_str(part);
        }
        key
    }

    async fn conn(&self) -> Result<redis::aio::MultiplexedConnection, StoreError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }
}

#[async_trait]
impl RegistryStore for RedisStore {
    async fn save_provider(&self, provider: &Provider) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let payload = serde_json::to_string(provider)?;
        let _: () = conn.set(Self::key(&["provider", &provider.id]), payload).await?;
        let _: () = conn.sadd(Self::key(&["providers"]), &provider.id).await?;
        Ok(())
    }

    async fn get_provider(&self, id: &str) -> Result<Option<Provider>, StoreError> {
        let mut conn = self.conn().await?;
        let payload: Option<String> = conn.get(Self::key(&["provider", id])).await?;
        match payload {
            Some(json) => Ok(Some(serde_json::from_str(&json).map_err(|e| {
                StoreError::Corrupt {
                    provider_id: id.to_string(),
                    message: e.to_string(),
                }
            })?)),
            None => Ok(None),
        }
    }

    async fn get_all_providers(&self) -> Result<HashMap<String, Provider>, StoreError> {
        let mut conn = self.conn().await?;
        let ids: Vec<String> = conn.smembers(Self::key(&["providers"])).await?;
        let mut out = HashMap::with_capacity(ids.len());
        for id in ids {
            if let Some(provider) = self.get_provider(&id).await? {
                out.insert(id, provider);
            }
        }
        Ok(out)
    }

    async fn save_health(&self, id: &str, health: ProviderHealth) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let entry = HealthHistoryEntry {
            checked_at: Utc::now(),
            health,
        };
        let score = entry.checked_at.timestamp_millis();
        let payload = serde_json::to_string(&entry)?;
        let key = Self::key(&["health", id]);
        let _: () = conn.zadd(&key, payload, score).await?;
        let _: () = conn.zremrangebyrank(&key, 0, -(MAX_HEALTH_HISTORY + 1)).await?;
        Ok(())
    }

    async fn get_health_history(
        &self,
        id: &str,
        limit: usize,
    ) -> Result<Vec<HealthHistoryEntry>, StoreError> {
        let mut conn = self.conn().await?;
        let raw: Vec<String> = conn
            .zrevrange(Self::key(&["health", id]), 0, limit.saturating_sub(1) as isize)
            .await?;
        raw.into_iter()
            .map(|json| {
                serde_json::from_str(&json).map_err(|e| StoreError::Corrupt {
                    provider_id: id.to_string(),
                    message: e.to_string(),
                })
            })
            .collect()
    }

    async fn save_routing_outcome(&self, row: OutcomeRow) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let key = Self::key(&["outcomes", &row.provider_id]);
        let score = row.created_at.timestamp_millis();
        let payload = serde_json::to_string(&(
            &row.task_type,
            row.success,
            row.quality_score,
            row.cost,
            row.latency_ms,
        ))?;
        let _: () = conn.zadd(key, payload, score).await?;
        Ok(())
    }

    async fn get_routing_stats(&self, id: &str, days: i64) -> Result<Option<RoutingStats>, StoreError> {
        let mut conn = self.conn().await?;
        let key = Self::key(&["outcomes", id]);
        let cutoff = (Utc::now() - chrono::Duration::days(days)).timestamp_millis();
        let raw: Vec<String> = conn.zrangebyscore(key, cutoff, "+inf").await?;
        if raw.is_empty() {
            return Ok(None);
        }
        let mut total = 0u64;
        let mut successes = 0u64;
        let mut cost_sum = 0.0;
        let mut latency_sum = 0.0;
        for json in &raw {
            let (_, success, _, cost, latency_ms): (String, bool, Option<f64>, f64, u32) =
                serde_json::from_str(json)?;
            total += 1;
            if success {
                successes += 1;
            }
            cost_sum += cost;
            latency_sum += latency_ms as f64;
        }
        Ok(Some(RoutingStats {
            total,
            successes,
            avg_cost: cost_sum / total as f64,
            avg_latency_ms: latency_sum / total as f64,
        }))
    }
}

pub fn in_memory() -> Arc<dyn RegistryStore> {
    Arc::new(InMemoryStore::new())
}
