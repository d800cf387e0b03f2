//! Counter store backends
//!
//! The store exposes Redis-shaped primitives (get/incr/decr/expire/del) and
//! every mutation is atomic per key. All quota state lives behind this trait;
//! nothing else reads or writes usage counters directly.

use crate::error::{Result, TimekillError};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePool, Row};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Atomic counter primitives for quota state.
///
/// A store failure must never be confused with "quota exceeded": implementors
/// surface infrastructure problems as [`TimekillError::QuotaStoreUnavailable`]
/// so callers fail closed.
#[async_trait::async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increment `key` by `amount`, creating it at 0 if missing.
    /// Returns the new value.
    async fn incr_by(&self, key: &str, amount: u64) -> Result<u64>;

    /// Atomically decrement `key` by `amount`, flooring at 0.
    /// Returns the new value. `amount = 0` is a no-op.
    async fn decr_by(&self, key: &str, amount: u64) -> Result<u64>;

    /// Current value of `key`, 0 if missing.
    async fn get(&self, key: &str) -> Result<u64>;

    /// Best-effort expiry at the billing-window boundary.
    async fn expire_at(&self, key: &str, when: DateTime<Utc>) -> Result<()>;

    /// Delete a counter (admin reset).
    async fn del(&self, key: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: u64,
    expires_at: Option<DateTime<Utc>>,
}

/// In-memory counter store.
///
/// Atomicity comes from holding the write lock across the read-modify-write;
/// expired entries are pruned lazily on access.
pub struct MemoryCounterStore {
    entries: Arc<RwLock<HashMap<String, MemoryEntry>>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for MemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

fn is_expired(entry: &MemoryEntry, now: DateTime<Utc>) -> bool {
    matches!(entry.expires_at, Some(at) if at <= now)
}

#[async_trait::async_trait]
impl CounterStore for MemoryCounterStore {
    async fn incr_by(&self, key: &str, amount: u64) -> Result<u64> {
        let mut entries = self.entries.write().await;
        let now = Utc::now();

        let entry = entries.entry(key.to_string()).or_insert(MemoryEntry {
            value: 0,
            expires_at: None,
        });
        if is_expired(entry, now) {
            entry.value = 0;
            entry.expires_at = None;
        }
        entry.value = entry.value.saturating_add(amount);
        Ok(entry.value)
    }

    async fn decr_by(&self, key: &str, amount: u64) -> Result<u64> {
        let mut entries = self.entries.write().await;
        let now = Utc::now();

        match entries.get_mut(key) {
            Some(entry) if !is_expired(entry, now) => {
                entry.value = entry.value.saturating_sub(amount);
                Ok(entry.value)
            }
            _ => Ok(0),
        }
    }

    async fn get(&self, key: &str) -> Result<u64> {
        let entries = self.entries.read().await;
        let now = Utc::now();

        Ok(entries
            .get(key)
            .filter(|e| !is_expired(e, now))
            .map(|e| e.value)
            .unwrap_or(0))
    }

    async fn expire_at(&self, key: &str, when: DateTime<Utc>) -> Result<()> {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(key) {
            entry.expires_at = Some(when);
        }
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.remove(key);
        Ok(())
    }
}

/// SQLite-backed counter store.
///
/// Each increment is a single upsert statement, so SQLite's writer
/// serialization makes the check-and-increment race-free across connections.
pub struct SqliteCounterStore {
    pool: SqlitePool,
}

impl SqliteCounterStore {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .map_err(|e| TimekillError::QuotaStoreUnavailable(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS usage_counters (
                key TEXT PRIMARY KEY,
                used INTEGER NOT NULL DEFAULT 0,
                expires_at TEXT
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| TimekillError::QuotaStoreUnavailable(e.to_string()))?;

        info!("Usage counter store initialized");
        Ok(Self { pool })
    }

    /// Drop counters whose window has rolled over
    async fn purge_expired(&self) -> Result<()> {
        sqlx::query("DELETE FROM usage_counters WHERE expires_at IS NOT NULL AND expires_at <= ?")
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| TimekillError::QuotaStoreUnavailable(e.to_string()))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl CounterStore for SqliteCounterStore {
    async fn incr_by(&self, key: &str, amount: u64) -> Result<u64> {
        self.purge_expired().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO usage_counters (key, used)
            VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET used = used + excluded.used
            RETURNING used
            "#,
        )
        .bind(key)
        .bind(amount as i64)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| TimekillError::QuotaStoreUnavailable(e.to_string()))?;

        Ok(row.get::<i64, _>("used") as u64)
    }

    async fn decr_by(&self, key: &str, amount: u64) -> Result<u64> {
        self.purge_expired().await?;

        let row = sqlx::query(
            r#"
            UPDATE usage_counters
            SET used = MAX(0, used - ?)
            WHERE key = ?
            RETURNING used
            "#,
        )
        .bind(amount as i64)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| TimekillError::QuotaStoreUnavailable(e.to_string()))?;

        Ok(row.map(|r| r.get::<i64, _>("used") as u64).unwrap_or(0))
    }

    async fn get(&self, key: &str) -> Result<u64> {
        self.purge_expired().await?;

        let row = sqlx::query("SELECT used FROM usage_counters WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| TimekillError::QuotaStoreUnavailable(e.to_string()))?;

        Ok(row.map(|r| r.get::<i64, _>("used") as u64).unwrap_or(0))
    }

    async fn expire_at(&self, key: &str, when: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE usage_counters SET expires_at = ? WHERE key = ?")
            .bind(when.to_rfc3339())
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| TimekillError::QuotaStoreUnavailable(e.to_string()))?;

        debug!("Counter {} expires at {}", key, when);
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM usage_counters WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| TimekillError::QuotaStoreUnavailable(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_memory_incr_get() {
        let store = MemoryCounterStore::new();
        assert_eq!(store.get("k").await.unwrap(), 0);
        assert_eq!(store.incr_by("k", 3).await.unwrap(), 3);
        assert_eq!(store.incr_by("k", 2).await.unwrap(), 5);
        assert_eq!(store.get("k").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_memory_decr_floor() {
        let store = MemoryCounterStore::new();
        store.incr_by("k", 3).await.unwrap();
        assert_eq!(store.decr_by("k", 10).await.unwrap(), 0);
        assert_eq!(store.get("k").await.unwrap(), 0);

        // Missing key decrements to 0, never panics
        assert_eq!(store.decr_by("missing", 5).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_memory_decr_zero_noop() {
        let store = MemoryCounterStore::new();
        store.incr_by("k", 4).await.unwrap();
        assert_eq!(store.decr_by("k", 0).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_memory_expiry_resets_counter() {
        let store = MemoryCounterStore::new();
        store.incr_by("k", 7).await.unwrap();
        store
            .expire_at("k", Utc::now() - Duration::seconds(1))
            .await
            .unwrap();

        // Expired entry reads as 0 and a fresh increment starts over
        assert_eq!(store.get("k").await.unwrap(), 0);
        assert_eq!(store.incr_by("k", 1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_memory_del() {
        let store = MemoryCounterStore::new();
        store.incr_by("k", 2).await.unwrap();
        store.del("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sqlite_counter_store() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}/counters.db?mode=rwc", dir.path().display());
        let store = SqliteCounterStore::new(&url).await.unwrap();

        assert_eq!(store.incr_by("u:humanizer:2026-08", 4).await.unwrap(), 4);
        assert_eq!(store.incr_by("u:humanizer:2026-08", 1).await.unwrap(), 5);
        assert_eq!(store.get("u:humanizer:2026-08").await.unwrap(), 5);
        assert_eq!(store.decr_by("u:humanizer:2026-08", 2).await.unwrap(), 3);
        assert_eq!(store.decr_by("u:humanizer:2026-08", 99).await.unwrap(), 0);

        store.del("u:humanizer:2026-08").await.unwrap();
        assert_eq!(store.get("u:humanizer:2026-08").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sqlite_expiry_purges_row() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}/counters.db?mode=rwc", dir.path().display());
        let store = SqliteCounterStore::new(&url).await.unwrap();

        store.incr_by("k", 9).await.unwrap();
        store
            .expire_at("k", Utc::now() - Duration::seconds(1))
            .await
            .unwrap();

        assert_eq!(store.get("k").await.unwrap(), 0);
        assert_eq!(store.incr_by("k", 1).await.unwrap(), 1);
    }
}
