//! Shared Key-Value Capability
//!
//! Storage seam for state that must be visible across gateway instances:
//! rate-limit block marks and repeat-offender counters. Single-instance
//! deployments use the in-memory backend; multi-instance deployments point
//! the same trait at Redis. The window algorithms never see the backend.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use redis::AsyncCommands;

use crate::error::{AppError, Result};

/// Minimal shared KV contract: {get, set-with-ttl, atomic-increment, delete}
#[async_trait]
pub trait SharedKvStore: Send + Sync {
    /// Fetch a value; expired entries read as absent
    async fn get(&self, key: &str) -> Result<Option<String>>;
    /// Store a value that expires after `ttl_seconds` (0 = no expiry)
    async fn set_with_ttl(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()>;
    /// Increment a counter atomically, returning the new value
    async fn atomic_increment(&self, key: &str) -> Result<i64>;
    /// Remove a key
    async fn delete(&self, key: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    /// Unix seconds; `None` never expires
    expires_at: Option<i64>,
}

impl StoredValue {
    fn live(&self, now: i64) -> bool {
        self.expires_at.map(|at| now < at).unwrap_or(true)
    }
}

/// Process-local backend
#[derive(Debug, Default)]
pub struct InMemoryKvStore {
    entries: DashMap<String, StoredValue>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SharedKvStore for InMemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Utc::now().timestamp();

        if let Some(entry) = self.entries.get(key) {
            if entry.live(now) {
                return Ok(Some(entry.value.clone()));
            }
        }
        // Lazy expiry: drop the dead entry on read
        self.entries.remove_if(key, |_, v| !v.live(now));
        Ok(None)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()> {
        let expires_at = (ttl_seconds > 0).then(|| Utc::now().timestamp() + ttl_seconds as i64);
        self.entries.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn atomic_increment(&self, key: &str) -> Result<i64> {
        let now = Utc::now().timestamp();
        let mut entry = self.entries.entry(key.to_string()).or_insert(StoredValue {
            value: "0".to_string(),
            expires_at: None,
        });

        let current = if entry.live(now) {
            entry.value.parse::<i64>().unwrap_or(0)
        } else {
            entry.expires_at = None;
            0
        };

        let next = current + 1;
        entry.value = next.to_string();
        Ok(next)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Redis backend for multi-instance deployments
#[derive(Clone)]
pub struct RedisKvStore {
    conn: redis::aio::MultiplexedConnection,
}

impl RedisKvStore {
    /// Connect to Redis at `url` (e.g. `redis://localhost:6379`)
    pub async fn connect(url: &str) -> Result<Self> {
        let client =
            redis::Client::open(url).map_err(|e| AppError::StateStore(e.to_string()))?;
        let conn = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|e| AppError::StateStore(e.to_string()))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl SharedKvStore for RedisKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get(key)
            .await
            .map_err(|e| AppError::StateStore(e.to_string()))
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        if ttl_seconds == 0 {
            let _: () = conn
                .set(key, value)
                .await
                .map_err(|e| AppError::StateStore(e.to_string()))?;
        } else {
            let _: () = conn
                .set_ex(key, value, ttl_seconds)
                .await
                .map_err(|e| AppError::StateStore(e.to_string()))?;
        }
        Ok(())
    }

    async fn atomic_increment(&self, key: &str) -> Result<i64> {
        let mut conn = self.conn.clone();
        conn.incr(key, 1)
            .await
            .map_err(|e| AppError::StateStore(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .del(key)
            .await
            .map_err(|e| AppError::StateStore(e.to_string()))?;
        Ok(())
    }
}
