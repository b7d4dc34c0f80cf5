//! Cache tier for the ledger counters.
//!
//! The cache holds the request-path copy of every user's card count and
//! balance. All writes go through atomic primitives (`INCRBY`,
//! `INCRBYFLOAT`, conditional decrements) so concurrent requests for the same
//! user never read-modify-write.

mod memory;
mod redis_cache;

pub use memory::MemoryCache;
pub use redis_cache::RedisCache;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::CacheConfig;
use crate::error::AppResult;

/// Cache key layout shared with other services reading the same Redis.
pub mod keys {
    pub fn card_count(user_id: &str) -> String {
        format!("{user_id}_card_count")
    }

    pub fn balance(user_id: &str) -> String {
        format!("{user_id}_balance")
    }

    /// Full serialized user row; best-effort and never read for decisions.
    pub fn user_snapshot(user_id: &str) -> String {
        format!("user:{user_id}")
    }

    /// Per-user mutex around grant task creation.
    pub fn grant_lock(user_id: &str) -> String {
        format!("lock:grant:{user_id}")
    }

    /// Purchases of one card type by one user on one UTC day (`YYYY-MM-DD`).
    pub fn daily_purchases(user_id: &str, card_type: &str, day: &str) -> String {
        format!("purchases:{user_id}:{card_type}:{day}")
    }
}

#[async_trait]
pub trait CounterCache: Send + Sync {
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    async fn set(&self, key: &str, value: String) -> AppResult<()>;

    /// Set only if the key is absent. Returns whether the value was written.
    async fn set_nx(&self, key: &str, value: String) -> AppResult<bool>;

    /// `set_nx` with an expiry; counters incremented later keep the expiry.
    async fn set_nx_ex(&self, key: &str, value: String, ttl: Duration) -> AppResult<bool>;

    async fn delete(&self, key: &str) -> AppResult<()>;

    async fn incr_by(&self, key: &str, delta: i64) -> AppResult<i64>;

    async fn incr_by_float(&self, key: &str, delta: f64) -> AppResult<f64>;

    /// Decrement by one only if the current value is positive.
    /// `None` when the key is missing or already at zero.
    async fn decr_if_positive(&self, key: &str) -> AppResult<Option<i64>>;

    /// Subtract `amount` only if the current value is at least `amount`.
    /// `None` when the key is missing or the value is too small.
    async fn decr_float_if_at_least(&self, key: &str, amount: f64) -> AppResult<Option<f64>>;
}

pub type SharedCache = Arc<dyn CounterCache>;

/// Build the configured cache backend.
pub async fn connect(config: &CacheConfig) -> AppResult<SharedCache> {
    match config.redis_url.as_deref() {
        Some(url) => {
            let cache = RedisCache::connect(url).await?;
            log::info!("Using Redis cache tier");
            Ok(Arc::new(cache))
        }
        None => {
            log::warn!("No redis_url configured, using in-process cache (single instance only)");
            Ok(Arc::new(MemoryCache::new()))
        }
    }
}
