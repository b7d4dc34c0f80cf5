use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::CounterCache;
use crate::error::{AppError, AppResult};

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// In-process cache with the same atomicity guarantees as the Redis backend:
/// every operation runs under one lock.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 取锁并清掉已过期的 key
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        // 锁内没有可能 panic 的逻辑，中毒时沿用内部数据
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Instant::now();
        entries.retain(|_, e| e.live(now));
        entries
    }
}

fn parse<T: std::str::FromStr>(key: &str, raw: &str) -> AppResult<T> {
    raw.parse::<T>()
        .map_err(|_| AppError::InternalError(format!("value at {key} is not a number: {raw}")))
}

/// 写入新值并保留原有过期时间（与 Redis INCRBY 行为一致）
fn store(entries: &mut HashMap<String, Entry>, key: &str, value: String) {
    match entries.get_mut(key) {
        Some(entry) => entry.value = value,
        None => {
            entries.insert(
                key.to_string(),
                Entry {
                    value,
                    expires_at: None,
                },
            );
        }
    }
}

#[async_trait]
impl CounterCache for MemoryCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.lock().get(key).map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: String) -> AppResult<()> {
        self.lock().insert(
            key.to_string(),
            Entry {
                value,
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: String) -> AppResult<bool> {
        let mut entries = self.lock();
        if entries.contains_key(key) {
            return Ok(false);
        }
        store(&mut entries, key, value);
        Ok(true)
    }

    async fn set_nx_ex(&self, key: &str, value: String, ttl: Duration) -> AppResult<bool> {
        let mut entries = self.lock();
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(true)
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.lock().remove(key);
        Ok(())
    }

    async fn incr_by(&self, key: &str, delta: i64) -> AppResult<i64> {
        let mut entries = self.lock();
        let current = match entries.get(key) {
            Some(e) => parse::<i64>(key, &e.value)?,
            None => 0,
        };
        let next = current + delta;
        store(&mut entries, key, next.to_string());
        Ok(next)
    }

    async fn incr_by_float(&self, key: &str, delta: f64) -> AppResult<f64> {
        let mut entries = self.lock();
        let current = match entries.get(key) {
            Some(e) => parse::<f64>(key, &e.value)?,
            None => 0.0,
        };
        let next = current + delta;
        store(&mut entries, key, next.to_string());
        Ok(next)
    }

    async fn decr_if_positive(&self, key: &str) -> AppResult<Option<i64>> {
        let mut entries = self.lock();
        let Some(entry) = entries.get(key) else {
            return Ok(None);
        };
        let current = parse::<i64>(key, &entry.value)?;
        if current <= 0 {
            return Ok(None);
        }
        let next = current - 1;
        store(&mut entries, key, next.to_string());
        Ok(Some(next))
    }

    async fn decr_float_if_at_least(&self, key: &str, amount: f64) -> AppResult<Option<f64>> {
        let mut entries = self.lock();
        let Some(entry) = entries.get(key) else {
            return Ok(None);
        };
        let current = parse::<f64>(key, &entry.value)?;
        if current < amount {
            return Ok(None);
        }
        let next = current - amount;
        store(&mut entries, key, next.to_string());
        Ok(Some(next))
    }
}
