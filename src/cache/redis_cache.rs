use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use std::time::Duration;

use super::CounterCache;
use crate::error::AppResult;

const DECR_IF_POSITIVE: &str = r#"
local v = redis.call('GET', KEYS[1])
if not v then return false end
if tonumber(v) <= 0 then return false end
return redis.call('DECR', KEYS[1])
"#;

// INCRBYFLOAT replies with a bulk string, which keeps full float precision.
const DECR_FLOAT_IF_AT_LEAST: &str = r#"
local v = redis.call('GET', KEYS[1])
if not v then return false end
if tonumber(v) < tonumber(ARGV[1]) then return false end
return redis.call('INCRBYFLOAT', KEYS[1], -tonumber(ARGV[1]))
"#;

#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
    decr_if_positive: Script,
    decr_float_if_at_least: Script,
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> AppResult<Self> {
        let client = Client::open(redis_url)?;
        let connection = client.get_connection_manager().await?;

        Ok(Self {
            connection,
            decr_if_positive: Script::new(DECR_IF_POSITIVE),
            decr_float_if_at_least: Script::new(DECR_FLOAT_IF_AT_LEAST),
        })
    }
}

#[async_trait]
impl CounterCache for RedisCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut conn = self.connection.clone();
        Ok(conn.get(key).await?)
    }

    async fn set(&self, key: &str, value: String) -> AppResult<()> {
        let mut conn = self.connection.clone();
        let _: () = conn.set(key, value).await?;
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: String) -> AppResult<bool> {
        let mut conn = self.connection.clone();
        Ok(conn.set_nx(key, value).await?)
    }

    async fn set_nx_ex(&self, key: &str, value: String, ttl: Duration) -> AppResult<bool> {
        let mut conn = self.connection.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis().max(1) as u64)
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let mut conn = self.connection.clone();
        let _: i64 = conn.del(key).await?;
        Ok(())
    }

    async fn incr_by(&self, key: &str, delta: i64) -> AppResult<i64> {
        let mut conn = self.connection.clone();
        let value: i64 = redis::cmd("INCRBY")
            .arg(key)
            .arg(delta)
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn incr_by_float(&self, key: &str, delta: f64) -> AppResult<f64> {
        let mut conn = self.connection.clone();
        let value: f64 = redis::cmd("INCRBYFLOAT")
            .arg(key)
            .arg(delta)
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn decr_if_positive(&self, key: &str) -> AppResult<Option<i64>> {
        let mut conn = self.connection.clone();
        let value: Option<i64> = self
            .decr_if_positive
            .key(key)
            .invoke_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn decr_float_if_at_least(&self, key: &str, amount: f64) -> AppResult<Option<f64>> {
        let mut conn = self.connection.clone();
        let value: Option<f64> = self
            .decr_float_if_at_least
            .key(key)
            .arg(amount)
            .invoke_async(&mut conn)
            .await?;
        Ok(value)
    }
}
