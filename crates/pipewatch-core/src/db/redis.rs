//! Redis connection and durable notified set

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config as PoolConfig, Pool, PoolConfig as PoolSize, Runtime};
use redis::AsyncCommands;

use crate::alerting::NotifiedStore;
use crate::config::RedisConfig;
use crate::error::{Error, Result};
use crate::models::AlertId;

/// Redis connection pool
#[derive(Clone)]
pub struct RedisPool {
    pool: Pool,
}

impl RedisPool {
    /// Create a new Redis connection pool
    pub fn new(config: &RedisConfig) -> Result<Self> {
        let mut cfg = PoolConfig::from_url(&config.url);
        cfg.pool = Some(PoolSize::new(config.max_connections));
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| Error::Redis(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Health check
    pub async fn health_check(&self) -> Result<()> {
        let mut conn = self.pool.get().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

/// Notified set kept in a Redis set, shared by every process using the key
#[derive(Clone)]
pub struct RedisNotifiedStore {
    pool: Pool,
    key: String,
    ttl: Option<Duration>,
}

impl RedisNotifiedStore {
    /// Create a store over `key`; `ttl` is refreshed on every insert
    pub fn new(pool: &RedisPool, key: impl Into<String>, ttl: Option<Duration>) -> Self {
        Self {
            pool: pool.pool.clone(),
            key: key.into(),
            ttl,
        }
    }
}

#[async_trait]
impl NotifiedStore for RedisNotifiedStore {
    async fn contains(&self, id: &AlertId) -> Result<bool> {
        let mut conn = self.pool.get().await?;
        let present: bool = conn.sismember(&self.key, id.as_str()).await?;
        Ok(present)
    }

    async fn insert(&self, id: &AlertId) -> Result<bool> {
        let mut conn = self.pool.get().await?;
        let added: i64 = conn.sadd(&self.key, id.as_str()).await?;

        if let Some(ttl) = self.ttl {
            let seconds = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX).max(1);
            let _: () = conn.expire(&self.key, seconds).await?;
        }

        Ok(added > 0)
    }

    async fn len(&self) -> Result<usize> {
        let mut conn = self.pool.get().await?;
        let count: usize = conn.scard(&self.key).await?;
        Ok(count)
    }
}
