use std::collections::HashMap;

use async_trait::async_trait;
use deadpool_redis::{Config, Connection, Pool, Runtime};
use redis::AsyncCommands;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::RegistrationError;

/// Atomic counters backing registration numbers and patient codes.
#[async_trait]
pub trait SequenceStore: Send + Sync {
    /// Sets the counter to `value` only if the key does not exist yet.
    async fn seed_if_absent(&self, key: &str, value: u64, ttl_seconds: u64) -> Result<(), RegistrationError>;

    /// Increments and returns the new value. An unseeded key starts from zero.
    async fn increment(&self, key: &str) -> Result<u64, RegistrationError>;
}

#[derive(Default)]
pub struct InMemorySequenceStore {
    counters: Mutex<HashMap<String, u64>>,
}

impl InMemorySequenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SequenceStore for InMemorySequenceStore {
    async fn seed_if_absent(&self, key: &str, value: u64, _ttl_seconds: u64) -> Result<(), RegistrationError> {
        self.counters
            .lock()
            .await
            .entry(key.to_string())
            .or_insert(value);
        Ok(())
    }

    async fn increment(&self, key: &str) -> Result<u64, RegistrationError> {
        let mut counters = self.counters.lock().await;
        let counter = counters.entry(key.to_string()).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }
}

/// Counters shared by every API instance pointed at the same Redis.
pub struct RedisSequenceStore {
    pool: Pool,
    prefix: String,
}

impl RedisSequenceStore {
    pub async fn new(redis_url: &str) -> Result<Self, RegistrationError> {
        let cfg = Config::from_url(redis_url);
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| RegistrationError::Identifier(format!("Failed to create Redis pool: {}", e)))?;

        let store = Self {
            pool,
            prefix: "clinic:sequence".to_string(),
        };

        let mut conn = store.get_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!("Redis sequence store initialized");

        Ok(store)
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }

    async fn get_connection(&self) -> Result<Connection, RegistrationError> {
        self.pool
            .get()
            .await
            .map_err(|e| RegistrationError::Identifier(format!("Failed to get Redis connection: {}", e)))
    }
}

#[async_trait]
impl SequenceStore for RedisSequenceStore {
    async fn seed_if_absent(&self, key: &str, value: u64, ttl_seconds: u64) -> Result<(), RegistrationError> {
        let mut conn = self.get_connection().await?;
        let full_key = self.full_key(key);

        let seeded: Option<String> = redis::cmd("SET")
            .arg(&full_key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await?;

        if seeded.is_some() {
            debug!("Seeded sequence {} at {}", full_key, value);
        }
        Ok(())
    }

    async fn increment(&self, key: &str) -> Result<u64, RegistrationError> {
        let mut conn = self.get_connection().await?;
        let value: u64 = conn.incr(self.full_key(key), 1u64).await?;
        Ok(value)
    }
}
