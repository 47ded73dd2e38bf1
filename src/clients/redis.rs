use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::MultiplexedConnection};
use tracing::info;

use crate::{
    config::Config,
    error::{PipelineError, PipelineResult},
};

/// Bounded list cache holding the most recent notifications.
#[async_trait]
pub trait FastCache: Send + Sync {
    async fn push_front(&self, key: &str, value: &str) -> PipelineResult<()>;

    /// Keeps only the first `max_len` items of the list.
    async fn trim(&self, key: &str, max_len: usize) -> PipelineResult<()>;

    async fn range_all(&self, key: &str) -> PipelineResult<Vec<String>>;

    async fn health_check(&self) -> PipelineResult<()>;
}

pub struct RedisClient {
    connection: MultiplexedConnection,
}

impl RedisClient {
    pub async fn connect(config: &Config) -> PipelineResult<Self> {
        Self::connect_url(&config.redis_url).await
    }

    pub async fn connect_url(redis_url: &str) -> PipelineResult<Self> {
        info!("Connecting to Redis");

        let client = Client::open(redis_url)
            .map_err(|e| PipelineError::Connection(format!("Failed to create redis client: {}", e)))?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| PipelineError::Connection(format!("Failed to connect to redis: {}", e)))?;

        info!("Redis connection established");

        Ok(Self { connection })
    }
}

#[async_trait]
impl FastCache for RedisClient {
    async fn push_front(&self, key: &str, value: &str) -> PipelineResult<()> {
        let mut conn = self.connection.clone();

        conn.lpush::<_, _, ()>(key, value)
            .await
            .map_err(|e| PipelineError::CacheWrite(e.to_string()))
    }

    async fn trim(&self, key: &str, max_len: usize) -> PipelineResult<()> {
        let mut conn = self.connection.clone();

        if max_len == 0 {
            return conn
                .del::<_, ()>(key)
                .await
                .map_err(|e| PipelineError::CacheWrite(e.to_string()));
        }

        conn.ltrim::<_, ()>(key, 0, max_len as isize - 1)
            .await
            .map_err(|e| PipelineError::CacheWrite(e.to_string()))
    }

    async fn range_all(&self, key: &str) -> PipelineResult<Vec<String>> {
        let mut conn = self.connection.clone();

        conn.lrange(key, 0, -1)
            .await
            .map_err(|e| PipelineError::CacheRead(e.to_string()))
    }

    async fn health_check(&self) -> PipelineResult<()> {
        let mut conn = self.connection.clone();

        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| PipelineError::CacheRead(format!("Ping failed: {}", e)))?;

        Ok(())
    }
}
