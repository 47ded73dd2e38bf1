use anyhow::{Error, Result, anyhow};
use dotenvy::dotenv;
use serde::Deserialize;

use crate::models::retry::RetryConfig;

#[derive(Clone, Deserialize, Debug)]
pub struct Config {
    pub rabbitmq_url: String,
    #[serde(default = "default_notification_topic")]
    pub notification_topic: String,
    #[serde(default = "default_dead_letter_topic")]
    pub dead_letter_topic: String,
    #[serde(default = "default_consumer_group")]
    pub consumer_group: String,
    #[serde(default = "default_dead_letter_group")]
    pub dead_letter_group: String,
    #[serde(default = "default_prefetch_count")]
    pub prefetch_count: u16,

    pub redis_url: String,
    #[serde(default = "default_recent_cache_key")]
    pub recent_cache_key: String,
    #[serde(default = "default_recent_cache_capacity")]
    pub recent_cache_capacity: usize,

    pub database_url: String,

    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,
    #[serde(default = "default_initial_retry_delay_ms")]
    pub initial_retry_delay_ms: u64,
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,
    #[serde(default = "default_retry_backoff_multiplier")]
    pub retry_backoff_multiplier: u64,
    #[serde(default)]
    pub retry_jitter_ratio: f64,

    #[serde(default = "default_poison_pattern")]
    pub poison_pattern: String,

    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,
    #[serde(default = "default_dead_letter_concurrency")]
    pub dead_letter_concurrency: usize,

    #[serde(default = "default_server_port")]
    pub server_port: u16,
}

/// Topic, group and cache naming shared by the worker, the dead-letter
/// handler and the gateway.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineSettings {
    pub notification_topic: String,
    pub dead_letter_topic: String,
    pub consumer_group: String,
    pub dead_letter_group: String,
    pub recent_cache_key: String,
    pub recent_cache_capacity: usize,
    pub poison_pattern: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            notification_topic: default_notification_topic(),
            dead_letter_topic: default_dead_letter_topic(),
            consumer_group: default_consumer_group(),
            dead_letter_group: default_dead_letter_group(),
            recent_cache_key: default_recent_cache_key(),
            recent_cache_capacity: default_recent_cache_capacity(),
            poison_pattern: default_poison_pattern(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, Error> {
        dotenv().ok();

        let config = envy::from_env::<Self>()
            .map_err(|e| anyhow!("Invalid or missing environmental variable: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.max_retry_attempts == 0 {
            return Err(anyhow!("MAX_RETRY_ATTEMPTS must be at least 1"));
        }
        if self.retry_backoff_multiplier == 0 {
            return Err(anyhow!("RETRY_BACKOFF_MULTIPLIER must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.retry_jitter_ratio) {
            return Err(anyhow!("RETRY_JITTER_RATIO must be between 0.0 and 1.0"));
        }
        if self.recent_cache_capacity == 0 {
            return Err(anyhow!("RECENT_CACHE_CAPACITY must be at least 1"));
        }
        if self.worker_concurrency == 0 || self.dead_letter_concurrency == 0 {
            return Err(anyhow!("Worker concurrency must be at least 1"));
        }
        Ok(())
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_retry_attempts,
            initial_delay_ms: self.initial_retry_delay_ms,
            max_delay_ms: self.max_retry_delay_ms,
            backoff_multiplier: self.retry_backoff_multiplier,
            jitter_ratio: self.retry_jitter_ratio,
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            notification_topic: self.notification_topic.clone(),
            dead_letter_topic: self.dead_letter_topic.clone(),
            consumer_group: self.consumer_group.clone(),
            dead_letter_group: self.dead_letter_group.clone(),
            recent_cache_key: self.recent_cache_key.clone(),
            recent_cache_capacity: self.recent_cache_capacity,
            poison_pattern: self.poison_pattern.clone(),
        }
    }
}

fn default_notification_topic() -> String {
    "user-notifications".to_string()
}

fn default_dead_letter_topic() -> String {
    "notifications-dlq".to_string()
}

fn default_consumer_group() -> String {
    "notification-group".to_string()
}

fn default_dead_letter_group() -> String {
    "dlq-group".to_string()
}

fn default_prefetch_count() -> u16 {
    1
}

fn default_recent_cache_key() -> String {
    "recent_notifications".to_string()
}

fn default_recent_cache_capacity() -> usize {
    10
}

fn default_max_retry_attempts() -> u32 {
    3
}

fn default_initial_retry_delay_ms() -> u64 {
    1000
}

fn default_max_retry_delay_ms() -> u64 {
    30_000
}

fn default_retry_backoff_multiplier() -> u64 {
    2
}

fn default_poison_pattern() -> String {
    "error".to_string()
}

fn default_worker_concurrency() -> usize {
    1
}

fn default_dead_letter_concurrency() -> usize {
    1
}

fn default_server_port() -> u16 {
    8080
}
