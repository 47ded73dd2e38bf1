use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Failures raised by the broker, store and cache adapters and by the
/// validation step of the delivery pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Failed to publish to '{topic}': {reason}")]
    Publish { topic: String, reason: String },

    #[error("Failed to subscribe to '{topic}' as '{group}': {reason}")]
    Subscribe {
        topic: String,
        group: String,
        reason: String,
    },

    #[error("Failed to acknowledge delivery: {0}")]
    Acknowledge(String),

    #[error("Broker connection failed: {0}")]
    Connection(String),

    #[error("Durable store write failed: {0}")]
    StoreWrite(String),

    #[error("Durable store read failed: {0}")]
    StoreRead(String),

    #[error("Cache write failed: {0}")]
    CacheWrite(String),

    #[error("Cache read failed: {0}")]
    CacheRead(String),
}

impl PipelineError {
    pub fn publish(topic: &str, reason: impl ToString) -> Self {
        Self::Publish {
            topic: topic.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn subscribe(topic: &str, group: &str, reason: impl ToString) -> Self {
        Self::Subscribe {
            topic: topic.to_string(),
            group: group.to_string(),
            reason: reason.to_string(),
        }
    }
}
