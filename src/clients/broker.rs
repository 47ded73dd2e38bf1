use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::error::{PipelineError, PipelineResult};

/// Lazy, effectively infinite stream of deliveries for one consumer slot.
pub type Subscription = BoxStream<'static, PipelineResult<Delivery>>;

/// Publish/subscribe surface the pipeline needs from a message broker.
///
/// A subscription belongs to a consumer group: slots subscribed under the same
/// group compete for messages, distinct groups each see every message.
/// Deliveries that are never acknowledged are redelivered by the broker.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    async fn publish(&self, topic: &str, payload: &str) -> PipelineResult<()>;

    async fn subscribe(&self, topic: &str, group_id: &str) -> PipelineResult<Subscription>;

    async fn health_check(&self) -> PipelineResult<()>;
}

#[async_trait]
pub trait Acknowledger: Send + Sync {
    async fn ack(&self) -> PipelineResult<()>;
}

/// One message handed to a consumer slot.
pub struct Delivery {
    pub payload: String,
    acker: Box<dyn Acknowledger>,
}

impl Delivery {
    pub fn new(payload: String, acker: Box<dyn Acknowledger>) -> Self {
        Self { payload, acker }
    }

    /// Tells the broker the message reached a terminal outcome.
    pub async fn ack(self) -> Result<(), PipelineError> {
        self.acker.ack().await
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("payload", &self.payload)
            .finish_non_exhaustive()
    }
}
