use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use futures_util::StreamExt;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::{
    clients::broker::BrokerClient,
    error::PipelineResult,
    models::message::NotificationMessage,
};

/// Terminal sink for messages that ran out of attempts. Publishing is best
/// effort: a failed publish is logged and never retried.
#[derive(Clone)]
pub struct DeadLetterHandler {
    broker: Arc<dyn BrokerClient>,
    topic: String,
}

impl DeadLetterHandler {
    pub fn new(broker: Arc<dyn BrokerClient>, topic: impl Into<String>) -> Self {
        Self {
            broker,
            topic: topic.into(),
        }
    }

    pub async fn route(&self, payload: &str, reason: &str) -> PipelineResult<()> {
        warn!(
            topic = %self.topic,
            reason = %reason,
            "Moving message to dead-letter topic"
        );

        let dead_letter = NotificationMessage::new(payload).dead_letter_payload();

        if let Err(e) = self.broker.publish(&self.topic, &dead_letter).await {
            error!(
                topic = %self.topic,
                error = %e,
                payload = %payload,
                "Failed to publish to dead-letter topic, message dropped"
            );
            return Err(e);
        }

        Ok(())
    }
}

/// Watches the dead-letter topic under its own consumer group. Records and
/// alerts only; messages are never fed back into the main topic.
pub struct DeadLetterObserver {
    broker: Arc<dyn BrokerClient>,
    topic: String,
    group_id: String,
    observed: AtomicU64,
}

impl DeadLetterObserver {
    pub fn new(
        broker: Arc<dyn BrokerClient>,
        topic: impl Into<String>,
        group_id: impl Into<String>,
    ) -> Self {
        Self {
            broker,
            topic: topic.into(),
            group_id: group_id.into(),
            observed: AtomicU64::new(0),
        }
    }

    pub fn observed(&self) -> u64 {
        self.observed.load(Ordering::SeqCst)
    }

    pub fn observe(&self, payload: &str) {
        let total = self.observed.fetch_add(1, Ordering::SeqCst) + 1;
        warn!(
            topic = %self.topic,
            total_dead_lettered = total,
            message = %payload,
            "Dead-letter topic received bad message"
        );
    }

    /// Consumes one observer slot until the subscription ends.
    pub async fn run_slot(&self, slot: usize) -> PipelineResult<()> {
        let mut deliveries = self.broker.subscribe(&self.topic, &self.group_id).await?;

        info!(
            topic = %self.topic,
            group = %self.group_id,
            slot,
            "Dead-letter observer started"
        );

        while let Some(delivery) = deliveries.next().await {
            let delivery = delivery.inspect_err(|e| {
                error!(slot, error = %e, "Dead-letter consumer error, stopping slot");
            })?;

            self.observe(&delivery.payload);

            if let Err(e) = delivery.ack().await {
                warn!(slot, error = %e, "Failed to acknowledge dead-letter message");
            }
        }

        warn!(topic = %self.topic, slot, "Dead-letter subscription ended");
        Ok(())
    }

    pub fn spawn_slots(
        self: &Arc<Self>,
        slots: usize,
        tasks: &mut JoinSet<PipelineResult<()>>,
    ) {
        for slot in 0..slots {
            let observer = Arc::clone(self);
            tasks.spawn(async move { observer.run_slot(slot).await });
        }
    }
}
