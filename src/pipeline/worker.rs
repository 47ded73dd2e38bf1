use std::sync::Arc;

use futures_util::StreamExt;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::{
    clients::{broker::BrokerClient, database::DurableStore},
    error::{PipelineError, PipelineResult},
    models::{
        outcome::DeliveryOutcome, record::CreateNotificationRecord,
        validation::MessageValidator,
    },
    pipeline::{
        dead_letter::DeadLetterHandler,
        recent::RecentNotifications,
        retry::{RetrySupervisor, Supervised},
    },
};

/// Consumer loop for the notification topic.
///
/// Each message is validated through the retry supervisor. A valid message is
/// written once to the durable store and then to the recent cache; a message
/// that exhausts its attempts goes to the dead-letter handler. The delivery is
/// acknowledged only after one of those terminal outcomes.
pub struct DeliveryWorker {
    broker: Arc<dyn BrokerClient>,
    store: Arc<dyn DurableStore>,
    recent: RecentNotifications,
    dead_letters: DeadLetterHandler,
    supervisor: RetrySupervisor,
    validator: Arc<dyn MessageValidator>,
    topic: String,
    group_id: String,
}

impl DeliveryWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        broker: Arc<dyn BrokerClient>,
        store: Arc<dyn DurableStore>,
        recent: RecentNotifications,
        dead_letters: DeadLetterHandler,
        supervisor: RetrySupervisor,
        validator: Arc<dyn MessageValidator>,
        topic: impl Into<String>,
        group_id: impl Into<String>,
    ) -> Self {
        Self {
            broker,
            store,
            recent,
            dead_letters,
            supervisor,
            validator,
            topic: topic.into(),
            group_id: group_id.into(),
        }
    }

    pub async fn handle(&self, payload: &str) -> DeliveryOutcome {
        info!(payload = %payload, "Processing notification message");

        let validator = self.validator.as_ref();
        let dead_letters = &self.dead_letters;

        let supervised = self
            .supervisor
            .supervise(
                payload,
                |payload| async move { validator.validate(&payload).await },
                |payload, e: PipelineError| async move {
                    let reason = e.to_string();
                    let published = dead_letters.route(&payload, &reason).await.is_ok();
                    (reason, published)
                },
            )
            .await;

        match supervised {
            Supervised::Succeeded { attempts, .. } => self.persist(payload, attempts).await,
            Supervised::Recovered {
                attempts,
                recovery: (reason, published),
            } => DeliveryOutcome::DeadLettered {
                attempts,
                reason,
                published,
            },
        }
    }

    async fn persist(&self, payload: &str, attempts: u32) -> DeliveryOutcome {
        let record = CreateNotificationRecord::new(payload.to_string());

        let record_id = match self.store.insert(record).await {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, "Durable store write failed after validation");
                let reason = e.to_string();
                let published = self.dead_letters.route(payload, &reason).await.is_ok();

                return DeliveryOutcome::DeadLettered {
                    attempts,
                    reason,
                    published,
                };
            }
        };

        info!(record_id = %record_id, attempts, "Saved to durable store");

        let cached = match self.recent.record(payload).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    record_id = %record_id,
                    error = %e,
                    "Cache write failed, record is durable but missing from recent reads"
                );
                false
            }
        };

        DeliveryOutcome::Persisted {
            record_id,
            attempts,
            cached,
        }
    }

    /// Consumes one slot: messages on this slot are handled strictly one at
    /// a time. Returns when the subscription ends or fails.
    pub async fn run_slot(&self, slot: usize) -> PipelineResult<()> {
        let mut deliveries = self.broker.subscribe(&self.topic, &self.group_id).await?;

        info!(
            topic = %self.topic,
            group = %self.group_id,
            slot,
            "Delivery worker started"
        );

        while let Some(delivery) = deliveries.next().await {
            let delivery = delivery.inspect_err(|e| {
                error!(slot, error = %e, "Consumer error, stopping slot");
            })?;

            let outcome = self.handle(&delivery.payload).await;

            info!(
                slot,
                outcome = %outcome,
                attempts = outcome.attempts(),
                "Delivery finished"
            );

            if let Err(e) = delivery.ack().await {
                warn!(slot, error = %e, "Failed to acknowledge delivery, broker will redeliver");
            }
        }

        warn!(topic = %self.topic, slot, "Subscription ended");
        Ok(())
    }

    pub fn spawn_slots(
        self: &Arc<Self>,
        slots: usize,
        tasks: &mut JoinSet<PipelineResult<()>>,
    ) {
        for slot in 0..slots {
            let worker = Arc::clone(self);
            tasks.spawn(async move { worker.run_slot(slot).await });
        }
    }
}
