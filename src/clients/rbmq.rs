use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::{
    BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind,
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
        ConfirmSelectOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
    },
    publisher_confirm::Confirmation,
    types::FieldTable,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    clients::broker::{Acknowledger, BrokerClient, Delivery, Subscription},
    config::Config,
    error::{PipelineError, PipelineResult},
};

/// RabbitMQ adapter. A topic is a durable fanout exchange; a consumer group is
/// a durable queue named `<topic>.<group>` bound to it. Each subscription gets
/// its own channel so one slot never holds more than `prefetch_count`
/// unacknowledged messages.
///
/// Publishes go through a confirm-mode channel with `mandatory` set, so a
/// message the broker nacks or cannot route to any group queue is reported
/// as a publish error instead of being dropped.
pub struct RabbitMqClient {
    connection: Connection,
    publish_channel: Channel,
    prefetch_count: u16,
}

impl RabbitMqClient {
    /// Connects and declares both configured routes before returning, so the
    /// gateway never publishes into a topic whose group queue is not bound yet.
    pub async fn connect(config: &Config) -> PipelineResult<Self> {
        let client = Self::connect_url(&config.rabbitmq_url, config.prefetch_count).await?;

        client
            .declare_route(&config.notification_topic, &config.consumer_group)
            .await?;
        client
            .declare_route(&config.dead_letter_topic, &config.dead_letter_group)
            .await?;

        Ok(client)
    }

    pub async fn connect_url(url: &str, prefetch_count: u16) -> PipelineResult<Self> {
        info!("Connecting to RabbitMQ");

        let connection = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(|e| PipelineError::Connection(format!("Failed to connect to RabbitMQ: {}", e)))?;

        let publish_channel = connection
            .create_channel()
            .await
            .map_err(|e| PipelineError::Connection(format!("RabbitMQ channel creation failed: {}", e)))?;

        publish_channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| PipelineError::Connection(format!("Failed to enable publisher confirms: {}", e)))?;

        info!("RabbitMQ connection established");

        Ok(Self {
            connection,
            publish_channel,
            prefetch_count,
        })
    }

    pub fn group_queue_name(topic: &str, group_id: &str) -> String {
        format!("{}.{}", topic, group_id)
    }

    /// Declares the topic exchange and binds the group's durable queue to it.
    /// Messages published afterwards are retained for the group even while no
    /// consumer is attached.
    pub async fn declare_route(&self, topic: &str, group_id: &str) -> PipelineResult<()> {
        Self::declare_topic(&self.publish_channel, topic)
            .await
            .map_err(|e| PipelineError::subscribe(topic, group_id, e))?;

        let queue_name = Self::declare_group(&self.publish_channel, topic, group_id)
            .await
            .map_err(|e| PipelineError::subscribe(topic, group_id, e))?;

        info!(topic = %topic, queue = %queue_name, "Route declared");
        Ok(())
    }

    async fn declare_topic(channel: &Channel, topic: &str) -> Result<(), lapin::Error> {
        channel
            .exchange_declare(
                topic,
                ExchangeKind::Fanout,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
    }

    async fn declare_group(
        channel: &Channel,
        topic: &str,
        group_id: &str,
    ) -> Result<String, lapin::Error> {
        let queue_name = Self::group_queue_name(topic, group_id);

        channel
            .queue_declare(
                &queue_name,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        channel
            .queue_bind(
                &queue_name,
                topic,
                "",
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;

        Ok(queue_name)
    }
}

#[async_trait]
impl BrokerClient for RabbitMqClient {
    async fn publish(&self, topic: &str, payload: &str) -> PipelineResult<()> {
        let confirmation = self
            .publish_channel
            .basic_publish(
                topic,
                "",
                BasicPublishOptions {
                    mandatory: true,
                    ..Default::default()
                },
                payload.as_bytes(),
                BasicProperties::default().with_delivery_mode(2),
            )
            .await
            .map_err(|e| PipelineError::publish(topic, e))?
            .await
            .map_err(|e| PipelineError::publish(topic, e))?;

        match confirmation {
            Confirmation::Ack(None) | Confirmation::NotRequested => {}
            Confirmation::Ack(Some(returned)) => {
                return Err(PipelineError::publish(
                    topic,
                    format!("no group queue bound ({})", returned.reply_text),
                ));
            }
            Confirmation::Nack(_) => {
                return Err(PipelineError::publish(topic, "broker rejected the message"));
            }
        }

        debug!(topic = %topic, "Message published");

        Ok(())
    }

    async fn subscribe(&self, topic: &str, group_id: &str) -> PipelineResult<Subscription> {
        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(|e| PipelineError::subscribe(topic, group_id, e))?;

        channel
            .basic_qos(self.prefetch_count, BasicQosOptions::default())
            .await
            .map_err(|e| PipelineError::subscribe(topic, group_id, e))?;

        Self::declare_topic(&channel, topic)
            .await
            .map_err(|e| PipelineError::subscribe(topic, group_id, e))?;

        let queue_name = Self::declare_group(&channel, topic, group_id)
            .await
            .map_err(|e| PipelineError::subscribe(topic, group_id, e))?;

        let consumer_tag = format!("{}-{}", group_id, Uuid::new_v4());
        let consumer = channel
            .basic_consume(
                &queue_name,
                &consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| PipelineError::subscribe(topic, group_id, e))?;

        info!(
            topic = %topic,
            group = %group_id,
            queue = %queue_name,
            consumer_tag = %consumer_tag,
            "Consumer created for queue"
        );

        let topic = topic.to_string();
        let group = group_id.to_string();

        let stream = consumer.map(move |delivery| -> PipelineResult<Delivery> {
            let delivery = delivery.map_err(|e| PipelineError::subscribe(&topic, &group, e))?;
            let payload = decode_payload(&topic, delivery.data);
            let acker = AmqpAcker {
                channel: channel.clone(),
                delivery_tag: delivery.delivery_tag,
            };

            Ok(Delivery::new(payload, Box::new(acker)))
        });

        Ok(stream.boxed())
    }

    async fn health_check(&self) -> PipelineResult<()> {
        if self.connection.status().connected() {
            Ok(())
        } else {
            Err(PipelineError::Connection(
                "RabbitMQ connection is not open".to_string(),
            ))
        }
    }
}

/// Broker payloads are bytes; the pipeline works on text. Invalid UTF-8 is
/// replaced rather than dropped so the message still reaches a terminal
/// outcome.
fn decode_payload(topic: &str, data: Vec<u8>) -> String {
    match String::from_utf8(data) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(
                topic = %topic,
                error = %e,
                "Payload is not valid UTF-8, invalid sequences replaced"
            );
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    }
}

struct AmqpAcker {
    channel: Channel,
    delivery_tag: u64,
}

#[async_trait]
impl Acknowledger for AmqpAcker {
    async fn ack(&self) -> PipelineResult<()> {
        self.channel
            .basic_ack(self.delivery_tag, BasicAckOptions::default())
            .await
            .map_err(|e| PipelineError::Acknowledge(e.to_string()))
    }
}
