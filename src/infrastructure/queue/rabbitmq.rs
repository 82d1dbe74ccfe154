use std::sync::Arc;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::{
    BasicProperties, Channel, Connection, ConnectionProperties, acker::Acker, options::*,
    types::FieldTable,
};
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::{Acknowledger, Delivery, DeliveryStream, MessageBroker, QueueError, QueueResult};

#[derive(Clone)]
pub struct RabbitMqService {
    url: String,
    conn: Arc<Mutex<Connection>>,
    channel: Arc<Mutex<Channel>>,
}

impl RabbitMqService {
    async fn connect(url: &str) -> Result<(Connection, Channel)> {
        info!("Connecting to RabbitMQ");
        let conn = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(|e| anyhow!("Failed to connect to RabbitMQ: {}", e))?;

        let channel = conn
            .create_channel()
            .await
            .map_err(|e| anyhow!("Failed to create channel: {}", e))?;

        // Publishes are only considered delivered once the broker confirms them.
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| anyhow!("Failed to enable publisher confirms: {}", e))?;

        info!("Connected to RabbitMQ");
        Ok((conn, channel))
    }

    pub async fn new(url: &str) -> Result<Self> {
        let (conn, channel) = Self::connect(url).await?;

        Ok(Self {
            url: url.to_string(),
            conn: Arc::new(Mutex::new(conn)),
            channel: Arc::new(Mutex::new(channel)),
        })
    }

    async fn reconnect(&self) -> Result<()> {
        warn!("RabbitMQ connection dropped, reconnecting...");
        let (conn, channel) = Self::connect(&self.url).await?;
        *self.conn.lock().await = conn;
        *self.channel.lock().await = channel;
        Ok(())
    }

    async fn declare(channel: &Channel, queue: &str) -> Result<()> {
        channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| anyhow!("Failed to declare queue {}: {}", queue, e))?;
        Ok(())
    }

    async fn publish_internal(&self, queue: &str, payload: &[u8]) -> Result<()> {
        let channel = self.channel.lock().await;

        Self::declare(&channel, queue).await?;

        let confirmation = channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default()
                    .with_delivery_mode(2) // Persistent
                    .with_content_type(mime::APPLICATION_JSON.as_ref().into()),
            )
            .await
            .map_err(|e| anyhow!("Failed to publish message: {}", e))?
            .await
            .map_err(|e| anyhow!("Failed to confirm publication: {}", e))?;

        if confirmation.is_nack() {
            return Err(anyhow!("Broker rejected message on {}", queue));
        }

        Ok(())
    }
}

#[async_trait]
impl MessageBroker for RabbitMqService {
    async fn publish(&self, queue: &str, payload: &[u8]) -> QueueResult<()> {
        if let Err(e) = self.publish_internal(queue, payload).await {
            warn!("RabbitMQ publish failed: {}. Retrying after reconnect.", e);
            self.reconnect()
                .await
                .map_err(|e| QueueError::Connection(e.to_string()))?;
            self.publish_internal(queue, payload)
                .await
                .map_err(|e| QueueError::Publish(e.to_string()))?;
        }

        Ok(())
    }

    async fn consume(&self, queue: &str, consumer_tag: &str) -> QueueResult<DeliveryStream> {
        // Consumers get their own channel so publishes never wait on them.
        let channel = self
            .conn
            .lock()
            .await
            .create_channel()
            .await
            .map_err(|e| QueueError::Connection(format!("Failed to create channel: {}", e)))?;

        Self::declare(&channel, queue)
            .await
            .map_err(|e| QueueError::Consume(e.to_string()))?;

        // One unacknowledged message at a time per consumer.
        channel
            .basic_qos(1, BasicQosOptions::default())
            .await
            .map_err(|e| QueueError::Consume(format!("Failed to set prefetch: {}", e)))?;

        let consumer = channel
            .basic_consume(
                queue,
                consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| QueueError::Consume(format!("Failed to create consumer: {}", e)))?;

        info!(queue, consumer_tag, "Consuming");

        let stream = consumer.map(|delivery| {
            delivery
                .map(|d| Delivery::new(d.data, d.redelivered, RabbitAcker(d.acker)))
                .map_err(|e| QueueError::Consume(e.to_string()))
        });

        Ok(stream.boxed())
    }
}

struct RabbitAcker(Acker);

#[async_trait]
impl Acknowledger for RabbitAcker {
    async fn ack(&self) -> QueueResult<()> {
        self.0
            .ack(BasicAckOptions::default())
            .await
            .map(|_| ())
            .map_err(|e| QueueError::Settle(e.to_string()))
    }

    async fn nack(&self, requeue: bool) -> QueueResult<()> {
        self.0
            .nack(BasicNackOptions {
                requeue,
                ..BasicNackOptions::default()
            })
            .await
            .map(|_| ())
            .map_err(|e| QueueError::Settle(e.to_string()))
    }
}
