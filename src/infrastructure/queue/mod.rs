//! Durable, at-least-once message queues.
//!
//! Consumers pull [`Delivery`] values from a stream and settle each one
//! exactly once with [`Delivery::ack`] or [`Delivery::nack`]. An unsettled
//! delivery stays invisible to other consumers until the connection drops,
//! after which the broker hands it out again.

pub mod memory;
pub mod rabbitmq;

use std::fmt;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use thiserror::Error;

pub use memory::MemoryBroker;
pub use rabbitmq::RabbitMqService;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Broker connection failed: {0}")]
    Connection(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Consume failed: {0}")]
    Consume(String),

    #[error("Failed to settle delivery: {0}")]
    Settle(String),
}

pub type DeliveryStream = BoxStream<'static, QueueResult<Delivery>>;

#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Persist `payload` on `queue`. An error means the message was not delivered.
    async fn publish(&self, queue: &str, payload: &[u8]) -> QueueResult<()>;

    /// Start consuming `queue`. The stream ends when the broker closes the
    /// consumer.
    async fn consume(&self, queue: &str, consumer_tag: &str) -> QueueResult<DeliveryStream>;
}

/// Broker-specific settlement of a single delivery.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    async fn ack(&self) -> QueueResult<()>;
    async fn nack(&self, requeue: bool) -> QueueResult<()>;
}

pub struct Delivery {
    pub data: Vec<u8>,
    pub redelivered: bool,
    acker: Box<dyn Acknowledger>,
}

impl Delivery {
    pub fn new(data: Vec<u8>, redelivered: bool, acker: impl Acknowledger + 'static) -> Self {
        Self {
            data,
            redelivered,
            acker: Box::new(acker),
        }
    }

    /// Remove the message from the queue.
    pub async fn ack(self) -> QueueResult<()> {
        self.acker.ack().await
    }

    /// Reject the message, handing it back to the queue when `requeue` is set.
    pub async fn nack(self, requeue: bool) -> QueueResult<()> {
        self.acker.nack(requeue).await
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("len", &self.data.len())
            .field("redelivered", &self.redelivered)
            .finish()
    }
}
