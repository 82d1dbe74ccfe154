//! Queue consumers.
//!
//! Each worker pulls one delivery at a time, handles it to completion and
//! settles it before asking for the next. Shutdown stops the pull side only:
//! a delivery already being handled always reaches its ack or nack.

pub mod converter;
pub mod notifier;

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::infrastructure::queue::{Delivery, MessageBroker, QueueResult};
use crate::modules::conversion::Disposition;

#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, payload: &[u8], redelivered: bool) -> Disposition;
}

#[derive(Debug, Clone)]
pub struct ConsumerOptions {
    pub queue: String,
    pub consumer_tag: String,
    /// Pause before handing a failed message back, so a broken dependency
    /// does not turn into a redelivery storm.
    pub requeue_delay: Duration,
}

/// Consume `options.queue` until shutdown or until the broker ends the stream.
///
/// Returns an error when the broker connection fails; the caller is expected
/// to exit and let its supervisor restart it.
pub async fn run_consumer(
    broker: &dyn MessageBroker,
    options: &ConsumerOptions,
    handler: &dyn MessageHandler,
    shutdown: CancellationToken,
) -> QueueResult<()> {
    let mut deliveries = broker
        .consume(&options.queue, &options.consumer_tag)
        .await?;

    info!(queue = %options.queue, consumer = %options.consumer_tag, "Worker listening");

    loop {
        let delivery = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                info!(queue = %options.queue, "Shutdown requested, no longer accepting deliveries");
                break;
            }
            next = deliveries.next() => match next {
                Some(Ok(delivery)) => delivery,
                Some(Err(e)) => return Err(e),
                None => {
                    warn!(queue = %options.queue, "Delivery stream ended");
                    break;
                }
            },
        };

        settle(delivery, options, handler, &shutdown).await?;
    }

    Ok(())
}

async fn settle(
    delivery: Delivery,
    options: &ConsumerOptions,
    handler: &dyn MessageHandler,
    shutdown: &CancellationToken,
) -> QueueResult<()> {
    match handler.handle(&delivery.data, delivery.redelivered).await {
        Disposition::Ack => delivery.ack().await,
        Disposition::Requeue => {
            if !options.requeue_delay.is_zero() {
                tokio::select! {
                    _ = shutdown.cancelled() => {}
                    _ = tokio::time::sleep(options.requeue_delay) => {}
                }
            }
            delivery.nack(true).await
        }
    }
}
