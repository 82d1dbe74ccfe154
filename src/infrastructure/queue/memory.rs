use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_channel::{Receiver, Sender};
use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{Acknowledger, Delivery, DeliveryStream, MessageBroker, QueueError, QueueResult};

/// Process-local broker with the same settlement semantics as RabbitMQ:
/// a nack with requeue puts the message back, flagged as redelivered.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    queues: Arc<Mutex<HashMap<String, MemoryQueue>>>,
}

struct Envelope {
    data: Vec<u8>,
    redelivered: bool,
}

struct MemoryQueue {
    tx: Sender<Envelope>,
    rx: Receiver<Envelope>,
    stats: QueueStats,
    fail_publish: bool,
}

impl MemoryQueue {
    fn new() -> Self {
        let (tx, rx) = async_channel::unbounded();
        Self {
            tx,
            rx,
            stats: QueueStats::default(),
            fail_publish: false,
        }
    }
}

/// Counters kept per queue for inspection.
#[derive(Debug, Clone, Default)]
pub struct QueueStats {
    /// Every payload accepted by `publish`, in order.
    pub published: Vec<Vec<u8>>,
    pub acked: usize,
    pub requeued: usize,
    pub rejected: usize,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn stats(&self, queue: &str) -> QueueStats {
        self.queues
            .lock()
            .await
            .get(queue)
            .map(|q| q.stats.clone())
            .unwrap_or_default()
    }

    /// Messages waiting for a consumer (excludes in-flight deliveries).
    pub async fn depth(&self, queue: &str) -> usize {
        self.queues.lock().await.get(queue).map_or(0, |q| q.rx.len())
    }

    pub async fn fail_publishes(&self, queue: &str, fail: bool) {
        self.queues
            .lock()
            .await
            .entry(queue.to_string())
            .or_insert_with(MemoryQueue::new)
            .fail_publish = fail;
    }

    /// End every consumer stream on `queue` once its backlog is drained.
    pub async fn close(&self, queue: &str) {
        if let Some(q) = self.queues.lock().await.get(queue) {
            q.tx.close();
        }
    }
}

#[async_trait]
impl MessageBroker for MemoryBroker {
    async fn publish(&self, queue: &str, payload: &[u8]) -> QueueResult<()> {
        let mut queues = self.queues.lock().await;
        let q = queues
            .entry(queue.to_string())
            .or_insert_with(MemoryQueue::new);

        if q.fail_publish {
            return Err(QueueError::Publish(format!("publish to {} refused", queue)));
        }

        q.tx.try_send(Envelope {
            data: payload.to_vec(),
            redelivered: false,
        })
        .map_err(|e| QueueError::Publish(e.to_string()))?;
        q.stats.published.push(payload.to_vec());
        Ok(())
    }

    async fn consume(&self, queue: &str, _consumer_tag: &str) -> QueueResult<DeliveryStream> {
        let (tx, rx) = {
            let mut queues = self.queues.lock().await;
            let q = queues
                .entry(queue.to_string())
                .or_insert_with(MemoryQueue::new);
            (q.tx.clone(), q.rx.clone())
        };

        let broker = self.clone();
        let queue = queue.to_string();
        let stream = rx.map(move |envelope| {
            let acker = MemoryAcker {
                broker: broker.clone(),
                queue: queue.clone(),
                tx: tx.clone(),
                data: envelope.data.clone(),
                settled: AtomicBool::new(false),
            };
            Ok(Delivery::new(envelope.data, envelope.redelivered, acker))
        });

        Ok(stream.boxed())
    }
}

/// Settles one delivery. Dropping it unsettled hands the message back,
/// as the broker does when a consumer dies mid-delivery.
struct MemoryAcker {
    broker: MemoryBroker,
    queue: String,
    tx: Sender<Envelope>,
    data: Vec<u8>,
    settled: AtomicBool,
}

impl MemoryAcker {
    fn redeliver(&self) -> QueueResult<()> {
        self.tx
            .try_send(Envelope {
                data: self.data.clone(),
                redelivered: true,
            })
            .map_err(|e| QueueError::Settle(format!("requeue on {} failed: {}", self.queue, e)))
    }
}

#[async_trait]
impl Acknowledger for MemoryAcker {
    async fn ack(&self) -> QueueResult<()> {
        let mut queues = self.broker.queues.lock().await;
        let q = queues
            .get_mut(&self.queue)
            .ok_or_else(|| QueueError::Settle(format!("unknown queue {}", self.queue)))?;
        q.stats.acked += 1;
        self.settled.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn nack(&self, requeue: bool) -> QueueResult<()> {
        let mut queues = self.broker.queues.lock().await;
        let q = queues
            .get_mut(&self.queue)
            .ok_or_else(|| QueueError::Settle(format!("unknown queue {}", self.queue)))?;

        if requeue {
            self.redeliver()?;
            q.stats.requeued += 1;
        } else {
            q.stats.rejected += 1;
        }
        self.settled.store(true, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for MemoryAcker {
    fn drop(&mut self) {
        if self.settled.load(Ordering::SeqCst) {
            return;
        }
        match self.redeliver() {
            Ok(()) => debug!(queue = %self.queue, "Unsettled delivery returned to queue"),
            Err(e) => warn!(queue = %self.queue, error = %e, "Unsettled delivery lost"),
        }
    }
}
