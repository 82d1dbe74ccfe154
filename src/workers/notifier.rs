use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::{ConsumerOptions, MessageHandler, run_consumer};
use crate::infrastructure::queue::{MessageBroker, QueueResult};
use crate::modules::conversion::{Disposition, JobMessage};
use crate::modules::notification::Notifier;

pub struct NotificationWorker {
    broker: Arc<dyn MessageBroker>,
    notifier: Arc<dyn Notifier>,
}

impl NotificationWorker {
    pub fn new(broker: Arc<dyn MessageBroker>, notifier: Arc<dyn Notifier>) -> Self {
        Self { broker, notifier }
    }

    pub async fn run(&self, options: &ConsumerOptions, shutdown: CancellationToken) -> QueueResult<()> {
        info!("Starting Notification Worker...");
        run_consumer(self.broker.as_ref(), options, self, shutdown).await
    }
}

#[async_trait]
impl MessageHandler for NotificationWorker {
    async fn handle(&self, payload: &[u8], _redelivered: bool) -> Disposition {
        let completion = match JobMessage::parse_completion(payload) {
            Ok(completion) => completion,
            Err(e) => {
                error!(error = %e, "Dropping malformed completion");
                return Disposition::Ack;
            }
        };

        match self.notifier.on_completion(&completion).await {
            Ok(()) => Disposition::Ack,
            Err(e) => {
                warn!(owner = %completion.owner, error = %e, "Notification failed, returning it to the queue");
                Disposition::Requeue
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::queue::MemoryBroker;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<JobMessage>>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for Recorder {
        async fn on_completion(&self, message: &JobMessage) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("mail server down");
            }
            self.seen.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    fn worker(recorder: Arc<Recorder>) -> NotificationWorker {
        NotificationWorker::new(Arc::new(MemoryBroker::new()), recorder)
    }

    #[tokio::test]
    async fn delivers_completion_to_sink() {
        let recorder = Arc::new(Recorder::default());
        let body = json!({"video_ref": "v1", "result_ref": "r1", "owner": "alice"}).to_string();

        let disposition = worker(recorder.clone()).handle(body.as_bytes(), false).await;

        assert_eq!(disposition, Disposition::Ack);
        let seen = recorder.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].owner, "alice");
    }

    #[tokio::test]
    async fn completion_without_result_is_dropped() {
        let recorder = Arc::new(Recorder::default());
        let body = json!({"video_ref": "v1", "result_ref": null, "owner": "alice"}).to_string();

        let disposition = worker(recorder.clone()).handle(body.as_bytes(), false).await;

        assert_eq!(disposition, Disposition::Ack);
        assert!(recorder.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn sink_failure_is_retried() {
        let recorder = Arc::new(Recorder {
            fail: true,
            ..Recorder::default()
        });
        let body = json!({"video_ref": "v1", "result_ref": "r1", "owner": "alice"}).to_string();

        let disposition = worker(recorder).handle(body.as_bytes(), false).await;
        assert_eq!(disposition, Disposition::Requeue);
    }
}
