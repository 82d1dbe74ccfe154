use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::{ConsumerOptions, MessageHandler, run_consumer};
use crate::infrastructure::queue::{MessageBroker, QueueResult};
use crate::infrastructure::storage::{BlobId, BlobStore, StorageError};
use crate::modules::conversion::{AudioExtractor, Disposition, JobMessage, ProcessingError};

/// Turns job messages into stored audio plus a completion message.
pub struct ConversionWorker {
    videos: Arc<dyn BlobStore>,
    results: Arc<dyn BlobStore>,
    broker: Arc<dyn MessageBroker>,
    extractor: Arc<dyn AudioExtractor>,
    completion_queue: String,
}

impl ConversionWorker {
    pub fn new(
        videos: Arc<dyn BlobStore>,
        results: Arc<dyn BlobStore>,
        broker: Arc<dyn MessageBroker>,
        extractor: Arc<dyn AudioExtractor>,
        completion_queue: &str,
    ) -> Self {
        Self {
            videos,
            results,
            broker,
            extractor,
            completion_queue: completion_queue.to_string(),
        }
    }

    /// Handle one job body end to end and return the published completion.
    ///
    /// The result blob is only left behind when its completion message was
    /// accepted by the broker.
    pub async fn process(&self, payload: &[u8]) -> Result<JobMessage, ProcessingError> {
        let job = JobMessage::parse(payload)?;
        info!(video_ref = %job.video_ref, owner = %job.owner, "Processing job");

        let video = match self.videos.get(&job.video_ref).await {
            Ok(video) => video,
            Err(StorageError::NotFound(id)) => return Err(ProcessingError::VideoNotFound(id)),
            Err(source) => {
                return Err(ProcessingError::VideoFetch {
                    id: job.video_ref.clone(),
                    source,
                });
            }
        };
        info!(video_ref = %job.video_ref, "Downloaded {} bytes", video.len());

        let audio = self
            .extractor
            .extract(video)
            .await
            .map_err(|source| ProcessingError::Extraction {
                id: job.video_ref.clone(),
                source,
            })?;

        let result_ref = self
            .results
            .put(audio)
            .await
            .map_err(ProcessingError::ResultStore)?;
        info!(video_ref = %job.video_ref, %result_ref, "Stored audio");

        let completion = job.completed(result_ref.clone());
        let published = match completion.to_bytes() {
            Ok(body) => self
                .broker
                .publish(&self.completion_queue, &body)
                .await
                .map_err(ProcessingError::CompletionPublish),
            Err(e) => Err(ProcessingError::Encode(e)),
        };

        if let Err(e) = published {
            self.discard_result(&result_ref).await;
            return Err(e);
        }

        Ok(completion)
    }

    async fn discard_result(&self, result_ref: &BlobId) {
        match self.results.delete(result_ref).await {
            Ok(()) => warn!(%result_ref, "Deleted audio whose completion was not published"),
            Err(e) => error!(
                %result_ref,
                error = %e,
                "Failed to delete audio whose completion was not published; blob is orphaned"
            ),
        }
    }

    pub async fn run(&self, options: &ConsumerOptions, shutdown: CancellationToken) -> QueueResult<()> {
        info!("Starting Converter Worker...");
        run_consumer(self.broker.as_ref(), options, self, shutdown).await
    }
}

#[async_trait]
impl MessageHandler for ConversionWorker {
    async fn handle(&self, payload: &[u8], redelivered: bool) -> Disposition {
        if redelivered {
            info!("Received redelivered job");
        }

        match self.process(payload).await {
            Ok(completion) => {
                info!(
                    video_ref = %completion.video_ref,
                    result_ref = ?completion.result_ref.as_ref().map(BlobId::as_str),
                    owner = %completion.owner,
                    "Job completed"
                );
                Disposition::Ack
            }
            Err(e) => {
                let disposition = e.disposition();
                match disposition {
                    Disposition::Ack => error!(error = %e, "Dropping job that can never succeed"),
                    Disposition::Requeue => warn!(error = %e, "Job failed, returning it to the queue"),
                }
                disposition
            }
        }
    }
}
