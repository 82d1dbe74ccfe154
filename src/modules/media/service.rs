use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::infrastructure::queue::{MessageBroker, QueueError};
use crate::infrastructure::storage::{BlobId, BlobStore, StorageError};
use crate::modules::conversion::JobMessage;

#[derive(Debug, Error)]
pub enum ProducerError {
    #[error("Failed to store video: {0}")]
    Store(#[from] StorageError),

    #[error("Failed to encode job: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to enqueue job: {0}")]
    Publish(#[source] QueueError),
}

/// Stores uploaded videos and queues them for conversion.
#[derive(Clone)]
pub struct Producer {
    videos: Arc<dyn BlobStore>,
    broker: Arc<dyn MessageBroker>,
    job_queue: String,
}

impl Producer {
    pub fn new(videos: Arc<dyn BlobStore>, broker: Arc<dyn MessageBroker>, job_queue: &str) -> Self {
        Self {
            videos,
            broker,
            job_queue: job_queue.to_string(),
        }
    }

    /// Store the video, then publish a job for it. If the job cannot be
    /// published the stored video is removed again.
    pub async fn enqueue_job(&self, video: Bytes, owner: &str) -> Result<BlobId, ProducerError> {
        let size = video.len();
        let video_ref = self.videos.put(video).await?;
        info!(%video_ref, owner, "Stored {} bytes of video", size);

        let job = JobMessage::new(video_ref.clone(), owner);
        let published = match job.to_bytes() {
            Ok(body) => self
                .broker
                .publish(&self.job_queue, &body)
                .await
                .map_err(ProducerError::Publish),
            Err(e) => Err(ProducerError::Encode(e)),
        };

        if let Err(e) = published {
            match self.videos.delete(&video_ref).await {
                Ok(()) => warn!(%video_ref, "Deleted video whose job was not published"),
                Err(del) => error!(%video_ref, error = %del, "Failed to delete video whose job was not published"),
            }
            return Err(e);
        }

        info!(%video_ref, queue = %self.job_queue, "Queued conversion job");
        Ok(video_ref)
    }
}
