use thiserror::Error;

use super::events::MessageError;
use super::extractor::ExtractionError;
use crate::infrastructure::queue::QueueError;
use crate::infrastructure::storage::{BlobId, StorageError};

/// What to tell the broker about a delivery once handling is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Remove the message; either it was handled or it never will be.
    Ack,
    /// Put the message back for another attempt.
    Requeue,
}

#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("Malformed job: {0}")]
    Malformed(#[from] MessageError),

    #[error("Video {0} does not exist")]
    VideoNotFound(BlobId),

    #[error("Failed to fetch video {id}: {source}")]
    VideoFetch {
        id: BlobId,
        #[source]
        source: StorageError,
    },

    #[error("Failed to extract audio from {id}: {source}")]
    Extraction {
        id: BlobId,
        #[source]
        source: ExtractionError,
    },

    #[error("Failed to store audio: {0}")]
    ResultStore(#[source] StorageError),

    #[error("Failed to encode completion: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to publish completion: {0}")]
    CompletionPublish(#[source] QueueError),
}

impl ProcessingError {
    /// Permanent failures are acknowledged and dropped; retrying the same
    /// message cannot succeed.
    pub fn is_permanent(&self) -> bool {
        match self {
            ProcessingError::Malformed(_)
            | ProcessingError::VideoNotFound(_)
            | ProcessingError::Encode(_) => true,
            ProcessingError::Extraction { source, .. } => source.is_permanent(),
            ProcessingError::VideoFetch { .. }
            | ProcessingError::ResultStore(_)
            | ProcessingError::CompletionPublish(_) => false,
        }
    }

    pub fn disposition(&self) -> Disposition {
        if self.is_permanent() {
            Disposition::Ack
        } else {
            Disposition::Requeue
        }
    }
}
