use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::infrastructure::storage::BlobId;

/// Body of both queues. On the job queue `result_ref` is empty; on the
/// completion queue it names the stored audio.
///
/// Fields this service does not know about are carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMessage {
    pub video_ref: BlobId,
    #[serde(default)]
    pub result_ref: Option<BlobId>,
    #[serde(default)]
    pub owner: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// Producers that predate the current field names.
const LEGACY_FIELDS: [(&str, &str); 3] = [
    ("video_fid", "video_ref"),
    ("mp3_fid", "result_ref"),
    ("username", "owner"),
];

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("invalid message body: {0}")]
    Invalid(#[from] serde_json::Error),

    #[error("video_ref is empty")]
    EmptyVideoRef,

    #[error("result_ref is missing")]
    MissingResultRef,
}

impl JobMessage {
    pub fn new(video_ref: BlobId, owner: impl Into<String>) -> Self {
        Self {
            video_ref,
            result_ref: None,
            owner: owner.into(),
            extra: Map::new(),
        }
    }

    /// Decode a job. Invalid UTF-8 surfaces as a JSON error.
    pub fn parse(payload: &[u8]) -> Result<Self, MessageError> {
        let mut body: Map<String, Value> = serde_json::from_slice(payload)?;
        for (legacy, current) in LEGACY_FIELDS {
            if !body.contains_key(current) {
                if let Some(value) = body.remove(legacy) {
                    body.insert(current.to_string(), value);
                }
            }
        }

        let message: Self = serde_json::from_value(Value::Object(body))?;
        if message.video_ref.as_str().is_empty() {
            return Err(MessageError::EmptyVideoRef);
        }
        Ok(message)
    }

    /// Decode a completion; a completion without `result_ref` is malformed.
    pub fn parse_completion(payload: &[u8]) -> Result<Self, MessageError> {
        let message = Self::parse(payload)?;
        match &message.result_ref {
            Some(id) if !id.as_str().is_empty() => Ok(message),
            _ => Err(MessageError::MissingResultRef),
        }
    }

    /// The completion derived from this job once `result` is stored.
    pub fn completed(&self, result: BlobId) -> Self {
        Self {
            result_ref: Some(result),
            ..self.clone()
        }
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}
