use serde::{Deserialize, Serialize};

use crate::infrastructure::storage::BlobId;

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub video_ref: BlobId,
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub fid: Option<String>,
}
