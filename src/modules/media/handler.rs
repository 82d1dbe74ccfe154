use axum::{
    extract::{Extension, Multipart, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use tracing::{error, info};

use super::dto::{DownloadQuery, UploadResponse};
use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::infrastructure::storage::{BlobId, StorageError};
use crate::middleware::auth::TokenClaims;
use crate::state::AppState;

pub async fn upload_video(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut file: Option<Bytes> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        if field.file_name().is_none() {
            continue;
        }
        if file.is_some() {
            return Err(ApiError::bad_request("Exactly one file required"));
        }
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Upload interrupted: {}", e)))?;
        file = Some(data);
    }

    let video = file.ok_or_else(|| ApiError::bad_request("Exactly one file required"))?;
    info!(owner = %claims.username, "Received upload of {} bytes", video.len());

    match state.producer.enqueue_job(video, &claims.username).await {
        Ok(video_ref) => Ok(ApiSuccess(
            ApiResponse::success(UploadResponse { video_ref }, "Video queued for conversion"),
            StatusCode::CREATED,
        )
        .into_response()),
        Err(e) => {
            error!(owner = %claims.username, error = %e, "Upload failed");
            Err(ApiError::internal())
        }
    }
}

pub async fn download_audio(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    let fid = query
        .fid
        .filter(|fid| !fid.is_empty())
        .ok_or_else(|| ApiError::bad_request("URL parameter \"fid\" is required"))?;
    let id = BlobId::from(fid);

    let audio = state.results.get(&id).await.map_err(|e| match e {
        StorageError::NotFound(_) => {
            ApiError(format!("No file found with fid: {}", id), StatusCode::NOT_FOUND)
        }
        other => {
            error!(fid = %id, error = %other, "Download failed");
            ApiError::internal()
        }
    })?;

    let headers = [
        (header::CONTENT_TYPE, "audio/mpeg".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}.mp3\"", id),
        ),
    ];
    Ok((headers, audio).into_response())
}
