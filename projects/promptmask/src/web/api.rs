use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::header;
use axum::response::Response;
use axum::Json;
use serde::Serialize;

use crate::error::ApiError;
use crate::jobs::types::{JobRecord, JobStatus};
use crate::web::AppState;

#[derive(Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub job_id: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `POST /api/upload` — multipart with a `video` file part and an
/// optional `prompt` text part. Replies with the job id as soon as the
/// pipeline has been dispatched.
pub async fn upload_video(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut video: Option<(String, Vec<u8>)> = None;
    let mut prompt: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidInput(format!("Malformed multipart body: {e}")))?
    {
        match field.name() {
            Some("video") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::InvalidInput(format!("Failed to read upload: {e}")))?;
                video = Some((file_name, data.to_vec()));
            }
            Some("prompt") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::InvalidInput(format!("Failed to read prompt: {e}")))?;
                prompt = Some(text);
            }
            _ => {}
        }
    }

    let (file_name, data) =
        video.ok_or_else(|| ApiError::InvalidInput("No video file provided".to_string()))?;

    let job_id = state.scheduler.submit(&data, &file_name, prompt)?;

    Ok(Json(UploadResponse {
        success: true,
        job_id,
        message: "Video processing started".to_string(),
    }))
}

/// `GET /api/status/:job_id`
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let record = state.registry.get(&job_id).ok_or(ApiError::NotFound)?;
    Ok(Json(status_payload(&record)))
}

/// `GET /api/video/:job_id` — inline playback of the finished video.
pub async fn get_video(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Response, ApiError> {
    let record = state.registry.get(&job_id).ok_or(ApiError::NotFound)?;
    let artifact = ready_artifact(&record)?;
    serve_artifact(&artifact, None).await
}

/// `GET /api/download/:job_id` — attachment download named after the
/// uploaded file.
pub async fn download_video(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Response, ApiError> {
    let record = state.registry.get(&job_id).ok_or(ApiError::NotFound)?;
    let artifact = ready_artifact(&record)?;
    serve_artifact(&artifact, Some(format!("segmented_{}", record.source_name))).await
}

fn status_payload(record: &JobRecord) -> StatusResponse {
    StatusResponse {
        status: record.status,
        video_url: (record.status == JobStatus::Completed)
            .then(|| format!("/api/video/{}", record.id)),
        error: if record.status == JobStatus::Failed {
            record.error_detail.clone()
        } else {
            None
        },
    }
}

fn ready_artifact(record: &JobRecord) -> Result<PathBuf, ApiError> {
    if record.status != JobStatus::Completed {
        return Err(ApiError::NotReady);
    }
    record.artifact_path.clone().ok_or(ApiError::NotReady)
}

async fn serve_artifact(
    path: &FsPath,
    attachment_name: Option<String>,
) -> Result<Response, ApiError> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read artifact {path:?}"))?;

    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let mut builder = Response::builder().header(header::CONTENT_TYPE, mime.as_ref());
    if let Some(name) = attachment_name {
        builder = builder.header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{name}\""),
        );
    }

    builder
        .body(Body::from(bytes))
        .map_err(|e| ApiError::Internal(e.into()))
}
