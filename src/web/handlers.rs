use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Json, Response},
};
use futures::StreamExt;
use serde::Deserialize;
use tokio_util::io::ReaderStream;

use super::{ApiError, AppState, HealthResponse};
use crate::export::ExportBundle;
use crate::models::TaskProgress;
use crate::utils::error::AppError;

#[derive(Debug, Deserialize)]
pub struct ScrapeParams {
    pub college: String,
    pub task_id: Option<String>,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

pub async fn list_colleges(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.service.catalog().names())
}

pub async fn get_progress(State(state): State<AppState>, Path(task_id): Path<String>) -> Json<TaskProgress> {
    Json(state.service.registry().snapshot(&task_id).await)
}

pub async fn scrape(State(state): State<AppState>, Query(params): Query<ScrapeParams>) -> Result<Response, ApiError> {
    let task_id = params.task_id.as_deref().filter(|id| !id.trim().is_empty());
    tracing::info!(college = %params.college, task_id = ?task_id, "Scrape requested");

    let bundle = state.service.extract(&params.college, task_id).await?;
    archive_response(bundle).await
}

/// Streams the archive. The bundle is moved into the body stream and its
/// files are deleted once the stream is dropped.
async fn archive_response(bundle: ExportBundle) -> Result<Response, ApiError> {
    let file = tokio::fs::File::open(bundle.archive_path()).await.map_err(AppError::from)?;
    let length = file.metadata().await.map_err(AppError::from)?.len();
    let disposition = format!("attachment; filename=\"{}\"", bundle.archive_name);

    let stream = ReaderStream::new(file).map(move |chunk| {
        let _bundle = &bundle;
        chunk
    });

    let headers = [
        (header::CONTENT_TYPE, "application/zip".to_string()),
        (header::CONTENT_LENGTH, length.to_string()),
        (header::CONTENT_DISPOSITION, disposition),
    ];
    Ok((headers, Body::from_stream(stream)).into_response())
}
