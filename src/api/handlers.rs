use axum::{
    Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
};
use axum_extra::extract::{Multipart, multipart::MultipartRejection};
use tracing::{debug, info};

use super::AppState;
use super::errors::ApiError;
use super::models::{
    ChatRequest, DocumentsQuery, HealthResponse, ResetResponse, RootResponse,
    SystemStatusResponse, UploadResponse,
};
use super::status::collect_system_status;
use crate::config::Provider;
use crate::database::{CollectionStats, StoredDocument};
use crate::pipeline::ChatAnswer;

const UPLOAD_FIELD: &str = "file";

#[inline]
#[expect(clippy::unused_async, reason = "axum handlers must be async")]
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "DocMind AI API is running".to_string(),
        status: "active".to_string(),
    })
}

#[inline]
#[expect(clippy::unused_async, reason = "axum handlers must be async")]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "api".to_string(),
    })
}

#[inline]
pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut multipart = multipart.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(e.status(), e.body_text()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::bad_request("Uploaded file has no filename"))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::new(e.status(), e.body_text()))?;

        upload = Some((filename, bytes));
        break;
    }

    let (filename, bytes) =
        upload.ok_or_else(|| ApiError::bad_request("Missing multipart field 'file'"))?;
    debug!("Received upload {} ({} bytes)", filename, bytes.len());

    let report = state.pipeline.ingest_upload(&filename, &bytes).await?;

    Ok(Json(UploadResponse {
        message: "Document processed successfully".to_string(),
        chunks_count: report.chunks_count,
        filename: report.filename,
        warning: report.warning,
    }))
}

#[inline]
pub async fn chat(
    State(state): State<AppState>,
    request: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatAnswer>, ApiError> {
    let Json(request) = request.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let provider = match request.model.as_deref() {
        None => Provider::default(),
        Some(model) => model
            .parse::<Provider>()
            .map_err(|e| ApiError::bad_request(e.to_string()))?,
    };

    let answer = state.pipeline.answer(&request.question, provider).await?;
    Ok(Json(answer))
}

#[inline]
pub async fn stats(State(state): State<AppState>) -> Json<CollectionStats> {
    Json(state.pipeline.stats().await)
}

#[inline]
pub async fn documents(
    State(state): State<AppState>,
    query: Result<Query<DocumentsQuery>, QueryRejection>,
) -> Result<Json<Vec<StoredDocument>>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    Ok(Json(state.pipeline.sample(query.limit).await))
}

#[inline]
pub async fn reset(State(state): State<AppState>) -> Result<Json<ResetResponse>, ApiError> {
    if !state.pipeline.reset().await {
        return Err(ApiError::internal("Failed to reset database"));
    }

    info!("Vector store reset through the API");
    Ok(Json(ResetResponse {
        message: "Database cleared successfully".to_string(),
        status: "empty".to_string(),
    }))
}

#[inline]
pub async fn system_status(
    State(state): State<AppState>,
) -> Result<Json<SystemStatusResponse>, ApiError> {
    let models = state.models.as_ref().clone();
    let status = tokio::task::spawn_blocking(move || collect_system_status(models))
        .await
        .map_err(|e| ApiError::internal(format!("Failed to collect system status: {}", e)))?;
    Ok(Json(status))
}
