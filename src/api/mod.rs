// HTTP API
// axum routes for upload, chat, collection inspection, reset and host status

pub mod errors;
pub mod handlers;
pub mod models;
pub mod status;


use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::pipeline::DocumentPipeline;
use crate::{DocMindError, Result};

pub use errors::ApiError;
pub use models::ModelSummary;

/// Handles shared by every request
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<DocumentPipeline>,
    pub models: Arc<ModelSummary>,
}

impl AppState {
    #[inline]
    pub fn new(pipeline: DocumentPipeline, models: ModelSummary) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            models: Arc::new(models),
        }
    }

    /// Describe the models `pipeline` was built with under `config`
    #[inline]
    pub fn from_pipeline(config: &Config, pipeline: DocumentPipeline) -> Self {
        let models = ModelSummary {
            embedding_model: pipeline.embedder().model().to_string(),
            embedding_dimensions: pipeline.embedder().dimension(),
            llm_provider: config.provider.to_string(),
            llm_model: config.chat_model(config.provider).to_string(),
        };
        Self::new(pipeline, models)
    }
}

/// Build the router with CORS, request tracing and the upload size limit
#[inline]
pub fn create_app(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/api/upload", post(handlers::upload))
        .route("/api/chat", post(handlers::chat))
        .route("/api/debug/stats", get(handlers::stats))
        .route("/api/debug/documents", get(handlers::documents))
        .route("/api/reset", post(handlers::reset))
        .route("/api/system/status", get(handlers::system_status))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Build every service from `config` and serve until the process exits
#[inline]
pub async fn serve(config: &Config) -> Result<()> {
    let pipeline = DocumentPipeline::from_config(config).await?;
    let state = AppState::from_pipeline(config, pipeline);
    let app = create_app(state, config.server.max_upload_bytes);

    let listener =
        tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port))
            .await
            .map_err(|e| {
                DocMindError::Config(format!(
                    "Failed to bind {}:{}: {}",
                    config.server.host, config.server.port, e
                ))
            })?;
    info!("DocMind API listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
