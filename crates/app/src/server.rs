use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
        DefaultBodyLimit, Multipart, State,
    },
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use pdf_ask_core::{Answer, IngestError, IngestOutcome, QueryError, QuestionRequest, RagPipeline};
use serde::Serialize;
use serde_json::json;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::DEFAULT_MAX_UPLOAD_BYTES;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RagPipeline>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub allowed_origins: Vec<String>,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8000)),
            allowed_origins: Vec::new(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

pub fn app_router(state: AppState, config: &ServerConfig) -> anyhow::Result<Router> {
    let origins = config
        .allowed_origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin).with_context(|| format!("invalid CORS origin '{origin}'"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request());

    Ok(Router::new()
        .route("/health", get(health))
        .route("/embed-and-vectorize", post(embed_and_vectorize))
        .route("/ask-question", post(ask_question))
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http()))
}

pub async fn run_server(config: ServerConfig, pipeline: RagPipeline) -> anyhow::Result<()> {
    let state = AppState {
        pipeline: Arc::new(pipeline),
    };
    let app = app_router(state, &config)?;

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    info!(addr = %config.bind, origins = ?config.allowed_origins, "pdf-ask listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Failure of one endpoint. Every variant is reported as a 500 carrying a
/// `detail` message and a machine-readable `kind`.
#[derive(Debug)]
pub enum ApiError {
    Pdf(IngestError),
    Question(QueryError),
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
    kind: &'static str,
}

impl From<MultipartError> for ApiError {
    fn from(error: MultipartError) -> Self {
        ApiError::Pdf(IngestError::InvalidArgument(format!(
            "malformed multipart body: {}",
            error.body_text()
        )))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (detail, kind) = match &self {
            ApiError::Pdf(error) => (format!("Error processing PDF: {error}"), error.kind()),
            ApiError::Question(error) => {
                (format!("Error processing question: {error}"), error.kind())
            }
        };
        error!(kind = kind.as_str(), %detail, "request failed");

        let body = Json(ErrorBody {
            detail,
            kind: kind.as_str(),
        });
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

async fn embed_and_vectorize(
    State(state): State<AppState>,
    payload: Result<Multipart, MultipartRejection>,
) -> Result<StatusCode, ApiError> {
    let mut multipart = payload.map_err(|rejection| {
        ApiError::Pdf(IngestError::InvalidArgument(rejection.body_text()))
    })?;
    let mut pdf_file = None;
    let mut file_name = None;

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("pdf_file") => pdf_file = Some(field.bytes().await?),
            Some("file_name") => file_name = Some(field.text().await?),
            _ => {}
        }
    }

    let pdf_file = pdf_file.ok_or_else(|| {
        ApiError::Pdf(IngestError::InvalidArgument("missing field 'pdf_file'".to_string()))
    })?;
    let file_name = file_name.ok_or_else(|| {
        ApiError::Pdf(IngestError::InvalidArgument("missing field 'file_name'".to_string()))
    })?;

    let outcome = state
        .pipeline
        .ingest(&file_name, &pdf_file)
        .await
        .map_err(ApiError::Pdf)?;

    match outcome {
        IngestOutcome::Indexed { chunk_count } => {
            info!(file_name = %file_name, chunk_count, "pdf indexed")
        }
        IngestOutcome::AlreadyIndexed { stale } => {
            info!(file_name = %file_name, stale, "pdf already indexed")
        }
    }
    Ok(StatusCode::OK)
}

async fn ask_question(
    State(state): State<AppState>,
    payload: Result<Json<QuestionRequest>, JsonRejection>,
) -> Result<Json<Answer>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        ApiError::Question(QueryError::InvalidArgument(rejection.body_text()))
    })?;

    let answer = state
        .pipeline
        .ask(&request.file_name, &request.question)
        .await
        .map_err(ApiError::Question)?;
    Ok(Json(answer))
}
