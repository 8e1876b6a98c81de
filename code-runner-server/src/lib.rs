use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use code_runner::{
    languages, CodeExecutionService, ErrorKind, ExecutionRequest, RunResponse, RunnerConfig,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{future::Future, net::SocketAddr, sync::Arc};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

/// Default cap on a `/run` request body
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    ExecutionError(#[from] code_runner::Error),
    #[error("Server error: {0}")]
    ServerError(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        // the client reads the body, so job and request failures stay 200
        match self {
            ServerError::InvalidRequest(message) => (
                StatusCode::OK,
                Json(RunResponse::error(ErrorKind::InvalidRequest, message)),
            )
                .into_response(),
            ServerError::ExecutionError(e) => {
                (StatusCode::OK, Json(RunResponse::from(e))).into_response()
            }
            ServerError::ServerError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error" })),
            )
                .into_response(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RunRequest {
    pub code: String,
    pub language: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub container_available: bool,
    pub languages: Vec<String>,
}

#[derive(Clone)]
pub struct AppState {
    service: Arc<CodeExecutionService>,
}

impl AppState {
    pub fn new(service: CodeExecutionService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

/// Build the service from `config`, start its backend monitor and wrap it in
/// the HTTP router.
pub async fn create_app(config: RunnerConfig, max_body_bytes: usize) -> Result<Router, ServerError> {
    let service = CodeExecutionService::new(config).await?;
    service.start_monitor();
    Ok(router(AppState::new(service), max_body_bytes))
}

pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(status))
        .route("/run", post(run))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub async fn run_server(app: Router, addr: SocketAddr) -> Result<(), ServerError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::ServerError(e.to_string()))?;
    serve(listener, app, shutdown_signal()).await
}

/// Serve `app` on an already bound listener until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener
        .local_addr()
        .map_err(|e| ServerError::ServerError(e.to_string()))?;
    info!("Starting code runner server on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ServerError::ServerError(e.to_string()))?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn health_check() -> &'static str {
    "OK"
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        container_available: state.service.container_available(),
        languages: languages::profiles()
            .iter()
            .map(|profile| profile.language.to_string())
            .collect(),
    })
}

async fn run(
    State(state): State<AppState>,
    payload: Result<Json<RunRequest>, JsonRejection>,
) -> Result<Json<RunResponse>, ServerError> {
    let Json(payload) = payload.map_err(|rejection| {
        warn!("Rejected /run request: {}", rejection.body_text());
        ServerError::InvalidRequest(rejection.body_text())
    })?;

    let result = state
        .service
        .execute(ExecutionRequest::new(payload.language, payload.code))
        .await?;

    Ok(Json(RunResponse::from(result)))
}
