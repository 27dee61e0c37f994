//! HTTP surface
//!
//! Thin axum layer over [`CompletionHandler`]. Handlers deserialize, call the
//! core and translate [`HandlerError`] into a status code and a JSON error
//! body; no other error type reaches a client.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header::{CONTENT_TYPE, RETRY_AFTER};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use llm_gateway_core::{
    CacheStats, CompletionHandler, CompletionRequest, CompletionResponse, DispatchError,
    ErrorClass, HandlerError, TENANT_HEADER,
};

/// Prometheus text exposition content type
const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Shared application state
pub struct AppState {
    handler: CompletionHandler,
    started: Instant,
}

impl AppState {
    pub fn new(handler: CompletionHandler) -> Self {
        Self {
            handler,
            started: Instant::now(),
        }
    }
}

/// Build the gateway router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/vllm/completion", post(completion))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!("Server listening on http://{}", addr);
    info!("API endpoints:");
    info!("  POST /v1/vllm/completion - Text completion");
    info!("  GET  /health - Health check");
    info!("  GET  /metrics - Prometheus metrics");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server stopped");
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

/// Text completion endpoint
async fn completion(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<CompletionRequest>, JsonRejection>,
) -> Result<Json<CompletionResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let tenant = headers.get(TENANT_HEADER).and_then(|v| v.to_str().ok());

    let response = state.handler.handle(request, tenant).await?;
    Ok(Json(response))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    backend: &'static str,
    models: usize,
    uptime_secs: u64,
    cache: CacheStats,
}

/// Health check endpoint
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let dispatcher = state.handler.dispatcher();
    Json(HealthResponse {
        status: "ok",
        service: "llm-gateway",
        backend: dispatcher.cache().provider_name(),
        models: dispatcher.catalog().len(),
        uptime_secs: state.started.elapsed().as_secs(),
        cache: dispatcher.cache().stats(),
    })
}

/// Prometheus scrape endpoint
async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
        state.handler.metrics().render_prometheus(),
    )
}

// ============================================================================
// Errors
// ============================================================================

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub r#type: &'static str,
    pub message: String,
}

/// Client-facing error
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    class: ErrorClass,
    message: String,
    retry_after: bool,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            class: ErrorClass::BadInput,
            message: message.into(),
            retry_after: false,
        }
    }
}

impl From<HandlerError> for ApiError {
    fn from(err: HandlerError) -> Self {
        let status = match &err {
            HandlerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            HandlerError::Dispatch(DispatchError::UnknownModel { .. }) => StatusCode::NOT_FOUND,
            HandlerError::Dispatch(
                DispatchError::CacheExhausted { .. } | DispatchError::EngineUnavailable { .. },
            ) => StatusCode::SERVICE_UNAVAILABLE,
            HandlerError::Dispatch(DispatchError::GenerationFailed { .. }) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        Self {
            status,
            class: err.class(),
            retry_after: err.is_retriable(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: ErrorDetail {
                r#type: self.class.as_str(),
                message: self.message,
            },
        });

        let mut response = (self.status, body).into_response();
        if self.retry_after {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from_static("1"));
        }
        response
    }
}
