//! Completion Request Handler
//!
//! Transport-agnostic request boundary: validates the inbound request,
//! resolves the tenant, runs the dispatcher inside a request span and
//! records metrics. The HTTP layer only deserializes, calls
//! [`CompletionHandler::handle`] and maps [`HandlerError::class`] to a status.

use std::error::Error as _;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, info_span, Instrument};

use crate::error::ErrorClass;
use crate::routing::{
    new_request_id, DispatchError, Dispatcher, GenerationRequest, GenerationResult,
    MetricsRecorder, DEFAULT_MAX_TOKENS,
};

/// Header carrying the calling organization
pub const TENANT_HEADER: &str = "x-org-id";

/// Tenant used when the header is missing or blank
pub const UNKNOWN_TENANT: &str = "unknown";

/// Longest accepted model identifier, in bytes
pub const MAX_MODEL_ID_BYTES: usize = 256;

/// Longest accepted tenant identifier, in bytes
pub const MAX_TENANT_BYTES: usize = 128;

/// Metrics label for requests naming a model outside the catalog
pub const UNKNOWN_MODEL_LABEL: &str = "unknown";

fn default_max_tokens() -> u64 {
    u64::from(DEFAULT_MAX_TOKENS)
}

/// Inbound completion request body
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Catalog identifier
    pub model_id: String,
    /// Prompt text
    pub prompt: String,
    /// Requested token limit, clamped to the model ceiling at dispatch
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u64,
}

impl CompletionRequest {
    /// Requested limit saturated into the engine's token range
    #[must_use]
    pub fn requested_tokens(&self) -> u32 {
        u32::try_from(self.max_tokens).unwrap_or(u32::MAX)
    }
}

/// Completion response body
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Request identifier
    pub request_id: String,
    /// Generated text
    pub output: String,
    /// Model identifier as requested
    pub model_id: String,
}

impl From<GenerationResult> for CompletionResponse {
    fn from(result: GenerationResult) -> Self {
        Self {
            request_id: result.request_id,
            output: result.output,
            model_id: result.model_id,
        }
    }
}

/// Size limits on inbound requests
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestLimits {
    /// Maximum prompt size in bytes (default: 100KB)
    pub max_prompt_bytes: usize,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            max_prompt_bytes: 100 * 1024, // 100KB
        }
    }
}

impl RequestLimits {
    /// Create limits from environment variables with fallback to defaults
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_prompt_bytes: std::env::var("GATEWAY_MAX_PROMPT_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_prompt_bytes),
        }
    }

    /// Check a request against these limits
    pub fn validate(&self, request: &CompletionRequest) -> Result<(), HandlerError> {
        if request.model_id.trim().is_empty() {
            return Err(HandlerError::BadRequest("model_id must not be empty".to_string()));
        }
        if request.model_id.len() > MAX_MODEL_ID_BYTES {
            return Err(HandlerError::BadRequest(format!(
                "model_id exceeds {MAX_MODEL_ID_BYTES} bytes"
            )));
        }
        if request.prompt.len() > self.max_prompt_bytes {
            return Err(HandlerError::BadRequest(format!(
                "prompt exceeds {} bytes",
                self.max_prompt_bytes
            )));
        }
        if request.max_tokens == 0 {
            return Err(HandlerError::BadRequest("max_tokens must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Resolve the tenant from an optional header value
pub fn resolve_tenant(header: Option<&str>) -> Result<String, HandlerError> {
    match header.map(str::trim) {
        None | Some("") => Ok(UNKNOWN_TENANT.to_string()),
        Some(tenant) if tenant.len() > MAX_TENANT_BYTES => Err(HandlerError::BadRequest(
            format!("{TENANT_HEADER} exceeds {MAX_TENANT_BYTES} bytes"),
        )),
        Some(tenant) => Ok(tenant.to_string()),
    }
}

/// Request-boundary failure
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The request was rejected before dispatch
    #[error("{0}")]
    BadRequest(String),

    /// Dispatch failed
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl HandlerError {
    /// Error class for the transport layer
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::BadRequest(_) => ErrorClass::BadInput,
            Self::Dispatch(e) => e.class(),
        }
    }

    /// Whether a client may reasonably retry shortly
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Dispatch(e) if e.is_retriable())
    }
}

/// Validates, dispatches and records completion requests
#[derive(Clone, Debug)]
pub struct CompletionHandler {
    dispatcher: Arc<Dispatcher>,
    metrics: Arc<MetricsRecorder>,
    limits: RequestLimits,
}

impl CompletionHandler {
    /// Create a handler
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        metrics: Arc<MetricsRecorder>,
        limits: RequestLimits,
    ) -> Self {
        Self {
            dispatcher,
            metrics,
            limits,
        }
    }

    /// Dispatcher behind this handler
    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Metrics recorder
    #[must_use]
    pub fn metrics(&self) -> &MetricsRecorder {
        &self.metrics
    }

    /// Handle one completion request
    ///
    /// Bad input is rejected here and records nothing. Anything that reaches
    /// the dispatcher records one latency observation for its (model, tenant)
    /// pair, even if the caller drops this future part-way through, and one
    /// request count once dispatch returns. Model ids outside the catalog are
    /// recorded under [`UNKNOWN_MODEL_LABEL`] so clients cannot mint series.
    pub async fn handle(
        &self,
        request: CompletionRequest,
        tenant: Option<&str>,
    ) -> Result<CompletionResponse, HandlerError> {
        let tenant = resolve_tenant(tenant)?;
        self.limits.validate(&request)?;

        let request_id = new_request_id();
        let span = info_span!(
            "completion",
            request_id = %request_id,
            model_id = %request.model_id,
            tenant = %tenant,
        );

        let model_label = self.model_label(&request.model_id);

        async move {
            let _timer = self.metrics.start_timer(&model_label, &tenant);
            let generation = GenerationRequest {
                max_tokens: request.requested_tokens(),
                model_id: request.model_id,
                prompt: request.prompt,
            };

            let result = self
                .dispatcher
                .dispatch_with_id(request_id, &generation)
                .await;
            self.metrics.record_request(&model_label, &tenant);

            match result {
                Ok(result) => {
                    info!(output_chars = result.output.chars().count(), "Completion served");
                    Ok(result.into())
                }
                Err(e) => {
                    log_failure(&e);
                    Err(e.into())
                }
            }
        }
        .instrument(span)
        .await
    }

    fn model_label(&self, model_id: &str) -> String {
        match self.dispatcher.catalog().lookup(model_id) {
            Ok(descriptor) => descriptor.id.clone(),
            Err(_) => UNKNOWN_MODEL_LABEL.to_string(),
        }
    }
}

fn log_failure(err: &DispatchError) {
    match err.class() {
        ErrorClass::NotFound => info!(error = %err, "Unknown model requested"),
        _ => {
            let mut chain = err.to_string();
            let mut source = err.source();
            while let Some(cause) = source {
                chain.push_str(": ");
                chain.push_str(&cause.to_string());
                source = cause.source();
            }
            error!(error = %chain, class = %err.class(), "Completion failed");
        }
    }
}
