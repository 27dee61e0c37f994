//! vLLM Backend Implementation
//!
//! Engine provider for an OpenAI-compatible vLLM server.
//!
//! # vLLM API
//!
//! - `/v1/models` - List served models (used as the construction probe)
//! - `/v1/completions` - Non-streaming text completion
//!
//! The descriptor's repository reference is the served-model name. The
//! server loads weights itself, so "constructing" an engine here means
//! confirming the model is served and keeping a client bound to it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::traits::{EngineError, EngineHandle, EngineProvider, GenerationEngine, SamplingParams};
use crate::registry::ModelDescriptor;

/// Probe timeout for the model listing
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// vLLM engine provider
#[derive(Clone, Debug)]
pub struct VllmProvider {
    /// Server base URL, without trailing slash
    base_url: String,
    /// HTTP client shared by every engine this provider builds
    http_client: reqwest::Client,
}

impl VllmProvider {
    /// Create a provider for `base_url` with a per-request timeout
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, EngineError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::Backend(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
        })
    }

    /// Base URL
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn models_url(&self) -> String {
        format!("{}/v1/models", self.base_url)
    }

    /// Names of the models the server currently serves
    pub async fn served_models(&self) -> Result<Vec<String>, EngineError> {
        let response = self
            .http_client
            .get(self.models_url())
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map_err(EngineError::Unreachable)?;

        let response = check_status(response).await?;
        let listing: ModelList = response
            .json()
            .await
            .map_err(|e| EngineError::MalformedResponse(e.to_string()))?;

        Ok(listing.data.into_iter().map(|m| m.id).collect())
    }
}

#[async_trait]
impl EngineProvider for VllmProvider {
    fn name(&self) -> &'static str {
        "vllm"
    }

    async fn create(&self, descriptor: &ModelDescriptor) -> Result<EngineHandle, EngineError> {
        let served = self.served_models().await?;
        if !served.iter().any(|name| name == &descriptor.repo) {
            return Err(EngineError::ModelNotServed {
                repo: descriptor.repo.clone(),
            });
        }

        info!(
            model_id = %descriptor.id,
            repo = %descriptor.repo,
            revision = %descriptor.revision,
            quantization = descriptor.quantization.as_deref().unwrap_or("none"),
            "vLLM engine ready"
        );

        Ok(Arc::new(VllmEngine {
            completions_url: format!("{}/v1/completions", self.base_url),
            served_model: descriptor.repo.clone(),
            http_client: self.http_client.clone(),
        }))
    }
}

/// Engine bound to one served model
#[derive(Clone, Debug)]
pub struct VllmEngine {
    completions_url: String,
    served_model: String,
    http_client: reqwest::Client,
}

#[async_trait]
impl GenerationEngine for VllmEngine {
    async fn generate(&self, prompt: &str, params: SamplingParams) -> Result<String, EngineError> {
        let body = CompletionBody {
            model: &self.served_model,
            prompt,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            top_p: params.top_p,
        };

        debug!(model = %self.served_model, max_tokens = params.max_tokens, "Sending completion");

        let response = self
            .http_client
            .post(&self.completions_url)
            .json(&body)
            .send()
            .await
            .map_err(EngineError::Unreachable)?;

        let response = check_status(response).await?;
        let completion: CompletionReply = response
            .json()
            .await
            .map_err(|e| EngineError::MalformedResponse(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.text)
            .ok_or_else(|| EngineError::MalformedResponse("response has no choices".to_string()))
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, EngineError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(EngineError::Status {
        status: status.as_u16(),
        body,
    })
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Deserialize)]
struct CompletionReply {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    text: String,
}

#[derive(Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}
