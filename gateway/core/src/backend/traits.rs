//! Generation Backend Traits
//!
//! Two seams separate the gateway from whatever actually produces text:
//!
//! - [`EngineProvider`] builds an engine for a model descriptor. This is the
//!   expensive step the instance cache guards.
//! - [`GenerationEngine`] turns a prompt into text. Engines are shared
//!   between concurrent requests, so `generate` takes `&self`.
//!
//! The process picks one provider at startup (real or mock) and never mixes
//! them per request.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::registry::ModelDescriptor;

/// Fixed sampling temperature
pub const DEFAULT_TEMPERATURE: f32 = 0.1;

/// Fixed nucleus sampling mass
pub const DEFAULT_TOP_P: f32 = 0.9;

/// Sampling configuration for one generation call
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SamplingParams {
    /// Temperature
    pub temperature: f32,
    /// Top-p
    pub top_p: f32,
    /// Upper bound on generated tokens (already clamped)
    pub max_tokens: u32,
}

impl SamplingParams {
    /// Low-temperature sampling with the given token limit
    #[must_use]
    pub fn deterministic(max_tokens: u32) -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
            max_tokens,
        }
    }
}

/// Backend failure, during construction or generation
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine server could not be reached
    #[error("engine unreachable: {0}")]
    Unreachable(#[source] reqwest::Error),

    /// The engine server answered with a non-success status
    #[error("engine returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, possibly empty
        body: String,
    },

    /// The engine server does not serve the requested repository
    #[error("model {repo} is not served by the engine")]
    ModelNotServed {
        /// Repository reference that was asked for
        repo: String,
    },

    /// The response body did not have the expected shape
    #[error("malformed engine response: {0}")]
    MalformedResponse(String),

    /// Any other backend-specific failure
    #[error("{0}")]
    Backend(String),
}

/// A constructed, ready-to-use generation engine
#[async_trait]
pub trait GenerationEngine: Send + Sync + std::fmt::Debug {
    /// Generate a completion for `prompt`
    async fn generate(&self, prompt: &str, params: SamplingParams) -> Result<String, EngineError>;
}

/// Shared engine handle, cloned out of the instance cache per request
pub type EngineHandle = Arc<dyn GenerationEngine>;

/// Builds engines for model descriptors
#[async_trait]
pub trait EngineProvider: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &'static str;

    /// Construct an engine for `descriptor`
    async fn create(&self, descriptor: &ModelDescriptor) -> Result<EngineHandle, EngineError>;
}
