//! Mock Backend
//!
//! Synthetic, deterministic completions for development and tests. Building a
//! mock engine costs nothing, so the instance cache only ever stores cheap
//! handles in this mode.

use std::sync::Arc;

use async_trait::async_trait;

use super::traits::{EngineError, EngineHandle, EngineProvider, GenerationEngine, SamplingParams};
use crate::registry::ModelDescriptor;

/// Number of prompt characters echoed back
pub const PROMPT_PREVIEW_CHARS: usize = 50;

/// Format a synthetic completion
///
/// The preview is cut on character boundaries so multi-byte prompts never
/// split a code point.
#[must_use]
pub fn mock_completion(model_id: &str, prompt: &str) -> String {
    let preview: String = prompt.chars().take(PROMPT_PREVIEW_CHARS).collect();
    format!("[FAKE RESPONSE] Model: {model_id} | Prompt: {preview}...")
}

/// Provider of mock engines
#[derive(Clone, Debug, Default)]
pub struct MockProvider;

impl MockProvider {
    /// Create a mock provider
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EngineProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn create(&self, descriptor: &ModelDescriptor) -> Result<EngineHandle, EngineError> {
        Ok(Arc::new(MockEngine {
            model_id: descriptor.id.clone(),
        }))
    }
}

/// Engine that echoes the model id and a prompt preview
#[derive(Clone, Debug)]
pub struct MockEngine {
    model_id: String,
}

impl MockEngine {
    /// Create a mock engine for `model_id`
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
        }
    }
}

#[async_trait]
impl GenerationEngine for MockEngine {
    async fn generate(&self, prompt: &str, _params: SamplingParams) -> Result<String, EngineError> {
        Ok(mock_completion(&self.model_id, prompt))
    }
}
