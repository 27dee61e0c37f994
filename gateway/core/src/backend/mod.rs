//! Generation Backends
//!
//! Provider/engine abstraction plus the two production variants. The variant
//! is selected once from configuration.

pub mod mock;
pub mod traits;
pub mod vllm;

use std::sync::Arc;

pub use mock::{mock_completion, MockEngine, MockProvider};
pub use traits::{EngineError, EngineHandle, EngineProvider, GenerationEngine, SamplingParams};
pub use vllm::{VllmEngine, VllmProvider};

use crate::config::{BackendKind, GatewayConfig};

/// Build the provider selected by the configuration
pub fn provider_for(config: &GatewayConfig) -> Result<Arc<dyn EngineProvider>, EngineError> {
    match config.backend {
        BackendKind::Mock => Ok(Arc::new(MockProvider::new())),
        BackendKind::Vllm => Ok(Arc::new(VllmProvider::new(
            config.engine_base_url.clone(),
            config.engine_timeout(),
        )?)),
    }
}
