//! Generation Dispatcher
//!
//! Resolves a request to a descriptor and an engine, clamps the token limit
//! to the model's ceiling and runs generation. Every failure leaves here as a
//! [`DispatchError`], which maps onto the three client-visible classes.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use super::instance_cache::{CacheError, InstanceCache};
use crate::backend::{EngineError, SamplingParams};
use crate::error::ErrorClass;
use crate::registry::{CatalogError, ModelCatalog};

/// Token limit used when the client does not send one
pub const DEFAULT_MAX_TOKENS: u32 = 512;

/// Fresh request identifier
#[must_use]
pub fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// One generation request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Catalog identifier
    pub model_id: String,
    /// Prompt text
    pub prompt: String,
    /// Requested token limit, before clamping
    pub max_tokens: u32,
}

impl GenerationRequest {
    /// Create a request with the default token limit
    pub fn new(model_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            prompt: prompt.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Set the requested token limit
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Successful generation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Identifier assigned to this request
    pub request_id: String,
    /// Generated text
    pub output: String,
    /// Model identifier as requested
    pub model_id: String,
}

/// Dispatch failure
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The catalog has no such model; no engine was constructed
    #[error("unknown model_id={model_id}")]
    UnknownModel {
        /// Requested identifier
        model_id: String,
    },

    /// The instance cache is full
    #[error("no capacity to load model {model_id} ({capacity} engines resident)")]
    CacheExhausted {
        /// Requested identifier
        model_id: String,
        /// Cache ceiling
        capacity: usize,
    },

    /// The engine could not be constructed
    #[error("engine for {model_id} is unavailable")]
    EngineUnavailable {
        /// Requested identifier
        model_id: String,
        /// Construction failure
        #[source]
        source: Arc<EngineError>,
    },

    /// The engine was available but generation failed
    #[error("generation failed for {model_id}")]
    GenerationFailed {
        /// Requested identifier
        model_id: String,
        /// Engine failure
        #[source]
        source: EngineError,
    },
}

impl DispatchError {
    /// Error class for the transport layer
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::UnknownModel { .. } => ErrorClass::NotFound,
            Self::CacheExhausted { .. }
            | Self::EngineUnavailable { .. }
            | Self::GenerationFailed { .. } => ErrorClass::Unavailable,
        }
    }

    /// Whether a client may reasonably retry shortly
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::CacheExhausted { .. })
    }
}

impl From<CatalogError> for DispatchError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(model_id) => Self::UnknownModel { model_id },
        }
    }
}

fn from_cache_error(model_id: &str, err: CacheError) -> DispatchError {
    match err {
        CacheError::Exhausted { capacity } => DispatchError::CacheExhausted {
            model_id: model_id.to_string(),
            capacity,
        },
        CacheError::Construction { source, .. } => DispatchError::EngineUnavailable {
            model_id: model_id.to_string(),
            source,
        },
    }
}

/// Routes generation requests to cached engines
#[derive(Debug)]
pub struct Dispatcher {
    catalog: Arc<ModelCatalog>,
    cache: InstanceCache,
}

impl Dispatcher {
    /// Create a dispatcher over a loaded catalog
    pub fn new(catalog: Arc<ModelCatalog>, cache: InstanceCache) -> Self {
        Self { catalog, cache }
    }

    /// Model catalog
    #[must_use]
    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// Engine cache
    #[must_use]
    pub fn cache(&self) -> &InstanceCache {
        &self.cache
    }

    /// Dispatch with a freshly generated request id
    pub async fn dispatch(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, DispatchError> {
        self.dispatch_with_id(new_request_id(), request).await
    }

    /// Dispatch under a caller-supplied request id
    pub async fn dispatch_with_id(
        &self,
        request_id: String,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, DispatchError> {
        let descriptor = self.catalog.lookup(&request.model_id)?;

        let engine = self
            .cache
            .get_or_create(&descriptor)
            .await
            .map_err(|e| from_cache_error(&request.model_id, e))?;

        let max_tokens = effective_max_tokens(request.max_tokens, descriptor.max_tokens);
        debug!(
            request_id = %request_id,
            model_id = %request.model_id,
            requested = request.max_tokens,
            effective = max_tokens,
            "Dispatching generation"
        );

        let output = engine
            .generate(&request.prompt, SamplingParams::deterministic(max_tokens))
            .await
            .map_err(|source| DispatchError::GenerationFailed {
                model_id: request.model_id.clone(),
                source,
            })?;

        Ok(GenerationResult {
            request_id,
            output,
            model_id: request.model_id.clone(),
        })
    }
}

/// Clamp the requested limit into `1..=ceiling`
#[must_use]
pub fn effective_max_tokens(requested: u32, ceiling: u32) -> u32 {
    requested.min(ceiling).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{EngineHandle, EngineProvider, GenerationEngine, MockProvider};
    use crate::registry::ModelDescriptor;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn catalog() -> Arc<ModelCatalog> {
        Arc::new(
            ModelCatalog::from_descriptors(vec![
                ModelDescriptor::new("m1", "org/m1", 256),
                ModelDescriptor::new("m2", "org/m2", 4096),
            ])
            .unwrap(),
        )
    }

    /// Engine that records the sampling parameters it was called with
    #[derive(Debug, Default)]
    struct RecordingEngine {
        seen: Mutex<Vec<SamplingParams>>,
        fail: bool,
    }

    #[async_trait]
    impl GenerationEngine for RecordingEngine {
        async fn generate(
            &self,
            _prompt: &str,
            params: SamplingParams,
        ) -> Result<String, EngineError> {
            self.seen.lock().push(params);
            if self.fail {
                return Err(EngineError::Backend("CUDA out of memory".to_string()));
            }
            Ok("ok".to_string())
        }
    }

    struct RecordingProvider {
        engine: Arc<RecordingEngine>,
        creates: AtomicUsize,
    }

    #[async_trait]
    impl EngineProvider for RecordingProvider {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn create(&self, _descriptor: &ModelDescriptor) -> Result<EngineHandle, EngineError> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            Ok(self.engine.clone())
        }
    }

    fn recording(fail: bool) -> (Dispatcher, Arc<RecordingProvider>) {
        let provider = Arc::new(RecordingProvider {
            engine: Arc::new(RecordingEngine {
                fail,
                ..Default::default()
            }),
            creates: AtomicUsize::new(0),
        });
        let cache = InstanceCache::new(provider.clone(), 4);
        (Dispatcher::new(catalog(), cache), provider)
    }

    #[test]
    fn test_effective_max_tokens() {
        assert_eq!(effective_max_tokens(512, 256), 256);
        assert_eq!(effective_max_tokens(100, 256), 100);
        assert_eq!(effective_max_tokens(256, 256), 256);
        assert_eq!(effective_max_tokens(0, 256), 1);
        assert_eq!(effective_max_tokens(u32::MAX, 4096), 4096);
    }

    #[tokio::test]
    async fn test_token_limit_is_clamped() {
        let (dispatcher, provider) = recording(false);

        dispatcher
            .dispatch(&GenerationRequest::new("m1", "hi").with_max_tokens(512))
            .await
            .unwrap();
        dispatcher
            .dispatch(&GenerationRequest::new("m2", "hi").with_max_tokens(512))
            .await
            .unwrap();

        let seen = provider.engine.seen.lock();
        assert_eq!(seen[0].max_tokens, 256);
        assert_eq!(seen[1].max_tokens, 512);
        assert_eq!(seen[0], SamplingParams::deterministic(256));
    }

    #[tokio::test]
    async fn test_oversized_request_gets_model_ceiling() {
        use crate::handler::{CompletionHandler, CompletionRequest, RequestLimits};
        use crate::routing::MetricsRecorder;

        let (dispatcher, provider) = recording(false);
        let handler = CompletionHandler::new(
            Arc::new(dispatcher),
            Arc::new(MetricsRecorder::new()),
            RequestLimits::default(),
        );
        let request: CompletionRequest = serde_json::from_str(
            r#"{"model_id":"m1","prompt":"hi","max_tokens":5000000000}"#,
        )
        .unwrap();

        handler.handle(request, None).await.unwrap();

        assert_eq!(provider.engine.seen.lock()[0].max_tokens, 256);
    }

    #[tokio::test]
    async fn test_unknown_model_constructs_nothing() {
        let (dispatcher, provider) = recording(false);

        let err = dispatcher
            .dispatch(&GenerationRequest::new("nope", "hi"))
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::UnknownModel { ref model_id } if model_id == "nope"));
        assert_eq!(err.class(), ErrorClass::NotFound);
        assert_eq!(provider.creates.load(Ordering::SeqCst), 0);
        assert_eq!(dispatcher.cache().stats().constructions, 0);
    }

    #[tokio::test]
    async fn test_generation_failure_keeps_cause() {
        let (dispatcher, _) = recording(true);

        let err = dispatcher
            .dispatch(&GenerationRequest::new("m1", "hi"))
            .await
            .unwrap_err();

        assert_eq!(err.class(), ErrorClass::Unavailable);
        assert!(matches!(
            err,
            DispatchError::GenerationFailed { source: EngineError::Backend(ref msg), .. }
                if msg == "CUDA out of memory"
        ));
    }

    #[tokio::test]
    async fn test_mock_mode_output() {
        let cache = InstanceCache::new(Arc::new(MockProvider::new()), 4);
        let dispatcher = Dispatcher::new(catalog(), cache);

        let result = dispatcher
            .dispatch_with_id(
                "req-1".to_string(),
                &GenerationRequest::new("m1", "hello world"),
            )
            .await
            .unwrap();

        assert_eq!(result.request_id, "req-1");
        assert_eq!(result.model_id, "m1");
        assert_eq!(
            result.output,
            "[FAKE RESPONSE] Model: m1 | Prompt: hello world..."
        );
    }

    #[tokio::test]
    async fn test_cache_exhaustion_is_retriable() {
        let cache = InstanceCache::new(Arc::new(MockProvider::new()), 1);
        let dispatcher = Dispatcher::new(catalog(), cache);

        dispatcher
            .dispatch(&GenerationRequest::new("m1", "a"))
            .await
            .unwrap();
        let err = dispatcher
            .dispatch(&GenerationRequest::new("m2", "a"))
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::CacheExhausted { capacity: 1, .. }));
        assert!(err.is_retriable());
        assert_eq!(err.class(), ErrorClass::Unavailable);
    }

    #[test]
    fn test_request_ids_are_unique() {
        assert_ne!(new_request_id(), new_request_id());
    }
}
