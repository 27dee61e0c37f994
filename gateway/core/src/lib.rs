//! LLM Gateway Core - Model Catalog, Engine Cache and Dispatch
//!
//! This crate holds everything the gateway does between an HTTP request and a
//! generation engine, independent of any web framework. The daemon crate
//! wraps it in an axum server.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     HTTP surface (daemon)                        │
//! │   POST /v1/vllm/completion     GET /health     GET /metrics      │
//! └───────────────────────────────┬──────────────────────────────────┘
//!                                 │ CompletionRequest + tenant
//! ┌───────────────────────────────┼──────────────────────────────────┐
//! │                      GATEWAY CORE                                │
//! │  ┌────────────────────────────┴───────────────────────────────┐  │
//! │  │                  CompletionHandler                          │  │
//! │  │   validate ─► span ─► Dispatcher ─► MetricsRecorder         │  │
//! │  └────────────────────────────┬───────────────────────────────┘  │
//! │                               │                                  │
//! │  ┌──────────────┐   ┌─────────┴────────┐   ┌──────────────────┐  │
//! │  │ ModelCatalog │◄──│    Dispatcher    │──►│  InstanceCache   │  │
//! │  │ (immutable)  │   │ clamp max_tokens │   │ single-flight,   │  │
//! │  └──────▲───────┘   └──────────────────┘   │ bounded          │  │
//! │         │                                  └────────┬─────────┘  │
//! │  ┌──────┴─────────┐                        ┌────────┴─────────┐  │
//! │  │ RegistryLoader │                        │  EngineProvider  │  │
//! │  │ s3 ─► file     │                        │  vLLM  |  mock   │  │
//! │  └────────────────┘                        └──────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`RegistryLoader`]: loads the catalog once at startup, primary then fallback
//! - [`ModelCatalog`]: identifier to descriptor lookup
//! - [`InstanceCache`]: at most one engine construction per identifier
//! - [`Dispatcher`]: clamps the token limit and runs generation
//! - [`MetricsRecorder`]: per-(model, tenant) counters and latency histograms
//! - [`CompletionHandler`]: request validation, tracing span, metrics
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use llm_gateway_core::{
//!     backend::provider_for, CompletionHandler, CompletionRequest, Dispatcher,
//!     GatewayConfig, InstanceCache, MetricsRecorder, RegistryLoader, RequestLimits,
//! };
//!
//! let config = GatewayConfig::from_env();
//! let catalog = RegistryLoader::from_config(&config).load().await?;
//! let cache = InstanceCache::new(provider_for(&config)?, config.cache_capacity);
//! let dispatcher = Arc::new(Dispatcher::new(Arc::new(catalog), cache));
//! let handler = CompletionHandler::new(
//!     dispatcher,
//!     Arc::new(MetricsRecorder::new()),
//!     RequestLimits::from_env(),
//! );
//!
//! let response = handler
//!     .handle(
//!         CompletionRequest { model_id: "m1".into(), prompt: "hello".into(), max_tokens: 64 },
//!         Some("acme"),
//!     )
//!     .await?;
//! ```
//!
//! # Module Overview
//!
//! - [`backend`]: engine provider abstraction (vLLM, mock)
//! - [`config`]: process configuration from environment and CLI
//! - [`error`]: client-facing error classes
//! - [`handler`]: transport-agnostic request boundary
//! - [`registry`]: registry document, sources, loader and catalog
//! - [`routing`]: dispatcher, instance cache and metrics

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod backend;
pub mod config;
pub mod error;
pub mod handler;
pub mod registry;
pub mod routing;

pub use backend::{provider_for, EngineError, EngineProvider, GenerationEngine, SamplingParams};
pub use config::{BackendKind, ConfigError, ConfigOverrides, GatewayConfig};
pub use error::ErrorClass;
pub use handler::{
    CompletionHandler, CompletionRequest, CompletionResponse, HandlerError, RequestLimits,
    TENANT_HEADER, UNKNOWN_MODEL_LABEL, UNKNOWN_TENANT,
};
pub use registry::{ModelCatalog, ModelDescriptor, RegistryError, RegistryLoader};
pub use routing::{
    CacheError, CacheStats, DispatchError, Dispatcher, GenerationRequest, GenerationResult,
    InstanceCache, MetricsRecorder,
};
