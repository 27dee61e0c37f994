//! Request Routing
//!
//! Everything between a validated request and an engine call:
//!
//! - `dispatcher` - descriptor lookup, token clamping, generation
//! - `instance_cache` - bounded single-flight engine cache
//! - `metrics` - per-(model, tenant) counters and latency histograms

pub mod dispatcher;
pub mod instance_cache;
pub mod metrics;

pub use dispatcher::{
    effective_max_tokens, new_request_id, DispatchError, Dispatcher, GenerationRequest,
    GenerationResult, DEFAULT_MAX_TOKENS,
};
pub use instance_cache::{CacheError, CacheStats, InstanceCache};
pub use metrics::{LatencyTimer, MetricsError, MetricsRecorder};
