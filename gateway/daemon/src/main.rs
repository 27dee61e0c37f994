//! LLM Gateway Daemon
//!
//! HTTP front door for the model catalog: loads the registry once, picks the
//! generation backend and serves completions until interrupted.
//!
//! # Usage
//!
//! ```bash
//! # Defaults: registry from object storage, vLLM at localhost:8000
//! llm-gateway
//!
//! # Local registry file, synthetic responses
//! llm-gateway --registry-uri file://./models.yaml --mock
//!
//! # With verbose logging
//! RUST_LOG=debug llm-gateway
//! ```
//!
//! # Environment Variables
//!
//! - `MODELS_REGISTRY_S3_URI`: Primary registry URI (`s3://bucket/key` or `file://path`)
//! - `MODELS_REGISTRY_LOCAL_PATH`: Fallback registry file (default: models.yaml)
//! - `S3_ENDPOINT_URL`: Object-storage endpoint override
//! - `USE_FAKE_LLM`: Serve synthetic responses instead of calling vLLM
//! - `VLLM_BASE_URL`: vLLM server base URL (default: http://localhost:8000)
//! - `GATEWAY_HOST` / `GATEWAY_PORT`: Listen address (default: 0.0.0.0:8205)
//! - `GATEWAY_CACHE_CAPACITY`: Maximum resident engines (default: 16)
//! - `GATEWAY_MAX_PROMPT_BYTES`: Prompt size limit (default: 102400)
//! - `RUST_LOG`: Log filter
//!
//! Command-line flags override the environment.
//!
//! # Signals
//!
//! - SIGTERM/SIGINT: Graceful shutdown (in-flight requests finish)

mod server;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use llm_gateway_core::{
    provider_for, CompletionHandler, ConfigOverrides, Dispatcher, GatewayConfig, InstanceCache,
    MetricsRecorder, RegistryLoader, RequestLimits,
};

use crate::server::AppState;

/// Log directives used when `RUST_LOG` is unset
const DEFAULT_LOG_FILTER: &str = "llm_gateway_daemon=info,llm_gateway_core=info,tower_http=info";

/// LLM gateway HTTP server
#[derive(Debug, Parser)]
#[command(name = "llm-gateway", version, about)]
struct Args {
    /// Listen host
    #[arg(long)]
    host: Option<String>,

    /// Listen port
    #[arg(long)]
    port: Option<u16>,

    /// Primary registry URI (s3://bucket/key or file://path)
    #[arg(long)]
    registry_uri: Option<String>,

    /// Fallback registry file
    #[arg(long)]
    registry_file: Option<PathBuf>,

    /// Serve synthetic responses instead of calling the engine
    #[arg(long)]
    mock: bool,

    /// Maximum number of resident engines
    #[arg(long)]
    cache_capacity: Option<usize>,
}

impl From<Args> for ConfigOverrides {
    fn from(args: Args) -> Self {
        Self {
            host: args.host,
            port: args.port,
            registry_uri: args.registry_uri,
            registry_file: args.registry_file,
            mock: args.mock,
            cache_capacity: args.cache_capacity,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_target(true)
        .init();

    let mut config = GatewayConfig::from_env();
    config.apply(args.into());
    config.validate().context("invalid gateway configuration")?;

    info!(
        backend = ?config.backend,
        registry = %config.registry_uri,
        fallback = %config.registry_fallback_path.display(),
        cache_capacity = config.cache_capacity,
        "Starting LLM gateway"
    );

    let catalog = RegistryLoader::from_config(&config)
        .load()
        .await
        .context("cannot start without a model registry")?;
    info!(models = catalog.len(), "Model catalog ready");

    let provider = provider_for(&config).context("failed to initialize generation backend")?;
    let cache = InstanceCache::new(provider, config.cache_capacity);
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(catalog), cache));
    let handler = CompletionHandler::new(
        dispatcher,
        Arc::new(MetricsRecorder::new()),
        RequestLimits::from_env(),
    );

    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    server::serve(listener, Arc::new(AppState::new(handler)), shutdown_signal()).await
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        () = terminate => {
            info!("Received SIGTERM, shutting down");
        }
    }
}
