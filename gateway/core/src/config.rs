//! Gateway Configuration
//!
//! Process-level settings, loaded once at startup from the environment and
//! then adjusted by command-line overrides. Nothing here is re-read while the
//! gateway is serving traffic.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default primary registry location
pub const DEFAULT_REGISTRY_URI: &str = "s3://llm-catalog-staging/models.yaml";

/// Default object-storage endpoint
pub const DEFAULT_STORAGE_ENDPOINT: &str = "https://s3.fr-par.scw.cloud";

/// Default instance cache ceiling
pub const DEFAULT_CACHE_CAPACITY: usize = 16;

/// Which generation backend the process runs against
///
/// Chosen once at startup; every request in the process uses the same kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// OpenAI-compatible vLLM server
    #[default]
    Vllm,
    /// Deterministic synthetic responses, no engine construction cost
    Mock,
}

/// Errors produced while validating configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Cache capacity must allow at least one resident engine
    #[error("instance cache capacity must be at least 1")]
    ZeroCacheCapacity,

    /// The registry URI was blank
    #[error("model registry URI must not be empty")]
    EmptyRegistryUri,

    /// The engine base URL is required for the vLLM backend
    #[error("engine base URL must not be empty when the vllm backend is selected")]
    EmptyEngineUrl,
}

/// Complete gateway configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Primary registry location (`s3://bucket/key` or `file://path`)
    pub registry_uri: String,

    /// Local registry file consulted when the primary source fails
    pub registry_fallback_path: PathBuf,

    /// Object-storage endpoint override
    pub storage_endpoint: Option<String>,

    /// Generation backend
    pub backend: BackendKind,

    /// Base URL of the vLLM server
    pub engine_base_url: String,

    /// Per-request engine timeout
    pub engine_timeout_ms: u64,

    /// Maximum simultaneously resident engine handles
    pub cache_capacity: usize,

    /// Listen host
    pub host: String,

    /// Listen port
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            registry_uri: DEFAULT_REGISTRY_URI.to_string(),
            registry_fallback_path: PathBuf::from("models.yaml"),
            storage_endpoint: Some(DEFAULT_STORAGE_ENDPOINT.to_string()),
            backend: BackendKind::Vllm,
            engine_base_url: "http://localhost:8000".to_string(),
            engine_timeout_ms: 120_000,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            host: "0.0.0.0".to_string(),
            port: 8205,
        }
    }
}

/// Values supplied on the command line, applied over the environment
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Listen host
    pub host: Option<String>,
    /// Listen port
    pub port: Option<u16>,
    /// Primary registry URI
    pub registry_uri: Option<String>,
    /// Fallback registry file
    pub registry_file: Option<PathBuf>,
    /// Force mock mode
    pub mock: bool,
    /// Instance cache ceiling
    pub cache_capacity: Option<usize>,
}

impl GatewayConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `MODELS_REGISTRY_S3_URI`: primary registry URI
    /// - `MODELS_REGISTRY_LOCAL_PATH`: fallback registry file
    /// - `S3_ENDPOINT_URL`: object-storage endpoint override
    /// - `USE_FAKE_LLM`: "1" or "true" for mock mode
    /// - `VLLM_BASE_URL`: vLLM server base URL
    /// - `GATEWAY_ENGINE_TIMEOUT_MS`: engine request timeout
    /// - `GATEWAY_CACHE_CAPACITY`: instance cache ceiling
    /// - `GATEWAY_HOST`: listen host
    /// - `GATEWAY_PORT` (or `VLLM_PORT`): listen port
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();

        let backend = if lookup("USE_FAKE_LLM").is_some_and(|v| parse_flag(&v)) {
            BackendKind::Mock
        } else {
            BackendKind::Vllm
        };

        Self {
            registry_uri: lookup("MODELS_REGISTRY_S3_URI")
                .or_else(|| lookup("MODELS_REGISTRY_URI"))
                .unwrap_or(default.registry_uri),
            registry_fallback_path: lookup("MODELS_REGISTRY_LOCAL_PATH")
                .map(PathBuf::from)
                .unwrap_or(default.registry_fallback_path),
            storage_endpoint: match lookup("S3_ENDPOINT_URL") {
                Some(v) if v.trim().is_empty() => None,
                Some(v) => Some(v),
                None => default.storage_endpoint,
            },
            backend,
            engine_base_url: lookup("VLLM_BASE_URL").unwrap_or(default.engine_base_url),
            engine_timeout_ms: lookup("GATEWAY_ENGINE_TIMEOUT_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.engine_timeout_ms),
            cache_capacity: lookup("GATEWAY_CACHE_CAPACITY")
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.cache_capacity),
            host: lookup("GATEWAY_HOST").unwrap_or(default.host),
            port: lookup("GATEWAY_PORT")
                .or_else(|| lookup("VLLM_PORT"))
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.port),
        }
    }

    /// Apply command-line overrides
    pub fn apply(&mut self, overrides: ConfigOverrides) {
        if let Some(host) = overrides.host {
            self.host = host;
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(uri) = overrides.registry_uri {
            self.registry_uri = uri;
        }
        if let Some(path) = overrides.registry_file {
            self.registry_fallback_path = path;
        }
        if overrides.mock {
            self.backend = BackendKind::Mock;
        }
        if let Some(capacity) = overrides.cache_capacity {
            self.cache_capacity = capacity;
        }
    }

    /// Check the configuration before startup
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_capacity == 0 {
            return Err(ConfigError::ZeroCacheCapacity);
        }
        if self.registry_uri.trim().is_empty() {
            return Err(ConfigError::EmptyRegistryUri);
        }
        if self.backend == BackendKind::Vllm && self.engine_base_url.trim().is_empty() {
            return Err(ConfigError::EmptyEngineUrl);
        }
        Ok(())
    }

    /// Engine request timeout as a `Duration`
    #[must_use]
    pub fn engine_timeout(&self) -> Duration {
        Duration::from_millis(self.engine_timeout_ms)
    }

    /// `host:port` listen address
    #[must_use]
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether mock mode is active
    #[must_use]
    pub fn is_mock(&self) -> bool {
        self.backend == BackendKind::Mock
    }
}

fn parse_flag(value: &str) -> bool {
    let value = value.trim().to_lowercase();
    value == "1" || value == "true" || value == "yes"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_gateway_config_default() {
        let config = GatewayConfig::default();
        assert_eq!(config.port, 8205);
        assert_eq!(config.cache_capacity, 16);
        assert_eq!(config.backend, BackendKind::Vllm);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_reads_variables() {
        let config = GatewayConfig::from_lookup(lookup_from(&[
            ("MODELS_REGISTRY_S3_URI", "s3://bucket/catalog.yaml"),
            ("USE_FAKE_LLM", "True"),
            ("VLLM_PORT", "9000"),
            ("GATEWAY_CACHE_CAPACITY", "4"),
            ("S3_ENDPOINT_URL", "http://minio:9000"),
        ]));

        assert_eq!(config.registry_uri, "s3://bucket/catalog.yaml");
        assert!(config.is_mock());
        assert_eq!(config.port, 9000);
        assert_eq!(config.cache_capacity, 4);
        assert_eq!(config.storage_endpoint.as_deref(), Some("http://minio:9000"));
    }

    #[test]
    fn test_gateway_port_wins_over_vllm_port() {
        let config = GatewayConfig::from_lookup(lookup_from(&[
            ("GATEWAY_PORT", "7000"),
            ("VLLM_PORT", "9000"),
        ]));
        assert_eq!(config.port, 7000);
    }

    #[test]
    fn test_unparsable_values_fall_back_to_defaults() {
        let config = GatewayConfig::from_lookup(lookup_from(&[
            ("GATEWAY_PORT", "not-a-port"),
            ("GATEWAY_CACHE_CAPACITY", "-1"),
            ("USE_FAKE_LLM", "nope"),
        ]));
        assert_eq!(config.port, 8205);
        assert_eq!(config.cache_capacity, DEFAULT_CACHE_CAPACITY);
        assert!(!config.is_mock());
    }

    #[test]
    fn test_blank_endpoint_disables_override() {
        let config = GatewayConfig::from_lookup(lookup_from(&[("S3_ENDPOINT_URL", " ")]));
        assert!(config.storage_endpoint.is_none());
    }

    #[test]
    fn test_overrides_apply() {
        let mut config = GatewayConfig::default();
        config.apply(ConfigOverrides {
            port: Some(1234),
            mock: true,
            registry_file: Some(PathBuf::from("/etc/gateway/models.yaml")),
            ..Default::default()
        });
        assert_eq!(config.port, 1234);
        assert!(config.is_mock());
        assert_eq!(
            config.registry_fallback_path,
            PathBuf::from("/etc/gateway/models.yaml")
        );
        assert_eq!(config.listen_addr(), "0.0.0.0:1234");
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let config = GatewayConfig {
            cache_capacity: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroCacheCapacity));
    }
}
