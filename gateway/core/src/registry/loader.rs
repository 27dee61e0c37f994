//! Registry Loader
//!
//! Primary-then-fallback loading of the model catalog. Runs once at startup.

use thiserror::Error;
use tracing::{info, warn};

use super::catalog::ModelCatalog;
use super::descriptor::{RegistryDocument, ValidationError};
use super::source::{FileSource, RegistrySource, S3Source, SourceError};
use crate::config::GatewayConfig;

/// Why a single source could not produce a catalog
#[derive(Debug, Error)]
pub enum LoadError {
    /// Bytes could not be fetched
    #[error(transparent)]
    Fetch(#[from] SourceError),

    /// Bytes were not a registry document
    #[error("malformed registry document: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Document parsed but failed validation
    #[error("invalid registry document: {0}")]
    Invalid(#[from] ValidationError),
}

/// No valid catalog could be loaded from any source
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Both primary and fallback failed; the process must not serve traffic
    #[error("model registry unavailable: {reason}")]
    Unavailable {
        /// Per-source failure summary
        reason: String,
    },
}

/// Loads the catalog from a primary source with a local fallback
pub struct RegistryLoader {
    primary: Option<Box<dyn RegistrySource>>,
    fallback: Box<dyn RegistrySource>,
}

impl RegistryLoader {
    /// Create a loader that only consults `fallback`
    pub fn new(fallback: Box<dyn RegistrySource>) -> Self {
        Self {
            primary: None,
            fallback,
        }
    }

    /// Set the primary source
    #[must_use]
    pub fn with_primary(mut self, primary: Box<dyn RegistrySource>) -> Self {
        self.primary = Some(primary);
        self
    }

    /// Build the loader described by the gateway configuration
    ///
    /// `s3://` URIs become an object-storage primary, `file://` URIs a local
    /// primary. Anything else is logged and skipped so only the fallback file
    /// is consulted.
    pub fn from_config(config: &GatewayConfig) -> Self {
        let loader = Self::new(Box::new(FileSource::new(&config.registry_fallback_path)));
        let uri = config.registry_uri.trim();

        if uri.starts_with("s3://") {
            match S3Source::from_uri(uri, config.storage_endpoint.clone()) {
                Ok(source) => loader.with_primary(Box::new(source)),
                Err(e) => {
                    warn!(error = %e, "Ignoring primary registry source");
                    loader
                }
            }
        } else if let Some(path) = uri.strip_prefix("file://") {
            loader.with_primary(Box::new(FileSource::new(path)))
        } else {
            warn!(uri = %uri, "Unsupported registry URI scheme, using local fallback only");
            loader
        }
    }

    /// Load and validate the catalog
    pub async fn load(&self) -> Result<ModelCatalog, RegistryError> {
        let mut failures = Vec::new();

        if let Some(ref primary) = self.primary {
            info!(source = %primary.describe(), "Loading model registry");
            match load_from(primary.as_ref()).await {
                Ok(catalog) => {
                    info!(source = %primary.describe(), models = catalog.len(), "Model registry loaded");
                    return Ok(catalog);
                }
                Err(e) => {
                    warn!(
                        source = %primary.describe(),
                        error = %e,
                        "Primary registry load failed, falling back to local registry"
                    );
                    failures.push(format!("{}: {e}", primary.describe()));
                }
            }
        }

        match load_from(self.fallback.as_ref()).await {
            Ok(catalog) => {
                info!(source = %self.fallback.describe(), models = catalog.len(), "Model registry loaded");
                Ok(catalog)
            }
            Err(e) => {
                failures.push(format!("{}: {e}", self.fallback.describe()));
                Err(RegistryError::Unavailable {
                    reason: failures.join("; "),
                })
            }
        }
    }
}

/// Fetch, parse and validate one source
pub async fn load_from(source: &dyn RegistrySource) -> Result<ModelCatalog, LoadError> {
    let bytes = source.fetch().await?;
    let document = RegistryDocument::parse(&bytes)?;
    Ok(ModelCatalog::from_descriptors(document.models)?)
}
