//! Registry Sources
//!
//! Byte-producing locations for the registry document. The loader does not
//! care where bytes come from; it only needs `fetch()` and a description for
//! log lines.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

/// Failure to produce registry bytes
#[derive(Debug, Error)]
pub enum SourceError {
    /// Local file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Object storage request failed (transport, authorization, missing object)
    #[error("object storage request failed: {0}")]
    ObjectStore(String),

    /// URI could not be interpreted
    #[error("invalid registry URI {0}")]
    InvalidUri(String),

    /// Source type not compiled in
    #[error("{0}")]
    Unsupported(String),
}

/// Anything that can produce a registry document
#[async_trait]
pub trait RegistrySource: Send + Sync {
    /// Human-readable location, used in logs
    fn describe(&self) -> String;

    /// Fetch the raw document bytes
    async fn fetch(&self) -> Result<Vec<u8>, SourceError>;
}

// ============================================================================
// Local file
// ============================================================================

/// Registry document on the local filesystem
#[derive(Clone, Debug)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    /// Create a source for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RegistrySource for FileSource {
    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }

    async fn fetch(&self) -> Result<Vec<u8>, SourceError> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|source| SourceError::Io {
                path: self.path.clone(),
                source,
            })
    }
}

// ============================================================================
// Object storage
// ============================================================================

/// Registry document in an S3-compatible bucket
#[derive(Clone, Debug)]
pub struct S3Source {
    bucket: String,
    key: String,
    #[cfg_attr(not(feature = "s3"), allow(dead_code))]
    endpoint: Option<String>,
}

impl S3Source {
    /// Create a source from an `s3://bucket/key` URI
    pub fn from_uri(uri: &str, endpoint: Option<String>) -> Result<Self, SourceError> {
        let rest = uri
            .strip_prefix("s3://")
            .ok_or_else(|| SourceError::InvalidUri(uri.to_string()))?;
        let (bucket, key) = rest
            .split_once('/')
            .ok_or_else(|| SourceError::InvalidUri(uri.to_string()))?;
        let key = key.trim_start_matches('/');

        if bucket.is_empty() || key.is_empty() {
            return Err(SourceError::InvalidUri(uri.to_string()));
        }

        Ok(Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
            endpoint,
        })
    }

    /// Bucket name
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Object key
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

#[async_trait]
impl RegistrySource for S3Source {
    fn describe(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }

    #[cfg(feature = "s3")]
    async fn fetch(&self) -> Result<Vec<u8>, SourceError> {
        use aws_config::BehaviorVersion;
        use aws_sdk_s3::error::DisplayErrorContext;

        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(ref endpoint) = self.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let shared_config = loader.load().await;
        let client = aws_sdk_s3::Client::new(&shared_config);

        let object = client
            .get_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .send()
            .await
            .map_err(|e| SourceError::ObjectStore(DisplayErrorContext(&e).to_string()))?;

        let body = object
            .body
            .collect()
            .await
            .map_err(|e| SourceError::ObjectStore(e.to_string()))?;

        Ok(body.into_bytes().to_vec())
    }

    #[cfg(not(feature = "s3"))]
    async fn fetch(&self) -> Result<Vec<u8>, SourceError> {
        Err(SourceError::Unsupported(format!(
            "cannot fetch {}: built without the 's3' feature",
            self.describe()
        )))
    }
}
