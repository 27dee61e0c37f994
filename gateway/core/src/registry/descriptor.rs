//! Model descriptors and the registry document

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Static metadata for one selectable model
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Unique model identifier used by clients
    pub id: String,

    /// Source repository reference (served-model name on the backend)
    #[serde(rename = "hf_repo")]
    pub repo: String,

    /// Revision tag of the repository
    pub revision: String,

    /// Quantization scheme, if any
    #[serde(default)]
    pub quantization: Option<String>,

    /// Maximum tokens a single request may generate
    pub max_tokens: u32,

    /// Domain label
    pub domain: String,

    /// Role label
    pub role: String,
}

impl ModelDescriptor {
    /// Create a descriptor with empty labels and no quantization
    pub fn new(id: impl Into<String>, repo: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            id: id.into(),
            repo: repo.into(),
            revision: "main".to_string(),
            quantization: None,
            max_tokens,
            domain: String::new(),
            role: String::new(),
        }
    }

    /// Set the quantization scheme
    #[must_use]
    pub fn with_quantization(mut self, quantization: impl Into<String>) -> Self {
        self.quantization = Some(quantization.into());
        self
    }

    /// Set domain and role labels
    #[must_use]
    pub fn with_labels(mut self, domain: impl Into<String>, role: impl Into<String>) -> Self {
        self.domain = domain.into();
        self.role = role.into();
        self
    }
}

/// A registry document failed validation
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The document lists no models
    #[error("registry document lists no models")]
    NoModels,

    /// A descriptor has a blank identifier
    #[error("model #{index} has an empty identifier")]
    EmptyIdentifier {
        /// Position of the descriptor in the document
        index: usize,
    },

    /// A descriptor has a blank repository reference
    #[error("model {id} has an empty repository reference")]
    EmptyRepository {
        /// Offending model identifier
        id: String,
    },

    /// A descriptor allows zero tokens
    #[error("model {id} has a non-positive token ceiling")]
    NonPositiveTokenCeiling {
        /// Offending model identifier
        id: String,
    },

    /// Two descriptors share an identifier
    #[error("model identifier {id} is declared more than once")]
    DuplicateIdentifier {
        /// Duplicated model identifier
        id: String,
    },
}

/// Top-level shape of a registry document
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryDocument {
    /// Model descriptors in declaration order
    pub models: Vec<ModelDescriptor>,
}

impl RegistryDocument {
    /// Parse a YAML (or JSON) registry document without validating it
    pub fn parse(bytes: &[u8]) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_slice(bytes)
    }

    /// Check every descriptor and identifier uniqueness
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_descriptors(&self.models)
    }
}

/// Validate a list of descriptors as a whole
pub fn validate_descriptors(models: &[ModelDescriptor]) -> Result<(), ValidationError> {
    if models.is_empty() {
        return Err(ValidationError::NoModels);
    }

    let mut seen = HashSet::with_capacity(models.len());
    for (index, model) in models.iter().enumerate() {
        if model.id.trim().is_empty() {
            return Err(ValidationError::EmptyIdentifier { index });
        }
        if model.repo.trim().is_empty() {
            return Err(ValidationError::EmptyRepository {
                id: model.id.clone(),
            });
        }
        if model.max_tokens == 0 {
            return Err(ValidationError::NonPositiveTokenCeiling {
                id: model.id.clone(),
            });
        }
        if !seen.insert(model.id.as_str()) {
            return Err(ValidationError::DuplicateIdentifier {
                id: model.id.clone(),
            });
        }
    }

    Ok(())
}
