//! Model Catalog
//!
//! Immutable identifier → descriptor mapping built once from a validated
//! registry document. Shared as `Arc<ModelCatalog>`; reads need no locking.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use super::descriptor::{validate_descriptors, ModelDescriptor, ValidationError};
use crate::error::ErrorClass;

/// Catalog lookup failure
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    /// No descriptor has this identifier
    #[error("unknown model_id={0}")]
    NotFound(String),
}

impl CatalogError {
    /// Error class for the transport layer
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        ErrorClass::NotFound
    }
}

/// Ordered, immutable set of model descriptors
#[derive(Debug, PartialEq, Eq)]
pub struct ModelCatalog {
    models: Vec<Arc<ModelDescriptor>>,
    index: HashMap<String, usize>,
}

impl ModelCatalog {
    /// Build a catalog, rejecting invalid or duplicate descriptors
    pub fn from_descriptors(models: Vec<ModelDescriptor>) -> Result<Self, ValidationError> {
        validate_descriptors(&models)?;

        let index = models
            .iter()
            .enumerate()
            .map(|(i, m)| (m.id.clone(), i))
            .collect();

        Ok(Self {
            models: models.into_iter().map(Arc::new).collect(),
            index,
        })
    }

    /// Resolve a model identifier
    pub fn lookup(&self, id: &str) -> Result<Arc<ModelDescriptor>, CatalogError> {
        self.index
            .get(id)
            .map(|&i| Arc::clone(&self.models[i]))
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))
    }

    /// Number of models
    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether the catalog is empty (never true for a loaded catalog)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Identifiers in declaration order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.models.iter().map(|m| m.id.as_str())
    }
}
