//! Model Registry
//!
//! Loading and holding the model catalog.
//!
//! ```text
//! +------------------+     fails     +------------------+
//! |  primary (s3://) | ------------> | fallback (file)  |
//! +--------+---------+               +--------+---------+
//!          |                                  |
//!          +---------------+------------------+
//!                          v
//!                 parse + validate
//!                          |
//!                          v
//!                 +------------------+
//!                 |   ModelCatalog   |  <-- immutable, Arc-shared
//!                 +------------------+
//! ```

pub mod catalog;
pub mod descriptor;
pub mod loader;
pub mod source;

pub use catalog::{CatalogError, ModelCatalog};
pub use descriptor::{ModelDescriptor, RegistryDocument, ValidationError};
pub use loader::{load_from, LoadError, RegistryError, RegistryLoader};
pub use source::{FileSource, RegistrySource, S3Source, SourceError};
