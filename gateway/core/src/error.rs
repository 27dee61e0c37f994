//! Client-facing error classification
//!
//! Every failure that can reach the transport layer maps onto one of three
//! classes. The HTTP layer picks status codes from the class; nothing else
//! about an internal error type leaks across the boundary.

use serde::Serialize;

/// Coarse error class shared by all request-path failures
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// The requested model is not in the catalog
    NotFound,
    /// The backend could not serve the request (capacity, construction, generation)
    Unavailable,
    /// The inbound request was malformed
    BadInput,
}

impl ErrorClass {
    /// Stable machine-readable name, used in error response bodies
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Unavailable => "unavailable",
            Self::BadInput => "bad_request",
        }
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
