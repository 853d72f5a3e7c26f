//! Error types for Grabber

use std::io;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Result type for Grabber operations
pub type Result<T> = std::result::Result<T, GrabberError>;

/// Opaque error returned by browser-side collaborators
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared cause attached to a resolution failure
pub type Cause = Arc<dyn std::error::Error + Send + Sync>;

/// Errors that can occur in Grabber
#[derive(Debug, Error)]
pub enum GrabberError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Trace document could not be encoded or decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Trace document is structurally invalid
    #[error("Invalid trace document: {0}")]
    InvalidDocument(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A browser-side collaborator failed
    #[error("Source error: {0}")]
    Source(String),

    /// Content resolution failed for one event
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// No recorded entry matches the requested URL
    #[error("No recorded entry for {0}")]
    EntryNotFound(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Why an event ended up without body content.
///
/// Every variant is recovered per event: the entry stays in the trace with
/// its content text absent.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// Cache-origin event, but no loaded resource has a matching URL
    #[error("no loaded resource matches {url}")]
    ContentUnavailable {
        /// Request URL that was looked up
        url: String,
    },

    /// The retrieval call itself failed
    #[error("content retrieval failed for {url}: {cause}")]
    ContentRetrieval {
        /// Request URL of the event
        url: String,
        /// Underlying failure reported by the collaborator
        #[source]
        cause: Cause,
    },

    /// Export gave up waiting on this event
    #[error("content resolution did not settle within {0:?}")]
    ResolutionTimeout(Duration),

    /// The owning session was discarded before resolution finished
    #[error("content resolution cancelled")]
    Cancelled,
}

impl ResolveError {
    /// Wrap a collaborator failure for `url`
    pub fn retrieval(url: impl Into<String>, cause: BoxError) -> Self {
        Self::ContentRetrieval {
            url: url.into(),
            cause: Arc::from(cause),
        }
    }
}
