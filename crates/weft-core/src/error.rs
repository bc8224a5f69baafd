//! Error types for the Weft query engine.
//!
//! One error enum is shared by every Weft crate so adapters, the cache layer,
//! and the orchestrator can classify failures the same way:
//!
//! | Variant | Meaning | Retried? |
//! |---------|---------|----------|
//! | `InvalidQuery` | Caller input is unusable | no |
//! | `BackendUnavailable` | Transient vector/graph store failure | once, at the adapter |
//! | `BothBackendsUnavailable` | Neither signal could be produced | no, surfaced to caller |
//! | `CacheBackend` | Cache store failure | no, absorbed by the circuit breaker |
//! | `DeadlineExceeded` | Per-request deadline elapsed | no |
//! | `Cancelled` | Caller cancelled the request | no |

use std::path::Path;

use thiserror::Error;

/// Result type alias for Weft operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Weft.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The query text cannot be searched (empty, whitespace-only, ...).
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A vector or graph backend could not serve the call.
    #[error("{backend} backend unavailable: {message}")]
    BackendUnavailable {
        /// Backend name ("vector", "graph", "embedding", ...).
        backend: String,
        /// What went wrong.
        message: String,
    },

    /// Neither the semantic nor the graph signal could be produced.
    #[error("Both backends unavailable (semantic: {semantic}; graph: {graph})")]
    BothBackendsUnavailable {
        /// Failure reported for the semantic signal.
        semantic: String,
        /// Failure reported for the graph signal.
        graph: String,
    },

    /// The cache store failed. Never escapes the cache layer.
    #[error("Cache backend error: {0}")]
    CacheBackend(String),

    /// The per-request deadline elapsed before the call completed.
    #[error("Deadline exceeded after {elapsed_ms}ms")]
    DeadlineExceeded {
        /// Milliseconds elapsed since the request started.
        elapsed_ms: u64,
    },

    /// The caller cancelled the request.
    #[error("Request cancelled")]
    Cancelled,

    /// Configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A referenced entity does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Entity kind ("node", "chunk", ...).
        kind: String,
        /// Identifier that was looked up.
        id: String,
    },

    /// I/O error, optionally tied to a path.
    #[error("I/O error{}: {source}", path_suffix(.path))]
    Io {
        /// Path involved in the failed operation.
        path: Option<String>,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Returns whether this error is worth retrying at the adapter level.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::BackendUnavailable { .. })
    }

    /// Returns whether this error came from the request deadline or a
    /// caller cancellation rather than from a backend.
    pub fn is_interruption(&self) -> bool {
        matches!(self, Error::DeadlineExceeded { .. } | Error::Cancelled)
    }

    /// Creates an invalid-query error.
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Error::InvalidQuery(message.into())
    }

    /// Creates a backend-unavailable error.
    pub fn backend_unavailable(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Error::BackendUnavailable {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Creates a cache backend error.
    pub fn cache(message: impl Into<String>) -> Self {
        Error::CacheBackend(message.into())
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    /// Creates a not-found error.
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Wraps an I/O error with the path it concerned.
    pub fn io_with_path(source: std::io::Error, path: &Path) -> Self {
        Error::Io {
            path: Some(path.display().to_string()),
            source,
        }
    }
}

fn path_suffix(path: &Option<String>) -> String {
    path.as_ref().map(|p| format!(" at {p}")).unwrap_or_default()
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Error::Io { path: None, source }
    }
}
