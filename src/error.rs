use std::sync::Arc;

/// Boxed error type accepted from fetchers and mirror backends.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error type for SWR operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SwrError {
    /// The operation was called without a usable key.
    #[error("a non-empty key is required")]
    KeyRequired,
    /// A fetch issued for `key` failed.
    #[error("fetch failed for key '{key}': {source}")]
    FetchFailed {
        key: String,
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync>,
    },
    /// The durable mirror could not be read or written.
    #[error("persistence error: {message}")]
    Persistence { message: String },
}

impl SwrError {
    /// Create a fetch failure for `key` from any error value.
    pub fn fetch(key: impl Into<String>, source: impl Into<BoxError>) -> Self {
        SwrError::FetchFailed {
            key: key.into(),
            source: Arc::from(source.into()),
        }
    }

    /// Create a persistence error from a message.
    pub fn persistence(message: impl Into<String>) -> Self {
        SwrError::Persistence {
            message: message.into(),
        }
    }
}
