use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that may clear up on their own and are worth another attempt.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),

    #[error("rate limited by {source_name} (retry after {retry_after_secs}s)")]
    RateLimited {
        source_name: String,
        retry_after_secs: u64,
    },

    #[error("endpoint not found: {url}")]
    NotFound { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("could not decode {context}: {source}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed page from {source_name}: {reason}")]
    MalformedPage { source_name: String, reason: String },

    #[error("source {source_name} is misconfigured: {reason}")]
    InvalidConfig { source_name: String, reason: String },
}

impl Transient for SourceError {
    /// Network failures, 429s and 5xx responses are retried. A 404, a 4xx, or
    /// a body that does not parse will fail the same way again.
    fn is_transient(&self) -> bool {
        match self {
            SourceError::Transport(_) | SourceError::RateLimited { .. } => true,
            SourceError::UnexpectedStatus { status, .. } => *status >= 500,
            SourceError::NotFound { .. }
            | SourceError::Decode { .. }
            | SourceError::MalformedPage { .. }
            | SourceError::InvalidConfig { .. } => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// Connection refused, pool exhausted, timeouts.
    #[error("store unavailable: {0}")]
    Unavailable(#[source] BoxError),

    #[error("store query failed: {0}")]
    Query(#[source] BoxError),

    #[error("stored row is invalid: {0}")]
    InvalidRow(String),
}

impl Transient for StoreError {
    fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}
