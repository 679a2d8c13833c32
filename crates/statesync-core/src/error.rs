use thiserror::Error;

pub type SyncResult<T> = Result<T, SyncError>;

/// Errors raised while synchronizing container state with the remote file.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Invalid settings or unsupported container shape. Never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Decoding error: {0}")]
    Decoding(String),

    /// The remote service answered with a non-success status.
    #[error("Remote error {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("No authentication token available")]
    MissingToken,

    /// Last error of a retried operation, tagged with the number of attempts made.
    #[error("Failed after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<SyncError>,
    },

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// Whether a retry could plausibly succeed (network failures, 5xx, 429).
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Network(_) => true,
            SyncError::Remote { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// The innermost error, unwrapping retry tagging.
    pub fn root(&self) -> &SyncError {
        match self {
            SyncError::RetriesExhausted { source, .. } => source.root(),
            other => other,
        }
    }
}
