use shelfscan_core::FailureReason;
use thiserror::Error;

/// Errors returned by an [`Uploader`](crate::Uploader).
#[derive(Debug, Error)]
pub enum UploadError {
    /// The service refused the configured credentials (HTTP 401/403).
    #[error("upload rejected credentials (HTTP {status}): {body}")]
    Auth { status: u16, body: String },

    /// The service refused the record itself (HTTP 400/409/422).
    #[error("upload rejected record (HTTP {status}): {body}")]
    Validation { status: u16, body: String },

    /// Any other non-2xx status.
    #[error("unexpected upload response (HTTP {status}): {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("upload request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected response from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

impl UploadError {
    #[must_use]
    pub fn reason(&self) -> FailureReason {
        match self {
            UploadError::Auth { .. } => FailureReason::Auth,
            UploadError::Validation { .. } => FailureReason::Validation,
            UploadError::UnexpectedStatus { .. }
            | UploadError::Network { .. }
            | UploadError::Decode { .. }
            | UploadError::Client(_) => FailureReason::Network,
        }
    }
}
