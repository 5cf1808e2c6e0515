use std::path::PathBuf;

use shelfscan_core::FailureReason;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR quota exhausted: {0}")]
    Quota(String),

    #[error("image could not be read: {0}")]
    Unreadable(String),

    #[error("OCR network error: {0}")]
    Network(String),

    #[error("OCR provider rejected credentials: {0}")]
    Auth(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

impl OcrError {
    #[must_use]
    pub fn reason(&self) -> FailureReason {
        match self {
            OcrError::Quota(_) => FailureReason::Quota,
            OcrError::Unreadable(_) => FailureReason::Unreadable,
            OcrError::Network(_) | OcrError::Client(_) => FailureReason::Network,
            OcrError::Auth(_) => FailureReason::Auth,
        }
    }

    pub(crate) fn is_retriable(&self) -> bool {
        matches!(self, OcrError::Quota(_) | OcrError::Network(_))
    }
}

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("failed to read OCR credentials {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("OCR credentials {} are empty", path.display())]
    Empty { path: PathBuf },

    #[error(
        "OCR credentials {} hold no usable key (expected a service account, \"api_key\" or \"access_token\")",
        path.display()
    )]
    Unsupported { path: PathBuf },

    #[error("OCR credentials {} hold an unusable private key: {reason}", path.display())]
    InvalidPrivateKey { path: PathBuf, reason: String },
}
