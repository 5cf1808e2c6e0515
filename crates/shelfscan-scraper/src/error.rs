use std::path::PathBuf;

use shelfscan_core::FailureReason;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("timed out after {timeout_secs}s fetching {url}")]
    Timeout { url: String, timeout_secs: u64 },

    #[error("storefront served a block page for {url}")]
    Blocked { url: String },

    #[error("network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("failed to read snapshot {}: {source}", path.display())]
    Snapshot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid target URL \"{target}\": {reason}")]
    InvalidTarget { target: String, reason: String },
}

impl FetchError {
    /// Classification recorded on the product when this error ends a fetch.
    #[must_use]
    pub fn reason(&self) -> FailureReason {
        match self {
            FetchError::Timeout { .. } => FailureReason::Timeout,
            FetchError::Blocked { .. } => FailureReason::Blocked,
            FetchError::Client(_)
            | FetchError::Network { .. }
            | FetchError::UnexpectedStatus { .. }
            | FetchError::Snapshot { .. }
            | FetchError::InvalidTarget { .. } => FailureReason::Network,
        }
    }
}
