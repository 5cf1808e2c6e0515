use std::path::PathBuf;

use shelfscan_core::FailureReason;
use shelfscan_scraper::FetchError;
use thiserror::Error;

/// Failures that end a run without a report.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("listing {target} could not be fetched: {source}")]
    ListingFetch {
        target: String,
        #[source]
        source: FetchError,
    },

    #[error("listing {target} produced no products; the listing selectors may need updating")]
    EmptyListing { target: String },

    #[error("failed to write report {}: {source}", path.display())]
    WriteReport {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read report {}: {source}", path.display())]
    ReadReport {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("report {} is not a combined report: {source}", path.display())]
    InvalidReport {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl PipelineError {
    /// The listing-stage cause, if this error came from the listing stage.
    #[must_use]
    pub fn reason(&self) -> Option<FailureReason> {
        match self {
            PipelineError::ListingFetch { source, .. } => Some(source.reason()),
            PipelineError::EmptyListing { .. } => Some(FailureReason::Empty),
            PipelineError::WriteReport { .. }
            | PipelineError::ReadReport { .. }
            | PipelineError::InvalidReport { .. }
            | PipelineError::Serialize(_) => None,
        }
    }
}
