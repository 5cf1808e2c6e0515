//! Per-product pipeline stages and the failures recorded against them.

use serde::{Deserialize, Serialize};

/// A step in the per-product chain. Failures are tagged with the stage that
/// produced them so the report shows how far each product got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Fetch,
    Parse,
    Ocr,
    Extract,
    Upload,
}

impl Stage {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Parse => "parse",
            Stage::Ocr => "ocr",
            Stage::Extract => "extract",
            Stage::Upload => "upload",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-readable cause of a stage failure.
///
/// The variants are the union of the fetch (`timeout|blocked|network`),
/// parse (`empty|malformed`), OCR (`quota|unreadable|network`), extract
/// (`no-images|no-text`) and upload (`auth|validation|network`) taxonomies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    Timeout,
    Blocked,
    Network,
    Empty,
    Malformed,
    Quota,
    Unreadable,
    NoImages,
    NoText,
    Auth,
    Validation,
}

impl FailureReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FailureReason::Timeout => "timeout",
            FailureReason::Blocked => "blocked",
            FailureReason::Network => "network",
            FailureReason::Empty => "empty",
            FailureReason::Malformed => "malformed",
            FailureReason::Quota => "quota",
            FailureReason::Unreadable => "unreadable",
            FailureReason::NoImages => "no-images",
            FailureReason::NoText => "no-text",
            FailureReason::Auth => "auth",
            FailureReason::Validation => "validation",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure captured as data on a product result instead of being propagated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageError {
    pub stage: Stage,
    pub reason: FailureReason,
    pub message: String,
    /// The URL being processed when the failure happened (detail page or image).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl StageError {
    pub fn new(stage: Stage, reason: FailureReason, message: impl Into<String>) -> Self {
        Self {
            stage,
            reason,
            message: message.into(),
            url: None,
        }
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

impl std::fmt::Display for StageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}: {}", self.stage, self.reason, self.message)?;
        if let Some(url) = &self.url {
            write!(f, " ({url})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_serializes_kebab_case() {
        let json = serde_json::to_string(&FailureReason::NoImages).unwrap();
        assert_eq!(json, "\"no-images\"");
    }

    #[test]
    fn stage_error_omits_missing_url() {
        let err = StageError::new(Stage::Extract, FailureReason::NoText, "no text detected");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["stage"], "extract");
        assert_eq!(json["reason"], "no-text");
        assert!(json.get("url").is_none());
    }

    #[test]
    fn stage_error_display_includes_url() {
        let err = StageError::new(Stage::Fetch, FailureReason::Timeout, "timed out after 20s")
            .with_url("https://blinkit.com/prn/x/prid/1");
        assert_eq!(
            err.to_string(),
            "fetch/timeout: timed out after 20s (https://blinkit.com/prn/x/prid/1)"
        );
    }
}
