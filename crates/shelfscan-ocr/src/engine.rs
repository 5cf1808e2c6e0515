use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::OcrError;

/// The image handed to an [`OcrEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRef {
    Url(String),
    Bytes(Vec<u8>),
}

/// One text annotation as returned by the provider.
///
/// By provider convention the first annotation of a response carries the full
/// detected text; the rest are individual words.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextAnnotation {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_poly: Option<BoundingPoly>,
}

impl TextAnnotation {
    #[must_use]
    pub fn text(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            locale: None,
            bounding_poly: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingPoly {
    #[serde(default)]
    pub vertices: Vec<Vertex>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vertex {
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
}

/// Full detected text of one response, trimmed; `None` when blank.
#[must_use]
pub fn full_text(annotations: &[TextAnnotation]) -> Option<&str> {
    annotations
        .first()
        .map(|a| a.description.trim())
        .filter(|text| !text.is_empty())
}

/// Text detection backend.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// # Errors
    ///
    /// Returns [`OcrError`] when the provider refuses the request (quota,
    /// credentials), cannot read the image, or is unreachable.
    async fn detect_text(&self, image: &ImageRef) -> Result<Vec<TextAnnotation>, OcrError>;
}
