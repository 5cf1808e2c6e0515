use std::collections::HashSet;
use std::sync::Arc;

use crate::download::ImageSource;
use crate::engine::{full_text, ImageRef, OcrEngine, TextAnnotation};
use crate::error::OcrError;
use crate::stitch::stitch_png;

/// Outcome of recognizing a product's images.
#[derive(Debug, Default)]
pub struct OcrRun {
    /// One full-text annotation per successful, non-blank provider response,
    /// in image order.
    pub pages: Vec<TextAnnotation>,
    /// Images whose single-image OCR failed.
    pub failures: Vec<(String, OcrError)>,
    /// Provider calls made, stitched batches included.
    pub calls: usize,
}

impl OcrRun {
    #[must_use]
    pub fn texts(&self) -> Vec<String> {
        self.pages.iter().map(|p| p.description.clone()).collect()
    }
}

/// Recognizes text across many images with as few provider calls as possible.
///
/// Unique URLs are grouped into batches of `batch_size`; a full batch is
/// downloaded, stitched into one PNG and sent as a single request. A batch
/// that fails or comes back blank, and any trailing partial batch, falls back
/// to one request per image. A `batch_size` of 1 never stitches.
pub struct BatchRecognizer<E> {
    engine: E,
    images: Arc<dyn ImageSource>,
    batch_size: usize,
}

impl<E: OcrEngine> BatchRecognizer<E> {
    pub fn new(engine: E, images: Arc<dyn ImageSource>, batch_size: usize) -> Self {
        Self {
            engine,
            images,
            batch_size: batch_size.max(1),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub async fn recognize(&self, urls: &[String]) -> OcrRun {
        let mut seen = HashSet::new();
        let unique: Vec<&str> = urls
            .iter()
            .map(|u| u.trim())
            .filter(|u| !u.is_empty() && seen.insert(*u))
            .collect();

        let mut run = OcrRun::default();
        for batch in unique.chunks(self.batch_size) {
            if self.batch_size > 1 && batch.len() == self.batch_size {
                match self.recognize_stitched(batch, &mut run).await {
                    Ok(Some(page)) => {
                        run.pages.push(page);
                        continue;
                    }
                    Ok(None) => {
                        tracing::info!(
                            images = batch.len(),
                            "stitched batch returned no text, retrying images singly"
                        );
                    }
                    Err(e) => {
                        tracing::warn!(
                            images = batch.len(),
                            error = %e,
                            "stitched batch failed, retrying images singly"
                        );
                    }
                }
            }

            for url in batch {
                run.calls += 1;
                match self
                    .engine
                    .detect_text(&ImageRef::Url((*url).to_owned()))
                    .await
                {
                    Ok(annotations) => {
                        if let Some(text) = full_text(&annotations) {
                            run.pages.push(TextAnnotation::text(text));
                        }
                    }
                    Err(e) => {
                        tracing::warn!(url, error = %e, "image OCR failed");
                        run.failures.push(((*url).to_owned(), e));
                    }
                }
            }
        }
        run
    }

    async fn recognize_stitched(
        &self,
        batch: &[&str],
        run: &mut OcrRun,
    ) -> Result<Option<TextAnnotation>, OcrError> {
        let mut buffers = Vec::with_capacity(batch.len());
        for url in batch {
            buffers.push(self.images.load(url).await?);
        }
        let png = stitch_png(&buffers)?;
        run.calls += 1;
        let annotations = self.engine.detect_text(&ImageRef::Bytes(png)).await?;
        Ok(full_text(&annotations).map(TextAnnotation::text))
    }
}

#[cfg(test)]
#[path = "batch_test.rs"]
mod tests;
