//! Drives listing → detail → OCR → extraction → upload across every product.
//!
//! Only the listing stage can fail a run. Each product runs its own chain and
//! carries its failures as [`StageError`]s, so one broken product never stops
//! the others and every failure ends up in the report.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use shelfscan_core::{
    CombinedReport, DeliveryLocation, FailureReason, ListingDiagnostics, ListingEntry,
    ProductResult, Stage, StageError,
};
use shelfscan_ocr::{extract_nutrition, BatchRecognizer, OcrEngine};
use shelfscan_scraper::{parse_detail, parse_listing, PageFetcher, StateStatus};
use shelfscan_upload::{UploadRecord, Uploader};

use crate::error::PipelineError;

/// Bounds applied to a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunLimits {
    /// Process only the first `n` listing entries.
    pub max_products: Option<usize>,
    pub listing_timeout: Duration,
    /// Bounds each detail-page fetch. OCR has its own provider timeout.
    pub product_timeout: Duration,
    /// Product chains in flight at once. Output order is listing order
    /// regardless.
    pub max_concurrent_products: usize,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            max_products: None,
            listing_timeout: Duration::from_secs(20),
            product_timeout: Duration::from_secs(20),
            max_concurrent_products: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunMode {
    /// Extract everything but never call the uploader.
    pub dry_run: bool,
}

pub struct BatchOrchestrator<F, O, U> {
    fetcher: F,
    recognizer: BatchRecognizer<O>,
    uploader: U,
    site_origin: String,
    cancel: Arc<AtomicBool>,
}

impl<F, O, U> BatchOrchestrator<F, O, U>
where
    F: PageFetcher,
    O: OcrEngine,
    U: Uploader,
{
    /// `site_origin` resolves relative links found on listing and detail
    /// pages.
    pub fn new(fetcher: F, recognizer: BatchRecognizer<O>, uploader: U, site_origin: &str) -> Self {
        Self {
            fetcher,
            recognizer,
            uploader,
            site_origin: site_origin.to_owned(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shares an abort flag with the caller (e.g. a Ctrl-C handler). Once set,
    /// no new product chain starts and no upload is attempted; the report
    /// still covers every product processed so far.
    #[must_use]
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn recognizer(&self) -> &BatchRecognizer<O> {
        &self.recognizer
    }

    pub fn uploader(&self) -> &U {
        &self.uploader
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Runs the full pipeline from a listing URL or snapshot path.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ListingFetch`] when the listing cannot be
    /// fetched and [`PipelineError::EmptyListing`] when it yields no entries.
    /// Per-product failures never surface here.
    pub async fn run(
        &self,
        listing_target: &str,
        location: &DeliveryLocation,
        limits: &RunLimits,
        mode: RunMode,
    ) -> Result<CombinedReport, PipelineError> {
        tracing::info!(
            listing = listing_target,
            locality = %location.locality,
            "fetching listing"
        );
        let html = self
            .fetcher
            .fetch(listing_target, location, limits.listing_timeout)
            .await
            .map_err(|source| PipelineError::ListingFetch {
                target: listing_target.to_owned(),
                source,
            })?;

        let page = parse_listing(&html, &self.site_origin);
        tracing::info!(
            entries = page.entries.len(),
            cards = page.diagnostics.cards_seen,
            skipped_without_name = page.diagnostics.skipped_without_name,
            skipped_without_image = page.diagnostics.skipped_without_image,
            "parsed listing"
        );
        if page.entries.is_empty() {
            return Err(PipelineError::EmptyListing {
                target: listing_target.to_owned(),
            });
        }

        Ok(self
            .run_entries(
                listing_target,
                page.entries,
                page.diagnostics,
                location,
                limits,
                mode,
            )
            .await)
    }

    /// Runs every stage after listing discovery over already-known entries.
    pub async fn run_entries(
        &self,
        source: &str,
        entries: Vec<ListingEntry>,
        listing: ListingDiagnostics,
        location: &DeliveryLocation,
        limits: &RunLimits,
        mode: RunMode,
    ) -> CombinedReport {
        let entries = cap(entries, limits.max_products);
        let total = entries.len();
        let known = self.known_names(mode).await;

        let mut products: Vec<ProductResult> = stream::iter(entries.into_iter().enumerate())
            .take_while(|_| futures::future::ready(!self.is_cancelled()))
            .map(|(idx, entry)| {
                self.process_entry(idx + 1, total, entry, location, limits.product_timeout, &known)
            })
            .buffered(limits.max_concurrent_products.max(1))
            .collect()
            .await;

        let cancelled = products.len() < total;
        if cancelled {
            tracing::warn!(
                processed = products.len(),
                total,
                "run cancelled, reporting products processed so far"
            );
        }
        if !mode.dry_run {
            self.upload_pass(&mut products, known).await;
        }

        self.finish(source, location, listing, products, mode, cancelled)
    }

    /// Re-runs OCR, extraction and upload over products from saved reports.
    ///
    /// OCR is repeated only for products without OCR text unless `force_ocr`
    /// is set. Products already marked uploaded are not pushed again.
    pub async fn rerun_saved(
        &self,
        source: &str,
        products: Vec<ProductResult>,
        location: &DeliveryLocation,
        limits: &RunLimits,
        mode: RunMode,
        force_ocr: bool,
    ) -> CombinedReport {
        let products = cap(products, limits.max_products);
        let total = products.len();
        let known = self.known_names(mode).await;
        let registry_consulted = self.consults_registry(mode);

        let mut products: Vec<ProductResult> = stream::iter(products.into_iter().enumerate())
            .take_while(|_| futures::future::ready(!self.is_cancelled()))
            .map(|(idx, mut product)| {
                let known = &known;
                async move {
                    tracing::info!(
                        position = idx + 1,
                        total,
                        product = %product.entry.name,
                        "reprocessing saved product"
                    );
                    product.stage_failures.retain(|f| f.stage != Stage::Upload);
                    if registry_consulted {
                        product.known_upstream = false;
                    }
                    if is_known(&product, known) {
                        mark_known(&mut product);
                    } else if product.failed_at(Stage::Fetch) || product.failed_at(Stage::Parse) {
                        tracing::info!(product = %product.entry.name, "no detail data saved, skipping OCR");
                    } else if force_ocr || product.ocr_text.is_empty() {
                        product
                            .stage_failures
                            .retain(|f| !matches!(f.stage, Stage::Ocr | Stage::Extract));
                        product.ocr_text.clear();
                        product.nutrition.clear();
                        self.recognize_into(&mut product).await;
                    }
                    product
                }
            })
            .buffered(limits.max_concurrent_products.max(1))
            .collect()
            .await;

        let cancelled = products.len() < total;
        if !mode.dry_run {
            self.upload_pass(&mut products, known).await;
        }

        self.finish(
            source,
            location,
            ListingDiagnostics::default(),
            products,
            mode,
            cancelled,
        )
    }

    fn finish(
        &self,
        source: &str,
        location: &DeliveryLocation,
        listing: ListingDiagnostics,
        products: Vec<ProductResult>,
        mode: RunMode,
        cancelled: bool,
    ) -> CombinedReport {
        let mut report = CombinedReport::new(location.clone(), source.to_owned(), listing, products);
        report.cancelled = cancelled || self.is_cancelled();
        report.dry_run = mode.dry_run;
        tracing::info!(
            products = report.summary.products,
            with_nutrition = report.summary.with_nutrition,
            failed = report.summary.failed,
            uploaded = report.summary.uploaded,
            "run finished"
        );
        report
    }

    /// Whether this run looks up the upstream name registry at all.
    fn consults_registry(&self, mode: RunMode) -> bool {
        !mode.dry_run && self.uploader.is_enabled()
    }

    async fn known_names(&self, mode: RunMode) -> HashSet<String> {
        if !self.consults_registry(mode) {
            return HashSet::new();
        }
        match self.uploader.known_products().await {
            Ok(names) => {
                tracing::info!(count = names.len(), "fetched known product names");
                names
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not fetch known product names, uploading without de-duplication");
                HashSet::new()
            }
        }
    }

    async fn process_entry(
        &self,
        position: usize,
        total: usize,
        entry: ListingEntry,
        location: &DeliveryLocation,
        timeout: Duration,
        known: &HashSet<String>,
    ) -> ProductResult {
        tracing::info!(
            position,
            total,
            product = %entry.name,
            url = %entry.detail_url,
            "processing product"
        );
        let mut product = ProductResult::new(entry);
        if is_known(&product, known) {
            mark_known(&mut product);
            return product;
        }

        let url = product.entry.detail_url.clone();
        let html = match self.fetcher.fetch(&url, location, timeout).await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!(product = %product.entry.name, error = %e, "detail fetch failed");
                product.record(StageError::new(Stage::Fetch, e.reason(), e.to_string()).with_url(url));
                return product;
            }
        };

        let detail = parse_detail(&html, &self.site_origin);
        if detail.is_empty() {
            let (reason, message) = match detail.state {
                StateStatus::Malformed => (
                    FailureReason::Malformed,
                    "embedded page state could not be parsed",
                ),
                StateStatus::Missing | StateStatus::Found => {
                    (FailureReason::Empty, "detail page yielded no product data")
                }
            };
            tracing::warn!(product = %product.entry.name, %reason, "detail parse produced nothing");
            product.record(StageError::new(Stage::Parse, reason, message).with_url(url));
            return product;
        }

        product.detail_name = detail.name;
        product.images = detail.images;
        product.listed_nutrition = detail.listed_nutrition;
        product.ingredients = detail.ingredients;
        product.description = detail.description;
        product.fssai_license = detail.fssai_license;
        if product.entry.name.is_empty() {
            if let Some(name) = &product.detail_name {
                product.entry.name.clone_from(name);
            }
        }
        if product.entry.hero_image_url.is_empty() {
            if let Some(first) = product.images.first() {
                product.entry.hero_image_url.clone_from(first);
            }
        }

        if is_known(&product, known) {
            mark_known(&mut product);
            return product;
        }

        self.recognize_into(&mut product).await;
        product
    }

    async fn recognize_into(&self, product: &mut ProductResult) {
        if product.images.is_empty() {
            tracing::warn!(product = %product.entry.name, "no product images, skipping OCR");
            product.record(StageError::new(
                Stage::Extract,
                FailureReason::NoImages,
                "detail page lists no product images",
            ));
            return;
        }

        let run = self.recognizer.recognize(&product.images).await;
        let texts = run.texts();
        let nutrition = extract_nutrition(&run.pages);
        let ocr_failed = !run.failures.is_empty();
        for (url, err) in run.failures {
            product.record(StageError::new(Stage::Ocr, err.reason(), err.to_string()).with_url(url));
        }

        if texts.is_empty() {
            if !ocr_failed {
                tracing::warn!(product = %product.entry.name, "OCR found no text");
                product.record(StageError::new(
                    Stage::Extract,
                    FailureReason::NoText,
                    "OCR found no text in product images",
                ));
            }
            return;
        }

        tracing::info!(
            product = %product.entry.name,
            calls = run.calls,
            pages = texts.len(),
            nutrients = nutrition.len(),
            "extracted nutrition"
        );
        product.ocr_text = texts;
        product.nutrition = nutrition;
    }

    /// Pushes each eligible product once, in listing order. Names pushed
    /// during the run join `registry`, so a product listed twice is sent once.
    async fn upload_pass(&self, products: &mut [ProductResult], mut registry: HashSet<String>) {
        if !self.uploader.is_enabled() {
            return;
        }
        for product in products.iter_mut() {
            if self.is_cancelled() {
                tracing::warn!("run cancelled, skipping remaining uploads");
                break;
            }
            if product.known_upstream || product.uploaded {
                continue;
            }
            let Some(record) = UploadRecord::from_product(product) else {
                continue;
            };
            let names = product.candidate_names();
            if names.iter().any(|n| registry.contains(n)) {
                tracing::info!(product = %product.entry.name, "already uploaded this run, skipping");
                continue;
            }

            match self.uploader.push(&record).await {
                Ok(()) => {
                    product.uploaded = true;
                    registry.extend(names);
                }
                Err(e) => {
                    tracing::warn!(product = %product.entry.name, error = %e, "upload failed");
                    let mut failure = StageError::new(Stage::Upload, e.reason(), e.to_string());
                    if !product.entry.detail_url.is_empty() {
                        failure = failure.with_url(product.entry.detail_url.clone());
                    }
                    product.record(failure);
                }
            }
        }
    }
}

fn cap<T>(mut items: Vec<T>, max: Option<usize>) -> Vec<T> {
    if let Some(max) = max {
        items.truncate(max);
    }
    items
}

fn is_known(product: &ProductResult, known: &HashSet<String>) -> bool {
    !known.is_empty() && product.candidate_names().iter().any(|n| known.contains(n))
}

fn mark_known(product: &mut ProductResult) {
    tracing::info!(product = %product.entry.name, "already known upstream, skipping OCR and upload");
    product.known_upstream = true;
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;
