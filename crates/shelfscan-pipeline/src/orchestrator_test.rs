use std::collections::HashMap;
use std::sync::atomic::AtomicU32;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;
use shelfscan_core::{normalize_name, LocationPreset, NutrientValue};
use shelfscan_ocr::{ImageRef, ImageSource, OcrError, TextAnnotation};
use shelfscan_scraper::FetchError;
use shelfscan_upload::UploadError;

use super::*;

const ORIGIN: &str = "https://blinkit.com";
const LISTING: &str = "https://blinkit.com/cn/bread/cid/14/953";
const LABEL: &str = "Nutrition Information\nEnergy 250 kcal\nProtein 8 g";

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn detail_url(id: u32) -> String {
    format!("{ORIGIN}/prn/p{id}/prid/{id}")
}

fn image_url(id: u32, n: u32) -> String {
    format!("https://cdn.grofers.com/app/images/products/sliding_image/{id}-{n}.jpg")
}

fn listing_html(products: &[(u32, &str)]) -> String {
    let cards: Vec<String> = products
        .iter()
        .map(|(id, name)| {
            format!(
                r#"<a href="/prn/p{id}/prid/{id}"><div role="button" id="{id}">
                     <img src="https://cdn.grofers.com/app/images/product/{id}.jpg">
                     <div class="tw-text-300 tw-font-semibold">{name}</div>
                   </div></a>"#
            )
        })
        .collect();
    format!(
        r#"<html><body><div id="plpContainer">{}</div></body></html>"#,
        cards.join("\n")
    )
}

fn detail_html(name: &str, images: &[String]) -> String {
    let items: Vec<_> = images
        .iter()
        .map(|url| {
            json!({ "data": { "media_content": { "media_type": "image", "image": { "url": url } } } })
        })
        .collect();
    let state = json!({ "ui": { "pdp": { "bffPdp": { "bffData": {
        "snippets": [{ "data": { "title": { "text": name }, "itemList": items } }]
    } } } } });
    format!(
        "<html><head><script>window.grofers.PRELOADED_STATE = {state};</script></head><body></body></html>"
    )
}

enum Page {
    Html(String),
    Timeout,
}

#[derive(Default)]
struct MockFetcher {
    pages: HashMap<String, Page>,
    requested: Mutex<Vec<String>>,
    /// Raises the flag while serving this target.
    cancel_on: Option<(String, Arc<AtomicBool>)>,
}

impl MockFetcher {
    fn with_listing(products: &[(u32, &str)]) -> Self {
        let mut fetcher = Self::default();
        fetcher
            .pages
            .insert(LISTING.to_owned(), Page::Html(listing_html(products)));
        for (id, name) in products {
            let images = vec![image_url(*id, 1), image_url(*id, 2)];
            fetcher
                .pages
                .insert(detail_url(*id), Page::Html(detail_html(name, &images)));
        }
        fetcher
    }

    fn set(&mut self, target: String, page: Page) {
        self.pages.insert(target, page);
    }

    fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch(
        &self,
        target: &str,
        _location: &DeliveryLocation,
        timeout: Duration,
    ) -> Result<String, FetchError> {
        self.requested.lock().unwrap().push(target.to_owned());
        if let Some((on, flag)) = &self.cancel_on {
            if on == target {
                flag.store(true, Ordering::SeqCst);
            }
        }
        match self.pages.get(target) {
            Some(Page::Html(html)) => Ok(html.clone()),
            Some(Page::Timeout) => Err(FetchError::Timeout {
                url: target.to_owned(),
                timeout_secs: timeout.as_secs(),
            }),
            None => Err(FetchError::UnexpectedStatus {
                status: 404,
                url: target.to_owned(),
            }),
        }
    }
}

/// Answers every image with `LABEL` unless the URL is scripted otherwise.
#[derive(Default)]
struct LabelEngine {
    blank: Vec<String>,
    quota: Vec<String>,
    calls: AtomicU32,
}

#[async_trait]
impl OcrEngine for LabelEngine {
    async fn detect_text(&self, image: &ImageRef) -> Result<Vec<TextAnnotation>, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let ImageRef::Url(url) = image else {
            panic!("batch size 1 never sends stitched bytes");
        };
        if self.quota.contains(url) {
            return Err(OcrError::Quota("daily limit reached".to_owned()));
        }
        if self.blank.contains(url) {
            return Ok(Vec::new());
        }
        Ok(vec![TextAnnotation::text(LABEL)])
    }
}

struct NoDownloads;

#[async_trait]
impl ImageSource for NoDownloads {
    async fn load(&self, url: &str) -> Result<Vec<u8>, OcrError> {
        Err(OcrError::Network(format!("{url} not downloadable in tests")))
    }
}

#[derive(Default)]
struct RecordingUploader {
    known: Vec<&'static str>,
    rejecting: Vec<&'static str>,
    pushed: Mutex<Vec<String>>,
    name_lookups: AtomicU32,
}

impl RecordingUploader {
    fn pushed(&self) -> Vec<String> {
        self.pushed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Uploader for RecordingUploader {
    async fn push(&self, record: &UploadRecord) -> Result<(), UploadError> {
        self.pushed.lock().unwrap().push(record.listing_name.clone());
        if self.rejecting.iter().any(|n| *n == record.listing_name) {
            return Err(UploadError::Validation {
                status: 422,
                body: "rejected".to_owned(),
            });
        }
        Ok(())
    }

    async fn known_products(&self) -> Result<HashSet<String>, UploadError> {
        self.name_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.known.iter().filter_map(|n| normalize_name(n)).collect())
    }
}

type TestOrchestrator = BatchOrchestrator<MockFetcher, LabelEngine, RecordingUploader>;

fn orchestrator(
    fetcher: MockFetcher,
    engine: LabelEngine,
    uploader: RecordingUploader,
) -> TestOrchestrator {
    BatchOrchestrator::new(
        fetcher,
        BatchRecognizer::new(engine, Arc::new(NoDownloads), 1),
        uploader,
        ORIGIN,
    )
}

fn location() -> DeliveryLocation {
    LocationPreset::Gurugram.location()
}

const THREE: [(u32, &str); 3] = [(1, "Bread A"), (2, "Bread B"), (3, "Bread C")];

async fn run(orch: &TestOrchestrator, limits: RunLimits, mode: RunMode) -> CombinedReport {
    orch.run(LISTING, &location(), &limits, mode)
        .await
        .expect("listing stage should succeed")
}

fn names(report: &CombinedReport) -> Vec<&str> {
    report.products.iter().map(|p| p.entry.name.as_str()).collect()
}

// ---------------------------------------------------------------------------
// Ordering and limits
// ---------------------------------------------------------------------------

#[tokio::test]
async fn every_entry_yields_one_result_in_listing_order() {
    let orch = orchestrator(
        MockFetcher::with_listing(&THREE),
        LabelEngine::default(),
        RecordingUploader::default(),
    );
    let report = run(&orch, RunLimits::default(), RunMode::default()).await;

    assert_eq!(names(&report), ["Bread A", "Bread B", "Bread C"]);
    assert!(!report.cancelled);
    for product in &report.products {
        assert!(!product.has_failures(), "{:?}", product.stage_failures);
        assert_eq!(
            product.nutrition.get("energy"),
            Some(&NutrientValue::amount(250.0, Some("kcal")))
        );
        assert_eq!(product.ocr_text, [LABEL, LABEL]);
        assert!(product.uploaded);
    }
    assert_eq!(orch.uploader().pushed(), ["Bread A", "Bread B", "Bread C"]);
    assert_eq!(report.summary.uploaded, 3);
}

#[tokio::test]
async fn max_products_keeps_only_the_first_entries() {
    let orch = orchestrator(
        MockFetcher::with_listing(&THREE),
        LabelEngine::default(),
        RecordingUploader::default(),
    );
    let limits = RunLimits {
        max_products: Some(2),
        ..RunLimits::default()
    };
    let report = run(&orch, limits, RunMode::default()).await;

    assert_eq!(names(&report), ["Bread A", "Bread B"]);
    assert!(!orch.fetcher().requested().contains(&detail_url(3)));
}

#[tokio::test]
async fn concurrent_chains_still_report_in_listing_order() {
    let orch = orchestrator(
        MockFetcher::with_listing(&THREE),
        LabelEngine::default(),
        RecordingUploader::default(),
    );
    let limits = RunLimits {
        max_concurrent_products: 3,
        ..RunLimits::default()
    };
    let report = run(&orch, limits, RunMode::default()).await;

    assert_eq!(names(&report), ["Bread A", "Bread B", "Bread C"]);
    assert_eq!(orch.uploader().pushed(), ["Bread A", "Bread B", "Bread C"]);
}

// ---------------------------------------------------------------------------
// Per-product isolation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn detail_fetch_failure_is_recorded_and_later_products_continue() {
    let mut fetcher = MockFetcher::with_listing(&THREE);
    fetcher.set(detail_url(2), Page::Timeout);
    let orch = orchestrator(fetcher, LabelEngine::default(), RecordingUploader::default());
    let report = run(&orch, RunLimits::default(), RunMode::default()).await;

    let failed = &report.products[1];
    assert_eq!(failed.stage_failures.len(), 1);
    let failure = &failed.stage_failures[0];
    assert_eq!(failure.stage, Stage::Fetch);
    assert_eq!(failure.reason, FailureReason::Timeout);
    assert_eq!(failure.url.as_deref(), Some(detail_url(2).as_str()));
    assert!(failed.images.is_empty());
    assert!(failed.nutrition.is_empty());

    assert!(!report.products[2].nutrition.is_empty());
    assert_eq!(orch.uploader().pushed(), ["Bread A", "Bread C"]);
    assert_eq!(report.summary.failed, 1);
}

#[tokio::test]
async fn product_without_images_skips_ocr() {
    let mut fetcher = MockFetcher::with_listing(&THREE[..1]);
    fetcher.set(detail_url(1), Page::Html(detail_html("Bread A", &[])));
    let orch = orchestrator(fetcher, LabelEngine::default(), RecordingUploader::default());
    let report = run(&orch, RunLimits::default(), RunMode::default()).await;

    let product = &report.products[0];
    assert_eq!(product.detail_name.as_deref(), Some("Bread A"));
    assert!(product.failed_at(Stage::Extract));
    assert_eq!(product.stage_failures[0].reason, FailureReason::NoImages);
    assert!(product.nutrition.is_empty());
    assert_eq!(orch.recognizer().engine().calls.load(Ordering::SeqCst), 0);
    assert!(orch.uploader().pushed().is_empty());
}

#[tokio::test]
async fn unparseable_detail_pages_are_parse_failures() {
    let mut fetcher = MockFetcher::with_listing(&THREE[..2]);
    fetcher.set(
        detail_url(1),
        Page::Html(
            "<script>window.grofers.PRELOADED_STATE = {\"ui\": [broken</script>".to_owned(),
        ),
    );
    fetcher.set(detail_url(2), Page::Html("<html><body>Nothing here</body></html>".to_owned()));
    let orch = orchestrator(fetcher, LabelEngine::default(), RecordingUploader::default());
    let report = run(&orch, RunLimits::default(), RunMode::default()).await;

    let reasons: Vec<(Stage, FailureReason)> = report
        .products
        .iter()
        .map(|p| (p.stage_failures[0].stage, p.stage_failures[0].reason))
        .collect();
    assert_eq!(
        reasons,
        [
            (Stage::Parse, FailureReason::Malformed),
            (Stage::Parse, FailureReason::Empty)
        ]
    );
}

#[tokio::test]
async fn ocr_failures_and_blank_text_are_recorded_per_image() {
    let fetcher = MockFetcher::with_listing(&THREE[..2]);
    let engine = LabelEngine {
        quota: vec![image_url(1, 2)],
        blank: vec![image_url(2, 1), image_url(2, 2)],
        ..LabelEngine::default()
    };
    let orch = orchestrator(fetcher, engine, RecordingUploader::default());
    let report = run(&orch, RunLimits::default(), RunMode::default()).await;

    // Product 1: one image failed, the other still produced nutrition.
    let partial = &report.products[0];
    assert_eq!(partial.stage_failures.len(), 1);
    assert_eq!(partial.stage_failures[0].stage, Stage::Ocr);
    assert_eq!(partial.stage_failures[0].reason, FailureReason::Quota);
    assert_eq!(partial.stage_failures[0].url, Some(image_url(1, 2)));
    assert!(!partial.nutrition.is_empty());

    // Product 2: OCR ran but found nothing.
    let blank = &report.products[1];
    assert_eq!(blank.stage_failures[0].stage, Stage::Extract);
    assert_eq!(blank.stage_failures[0].reason, FailureReason::NoText);
    assert!(blank.ocr_text.is_empty());
}

// ---------------------------------------------------------------------------
// Upload stage
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dry_run_never_calls_the_uploader() {
    let orch = orchestrator(
        MockFetcher::with_listing(&THREE),
        LabelEngine::default(),
        RecordingUploader::default(),
    );
    let report = run(&orch, RunLimits::default(), RunMode { dry_run: true }).await;

    assert!(report.dry_run);
    assert!(orch.uploader().pushed().is_empty());
    assert_eq!(orch.uploader().name_lookups.load(Ordering::SeqCst), 0);
    assert_eq!(report.summary.with_nutrition, 3);
    assert!(report.products.iter().all(|p| !p.uploaded));
}

#[tokio::test]
async fn upload_failure_keeps_nutrition_and_other_uploads() {
    let uploader = RecordingUploader {
        rejecting: vec!["Bread A"],
        ..RecordingUploader::default()
    };
    let orch = orchestrator(MockFetcher::with_listing(&THREE), LabelEngine::default(), uploader);
    let report = run(&orch, RunLimits::default(), RunMode::default()).await;

    let rejected = &report.products[0];
    assert!(!rejected.uploaded);
    assert!(!rejected.nutrition.is_empty());
    assert_eq!(rejected.stage_failures.len(), 1);
    assert_eq!(rejected.stage_failures[0].stage, Stage::Upload);
    assert_eq!(rejected.stage_failures[0].reason, FailureReason::Validation);

    assert_eq!(orch.uploader().pushed(), ["Bread A", "Bread B", "Bread C"]);
    assert!(report.products[1].uploaded && report.products[2].uploaded);
}

#[tokio::test]
async fn products_known_upstream_skip_ocr_and_upload() {
    let uploader = RecordingUploader {
        known: vec!["  bread b"],
        ..RecordingUploader::default()
    };
    let orch = orchestrator(MockFetcher::with_listing(&THREE), LabelEngine::default(), uploader);
    let report = run(&orch, RunLimits::default(), RunMode::default()).await;

    let known = &report.products[1];
    assert!(known.known_upstream);
    assert!(known.ocr_text.is_empty());
    assert!(!orch.fetcher().requested().contains(&detail_url(2)));
    assert_eq!(orch.recognizer().engine().calls.load(Ordering::SeqCst), 4);
    assert_eq!(orch.uploader().pushed(), ["Bread A", "Bread C"]);
}

#[tokio::test]
async fn duplicate_listing_entries_are_uploaded_once() {
    let mut fetcher = MockFetcher::with_listing(&[(1, "Bread A"), (2, "bread a")]);
    fetcher.set(
        detail_url(2),
        Page::Html(detail_html("Bread A", &[image_url(2, 1)])),
    );
    let orch = orchestrator(fetcher, LabelEngine::default(), RecordingUploader::default());
    let report = run(&orch, RunLimits::default(), RunMode::default()).await;

    assert_eq!(orch.uploader().pushed(), ["Bread A"]);
    assert!(report.products[0].uploaded);
    assert!(!report.products[1].uploaded);
    assert!(!report.products[1].has_failures());
}

// ---------------------------------------------------------------------------
// Run-level behaviour
// ---------------------------------------------------------------------------

#[tokio::test]
async fn identical_inputs_produce_identical_reports() {
    let make = || {
        orchestrator(
            MockFetcher::with_listing(&THREE),
            LabelEngine {
                quota: vec![image_url(3, 1)],
                ..LabelEngine::default()
            },
            RecordingUploader::default(),
        )
    };
    let mut first = run(&make(), RunLimits::default(), RunMode { dry_run: true }).await;
    let second = run(&make(), RunLimits::default(), RunMode { dry_run: true }).await;
    first.generated_at = second.generated_at;

    assert_eq!(
        serde_json::to_string_pretty(&first).unwrap(),
        serde_json::to_string_pretty(&second).unwrap()
    );
}

#[tokio::test]
async fn cancellation_stops_before_next_product_and_skips_uploads() {
    let flag = Arc::new(AtomicBool::new(false));
    let mut fetcher = MockFetcher::with_listing(&THREE);
    fetcher.cancel_on = Some((detail_url(1), Arc::clone(&flag)));
    let orch = orchestrator(fetcher, LabelEngine::default(), RecordingUploader::default())
        .with_cancel_flag(flag);
    let report = run(&orch, RunLimits::default(), RunMode::default()).await;

    assert!(report.cancelled);
    assert_eq!(names(&report), ["Bread A"]);
    assert!(!report.products[0].nutrition.is_empty());
    assert!(orch.uploader().pushed().is_empty());
}

#[tokio::test]
async fn listing_fetch_failure_aborts_the_run() {
    let orch = orchestrator(
        MockFetcher::default(),
        LabelEngine::default(),
        RecordingUploader::default(),
    );
    let err = orch
        .run(LISTING, &location(), &RunLimits::default(), RunMode::default())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::ListingFetch { .. }), "got: {err:?}");
    assert_eq!(err.reason(), Some(FailureReason::Network));
}

#[tokio::test]
async fn listing_without_entries_aborts_the_run() {
    let mut fetcher = MockFetcher::default();
    fetcher.set(LISTING.to_owned(), Page::Html("<html><body>Oops</body></html>".to_owned()));
    let orch = orchestrator(fetcher, LabelEngine::default(), RecordingUploader::default());
    let err = orch
        .run(LISTING, &location(), &RunLimits::default(), RunMode::default())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::EmptyListing { .. }), "got: {err:?}");
    assert!(orch.uploader().pushed().is_empty());
}

#[tokio::test]
async fn url_entries_take_name_and_hero_image_from_detail_page() {
    let fetcher = MockFetcher::with_listing(&THREE[..1]);
    let orch = orchestrator(fetcher, LabelEngine::default(), RecordingUploader::default());
    let entries = shelfscan_scraper::entries_from_url_list(&detail_url(1), ORIGIN);

    let report = orch
        .run_entries(
            "url-list:urls.txt",
            entries,
            ListingDiagnostics::default(),
            &location(),
            &RunLimits::default(),
            RunMode { dry_run: true },
        )
        .await;

    let product = &report.products[0];
    assert_eq!(product.entry.name, "Bread A");
    assert_eq!(product.entry.hero_image_url, image_url(1, 1));
    assert_eq!(report.source_listing_url, "url-list:urls.txt");
}

// ---------------------------------------------------------------------------
// Saved reports
// ---------------------------------------------------------------------------

fn saved_product(id: u32, name: &str, ocr_text: &[&str]) -> ProductResult {
    let mut product = ProductResult::new(ListingEntry {
        name: name.to_owned(),
        hero_image_url: image_url(id, 0),
        detail_url: detail_url(id),
        product_id: Some(id.to_string()),
    });
    product.images = vec![image_url(id, 1)];
    product.ocr_text = ocr_text.iter().map(|t| (*t).to_owned()).collect();
    product
}

#[tokio::test]
async fn saved_products_rerun_ocr_only_when_missing() {
    let orch = orchestrator(
        MockFetcher::default(),
        LabelEngine::default(),
        RecordingUploader::default(),
    );
    let mut stale = saved_product(2, "Bread B", &[]);
    stale.record(StageError::new(Stage::Upload, FailureReason::Network, "timeout"));
    let products = vec![saved_product(1, "Bread A", &["Protein 3 g"]), stale];

    let report = orch
        .rerun_saved(
            "stored-reports:a.json",
            products,
            &location(),
            &RunLimits::default(),
            RunMode::default(),
            false,
        )
        .await;

    assert_eq!(orch.recognizer().engine().calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.products[0].ocr_text, ["Protein 3 g"]);
    assert!(report.products[0].nutrition.is_empty());
    assert_eq!(report.products[1].ocr_text, [LABEL]);
    assert!(!report.products[1].has_failures());
    assert_eq!(orch.uploader().pushed(), ["Bread B"]);
    assert!(orch.fetcher().requested().is_empty());
}

#[tokio::test]
async fn forced_rerun_replaces_saved_ocr_text() {
    let orch = orchestrator(
        MockFetcher::default(),
        LabelEngine::default(),
        RecordingUploader::default(),
    );
    let report = orch
        .rerun_saved(
            "stored-reports:a.json",
            vec![saved_product(1, "Bread A", &["old text"])],
            &location(),
            &RunLimits::default(),
            RunMode { dry_run: true },
            true,
        )
        .await;

    assert_eq!(report.products[0].ocr_text, [LABEL]);
    assert!(!report.products[0].nutrition.is_empty());
    assert!(orch.uploader().pushed().is_empty());
}

#[tokio::test]
async fn saved_fetch_failures_are_not_reprocessed() {
    let orch = orchestrator(
        MockFetcher::default(),
        LabelEngine::default(),
        RecordingUploader::default(),
    );
    let mut broken = saved_product(1, "Bread A", &[]);
    broken.images.clear();
    broken.record(StageError::new(Stage::Fetch, FailureReason::Timeout, "timed out"));

    let report = orch
        .rerun_saved(
            "stored-reports:a.json",
            vec![broken],
            &location(),
            &RunLimits::default(),
            RunMode { dry_run: true },
            true,
        )
        .await;

    let product = &report.products[0];
    assert_eq!(orch.recognizer().engine().calls.load(Ordering::SeqCst), 0);
    assert_eq!(product.stage_failures.len(), 1);
    assert!(product.failed_at(Stage::Fetch));
    assert!(!product.failed_at(Stage::Extract));
}

#[tokio::test]
async fn saved_known_flag_follows_current_registry() {
    let orch = orchestrator(
        MockFetcher::default(),
        LabelEngine::default(),
        RecordingUploader {
            known: vec!["Bread B"],
            ..RecordingUploader::default()
        },
    );
    let mut dropped_upstream = saved_product(1, "Bread A", &[]);
    dropped_upstream.known_upstream = true;
    let mut still_known = saved_product(2, "Bread B", &[]);
    still_known.known_upstream = true;

    let report = orch
        .rerun_saved(
            "stored-reports:a.json",
            vec![dropped_upstream, still_known],
            &location(),
            &RunLimits::default(),
            RunMode::default(),
            false,
        )
        .await;

    let (a, b) = (&report.products[0], &report.products[1]);
    assert!(!a.known_upstream);
    assert_eq!(a.ocr_text, [LABEL]);
    assert!(a.uploaded);
    assert!(b.known_upstream);
    assert!(b.ocr_text.is_empty());
    assert_eq!(orch.uploader().pushed(), ["Bread A"]);
}
