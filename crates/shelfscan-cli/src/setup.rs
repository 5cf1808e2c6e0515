//! Builds the pipeline collaborators from configuration.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use shelfscan_core::AppConfig;
use shelfscan_ocr::{BatchRecognizer, HttpImageSource, ImageSource, VisionClient, VisionCredentials};
use shelfscan_pipeline::{BatchOrchestrator, RunLimits, RunMode};
use shelfscan_scraper::HttpPageFetcher;
use shelfscan_upload::{DisabledUploader, NutriSnapClient, Uploader};

use crate::RunArgs;

pub(crate) type Orchestrator = BatchOrchestrator<HttpPageFetcher, VisionClient, Box<dyn Uploader>>;

pub(crate) fn fetcher(config: &AppConfig) -> anyhow::Result<HttpPageFetcher> {
    HttpPageFetcher::new(
        &config.user_agent,
        config.fetch_max_retries,
        config.retry_backoff_base_ms,
    )
    .context("failed to build page fetcher")
}

/// Loads credentials eagerly so a bad credentials file fails before any
/// scraping starts.
pub(crate) fn vision_client(
    config: &AppConfig,
    creds_override: Option<&Path>,
) -> anyhow::Result<(VisionClient, Arc<dyn ImageSource>)> {
    let creds_path = creds_override.unwrap_or(config.ocr_credentials_path.as_path());
    let credentials = VisionCredentials::from_file(creds_path)
        .with_context(|| format!("loading OCR credentials from {}", creds_path.display()))?;

    let images: Arc<dyn ImageSource> = Arc::new(
        HttpImageSource::new(config.image_download_timeout_secs, &config.user_agent)
            .context("failed to build image downloader")?,
    );
    let client = VisionClient::new(
        &config.ocr_endpoint,
        credentials,
        Arc::clone(&images),
        config.ocr_timeout_secs,
        config.ocr_max_retries,
        config.retry_backoff_base_ms,
    )
    .context("failed to build OCR client")?;
    Ok((client, images))
}

pub(crate) fn uploader(config: &AppConfig) -> anyhow::Result<Box<dyn Uploader>> {
    if config.upload_url.trim().is_empty() {
        tracing::info!("no upload URL configured, uploads disabled");
        return Ok(Box::new(DisabledUploader));
    }
    let client = NutriSnapClient::new(
        &config.upload_url,
        &config.product_names_url,
        config.upload_token.clone(),
        config.upload_timeout_secs,
        &config.user_agent,
    )
    .context("failed to build upload client")?;
    Ok(Box::new(client))
}

pub(crate) fn orchestrator(config: &AppConfig, run: &RunArgs) -> anyhow::Result<Orchestrator> {
    let (vision, images) = vision_client(config, run.ocr_creds.as_deref())?;
    Ok(BatchOrchestrator::new(
        fetcher(config)?,
        BatchRecognizer::new(vision, images, config.ocr_batch_size),
        uploader(config)?,
        &config.site_origin,
    ))
}

pub(crate) fn limits(config: &AppConfig, run: &RunArgs) -> RunLimits {
    RunLimits {
        max_products: run.max_products,
        listing_timeout: Duration::from_secs(
            run.listing_timeout.unwrap_or(config.listing_timeout_secs),
        ),
        product_timeout: Duration::from_secs(
            run.product_timeout.unwrap_or(config.product_timeout_secs),
        ),
        max_concurrent_products: run
            .concurrency
            .unwrap_or(config.max_concurrent_products)
            .max(1),
    }
}

pub(crate) fn mode(run: &RunArgs) -> RunMode {
    RunMode {
        dry_run: run.dry_run,
    }
}
