//! `batch` and `urls`: full pipeline runs that end in a report file.

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Context;
use shelfscan_core::{AppConfig, CombinedReport, DeliveryLocation, ListingDiagnostics};
use shelfscan_pipeline::write_report;
use shelfscan_scraper::entries_from_url_list;

use crate::{setup, RunArgs};

/// Runs the pipeline from a listing URL or snapshot.
///
/// # Errors
///
/// Returns an error when collaborators cannot be built, the listing stage
/// fails, or the report cannot be written. Per-product failures only appear
/// in the report.
pub(crate) async fn run_batch(
    config: &AppConfig,
    location: &DeliveryLocation,
    output_dir: &Path,
    listing_target: &str,
    run: &RunArgs,
    cancel: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let orchestrator = setup::orchestrator(config, run)?.with_cancel_flag(cancel);
    let report = orchestrator
        .run(
            listing_target,
            location,
            &setup::limits(config, run),
            setup::mode(run),
        )
        .await?;
    finish(output_dir, &report)
}

/// Runs the pipeline over product URLs read from a file.
///
/// # Errors
///
/// Returns an error when the file cannot be read or holds no URLs, or when
/// the report cannot be written.
pub(crate) async fn run_urls(
    config: &AppConfig,
    location: &DeliveryLocation,
    output_dir: &Path,
    urls_file: &Path,
    run: &RunArgs,
    cancel: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(urls_file)
        .with_context(|| format!("reading URL list {}", urls_file.display()))?;
    let entries = entries_from_url_list(&text, &config.site_origin);
    if entries.is_empty() {
        anyhow::bail!("{} contains no product URLs", urls_file.display());
    }
    tracing::info!(urls = entries.len(), file = %urls_file.display(), "loaded product URLs");

    let orchestrator = setup::orchestrator(config, run)?.with_cancel_flag(cancel);
    let report = orchestrator
        .run_entries(
            &format!("url-list:{}", urls_file.display()),
            entries,
            ListingDiagnostics::default(),
            location,
            &setup::limits(config, run),
            setup::mode(run),
        )
        .await;
    finish(output_dir, &report)
}

pub(crate) fn finish(output_dir: &Path, report: &CombinedReport) -> anyhow::Result<()> {
    let path = write_report(output_dir, report)?;
    let summary = &report.summary;
    println!(
        "{} products ({} with nutrition, {} with failures, {} uploaded){}",
        summary.products,
        summary.with_nutrition,
        summary.failed,
        summary.uploaded,
        if report.cancelled { " [cancelled]" } else { "" }
    );
    println!("report written to {}", path.display());
    Ok(())
}
