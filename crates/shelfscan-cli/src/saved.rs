//! `upload-saved`: finish OCR and uploads for products from earlier reports.

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use shelfscan_core::{AppConfig, DeliveryLocation};
use shelfscan_pipeline::{discover_reports, load_report};

use crate::{batch, setup, RunArgs};

pub(crate) struct SavedInputs {
    pub(crate) input_dir: PathBuf,
    pub(crate) input_files: Vec<PathBuf>,
    pub(crate) force_ocr: bool,
}

/// Loads saved reports and reprocesses their products.
///
/// The delivery location comes from `location_override` when the user gave
/// one, otherwise from the first report loaded.
///
/// # Errors
///
/// Returns an error when no reports are found, a report cannot be loaded,
/// the reports hold no products, or the new report cannot be written.
pub(crate) async fn run_upload_saved(
    config: &AppConfig,
    location_override: Option<&DeliveryLocation>,
    inputs: &SavedInputs,
    output_dir: &Path,
    run: &RunArgs,
    cancel: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let paths = if inputs.input_files.is_empty() {
        discover_reports(&inputs.input_dir)?
    } else {
        inputs.input_files.clone()
    };
    if paths.is_empty() {
        anyhow::bail!(
            "no combined_report_*.json files found in {}",
            inputs.input_dir.display()
        );
    }

    let mut location = location_override.cloned();
    let mut products = Vec::new();
    for path in &paths {
        let report = load_report(path)?;
        tracing::info!(
            path = %path.display(),
            products = report.products.len(),
            "loaded saved report"
        );
        location.get_or_insert(report.location);
        products.extend(report.products);
    }
    if products.is_empty() {
        anyhow::bail!("saved reports contain no products");
    }
    let Some(location) = location else {
        anyhow::bail!("saved reports carry no delivery location");
    };

    let names: Vec<String> = paths
        .iter()
        .map(|p| {
            p.file_name()
                .map_or_else(|| p.display().to_string(), |n| n.to_string_lossy().into_owned())
        })
        .collect();
    let source = format!("stored-reports:{}", names.join(","));

    let orchestrator = setup::orchestrator(config, run)?.with_cancel_flag(cancel);
    let report = orchestrator
        .rerun_saved(
            &source,
            products,
            &location,
            &setup::limits(config, run),
            setup::mode(run),
            inputs.force_ocr,
        )
        .await;
    batch::finish(output_dir, &report)
}
