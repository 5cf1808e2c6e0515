//! Reading and writing combined report files.

use std::path::{Path, PathBuf};

use shelfscan_core::CombinedReport;

use crate::error::PipelineError;

const REPORT_PREFIX: &str = "combined_report_";

/// `combined_report_<YYYYMMDD_HHMMSS>.json`, from the report's UTC timestamp.
#[must_use]
pub fn report_file_name(report: &CombinedReport) -> String {
    format!(
        "{REPORT_PREFIX}{}.json",
        report.generated_at.format("%Y%m%d_%H%M%S")
    )
}

/// Writes `report` as pretty-printed JSON with a trailing newline into `dir`,
/// creating the directory if needed. Returns the written path.
///
/// # Errors
///
/// Returns [`PipelineError::WriteReport`] on I/O failure and
/// [`PipelineError::Serialize`] if the report cannot be serialized.
pub fn write_report(dir: &Path, report: &CombinedReport) -> Result<PathBuf, PipelineError> {
    std::fs::create_dir_all(dir).map_err(|source| PipelineError::WriteReport {
        path: dir.to_path_buf(),
        source,
    })?;

    let path = dir.join(report_file_name(report));
    let mut body = serde_json::to_string_pretty(report)?;
    body.push('\n');
    std::fs::write(&path, body).map_err(|source| PipelineError::WriteReport {
        path: path.clone(),
        source,
    })?;

    tracing::info!(path = %path.display(), products = report.products.len(), "wrote report");
    Ok(path)
}

/// # Errors
///
/// Returns [`PipelineError::ReadReport`] when the file cannot be read and
/// [`PipelineError::InvalidReport`] when it is not a combined report.
pub fn load_report(path: &Path) -> Result<CombinedReport, PipelineError> {
    let raw = std::fs::read_to_string(path).map_err(|source| PipelineError::ReadReport {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| PipelineError::InvalidReport {
        path: path.to_path_buf(),
        source,
    })
}

/// Report files in `dir`, oldest first (names sort chronologically).
///
/// # Errors
///
/// Returns [`PipelineError::ReadReport`] when the directory cannot be listed.
pub fn discover_reports(dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    let entries = std::fs::read_dir(dir).map_err(|source| PipelineError::ReadReport {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(REPORT_PREFIX) && n.ends_with(".json"))
        })
        .collect();
    paths.sort();
    Ok(paths)
}
