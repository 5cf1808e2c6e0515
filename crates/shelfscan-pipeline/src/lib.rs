//! The batch pipeline: listing discovery, per-product detail extraction, OCR,
//! nutrition extraction, optional upload and the combined report.

pub mod error;
pub mod orchestrator;
pub mod report;

pub use error::PipelineError;
pub use orchestrator::{BatchOrchestrator, RunLimits, RunMode};
pub use report::{discover_reports, load_report, report_file_name, write_report};
