//! Shared data model and configuration for shelfscan.
//!
//! Every other crate in the workspace speaks in these types: the listing
//! entries the scraper discovers, the per-product results the pipeline
//! accumulates, the stage failures attached to them, and the combined report
//! written at the end of a run.

mod app_config;
mod config;
pub mod location;
pub mod products;
pub mod report;
pub mod stage;

pub use app_config::AppConfig;
pub use config::{load_app_config, load_app_config_from_env};
pub use location::{DeliveryLocation, LocationError, LocationPreset, LocationSpec};
pub use products::{
    normalize_name, slugify, ListedNutrient, ListingEntry, NutrientValue, NutritionFields,
    ProductResult,
};
pub use report::{CombinedReport, ListingDiagnostics, RunSummary};
pub use stage::{FailureReason, Stage, StageError};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for environment variable {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
