//! Forwarding extracted nutrition records to the NutriSnap ingestion service.

pub mod client;
pub mod error;
pub mod payload;

pub use client::{DisabledUploader, NutriSnapClient, Uploader};
pub use error::UploadError;
pub use payload::{split_ingredients, UploadRecord};
