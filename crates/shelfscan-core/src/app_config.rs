use std::path::PathBuf;

use crate::location::LocationSpec;

#[derive(Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub output_dir: PathBuf,
    pub listing_url: String,
    /// Origin used to resolve relative links found in listing snapshots.
    pub site_origin: String,
    pub location: Option<LocationSpec>,
    pub user_agent: String,
    pub listing_timeout_secs: u64,
    pub product_timeout_secs: u64,
    pub fetch_max_retries: u32,
    pub retry_backoff_base_ms: u64,
    pub max_concurrent_products: usize,
    pub ocr_credentials_path: PathBuf,
    pub ocr_endpoint: String,
    pub ocr_batch_size: usize,
    pub ocr_timeout_secs: u64,
    pub ocr_max_retries: u32,
    pub image_download_timeout_secs: u64,
    pub upload_url: String,
    pub product_names_url: String,
    pub upload_token: Option<String>,
    pub upload_timeout_secs: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("log_level", &self.log_level)
            .field("output_dir", &self.output_dir)
            .field("listing_url", &self.listing_url)
            .field("site_origin", &self.site_origin)
            .field("location", &self.location)
            .field("user_agent", &self.user_agent)
            .field("listing_timeout_secs", &self.listing_timeout_secs)
            .field("product_timeout_secs", &self.product_timeout_secs)
            .field("fetch_max_retries", &self.fetch_max_retries)
            .field("retry_backoff_base_ms", &self.retry_backoff_base_ms)
            .field("max_concurrent_products", &self.max_concurrent_products)
            .field("ocr_credentials_path", &self.ocr_credentials_path)
            .field("ocr_endpoint", &self.ocr_endpoint)
            .field("ocr_batch_size", &self.ocr_batch_size)
            .field("ocr_timeout_secs", &self.ocr_timeout_secs)
            .field("ocr_max_retries", &self.ocr_max_retries)
            .field(
                "image_download_timeout_secs",
                &self.image_download_timeout_secs,
            )
            .field("upload_url", &self.upload_url)
            .field("product_names_url", &self.product_names_url)
            .field(
                "upload_token",
                &self.upload_token.as_ref().map(|_| "[redacted]"),
            )
            .field("upload_timeout_secs", &self.upload_timeout_secs)
            .finish()
    }
}
