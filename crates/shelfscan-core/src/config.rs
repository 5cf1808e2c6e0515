use crate::app_config::AppConfig;
use crate::location::LocationSpec;
use crate::ConfigError;

pub(crate) const DEFAULT_LISTING_URL: &str =
    "https://blinkit.com/cn/dairy-breakfast/bread-pav/cid/14/953";
pub(crate) const DEFAULT_OCR_ENDPOINT: &str = "https://vision.googleapis.com/v1/images:annotate";
pub(crate) const DEFAULT_UPLOAD_URL: &str =
    "https://us-central1-nutrisnap-82709.cloudfunctions.net/api/products/upload-scraped-data";
pub(crate) const DEFAULT_PRODUCT_NAMES_URL: &str =
    "https://us-central1-nutrisnap-82709.cloudfunctions.net/api/products/names";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Every variable has a default, so an empty environment yields a usable
/// config. Decoupled from the process environment so tests can feed a `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let log_level = or_default("SHELFSCAN_LOG_LEVEL", "info");
    let output_dir = PathBuf::from(or_default("SHELFSCAN_OUTPUT_DIR", "scrappedData"));
    let listing_url = or_default("SHELFSCAN_LISTING_URL", DEFAULT_LISTING_URL);
    let site_origin = or_default("SHELFSCAN_SITE_ORIGIN", "https://blinkit.com");
    let location = match lookup("SHELFSCAN_LOCATION") {
        Ok(raw) if !raw.trim().is_empty() => Some(
            raw.parse::<LocationSpec>()
                .map_err(|e| invalid("SHELFSCAN_LOCATION", e.to_string()))?,
        ),
        _ => None,
    };
    let user_agent = or_default(
        "SHELFSCAN_USER_AGENT",
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    );

    let listing_timeout_secs = parse_u64("SHELFSCAN_LISTING_TIMEOUT_SECS", "20")?;
    let product_timeout_secs = parse_u64("SHELFSCAN_PRODUCT_TIMEOUT_SECS", "20")?;
    let fetch_max_retries = parse_u32("SHELFSCAN_FETCH_MAX_RETRIES", "2")?;
    let retry_backoff_base_ms = parse_u64("SHELFSCAN_RETRY_BACKOFF_BASE_MS", "500")?;
    let max_concurrent_products = parse_usize("SHELFSCAN_MAX_CONCURRENT_PRODUCTS", "1")?;

    let ocr_credentials_path = PathBuf::from(or_default(
        "SHELFSCAN_OCR_CREDENTIALS",
        "./vision-credentials.json",
    ));
    let ocr_endpoint = or_default("SHELFSCAN_OCR_ENDPOINT", DEFAULT_OCR_ENDPOINT);
    let ocr_batch_size = parse_usize("SHELFSCAN_OCR_BATCH_SIZE", "4")?;
    if ocr_batch_size == 0 {
        return Err(invalid(
            "SHELFSCAN_OCR_BATCH_SIZE",
            "must be at least 1".to_string(),
        ));
    }
    let ocr_timeout_secs = parse_u64("SHELFSCAN_OCR_TIMEOUT_SECS", "30")?;
    let ocr_max_retries = parse_u32("SHELFSCAN_OCR_MAX_RETRIES", "2")?;
    let image_download_timeout_secs = parse_u64("SHELFSCAN_IMAGE_DOWNLOAD_TIMEOUT_SECS", "15")?;

    let upload_url = or_default("SHELFSCAN_UPLOAD_URL", DEFAULT_UPLOAD_URL);
    let product_names_url = or_default("SHELFSCAN_PRODUCT_NAMES_URL", DEFAULT_PRODUCT_NAMES_URL);
    let upload_token = lookup("SHELFSCAN_UPLOAD_TOKEN")
        .ok()
        .filter(|t| !t.trim().is_empty());
    let upload_timeout_secs = parse_u64("SHELFSCAN_UPLOAD_TIMEOUT_SECS", "200")?;

    Ok(AppConfig {
        log_level,
        output_dir,
        listing_url,
        site_origin,
        location,
        user_agent,
        listing_timeout_secs,
        product_timeout_secs,
        fetch_max_retries,
        retry_backoff_base_ms,
        max_concurrent_products,
        ocr_credentials_path,
        ocr_endpoint,
        ocr_batch_size,
        ocr_timeout_secs,
        ocr_max_retries,
        image_download_timeout_secs,
        upload_url,
        product_names_url,
        upload_token,
        upload_timeout_secs,
    })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
