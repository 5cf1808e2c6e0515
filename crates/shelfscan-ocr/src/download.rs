use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::OcrError;

/// Supplies raw image bytes for a URL.
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// # Errors
    ///
    /// Returns [`OcrError::Network`] when the image cannot be downloaded and
    /// [`OcrError::Unreadable`] when the response carries no bytes.
    async fn load(&self, url: &str) -> Result<Vec<u8>, OcrError>;
}

/// Downloads images over HTTP with a per-request timeout.
#[derive(Clone)]
pub struct HttpImageSource {
    client: Client,
}

impl HttpImageSource {
    /// # Errors
    ///
    /// Returns [`OcrError::Client`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(timeout_secs: u64, user_agent: &str) -> Result<Self, OcrError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ImageSource for HttpImageSource {
    async fn load(&self, url: &str) -> Result<Vec<u8>, OcrError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| OcrError::Network(format!("downloading {url}: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(OcrError::Network(format!(
                "downloading {url}: HTTP {}",
                status.as_u16()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| OcrError::Network(format!("downloading {url}: {e}")))?;
        if bytes.is_empty() {
            return Err(OcrError::Unreadable(format!("{url} returned no bytes")));
        }
        tracing::debug!(url, bytes = bytes.len(), "downloaded image");
        Ok(bytes.to_vec())
    }
}
