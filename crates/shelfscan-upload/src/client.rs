//! HTTP client for the NutriSnap product ingestion API.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use shelfscan_core::normalize_name;

use crate::error::UploadError;
use crate::payload::UploadRecord;

const NAMES_TIMEOUT: Duration = Duration::from_secs(20);

/// Destination for extracted nutrition records.
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Pushes one record. Callers push a product at most once per run; no
    /// retry happens here.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError`] when the service rejects the record or cannot
    /// be reached.
    async fn push(&self, record: &UploadRecord) -> Result<(), UploadError>;

    /// Normalized names of products the service already holds.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError`] when the names cannot be fetched.
    async fn known_products(&self) -> Result<HashSet<String>, UploadError> {
        Ok(HashSet::new())
    }

    /// `false` for an uploader that drops everything; the pipeline then skips
    /// the upload pass entirely.
    fn is_enabled(&self) -> bool {
        true
    }
}

#[async_trait]
impl<T: Uploader + ?Sized> Uploader for Box<T> {
    async fn push(&self, record: &UploadRecord) -> Result<(), UploadError> {
        (**self).push(record).await
    }

    async fn known_products(&self) -> Result<HashSet<String>, UploadError> {
        (**self).known_products().await
    }

    fn is_enabled(&self) -> bool {
        (**self).is_enabled()
    }
}

/// Uploader used when no ingestion endpoint is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledUploader;

#[async_trait]
impl Uploader for DisabledUploader {
    async fn push(&self, record: &UploadRecord) -> Result<(), UploadError> {
        tracing::debug!(product = %record.listing_name, "upload disabled, dropping record");
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Client for the NutriSnap `upload-scraped-data` and `names` endpoints.
pub struct NutriSnapClient {
    client: Client,
    upload_url: String,
    names_url: String,
    token: Option<String>,
}

impl NutriSnapClient {
    /// # Errors
    ///
    /// Returns [`UploadError::Client`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        upload_url: &str,
        names_url: &str,
        token: Option<String>,
        timeout_secs: u64,
        user_agent: &str,
    ) -> Result<Self, UploadError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            upload_url: upload_url.to_owned(),
            names_url: names_url.to_owned(),
            token,
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl Uploader for NutriSnapClient {
    async fn push(&self, record: &UploadRecord) -> Result<(), UploadError> {
        let response = self
            .authorize(self.client.post(&self.upload_url).json(record))
            .send()
            .await
            .map_err(|source| UploadError::Network {
                url: self.upload_url.clone(),
                source,
            })?;

        let status = response.status();
        if status.is_success() {
            tracing::info!(
                product = %record.listing_name,
                status = status.as_u16(),
                "uploaded nutrition record"
            );
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let body = snippet(&body);
        let status = status.as_u16();
        Err(match status {
            401 | 403 => UploadError::Auth { status, body },
            400 | 409 | 422 => UploadError::Validation { status, body },
            _ => UploadError::UnexpectedStatus { status, body },
        })
    }

    async fn known_products(&self) -> Result<HashSet<String>, UploadError> {
        let response = self
            .authorize(self.client.get(&self.names_url).timeout(NAMES_TIMEOUT))
            .send()
            .await
            .map_err(|source| UploadError::Network {
                url: self.names_url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::UnexpectedStatus {
                status: status.as_u16(),
                body: snippet(&body),
            });
        }

        let payload: Value = response.json().await.map_err(|e| UploadError::Decode {
            url: self.names_url.clone(),
            reason: e.to_string(),
        })?;
        let Value::Array(entries) = payload else {
            return Err(UploadError::Decode {
                url: self.names_url.clone(),
                reason: "expected a JSON array of product names".to_owned(),
            });
        };

        Ok(entries
            .iter()
            .filter_map(Value::as_str)
            .filter_map(normalize_name)
            .collect())
    }
}

/// First 300 characters of a response body, on one line.
fn snippet(body: &str) -> String {
    body.trim().replace('\n', " ").chars().take(300).collect()
}
