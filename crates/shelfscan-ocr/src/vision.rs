use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::credentials::VisionCredentials;
use crate::download::ImageSource;
use crate::engine::{ImageRef, OcrEngine, TextAnnotation};
use crate::error::OcrError;
use crate::token::ServiceAccountTokens;

/// `google.rpc.Code` values the per-image status can carry.
const CODE_DEADLINE_EXCEEDED: i32 = 4;
const CODE_PERMISSION_DENIED: i32 = 7;
const CODE_RESOURCE_EXHAUSTED: i32 = 8;
const CODE_UNAVAILABLE: i32 = 14;
const CODE_UNAUTHENTICATED: i32 = 16;

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageResponse {
    #[serde(default)]
    text_annotations: Vec<TextAnnotation>,
    error: Option<RpcStatus>,
}

#[derive(Debug, Deserialize)]
struct RpcStatus {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

enum Authorization {
    ApiKey(String),
    Bearer(String),
    ServiceAccount(ServiceAccountTokens),
}

/// Client for the Vision `images:annotate` REST endpoint (`TEXT_DETECTION`).
///
/// URL images are downloaded through the configured [`ImageSource`] and sent
/// inline, so the provider never has to reach the storefront CDN. Quota and
/// network errors are retried with exponential backoff.
pub struct VisionClient {
    client: Client,
    endpoint: String,
    auth: Authorization,
    images: Arc<dyn ImageSource>,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl VisionClient {
    /// # Errors
    ///
    /// Returns [`OcrError::Client`] if the underlying `reqwest::Client`
    /// cannot be constructed and [`OcrError::Auth`] if a service-account
    /// private key cannot be used for signing.
    pub fn new(
        endpoint: &str,
        credentials: VisionCredentials,
        images: Arc<dyn ImageSource>,
        timeout_secs: u64,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, OcrError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        let auth = match credentials {
            VisionCredentials::ApiKey(key) => Authorization::ApiKey(key),
            VisionCredentials::AccessToken(token) => Authorization::Bearer(token),
            VisionCredentials::ServiceAccount(key) => {
                Authorization::ServiceAccount(ServiceAccountTokens::new(key)?)
            }
        };
        Ok(Self {
            client,
            endpoint: endpoint.to_owned(),
            auth,
            images,
            max_retries,
            backoff_base_ms,
        })
    }

    async fn annotate_once(&self, content: &str) -> Result<Vec<TextAnnotation>, OcrError> {
        let body = json!({
            "requests": [{
                "image": { "content": content },
                "features": [{ "type": "TEXT_DETECTION" }]
            }]
        });

        let mut request = self.client.post(&self.endpoint).json(&body);
        request = match &self.auth {
            Authorization::ApiKey(key) => request.query(&[("key", key)]),
            Authorization::Bearer(token) => request.bearer_auth(token),
            Authorization::ServiceAccount(tokens) => {
                request.bearer_auth(tokens.access_token(&self.client).await?)
            }
        };

        let response = request
            .send()
            .await
            .map_err(|e| OcrError::Network(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            if status.as_u16() == 401 {
                if let Authorization::ServiceAccount(tokens) = &self.auth {
                    tokens.invalidate().await;
                }
            }
            let detail = response.text().await.unwrap_or_default();
            let detail = truncate(detail.trim(), 300);
            return Err(match status.as_u16() {
                429 => OcrError::Quota(format!("HTTP 429: {detail}")),
                401 | 403 => OcrError::Auth(format!("HTTP {}: {detail}", status.as_u16())),
                400 => OcrError::Unreadable(format!("HTTP 400: {detail}")),
                code => OcrError::Network(format!("HTTP {code}: {detail}")),
            });
        }

        let parsed: AnnotateResponse = response
            .json()
            .await
            .map_err(|e| OcrError::Network(format!("invalid annotate response: {e}")))?;
        let first = parsed
            .responses
            .into_iter()
            .next()
            .ok_or_else(|| OcrError::Network("annotate response held no results".to_owned()))?;

        if let Some(err) = first.error.filter(|e| e.code != 0 || !e.message.is_empty()) {
            return Err(match err.code {
                CODE_RESOURCE_EXHAUSTED => OcrError::Quota(err.message),
                CODE_DEADLINE_EXCEEDED | CODE_UNAVAILABLE => OcrError::Network(err.message),
                CODE_PERMISSION_DENIED | CODE_UNAUTHENTICATED => OcrError::Auth(err.message),
                _ => OcrError::Unreadable(err.message),
            });
        }
        Ok(first.text_annotations)
    }
}

#[async_trait]
impl OcrEngine for VisionClient {
    async fn detect_text(&self, image: &ImageRef) -> Result<Vec<TextAnnotation>, OcrError> {
        let downloaded;
        let bytes = match image {
            ImageRef::Bytes(bytes) => bytes,
            ImageRef::Url(url) => {
                downloaded = self.images.load(url).await?;
                &downloaded
            }
        };
        let content = base64::engine::general_purpose::STANDARD.encode(bytes);

        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            self.annotate_once(&content)
        })
        .await
    }
}

/// Runs `operation` with up to `max_retries` additional attempts on quota
/// and network errors, doubling the delay each time (± 25 % jitter, 30 s cap).
async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, OcrError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, OcrError>>,
{
    const MAX_DELAY_MS: u64 = 30_000;
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_retriable() || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let computed = backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(10));
                let capped = computed.min(MAX_DELAY_MS);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "transient OCR error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    text.char_indices()
        .nth(max_chars)
        .map_or(text, |(idx, _)| &text[..idx])
}
