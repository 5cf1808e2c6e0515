//! Service-account access tokens via the OAuth 2.0 JWT-bearer grant.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::credentials::ServiceAccountKey;
use crate::error::OcrError;

const VISION_SCOPE: &str = "https://www.googleapis.com/auth/cloud-vision";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: u64 = 3600;
/// A cached token is replaced this long before it expires.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    ASSERTION_LIFETIME_SECS
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Mints and caches access tokens for one service account.
pub(crate) struct ServiceAccountTokens {
    key: ServiceAccountKey,
    signing_key: EncodingKey,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokens {
    pub(crate) fn new(key: ServiceAccountKey) -> Result<Self, OcrError> {
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| OcrError::Auth(format!("invalid service account private key: {e}")))?;
        Ok(Self {
            key,
            signing_key,
            cached: Mutex::new(None),
        })
    }

    /// Returns the cached token, exchanging a fresh assertion when there is
    /// none or it is about to expire.
    pub(crate) async fn access_token(&self, client: &Client) -> Result<String, OcrError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| Instant::now() < t.refresh_at) {
            return Ok(token.value.clone());
        }

        let response = self.exchange(client).await?;
        tracing::debug!(
            account = %self.key.client_email,
            expires_in = response.expires_in,
            "obtained OCR access token"
        );
        let lifetime = Duration::from_secs(response.expires_in).saturating_sub(EXPIRY_MARGIN);
        *cached = Some(CachedToken {
            value: response.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(response.access_token)
    }

    /// Drops the cached token so the next call mints a new one.
    pub(crate) async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    fn assertion(&self) -> Result<String, OcrError> {
        let iat = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        let claims = Claims {
            iss: &self.key.client_email,
            scope: VISION_SCOPE,
            aud: &self.key.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid.clone_from(&self.key.private_key_id);
        jsonwebtoken::encode(&header, &claims, &self.signing_key)
            .map_err(|e| OcrError::Auth(format!("failed to sign token assertion: {e}")))
    }

    async fn exchange(&self, client: &Client) -> Result<TokenResponse, OcrError> {
        let assertion = self.assertion()?;
        let response = client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| OcrError::Network(format!("token exchange failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.trim().chars().take(300).collect();
            return Err(match status.as_u16() {
                400 | 401 | 403 => {
                    OcrError::Auth(format!("token exchange rejected (HTTP {status}): {body}"))
                }
                code => OcrError::Network(format!("token exchange failed (HTTP {code}): {body}")),
            });
        }

        response
            .json()
            .await
            .map_err(|e| OcrError::Auth(format!("invalid token response: {e}")))
    }
}
