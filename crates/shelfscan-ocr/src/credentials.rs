use std::path::Path;

use serde::Deserialize;

use crate::error::CredentialsError;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// How requests to the Vision endpoint are authorized.
#[derive(Clone, PartialEq, Eq)]
pub enum VisionCredentials {
    /// Sent as the `key` query parameter.
    ApiKey(String),
    /// Sent as `Authorization: Bearer <token>`.
    AccessToken(String),
    /// Exchanged for short-lived access tokens with a signed JWT assertion.
    ServiceAccount(ServiceAccountKey),
}

/// The fields of a Google service-account key file needed for the
/// JWT-bearer grant.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_owned()
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"[redacted]")
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for VisionCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VisionCredentials::ApiKey(_) => f.write_str("ApiKey([redacted])"),
            VisionCredentials::AccessToken(_) => f.write_str("AccessToken([redacted])"),
            VisionCredentials::ServiceAccount(key) => {
                f.debug_tuple("ServiceAccount").field(key).finish()
            }
        }
    }
}

impl VisionCredentials {
    /// Load credentials from a file.
    ///
    /// Accepted forms: a service-account key file, a JSON object with an
    /// `api_key` (or `apiKey`) or `access_token` field, or a bare API key on a
    /// single line.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialsError`] when the file cannot be read, is empty, is
    /// JSON without a usable key, or holds a private key that is not RSA PEM.
    pub fn from_file(path: &Path) -> Result<Self, CredentialsError> {
        let raw = std::fs::read_to_string(path).map_err(|source| CredentialsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw).map_err(|kind| match kind {
            ParseFailure::Empty => CredentialsError::Empty {
                path: path.to_path_buf(),
            },
            ParseFailure::NoKey => CredentialsError::Unsupported {
                path: path.to_path_buf(),
            },
            ParseFailure::InvalidPrivateKey(reason) => CredentialsError::InvalidPrivateKey {
                path: path.to_path_buf(),
                reason,
            },
        })
    }

    fn parse(raw: &str) -> Result<Self, ParseFailure> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ParseFailure::Empty);
        }
        if !trimmed.starts_with('{') {
            return Ok(VisionCredentials::ApiKey(trimmed.to_owned()));
        }

        let value: serde_json::Value =
            serde_json::from_str(trimmed).map_err(|_| ParseFailure::NoKey)?;
        if value.get("private_key").is_some() && value.get("client_email").is_some() {
            let key: ServiceAccountKey =
                serde_json::from_value(value).map_err(|_| ParseFailure::NoKey)?;
            jsonwebtoken::EncodingKey::from_rsa_pem(key.private_key.as_bytes())
                .map_err(|e| ParseFailure::InvalidPrivateKey(e.to_string()))?;
            return Ok(VisionCredentials::ServiceAccount(key));
        }

        let field = |key: &str| {
            value
                .get(key)
                .and_then(serde_json::Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
        };
        if let Some(key) = field("api_key").or_else(|| field("apiKey")) {
            return Ok(VisionCredentials::ApiKey(key));
        }
        if let Some(token) = field("access_token") {
            return Ok(VisionCredentials::AccessToken(token));
        }
        Err(ParseFailure::NoKey)
    }
}

enum ParseFailure {
    Empty,
    NoKey,
    InvalidPrivateKey(String),
}
