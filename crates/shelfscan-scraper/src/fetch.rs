use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::Client;
use shelfscan_core::DeliveryLocation;

use crate::error::FetchError;
use crate::retry::retry_with_backoff;

/// Phrases the storefront's block page contains, matched case-insensitively.
const BLOCK_MARKERS: [&str; 2] = ["security@blinkit.com", "blocked you"];

/// Retrieves an HTML document for a URL or local snapshot.
///
/// The delivery location is an explicit argument on every call; implementors
/// must not cache it between calls.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// # Errors
    ///
    /// Returns [`FetchError`] when the document cannot be retrieved within
    /// `timeout`, the storefront blocks the request, or a snapshot is unreadable.
    async fn fetch(
        &self,
        target: &str,
        location: &DeliveryLocation,
        timeout: Duration,
    ) -> Result<String, FetchError>;
}

/// Plain-HTTP page fetcher.
///
/// The delivery location travels as `gr_1_*` cookies plus `lat`/`lon`
/// headers. Targets that name an existing file (or use `file://`) are read
/// from disk instead, which is how saved listing snapshots are replayed.
pub struct HttpPageFetcher {
    client: Client,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl HttpPageFetcher {
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        user_agent: &str,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            max_retries,
            backoff_base_ms,
        })
    }

    async fn fetch_once(&self, url: &str, location: &DeliveryLocation) -> Result<String, FetchError> {
        let mut request = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "text/html,application/xhtml+xml")
            .header(reqwest::header::COOKIE, location_cookie(location));
        for (name, value) in location_headers(location) {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(|source| FetchError::Network {
            url: url.to_owned(),
            source,
        })?;
        let status = response.status();

        if status == reqwest::StatusCode::FORBIDDEN {
            return Err(FetchError::Blocked {
                url: url.to_owned(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_owned(),
            });
        }

        let body = response.text().await.map_err(|source| FetchError::Network {
            url: url.to_owned(),
            source,
        })?;
        if is_block_page(&body) {
            return Err(FetchError::Blocked {
                url: url.to_owned(),
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(
        &self,
        target: &str,
        location: &DeliveryLocation,
        timeout: Duration,
    ) -> Result<String, FetchError> {
        if let Some(path) = snapshot_path(target) {
            tracing::debug!(path = %path.display(), "reading snapshot");
            return read_snapshot(&path).await;
        }

        let url = reqwest::Url::parse(target).map_err(|e| FetchError::InvalidTarget {
            target: target.to_owned(),
            reason: e.to_string(),
        })?;
        let url = url.as_str();

        tokio::time::timeout(
            timeout,
            retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
                self.fetch_once(url, location)
            }),
        )
        .await
        .map_err(|_| FetchError::Timeout {
            url: url.to_owned(),
            timeout_secs: timeout.as_secs(),
        })?
    }
}

async fn read_snapshot(path: &Path) -> Result<String, FetchError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| FetchError::Snapshot {
            path: path.to_path_buf(),
            source,
        })?;
    let html = String::from_utf8_lossy(&bytes).into_owned();
    if is_block_page(&html) {
        return Err(FetchError::Blocked {
            url: path.display().to_string(),
        });
    }
    Ok(html)
}

/// Returns `true` when `html` is the storefront's "we blocked you" page.
#[must_use]
pub fn is_block_page(html: &str) -> bool {
    let lower = html.to_lowercase();
    BLOCK_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Resolves a target to a local snapshot path.
///
/// `file://` targets always resolve (a missing file surfaces later as
/// [`FetchError::Snapshot`]); `http(s)` targets never do; anything else
/// resolves only if the path exists.
#[must_use]
pub fn snapshot_path(target: &str) -> Option<PathBuf> {
    if let Some(rest) = target.strip_prefix("file://") {
        return Some(PathBuf::from(rest));
    }
    if target.starts_with("http://") || target.starts_with("https://") {
        return None;
    }
    let path = Path::new(target);
    path.exists().then(|| path.to_path_buf())
}

pub(crate) fn location_cookie(location: &DeliveryLocation) -> String {
    let mut pairs = vec![
        format!("gr_1_lat={}", location.lat),
        format!("gr_1_lon={}", location.lon),
        format!(
            "gr_1_locality={}",
            utf8_percent_encode(&location.locality, NON_ALPHANUMERIC)
        ),
    ];
    if let Some(landmark) = location.landmark.as_deref() {
        pairs.push(format!(
            "gr_1_landmark={}",
            utf8_percent_encode(landmark, NON_ALPHANUMERIC)
        ));
    }
    pairs.join("; ")
}

pub(crate) fn location_headers(location: &DeliveryLocation) -> [(&'static str, String); 2] {
    [
        ("lat", location.lat.to_string()),
        ("lon", location.lon.to_string()),
    ]
}

#[cfg(test)]
#[path = "fetch_test.rs"]
mod tests;
