//! API transport seam
//!
//! The engine only ever needs four request shapes against the helpdesk and
//! patch-portal APIs: JSON GET, text GET, binary GET, and a form-encoded
//! POST. They are bundled behind [`ApiTransport`] so the resolver and the
//! bulk downloader can be exercised against scripted responses in tests,
//! with [`HttpTransport`] as the shipped implementation.
//!
//! Every request carries cache-busting headers: the helpdesk sits behind
//! aggressive intermediary caches and a stale ticket view is worse than the
//! extra round-trip.

use async_trait::async_trait;
use reqwest::header::{CACHE_CONTROL, HeaderMap, HeaderValue, PRAGMA};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("network failure for {url}: {detail}")]
    Network { url: String, detail: String },

    #[error("unexpected status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("malformed response body from {url}: {detail}")]
    Malformed { url: String, detail: String },
}

pub type TransportResult<T> = Result<T, TransportError>;

/// Read-mostly HTTP access used by the resolver, the bulk downloader and the
/// issue-form baseline lookup.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    /// GET returning a decoded JSON body.
    async fn get_json(&self, url: &str) -> TransportResult<serde_json::Value>;

    /// GET returning the raw text body (the patch portal serves HTML).
    async fn get_text(&self, url: &str) -> TransportResult<String>;

    /// GET returning the raw body bytes (attachment downloads).
    async fn get_bytes(&self, url: &str) -> TransportResult<Vec<u8>>;

    /// Form-encoded POST returning a decoded JSON body.
    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> TransportResult<serde_json::Value>;
}

/// reqwest-backed transport with the cache-busting headers applied to every
/// request.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> TransportResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store, max-age=0"),
        );
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|error| TransportError::Network {
                url: String::new(),
                detail: error.to_string(),
            })?;

        Ok(Self { client })
    }

    async fn checked(&self, request: reqwest::RequestBuilder, url: &str) -> TransportResult<reqwest::Response> {
        let response = request.send().await.map_err(|error| TransportError::Network {
            url: url.to_string(),
            detail: error.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl ApiTransport for HttpTransport {
    async fn get_json(&self, url: &str) -> TransportResult<serde_json::Value> {
        let body = self.get_text(url).await?;
        serde_json::from_str(&body).map_err(|error| TransportError::Malformed {
            url: url.to_string(),
            detail: error.to_string(),
        })
    }

    async fn get_text(&self, url: &str) -> TransportResult<String> {
        let response = self.checked(self.client.get(url), url).await?;
        response.text().await.map_err(|error| TransportError::Network {
            url: url.to_string(),
            detail: error.to_string(),
        })
    }

    async fn get_bytes(&self, url: &str) -> TransportResult<Vec<u8>> {
        let response = self.checked(self.client.get(url), url).await?;
        let bytes = response.bytes().await.map_err(|error| TransportError::Network {
            url: url.to_string(),
            detail: error.to_string(),
        })?;
        Ok(bytes.to_vec())
    }

    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> TransportResult<serde_json::Value> {
        let response = self.checked(self.client.post(url).form(form), url).await?;
        let body = response.text().await.map_err(|error| TransportError::Network {
            url: url.to_string(),
            detail: error.to_string(),
        })?;
        serde_json::from_str(&body).map_err(|error| TransportError::Malformed {
            url: url.to_string(),
            detail: error.to_string(),
        })
    }
}
