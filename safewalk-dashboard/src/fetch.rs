//! Shared HTTP fetch wrapper
//!
//! Every read the dashboard performs goes through [`HttpFetcher`]:
//! - paths are resolved against one base URL
//! - requests carry `Cache-Control: no-cache`
//! - each request is bounded by a timeout
//! - non-2xx statuses become [`FetchError::Status`]

use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL};
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::trace;

/// Failure of a single HTTP read
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid URL {0}")]
    InvalidUrl(String),
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16, body: String },
    #[error("{url} timed out after {timeout_ms} ms")]
    Timeout { url: String, timeout_ms: u64 },
    #[error("could not decode {what}: {source}")]
    Decode {
        what: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("could not build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl FetchError {
    /// True when the endpoint answered but with a non-2xx status
    pub fn is_status(&self) -> bool {
        matches!(self, FetchError::Status { .. })
    }
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    base: Url,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        // Url::join remplace le dernier segment sans slash final
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base = Url::parse(&normalized).map_err(|_| FetchError::InvalidUrl(base_url.to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        let client = Client::builder()
            .user_agent(concat!("safewalk-dashboard/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self { client, base, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolve an endpoint path (`/telemetry/latitude`) against the base URL
    pub fn url(&self, path: &str) -> Result<Url, FetchError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|_| FetchError::InvalidUrl(format!("{}{}", self.base, path)))
    }

    /// GET an already resolved URL and return the body as text
    pub async fn get_url(&self, url: Url) -> Result<String, FetchError> {
        let label = url.to_string();
        let timeout_ms = self.timeout.as_millis() as u64;

        let request = async {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|source| FetchError::Transport { url: label.clone(), source })?;

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|source| FetchError::Transport { url: label.clone(), source })?;

            if !status.is_success() {
                return Err(FetchError::Status {
                    url: label.clone(),
                    status: status.as_u16(),
                    body,
                });
            }
            Ok(body)
        };

        let body = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| FetchError::Timeout { url: label.clone(), timeout_ms })??;

        trace!("GET {} -> {} bytes", label, body.len());
        Ok(body)
    }

    pub async fn get_text(&self, path: &str) -> Result<String, FetchError> {
        let url = self.url(path)?;
        self.get_url(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_resolution_keeps_base_path() {
        let fetcher = HttpFetcher::new("http://10.0.0.1:8000/robot", Duration::from_secs(1)).unwrap();
        let url = fetcher.url("/telemetry/latitude").unwrap();
        assert_eq!(url.as_str(), "http://10.0.0.1:8000/robot/telemetry/latitude");

        let url = fetcher.url("telemetry").unwrap();
        assert_eq!(url.as_str(), "http://10.0.0.1:8000/robot/telemetry");
    }

    #[test]
    fn test_invalid_base_url() {
        let err = HttpFetcher::new("not a url", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
    }

    #[test]
    fn test_status_error_message() {
        let err = FetchError::Status {
            url: "http://robot/health".into(),
            status: 404,
            body: String::new(),
        };
        assert!(err.is_status());
        assert_eq!(err.to_string(), "http://robot/health returned HTTP 404");
    }
}
