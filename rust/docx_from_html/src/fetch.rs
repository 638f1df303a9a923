//! Remote image retrieval.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("server answered {0}")]
    Status(u16),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("empty response body")]
    Empty,
}

/// Source of image bytes for `http(s)` image references.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Only `http` and `https` URLs are fetched; everything else is treated as
/// an inline data reference.
pub fn is_valid_url(source: &str) -> bool {
    reqwest::Url::parse(source.trim())
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }
}

#[async_trait]
impl ImageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;
        if body.is_empty() {
            return Err(FetchError::Empty);
        }
        Ok(body.to_vec())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves canned bodies; unknown URLs fail like an unreachable host.
    #[derive(Default)]
    pub(crate) struct StaticFetcher {
        bodies: HashMap<String, Vec<u8>>,
        pub(crate) calls: AtomicUsize,
    }

    impl StaticFetcher {
        pub(crate) fn with(mut self, url: &str, body: Vec<u8>) -> Self {
            self.bodies.insert(url.to_string(), body);
            self
        }
    }

    #[async_trait]
    impl ImageFetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.bodies
                .get(url)
                .cloned()
                .ok_or_else(|| FetchError::Request(format!("dns error: {url}")))
        }
    }

    /// Never answers within any sane timeout.
    pub(crate) struct StalledFetcher;

    #[async_trait]
    impl ImageFetcher for StalledFetcher {
        async fn fetch(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(FetchError::Empty)
        }
    }

    #[test]
    fn only_http_urls_are_fetchable() {
        assert!(is_valid_url("https://example.com/a.png"));
        assert!(is_valid_url(" http://example.com/a.png"));
        assert!(!is_valid_url("data:image/png;base64,AAAA"));
        assert!(!is_valid_url("ftp://example.com/a.png"));
        assert!(!is_valid_url("images/a.png"));
    }

    #[tokio::test]
    async fn static_fetcher_fails_unknown_hosts() {
        let fetcher = StaticFetcher::default().with("https://a.test/x.png", vec![1, 2]);
        assert_eq!(fetcher.fetch("https://a.test/x.png").await.unwrap(), vec![1, 2]);
        assert!(fetcher.fetch("https://unreachable.example/x.png").await.is_err());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }
}
