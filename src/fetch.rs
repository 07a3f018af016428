//! HTTP JSON fetching
//!
//! The loader depends on the [`JsonFetcher`] trait only, so tests can script
//! upstream responses without a network.

use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;

/// Errors raised while fetching a JSON document
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Upstream answered with a non-2xx status
    #[error("{url} returned status {status}")]
    Status { status: u16, url: String },

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    Json(#[from] serde_json::Error),

    /// The request did not finish in time
    #[error("{url} did not respond within {seconds}s")]
    Timeout { url: String, seconds: u64 },

    /// A response shared by several entities failed earlier in this run
    #[error("shared response from {url} unavailable: {message}")]
    Shared { url: String, message: String },
}

/// Fetches a URL and decodes the body as JSON
///
/// Fails on transport errors, non-2xx statuses and malformed JSON.
pub trait JsonFetcher: Send + Sync {
    fn fetch_json<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Value, FetchError>>;
}

/// `reqwest`-backed fetcher used outside of tests
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JsonFetcher for HttpFetcher {
    fn fetch_json<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Value, FetchError>> {
        async move {
            let response = self.client.get(url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
            }

            let text = response.text().await?;
            Ok(serde_json::from_str(&text)?)
        }
        .boxed()
    }
}
