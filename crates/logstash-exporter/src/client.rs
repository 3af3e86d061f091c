//! Upstream fetcher for the Logstash monitoring API.
//!
//! Every request is bounded by a caller-supplied timeout that covers
//! connecting, sending and reading the whole body. The response is always
//! consumed or dropped before returning, so the pooled connection goes back
//! to the pool (or is closed) on every exit path.

use std::time::Duration;

use bytes::Bytes;
use reqwest::{Client, StatusCode};
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const USER_AGENT: &str = concat!("logstash-exporter/", env!("CARGO_PKG_VERSION"));

/// Immutable upstream location and request timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base_url: Url,
    timeout: Duration,
}

impl Endpoint {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        if timeout.is_zero() {
            return Err(Error::config("scrape timeout must be greater than zero"));
        }

        let parsed = Url::parse(base_url)
            .map_err(|e| Error::config(format!("invalid endpoint `{base_url}`: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "unsupported endpoint scheme `{}`",
                parsed.scheme()
            )));
        }

        Ok(Self {
            base_url: parsed,
            timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Joins `path` onto the base URL, keeping any path prefix the base
    /// URL already has.
    pub fn url_for(&self, path: &str) -> Result<String> {
        if !path.starts_with('/') {
            return Err(Error::InvalidPath {
                path: path.to_owned(),
            });
        }
        Ok(format!(
            "{}{}",
            self.base_url.as_str().trim_end_matches('/'),
            path
        ))
    }
}

/// A successfully fetched response body.
#[derive(Debug, Clone)]
pub struct RawBody {
    pub status: StatusCode,
    pub body: Bytes,
}

/// HTTP client bound to one upstream [`Endpoint`].
#[derive(Debug, Clone)]
pub struct StatsClient {
    endpoint: Endpoint,
    client: Client,
}

impl StatsClient {
    pub fn new(endpoint: Endpoint) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { endpoint, client })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Fetches `path` using the endpoint's configured timeout.
    pub async fn get(&self, path: &str) -> Result<RawBody> {
        self.fetch(path, self.endpoint.timeout).await
    }

    /// Issues one GET for `path`, bounded by `timeout`.
    ///
    /// Non-2xx responses are reported as [`Error::HttpStatus`] without
    /// reading the body.
    pub async fn fetch(&self, path: &str, timeout: Duration) -> Result<RawBody> {
        if timeout.is_zero() {
            return Err(Error::config("fetch timeout must be greater than zero"));
        }
        let url = self.endpoint.url_for(path)?;

        let response = self
            .client
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Error::from_reqwest(&url, timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            debug!(url = %url, status = %status, "upstream returned non-success status");
            return Err(Error::HttpStatus { url, status });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::from_reqwest(&url, timeout, e))?;

        debug!(url = %url, status = %status, bytes = body.len(), "fetched upstream stats");
        Ok(RawBody { status, body })
    }
}
