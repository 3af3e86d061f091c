use std::time::Duration;

use bytes::Bytes;
use reqwest::StatusCode;
use thiserror::Error;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Longest body excerpt carried into a decode error message.
const BODY_PREVIEW_LEN: usize = 256;

#[derive(Debug, Error)]
pub enum Error {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("request to {url} returned HTTP {status}")]
    HttpStatus { url: String, status: StatusCode },

    #[error("failed to decode {what}: {source} (body: {})", preview(.body))]
    Decode {
        what: &'static str,
        body: Bytes,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid request path `{path}`: must start with `/`")]
    InvalidPath { path: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn decode(what: &'static str, body: Bytes, source: serde_json::Error) -> Self {
        Self::Decode { what, body, source }
    }

    /// Classifies a reqwest failure into the fetch-layer taxonomy.
    pub(crate) fn from_reqwest(url: &str, timeout: Duration, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout {
                url: url.to_owned(),
                timeout,
            }
        } else if let Some(status) = source.status() {
            Self::HttpStatus {
                url: url.to_owned(),
                status,
            }
        } else {
            Self::Transport {
                url: url.to_owned(),
                source,
            }
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Whether the failure came from talking to the upstream engine.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. }
                | Self::Timeout { .. }
                | Self::HttpStatus { .. }
                | Self::Decode { .. }
        )
    }
}

fn preview(body: &Bytes) -> String {
    let text = String::from_utf8_lossy(body);
    if text.chars().count() <= BODY_PREVIEW_LEN {
        text.into_owned()
    } else {
        let head: String = text.chars().take(BODY_PREVIEW_LEN).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_truncates_body() {
        let body = Bytes::from("x".repeat(1000));
        let source = serde_json::from_str::<u32>("\"nope\"").unwrap_err();
        let message = Error::decode("node stats", body, source).to_string();

        assert!(message.starts_with("failed to decode node stats"));
        assert!(message.ends_with("...)"));
        assert!(message.len() < 400);
    }

    #[test]
    fn test_upstream_classification() {
        let timeout = Error::Timeout {
            url: "http://localhost:9600/".to_string(),
            timeout: Duration::from_millis(10),
        };
        assert!(timeout.is_timeout());
        assert!(timeout.is_upstream());
        assert!(!Error::config("bad").is_upstream());
    }
}
