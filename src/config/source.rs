//! Engine configuration sources.
//!
//! # Responsibilities
//! - Classify the configured source as a local path or a remote URL
//! - Fetch one raw configuration snapshot from that source
//!
//! # Design Decisions
//! - Selection is syntactic: an `http://` or `https://` prefix means remote
//! - Remote fetches carry the operator's extra headers and a deadline
//! - Non-2xx responses are errors; the body is kept (truncated) for logs

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use thiserror::Error;
use url::Url;

use crate::config::loader::SettingsError;

/// Longest response body excerpt carried in an error.
const ERROR_BODY_LIMIT: usize = 512;

/// Where engine configuration snapshots come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Local(PathBuf),
    Remote(Url),
}

impl ConfigSource {
    pub fn parse(s: &str) -> Result<Self, SettingsError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(SettingsError::Source {
                source_str: s.to_string(),
                reason: "empty".to_string(),
            });
        }

        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            let url = Url::parse(trimmed).map_err(|e| SettingsError::Source {
                source_str: s.to_string(),
                reason: e.to_string(),
            })?;
            return Ok(ConfigSource::Remote(url));
        }

        Ok(ConfigSource::Local(PathBuf::from(trimmed)))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, ConfigSource::Remote(_))
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Local(path) => write!(f, "{}", path.display()),
            ConfigSource::Remote(url) => write!(f, "{}", url),
        }
    }
}

/// Parse `key=value` header pairs, splitting on the first `=`.
pub fn parse_headers(pairs: &[String]) -> Result<Vec<(String, String)>, SettingsError> {
    pairs
        .iter()
        .map(|pair| {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| SettingsError::Header(pair.clone()))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(SettingsError::Header(pair.clone()));
            }
            Ok((key.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// One observed configuration snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigText {
    /// Position in the update sequence, starting at 1.
    pub generation: u64,
    pub content: String,
}

/// Errors that can occur while fetching a snapshot.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned status {status}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("invalid http header '{0}'")]
    Header(String),

    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Fetches snapshots from a single source.
#[derive(Debug, Clone)]
pub struct ConfigFetcher {
    source: ConfigSource,
    client: reqwest::Client,
}

impl ConfigFetcher {
    pub fn new(
        source: ConfigSource,
        headers: &[(String, String)],
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let mut header_map = HeaderMap::new();
        for (key, value) in headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|_| FetchError::Header(key.clone()))?;
            let value =
                HeaderValue::from_str(value).map_err(|_| FetchError::Header(key.clone()))?;
            header_map.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(header_map)
            .timeout(timeout)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self { source, client })
    }

    pub fn source(&self) -> &ConfigSource {
        &self.source
    }

    /// Fetch the current raw configuration text.
    pub async fn fetch(&self) -> Result<String, FetchError> {
        match &self.source {
            ConfigSource::Local(path) => {
                tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| FetchError::Read {
                        path: path.display().to_string(),
                        source,
                    })
            }
            ConfigSource::Remote(url) => self.fetch_remote(url).await,
        }
    }

    async fn fetch_remote(&self, url: &Url) -> Result<String, FetchError> {
        let request_error = |source| FetchError::Request {
            url: url.to_string(),
            source,
        };

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            truncate_body(&mut body);
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        response.text().await.map_err(request_error)
    }
}

pub(crate) fn truncate_body(body: &mut String) {
    if body.len() > ERROR_BODY_LIMIT {
        let mut cut = ERROR_BODY_LIMIT;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push_str("...");
    }
}
