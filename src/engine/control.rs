//! Engine control-plane client.
//!
//! # Responsibilities
//! - Ask the running engine to reload its configuration from disk
//!
//! # Design Decisions
//! - Every call has a deadline so shutdown never waits on a hung engine
//! - Loopback calls bypass any system HTTP proxy
//! - Non-2xx responses are errors carrying status and body for logs

use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::config::source::truncate_body;
use crate::config::validation::ControlAddress;

/// Errors that can occur during a control-plane call.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("failed to build control client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("reload request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("reload rejected with status {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Debug, Serialize)]
struct ReloadRequest<'a> {
    path: &'a str,
}

/// Client for the engine's management API.
#[derive(Debug, Clone)]
pub struct ControlClient {
    client: reqwest::Client,
}

impl ControlClient {
    pub fn new(timeout: Duration) -> Result<Self, ControlError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()
            .map_err(ControlError::Client)?;
        Ok(Self { client })
    }

    /// `PUT {controller}/configs` with the path of the config to load.
    pub async fn reload(
        &self,
        controller: &ControlAddress,
        secret: &str,
        config_path: &Path,
    ) -> Result<(), ControlError> {
        let url = format!("{}/configs", controller.base_url());
        let path = config_path.to_string_lossy();

        let response = self
            .client
            .put(&url)
            .bearer_auth(secret)
            .json(&ReloadRequest { path: &*path })
            .send()
            .await
            .map_err(|source| ControlError::Request {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            truncate_body(&mut body);
            return Err(ControlError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}
