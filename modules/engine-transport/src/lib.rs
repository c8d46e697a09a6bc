//! HTTP delivery of reload messages to a running engine.

use reload_core::EngineEndpoint;
use reqwest::{header::CONTENT_TYPE, Client};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const RELOAD_PATH: &str = "/post/@resource/reload";
pub const PING_PATH: &str = "/ping";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http client setup failed: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("engine answered {status} for {url}")]
    Status { url: String, status: u16 },
}

pub fn reload_url(endpoint: &EngineEndpoint) -> String {
    format!("{}{}", endpoint.base_url(), RELOAD_PATH)
}

pub fn ping_url(endpoint: &EngineEndpoint) -> String {
    format!("{}{}", endpoint.base_url(), PING_PATH)
}

/// Talks to the engine's service port. One attempt per call.
#[derive(Debug, Clone)]
pub struct EngineClient {
    client: Client,
}

impl EngineClient {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("reloader/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(TransportError::Client)?;
        Ok(EngineClient { client })
    }

    /// Deliver an encoded reload message.
    pub async fn send_resource_reload(&self, endpoint: &EngineEndpoint, payload: Vec<u8>) -> Result<(), TransportError> {
        let url = reload_url(endpoint);
        debug!(%url, bytes = payload.len(), "posting reload message");
        let resp = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/x-protobuf")
            .body(payload)
            .send()
            .await
            .map_err(|source| TransportError::Request { url: url.clone(), source })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::Status { url, status: status.as_u16() });
        }
        Ok(())
    }

    /// True when the engine service answers on its ping route.
    pub async fn ping(&self, endpoint: &EngineEndpoint) -> bool {
        let url = ping_url(endpoint);
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(%url, error = %e, "engine ping failed");
                false
            }
        }
    }
}
