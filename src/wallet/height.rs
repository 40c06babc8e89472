//! Chain height lookup
//!
//! Scan jobs start at the chain height current when the wallet was created,
//! so the scanner never walks blocks older than the wallet itself.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::types::{RelayError, Result};

/// Source of the current chain height
#[async_trait]
pub trait HeightSource: Send + Sync {
    async fn top_height(&self) -> Result<u64>;
}

/// Top block header as returned by the block API. Only the height is used.
#[derive(Debug, Clone, Deserialize)]
pub struct TopBlock {
    pub height: u64,
}

/// Looks the height up with `GET <url>` against the block API
#[derive(Debug, Clone)]
pub struct HttpHeightSource {
    url: String,
    http_client: reqwest::Client,
}

impl HttpHeightSource {
    /// Create a lookup client; `timeout` bounds each request end to end
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("wallet-workers/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RelayError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            url: url.into(),
            http_client,
        })
    }
}

#[async_trait]
impl HeightSource for HttpHeightSource {
    async fn top_height(&self) -> Result<u64> {
        let response = self
            .http_client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| RelayError::Lookup(format!("Request to {} failed: {e}", self.url)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Lookup(format!(
                "{} returned {}",
                self.url, status
            )));
        }

        let top: TopBlock = response
            .json()
            .await
            .map_err(|e| RelayError::Lookup(format!("Malformed top block from {}: {e}", self.url)))?;

        debug!(height = top.height, "Fetched top block");
        Ok(top.height)
    }
}
