//! HTTP fetch helper
//!
//! A thin wrapper over reqwest that turns transport failures and non-200
//! responses into domain errors. Requests are never retried.

use std::time::Duration;

use anyhow::Context;
use reqwest::{Client, StatusCode};
use tracing::debug;
use url::Url;

use crate::domain::result::{Error, Result};

/// Default request timeout
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP GET client
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    /// Create a fetcher with the given request timeout
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("userbase/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Fetch the body of `url`
    ///
    /// Fails when the URL is malformed, the request cannot be completed, or
    /// the server answers with anything other than 200 OK.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let url = Url::parse(url)
            .map_err(|e| Error::http(format!("invalid url '{}': {}", url, e)))?;

        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::http(format!("failed to fetch data: {}", e)))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(Error::http(format!(
                "unexpected status code: {}",
                status.as_u16()
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::http(format!("failed to fetch data: {}", e)))?;

        Ok(body.to_vec())
    }

    /// Fetch `url` and decode the body as UTF-8 (lossy)
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let body = self.fetch(url).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}
