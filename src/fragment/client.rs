//! Fragment page fetcher
//!
//! Issues the marketplace page GET without following redirects: a redirect
//! response means the username is not listed on Fragment at all, which is a
//! meaningful outcome rather than an error.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::error::FetchError;

/// Outcome of fetching a username's marketplace page
#[derive(Debug, Clone)]
pub enum PageOutcome {
    /// The page body, ready for interpretation
    Page(String),
    /// The marketplace redirected: the name is unavailable on the platform
    Unavailable,
}

/// Seam for the marketplace page upstream
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, identifier: &str) -> Result<PageOutcome, FetchError>;
}

/// HTTP client for fragment.com username pages
pub struct FragmentClient {
    client: reqwest::Client,
    base_url: String,
}

impl FragmentClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to create Fragment HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl PageSource for FragmentClient {
    async fn fetch_page(&self, identifier: &str) -> Result<PageOutcome, FetchError> {
        let url = format!(
            "{}/username/{}",
            self.base_url.trim_end_matches('/'),
            identifier
        );

        let response = self.client.get(&url).send().await?;
        let status = response.status();

        if status.is_redirection() {
            debug!(identifier, status = %status, "redirect, username unavailable on platform");
            return Ok(PageOutcome::Unavailable);
        }

        if status.is_success() {
            let body = response.text().await?;
            return Ok(PageOutcome::Page(body));
        }

        Err(FetchError::unavailable(format!(
            "Fragment returned {status} for {identifier}"
        )))
    }
}
