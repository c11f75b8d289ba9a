//! Auction provenance resolver
//!
//! When an auction page carries no ownership history, two sequential TONAPI
//! lookups establish who benefits from the auction: the username resolves
//! to an account address, and that account's telemint auction config yields
//! the beneficiary. Any non-success at either step drops the enrichment;
//! there are no retries and no caching.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::types::ProvenanceInfo;

/// Seam for the on-chain lookup, stubbed in tests
#[async_trait]
pub trait ProvenanceLookup: Send + Sync {
    /// Best-effort; `None` covers every failure mode
    async fn resolve(&self, identifier: &str) -> Option<ProvenanceInfo>;
}

/// TONAPI-backed resolver
pub struct TonApiClient {
    client: reqwest::Client,
    base_url: String,
    /// Beneficiary address identifying platform-minted auctions
    platform_mint_address: String,
}

#[derive(Debug, Deserialize)]
struct DnsResponse {
    item: Option<DnsItem>,
}

#[derive(Debug, Deserialize)]
struct DnsItem {
    address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuctionConfigResponse {
    #[serde(default)]
    success: bool,
    decoded: Option<DecodedConfig>,
}

#[derive(Debug, Deserialize)]
struct DecodedConfig {
    /// Field name as returned by the telemint contract
    beneficiar: Option<String>,
}

impl TonApiClient {
    pub fn new(
        base_url: impl Into<String>,
        platform_mint_address: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create TONAPI HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            platform_mint_address: platform_mint_address.into(),
        })
    }

    async fn resolve_address(&self, identifier: &str) -> Option<String> {
        let url = format!(
            "{}/v2/dns/{}.t.me",
            self.base_url.trim_end_matches('/'),
            identifier
        );

        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(err) => {
                warn!(identifier, error = %err, "TONAPI DNS request failed");
                return None;
            }
        };
        if !response.status().is_success() {
            warn!(identifier, status = %response.status(), "TONAPI DNS lookup failed");
            return None;
        }

        let body: DnsResponse = match response.json().await {
            Ok(b) => b,
            Err(err) => {
                warn!(identifier, error = %err, "TONAPI DNS response unparseable");
                return None;
            }
        };

        let address = body.item.and_then(|item| item.address);
        if address.is_none() {
            warn!(identifier, "address missing from TONAPI DNS response");
        }
        address
    }

    async fn fetch_beneficiary(&self, address: &str) -> Option<String> {
        let url = format!(
            "{}/v2/blockchain/accounts/{}/methods/get_telemint_auction_config",
            self.base_url.trim_end_matches('/'),
            address
        );

        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(err) => {
                warn!(address, error = %err, "TONAPI auction config request failed");
                return None;
            }
        };
        if !response.status().is_success() {
            warn!(address, status = %response.status(), "TONAPI auction config lookup failed");
            return None;
        }

        let body: AuctionConfigResponse = match response.json().await {
            Ok(b) => b,
            Err(err) => {
                warn!(address, error = %err, "TONAPI auction config unparseable");
                return None;
            }
        };

        if !body.success {
            debug!(address, "auction config method call unsuccessful");
            return None;
        }
        body.decoded.and_then(|d| d.beneficiar)
    }
}

#[async_trait]
impl ProvenanceLookup for TonApiClient {
    async fn resolve(&self, identifier: &str) -> Option<ProvenanceInfo> {
        let address = self.resolve_address(identifier).await?;
        debug!(identifier, address, "resolved account address");

        let beneficiary = self.fetch_beneficiary(&address).await?;
        let is_platform_mint = beneficiary == self.platform_mint_address;
        debug!(identifier, is_platform_mint, "auction provenance resolved");

        Some(ProvenanceInfo {
            beneficiary_address: beneficiary,
            is_platform_mint,
        })
    }
}
