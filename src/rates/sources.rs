//! TON/USD price sources
//!
//! Two independent REST sources queried concurrently by the rate refresher.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

use crate::error::FetchError;

/// A single upstream quoting TON in USD
#[async_trait]
pub trait RateSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_usd_price(&self) -> Result<Decimal, FetchError>;
}

/// CoinGecko simple-price endpoint
pub struct CoinGeckoSource {
    client: reqwest::Client,
    url: String,
}

#[derive(Debug, Deserialize)]
struct CoinGeckoResponse {
    #[serde(rename = "the-open-network")]
    the_open_network: CoinGeckoPrice,
}

#[derive(Debug, Deserialize)]
struct CoinGeckoPrice {
    usd: f64,
}

impl CoinGeckoSource {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self { client, url: url.into() }
    }
}

#[async_trait]
impl RateSource for CoinGeckoSource {
    fn name(&self) -> &'static str {
        "CoinGecko"
    }

    async fn fetch_usd_price(&self) -> Result<Decimal, FetchError> {
        let response = self.client.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::unavailable(format!(
                "CoinGecko returned {}",
                response.status()
            )));
        }

        let body: CoinGeckoResponse = response.json().await?;
        Decimal::try_from(body.the_open_network.usd).map_err(FetchError::parse)
    }
}

/// Binance ticker-price endpoint
pub struct BinanceSource {
    client: reqwest::Client,
    url: String,
}

#[derive(Debug, Deserialize)]
struct BinanceTicker {
    price: String,
}

impl BinanceSource {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self { client, url: url.into() }
    }
}

#[async_trait]
impl RateSource for BinanceSource {
    fn name(&self) -> &'static str {
        "Binance"
    }

    async fn fetch_usd_price(&self) -> Result<Decimal, FetchError> {
        let response = self.client.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::unavailable(format!(
                "Binance returned {}",
                response.status()
            )));
        }

        let body: BinanceTicker = response.json().await?;
        Decimal::from_str(body.price.trim()).map_err(FetchError::parse)
    }
}
