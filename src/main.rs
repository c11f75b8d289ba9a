//! FragBot service entrypoint
//!
//! Wires configuration, the HTTP clients and the two background caches, then
//! serves queries until interrupted. The chat transport in front of
//! [`QueryRouter::handle`] is deliberately out of scope here.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fragbot::config::AppConfig;
use fragbot::floor::{FloorPriceService, GetGemsClient};
use fragbot::fragment::FragmentClient;
use fragbot::rates::sources::{BinanceSource, CoinGeckoSource};
use fragbot::rates::RateService;
use fragbot::router::QueryRouter;
use fragbot::tonapi::TonApiClient;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load()?;
    info!("🚀 Starting FragBot ({})", config.digest());

    let timeout = Duration::from_secs(config.http.timeout_secs);
    let http = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to create shared HTTP client")?;

    let rates = Arc::new(RateService::new(
        Arc::new(CoinGeckoSource::new(http.clone(), &config.rates.coingecko_url)),
        Arc::new(BinanceSource::new(http.clone(), &config.rates.binance_url)),
        Duration::from_secs(config.rates.ttl_secs),
    ));
    let floor = Arc::new(FloorPriceService::new(
        Arc::new(GetGemsClient::new(
            http.clone(),
            &config.floor.api_url,
            &config.floor.collection_address,
        )),
        &config.floor.collection_address,
        Duration::from_secs(config.floor.ttl_secs),
    ));

    rates.start();
    floor.start();
    info!("✅ Background rate and floor caches started");

    let router = Arc::new(QueryRouter::new(
        Arc::new(FragmentClient::new(&config.fragment.base_url, timeout)?),
        Arc::new(TonApiClient::new(
            &config.tonapi.base_url,
            &config.fragment.mint_address,
            timeout,
        )?),
        rates.clone(),
        floor.clone(),
        config,
    ));
    serve(router).await;

    info!("🛑 Shutting down");
    rates.stop();
    floor.stop();
    Ok(())
}

/// Placeholder serve loop: blocks until ctrl-c. A chat transport would pull
/// queries here and feed them to the router.
async fn serve(_router: Arc<QueryRouter>) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
