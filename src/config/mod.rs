//! Configuration management for FragBot
//!
//! Loads from optional config files + environment variables via .env

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub fragment: FragmentConfig,
    pub tonapi: TonApiConfig,
    pub rates: RatesConfig,
    pub floor: FloorConfig,
    pub cache_times: CacheTimesConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout in seconds (every outbound call carries its own)
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FragmentConfig {
    /// Marketplace base URL
    pub base_url: String,
    /// Courtesy delay before each page fetch, in milliseconds
    pub request_delay_ms: u64,
    /// Fixed beneficiary address of platform-minted auctions
    pub mint_address: String,
    /// Thumbnail shown on username results
    pub thumbnail_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TonApiConfig {
    /// TONAPI base URL for DNS resolution and account introspection
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RatesConfig {
    /// CoinGecko simple-price endpoint
    pub coingecko_url: String,
    /// Binance ticker-price endpoint
    pub binance_url: String,
    /// Staleness threshold and background refresh period, in seconds
    pub ttl_secs: u64,
    /// Thumbnail shown on rate/conversion results
    pub thumbnail_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FloorConfig {
    /// GetGems GraphQL endpoint
    pub api_url: String,
    /// Fragment Numbers collection address
    pub collection_address: String,
    /// Staleness threshold and background refresh period, in seconds
    pub ttl_secs: u64,
}

/// Client-side cache durations returned with each result kind, in seconds.
/// These are the only backpressure signal the platform honors.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheTimesConfig {
    pub empty_query: u32,
    pub invalid_query: u32,
    pub numeric_query: u32,
    pub unavailable_username: u32,
    pub username_result: u32,
    pub error: u32,
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let config = Config::builder()
            // HTTP defaults
            .set_default("http.timeout_secs", 15)?
            // Fragment defaults
            .set_default("fragment.base_url", "https://fragment.com")?
            .set_default("fragment.request_delay_ms", 500)?
            .set_default(
                "fragment.mint_address",
                "0:408da3b28b6c065a593e10391269baaa9c5f8caebc0c69d9f0aabbab2a99256b",
            )?
            .set_default(
                "fragment.thumbnail_url",
                "https://storage.getblock.io/web/web/images/marketplace/Fragment/photo_2024-07-23_22-06-50.jpg",
            )?
            // TONAPI defaults
            .set_default("tonapi.base_url", "https://tonapi.io")?
            // Rates defaults
            .set_default(
                "rates.coingecko_url",
                "https://api.coingecko.com/api/v3/simple/price?ids=the-open-network&vs_currencies=usd",
            )?
            .set_default(
                "rates.binance_url",
                "https://api.binance.com/api/v3/ticker/price?symbol=TONUSDT",
            )?
            .set_default("rates.ttl_secs", 120)?
            .set_default(
                "rates.thumbnail_url",
                "https://pbs.twimg.com/profile_images/1602985148219260928/VC-Mraev_400x400.jpg",
            )?
            // Floor price defaults
            .set_default("floor.api_url", "https://getgems.io/graphql/")?
            .set_default(
                "floor.collection_address",
                "EQAOQdwdw8kGftJCSFgOErM1mBjYPe4DBPq8-AhF6vr9si5N",
            )?
            .set_default("floor.ttl_secs", 300)?
            // Result cache durations
            .set_default("cache_times.empty_query", 5)?
            .set_default("cache_times.invalid_query", 300)?
            .set_default("cache_times.numeric_query", 30)?
            .set_default("cache_times.unavailable_username", 300)?
            .set_default("cache_times.username_result", 300)?
            .set_default("cache_times.error", 5)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (FRAGBOT_*)
            .add_source(Environment::with_prefix("FRAGBOT").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        Ok(app_config)
    }

    /// Generate a digest of the config for logging
    pub fn digest(&self) -> String {
        format!(
            "fragment={} rates_ttl={}s floor_ttl={}s delay={}ms",
            self.fragment.base_url,
            self.rates.ttl_secs,
            self.floor.ttl_secs,
            self.fragment.request_delay_ms
        )
    }
}
