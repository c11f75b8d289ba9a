//! Query routing
//!
//! Takes a raw inline query, classifies it, drives the right services and
//! returns presentable articles. Each article carries the cache duration for
//! its result kind; those durations are the only backpressure signal the
//! chat platform honors.

use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::floor::FloorPriceService;
use crate::fragment::{self, PageOutcome, PageSource};
use crate::query::{self, QueryKind};
use crate::rates::{RateService, RateSnapshot};
use crate::results::{self, ResultArticle};
use crate::tonapi::ProvenanceLookup;
use crate::types::ListingStatus;

pub struct QueryRouter {
    pages: Arc<dyn PageSource>,
    provenance: Arc<dyn ProvenanceLookup>,
    rates: Arc<RateService>,
    floor: Arc<FloorPriceService>,
    config: AppConfig,
}

impl QueryRouter {
    pub fn new(
        pages: Arc<dyn PageSource>,
        provenance: Arc<dyn ProvenanceLookup>,
        rates: Arc<RateService>,
        floor: Arc<FloorPriceService>,
        config: AppConfig,
    ) -> Self {
        Self {
            pages,
            provenance,
            rates,
            floor,
            config,
        }
    }

    /// Answer one raw query with the articles to present
    pub async fn handle(&self, raw: &str) -> Vec<ResultArticle> {
        match query::classify(raw) {
            QueryKind::Empty => self.empty_query().await,
            QueryKind::Numeric(text) => vec![self.numeric_query(&text).await],
            QueryKind::Identifier(identifier) => {
                vec![self.username_query(&identifier).await]
            }
            QueryKind::Invalid => vec![results::invalid_username_article(
                &self.config.fragment.thumbnail_url,
                self.config.cache_times.invalid_query,
            )],
        }
    }

    /// Empty query: prompt, current rate and number floor price
    async fn empty_query(&self) -> Vec<ResultArticle> {
        let cache = self.config.cache_times.empty_query;
        let (rate, _) = self.rates.get().await;
        let (listing, _) = self.floor.get().await;

        vec![
            results::empty_prompt_article(&self.config.fragment.thumbnail_url, cache),
            results::rate_article(rate.as_ref(), &self.config.rates.thumbnail_url, cache),
            results::floor_article(
                listing.as_ref(),
                rate.as_ref(),
                self.floor.collection_address(),
                &self.config.fragment.thumbnail_url,
                cache,
            ),
        ]
    }

    async fn numeric_query(&self, text: &str) -> ResultArticle {
        let amount = parse_amount(text);

        let (snapshot, age) = self.rates.get().await;
        let Some(snapshot) = snapshot else {
            return results::price_unavailable_article(
                &self.config.rates.thumbnail_url,
                self.config.cache_times.error,
            );
        };
        debug!(%amount, rate = %snapshot.ton_usd, age, "converting amount");

        let snapshot = conversion_snapshot(snapshot);
        results::conversion_article(
            amount,
            &snapshot,
            &self.config.rates.thumbnail_url,
            self.config.cache_times.numeric_query,
        )
    }

    async fn username_query(&self, identifier: &str) -> ResultArticle {
        // Courtesy pause between marketplace hits
        tokio::time::sleep(Duration::from_millis(self.config.fragment.request_delay_ms))
            .await;

        let html = match self.pages.fetch_page(identifier).await {
            Ok(PageOutcome::Page(html)) => html,
            Ok(PageOutcome::Unavailable) => {
                return results::unavailable_article(
                    identifier,
                    &self.config.fragment.thumbnail_url,
                    self.config.cache_times.unavailable_username,
                );
            }
            Err(err) => {
                warn!(identifier, error = %err, "page fetch failed");
                return results::unavailable_article(
                    identifier,
                    &self.config.fragment.thumbnail_url,
                    self.config.cache_times.unavailable_username,
                );
            }
        };

        let mut record = fragment::interpret(&html, identifier);
        if record.status == ListingStatus::Unknown {
            return results::error_checking_article(
                identifier,
                &self.config.fragment.thumbnail_url,
                self.config.cache_times.error,
            );
        }

        // Auction pages without an ownership history were not started by the
        // platform mint wallet; ask the chain who benefits
        if record.status == ListingStatus::OnAuction
            && fragment::lacks_ownership_history(&html)
        {
            record.provenance = self.provenance.resolve(identifier).await;
        }

        info!(identifier, status = ?record.status, "username resolved");

        let cache = match record.status {
            ListingStatus::Unavailable => self.config.cache_times.unavailable_username,
            _ => self.config.cache_times.username_result,
        };
        results::listing_article(
            &record,
            &self.config.fragment.base_url,
            &self.config.fragment.thumbnail_url,
            cache,
        )
    }
}

/// Parse a numeric query; comma doubles as a decimal separator and anything
/// unparseable converts as zero
fn parse_amount(text: &str) -> Decimal {
    Decimal::from_str(&text.replace(',', ".")).unwrap_or(Decimal::ZERO)
}

/// Conversions average whatever per-source prices are on hand, even ones
/// retained from a round where that source failed
fn conversion_snapshot(snapshot: RateSnapshot) -> RateSnapshot {
    if snapshot.source_prices.is_empty() {
        return snapshot;
    }
    let sum: Decimal = snapshot.source_prices.values().copied().sum();
    let ton_usd =
        (sum / Decimal::from(snapshot.source_prices.len())).round_dp(results::TON_RATE_DECIMALS);
    RateSnapshot { ton_usd, ..snapshot }
}
