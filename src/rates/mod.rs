//! Currency rate service
//!
//! Keeps a TTL-cached TON/USD composite rate averaged over two independent
//! sources. Whichever subset of sources succeeds in a round is averaged;
//! each source's last individually-seen price is retained even while that
//! source is failing, and a fully failed round leaves the previous
//! composite untouched.

pub mod sources;

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::cache::{Refresh, RefreshCache};
use sources::RateSource;

/// Number of decimal digits kept on the stored composite rate
const RATE_SCALE: u32 = 4;

/// Snapshot of the composite rate plus per-source detail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateSnapshot {
    /// Averaged TON price in USD, rounded to 4 decimal digits
    pub ton_usd: Decimal,
    /// Last price seen from each source, surviving partial failures
    pub source_prices: HashMap<String, Decimal>,
}

impl RateSnapshot {
    /// Convert a USD amount to TON; `None` when the rate is unusable
    pub fn usd_to_ton(&self, usd: Decimal) -> Option<Decimal> {
        if self.ton_usd.is_zero() {
            return None;
        }
        Some(usd / self.ton_usd)
    }

    /// Convert a TON amount to USD
    pub fn ton_to_usd(&self, ton: Decimal) -> Decimal {
        ton * self.ton_usd
    }

    /// Last price seen from a named source
    pub fn source_price(&self, name: &str) -> Option<Decimal> {
        self.source_prices.get(name).copied()
    }
}

/// Refresh strategy querying both sources concurrently
pub struct RateRefresher {
    primary: Arc<dyn RateSource>,
    secondary: Arc<dyn RateSource>,
}

impl RateRefresher {
    pub fn new(primary: Arc<dyn RateSource>, secondary: Arc<dyn RateSource>) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl Refresh for RateRefresher {
    type Value = RateSnapshot;

    fn name(&self) -> &'static str {
        "ton_rate"
    }

    async fn refresh(&self, previous: Option<&RateSnapshot>) -> Option<RateSnapshot> {
        let (primary, secondary) = tokio::join!(
            self.primary.fetch_usd_price(),
            self.secondary.fetch_usd_price()
        );

        let mut source_prices = previous
            .map(|snapshot| snapshot.source_prices.clone())
            .unwrap_or_default();
        let mut fresh = Vec::with_capacity(2);

        for (source, result) in [
            (self.primary.name(), primary),
            (self.secondary.name(), secondary),
        ] {
            match result {
                Ok(price) => {
                    source_prices.insert(source.to_string(), price);
                    fresh.push(price);
                }
                Err(err) => {
                    warn!(source, error = %err, "rate source failed");
                }
            }
        }

        if fresh.is_empty() {
            return None;
        }

        let composite = (fresh.iter().sum::<Decimal>() / Decimal::from(fresh.len()))
            .round_dp(RATE_SCALE);
        info!(rate = %composite, sources = fresh.len(), "TON rate updated");

        Some(RateSnapshot {
            ton_usd: composite,
            source_prices,
        })
    }
}

/// TTL-cached TON/USD rate with a background refresh task
pub struct RateService {
    cache: RefreshCache<RateRefresher>,
}

impl RateService {
    pub fn new(
        primary: Arc<dyn RateSource>,
        secondary: Arc<dyn RateSource>,
        ttl: Duration,
    ) -> Self {
        Self {
            cache: RefreshCache::new(RateRefresher::new(primary, secondary), ttl),
        }
    }

    /// Spawn the periodic background refresh
    pub fn start(&self) {
        self.cache.start();
    }

    pub fn stop(&self) {
        self.cache.stop();
    }

    /// Current snapshot and its age in seconds
    pub async fn get(&self) -> (Option<RateSnapshot>, u64) {
        self.cache.get().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use rust_decimal_macros::dec;

    struct FixedSource {
        name: &'static str,
        price: Option<Decimal>,
    }

    #[async_trait]
    impl RateSource for FixedSource {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn fetch_usd_price(&self) -> Result<Decimal, FetchError> {
            self.price
                .ok_or_else(|| FetchError::unavailable("source down"))
        }
    }

    fn refresher(a: Option<Decimal>, b: Option<Decimal>) -> RateRefresher {
        RateRefresher::new(
            Arc::new(FixedSource { name: "CoinGecko", price: a }),
            Arc::new(FixedSource { name: "Binance", price: b }),
        )
    }

    #[tokio::test]
    async fn test_both_sources_averaged() {
        let snapshot = refresher(Some(dec!(5.0)), Some(dec!(7.0)))
            .refresh(None)
            .await
            .unwrap();
        assert_eq!(snapshot.ton_usd, dec!(6.0000));
        assert_eq!(snapshot.source_price("CoinGecko"), Some(dec!(5.0)));
        assert_eq!(snapshot.source_price("Binance"), Some(dec!(7.0)));
    }

    #[tokio::test]
    async fn test_single_source_used_alone() {
        let snapshot = refresher(Some(dec!(5.0)), None)
            .refresh(None)
            .await
            .unwrap();
        assert_eq!(snapshot.ton_usd, dec!(5.0000));
        assert_eq!(snapshot.source_price("Binance"), None);
    }

    #[tokio::test]
    async fn test_total_failure_keeps_previous() {
        let previous = RateSnapshot {
            ton_usd: dec!(6.0),
            source_prices: HashMap::from([("CoinGecko".to_string(), dec!(6.0))]),
        };
        let result = refresher(None, None).refresh(Some(&previous)).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_failing_source_detail_retained() {
        let previous = refresher(Some(dec!(5.0)), Some(dec!(7.0)))
            .refresh(None)
            .await
            .unwrap();

        // Binance fails this round; its last-seen price survives while the
        // composite follows the fresh subset only
        let snapshot = refresher(Some(dec!(4.0)), None)
            .refresh(Some(&previous))
            .await
            .unwrap();
        assert_eq!(snapshot.ton_usd, dec!(4.0000));
        assert_eq!(snapshot.source_price("Binance"), Some(dec!(7.0)));
    }

    #[tokio::test]
    async fn test_composite_rounded_to_four_digits() {
        let snapshot = refresher(Some(dec!(1.00001)), Some(dec!(2.00002)))
            .refresh(None)
            .await
            .unwrap();
        assert_eq!(snapshot.ton_usd, dec!(1.5000));
    }

    #[test]
    fn test_conversions() {
        let snapshot = RateSnapshot {
            ton_usd: dec!(3.0),
            source_prices: HashMap::new(),
        };
        assert_eq!(snapshot.ton_to_usd(dec!(100)), dec!(300.0));
        let ton = snapshot.usd_to_ton(dec!(100)).unwrap();
        assert_eq!(ton.round_dp(2), dec!(33.33));

        let zero = RateSnapshot {
            ton_usd: Decimal::ZERO,
            source_prices: HashMap::new(),
        };
        assert_eq!(zero.usd_to_ton(dec!(100)), None);
    }
}
