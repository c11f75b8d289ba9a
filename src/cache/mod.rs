//! TTL refresh cache
//!
//! Serves a possibly-stale value immediately while a background task
//! refreshes it on a fixed period. A synchronous catch-up refresh runs only
//! when no value exists yet or a background tick was missed, with at most
//! one in-flight upstream refresh at a time. A failed refresh never clears
//! the last good value; the cache is permanently best-effort.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Upstream refresh strategy plugged into a [`RefreshCache`]
#[async_trait]
pub trait Refresh: Send + Sync + 'static {
    type Value: Clone + Send + Sync + 'static;

    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Produce a replacement value. `previous` is the last good value so a
    /// strategy can carry over per-source detail across partial failures.
    /// Returning `None` keeps the previous value untouched.
    async fn refresh(&self, previous: Option<&Self::Value>) -> Option<Self::Value>;
}

struct CacheState<T> {
    value: Option<T>,
    last_updated: Option<Instant>,
}

impl<T> CacheState<T> {
    fn is_fresh(&self, ttl: Duration) -> bool {
        match (&self.value, self.last_updated) {
            (Some(_), Some(at)) => at.elapsed() <= ttl,
            _ => false,
        }
    }

    fn age_secs(&self) -> u64 {
        self.last_updated.map(|at| at.elapsed().as_secs()).unwrap_or(0)
    }
}

/// Shared cached value with background refresh and serve-stale reads
pub struct RefreshCache<R: Refresh> {
    refresher: Arc<R>,
    ttl: Duration,
    state: Arc<RwLock<CacheState<R::Value>>>,
    /// Serializes upstream refreshes (single-flight)
    refresh_gate: Arc<Mutex<()>>,
    task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl<R: Refresh> RefreshCache<R> {
    pub fn new(refresher: R, ttl: Duration) -> Self {
        Self {
            refresher: Arc::new(refresher),
            ttl,
            state: Arc::new(RwLock::new(CacheState {
                value: None,
                last_updated: None,
            })),
            refresh_gate: Arc::new(Mutex::new(())),
            task: std::sync::Mutex::new(None),
        }
    }

    /// Current value and its age in seconds. If the value is unset or past
    /// its TTL a synchronous refresh runs first (first-caller-pays);
    /// otherwise the held value is returned immediately.
    pub async fn get(&self) -> (Option<R::Value>, u64) {
        {
            let state = self.state.read().await;
            if state.is_fresh(self.ttl) {
                return (state.value.clone(), state.age_secs());
            }
        }

        self.refresh_now().await;

        let state = self.state.read().await;
        (state.value.clone(), state.age_secs())
    }

    /// Run one refresh, skipping it if another caller already completed one
    /// while we waited on the gate.
    async fn refresh_now(&self) {
        let _guard = self.refresh_gate.lock().await;

        let previous = {
            let state = self.state.read().await;
            if state.is_fresh(self.ttl) {
                return;
            }
            state.value.clone()
        };

        match self.refresher.refresh(previous.as_ref()).await {
            Some(value) => {
                // Whole-value replace; readers never observe a partial update
                let mut state = self.state.write().await;
                state.value = Some(value);
                state.last_updated = Some(Instant::now());
                debug!(cache = self.refresher.name(), "cache refreshed");
            }
            None => {
                warn!(
                    cache = self.refresher.name(),
                    "refresh failed, retaining previous value"
                );
            }
        }
    }

    /// Spawn the background task refreshing on a fixed period equal to the
    /// TTL. The first tick fires immediately to warm the cache at startup.
    pub fn start(&self) {
        let refresher = Arc::clone(&self.refresher);
        let state = Arc::clone(&self.state);
        let gate = Arc::clone(&self.refresh_gate);
        let period = self.ttl;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let _guard = gate.lock().await;
                let previous = state.read().await.value.clone();
                match refresher.refresh(previous.as_ref()).await {
                    Some(value) => {
                        let mut state = state.write().await;
                        state.value = Some(value);
                        state.last_updated = Some(Instant::now());
                        debug!(cache = refresher.name(), "background refresh completed");
                    }
                    None => {
                        warn!(
                            cache = refresher.name(),
                            "background refresh failed, retaining previous value"
                        );
                    }
                }
            }
        });

        let mut task = self.task.lock().expect("cache task lock poisoned");
        if let Some(old) = task.replace(handle) {
            old.abort();
        }
    }

    /// Cancel the background task
    pub fn stop(&self) {
        if let Some(handle) = self.task.lock().expect("cache task lock poisoned").take() {
            handle.abort();
        }
    }
}

impl<R: Refresh> Drop for RefreshCache<R> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Succeeds `successes` times, then fails forever
    struct FlakyRefresher {
        calls: AtomicU32,
        successes: u32,
    }

    #[async_trait]
    impl Refresh for FlakyRefresher {
        type Value = u32;

        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn refresh(&self, _previous: Option<&u32>) -> Option<u32> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.successes {
                Some(n + 100)
            } else {
                None
            }
        }
    }

    #[tokio::test]
    async fn test_cold_start_refreshes_synchronously() {
        let cache = RefreshCache::new(
            FlakyRefresher { calls: AtomicU32::new(0), successes: 1 },
            Duration::from_secs(60),
        );
        let (value, age) = cache.get().await;
        assert_eq!(value, Some(100));
        assert_eq!(age, 0);
    }

    #[tokio::test]
    async fn test_fresh_value_served_without_refresh() {
        let cache = RefreshCache::new(
            FlakyRefresher { calls: AtomicU32::new(0), successes: 10 },
            Duration::from_secs(60),
        );
        let (first, _) = cache.get().await;
        let (second, _) = cache.get().await;
        // Second read must not trigger a second upstream call
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_failed_refresh_retains_last_good_value() {
        let cache = RefreshCache::new(
            FlakyRefresher { calls: AtomicU32::new(0), successes: 1 },
            Duration::from_millis(10),
        );
        let (value, _) = cache.get().await;
        assert_eq!(value, Some(100));

        tokio::time::sleep(Duration::from_millis(30)).await;

        // Stale and the upstream now always fails: the old value survives
        let (value, _) = cache.get().await;
        assert_eq!(value, Some(100));
    }

    #[tokio::test]
    async fn test_never_successful_refresh_yields_none() {
        let cache = RefreshCache::new(
            FlakyRefresher { calls: AtomicU32::new(0), successes: 0 },
            Duration::from_secs(60),
        );
        let (value, _) = cache.get().await;
        assert_eq!(value, None);
    }
}
