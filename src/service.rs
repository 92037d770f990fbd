//! Orchestrates cache, limiter, provider, engine and fallback.
//!
//! `get_volatility` never fails: every error path degrades to a fallback
//! estimate annotated with what went wrong. Concurrent requests for the same
//! pair are serialized on a per-pair gate and re-check the cache once they
//! hold it, so one upstream fetch serves them all. A fallback produced while
//! others were queued is handed to them instead of retrying the upstream.
//!
//! Cache operations run on the blocking pool since the file store writes
//! synchronously.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, info, warn};

use crate::cache::{CacheStore, DailyResultCache, InMemoryStore, JsonFileStore};
use crate::clock::{Clock, SystemClock};
use crate::config::ServiceConfig;
use crate::errors::VolatilityError;
use crate::fallback::FallbackEstimator;
use crate::indicators::VolatilityEngine;
use crate::limiter::{Admission, RateLimiter};
use crate::models::{
    CurrencyPair, RateLimitInfo, ResultSource, VolatilityReport, VolatilityResult,
};
use crate::provider::{AlphaVantageProvider, HistoricalDataProvider};
use crate::stats::ServiceStats;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-pair lock; holds the fallback of the last failed attempt while
/// requests are queued behind it.
type PairGate = Arc<AsyncMutex<Option<VolatilityResult>>>;

pub struct VolatilityService {
    limiter: RateLimiter,
    cache: Arc<DailyResultCache>,
    engine: VolatilityEngine,
    fallback: FallbackEstimator,
    provider: Arc<dyn HistoricalDataProvider>,
    clock: Arc<dyn Clock>,
    fetch_timeout: Duration,
    in_flight: Mutex<HashMap<String, PairGate>>,
    stats: Mutex<ServiceStats>,
}

impl VolatilityService {
    pub fn new(
        provider: Arc<dyn HistoricalDataProvider>,
        limiter: RateLimiter,
        cache: DailyResultCache,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            limiter,
            cache: Arc::new(cache),
            engine: VolatilityEngine::new(),
            fallback: FallbackEstimator::new(),
            provider,
            clock,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            in_flight: Mutex::new(HashMap::new()),
            stats: Mutex::new(ServiceStats::new()),
        }
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Wires the Alpha Vantage provider, the system clock and the configured
    /// cache store.
    pub fn from_config(config: &ServiceConfig) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let store: Arc<dyn CacheStore> = match &config.cache.path {
            Some(path) => {
                let store = JsonFileStore::new(path);
                info!("📁 Persisting daily cache to {}", store.path().display());
                Arc::new(store)
            }
            None => Arc::new(InMemoryStore::new()),
        };

        let limiter = RateLimiter::new(config.rate_limit.to_limiter_config(), clock.clone());
        let cache = DailyResultCache::new(store, clock.clone());
        let provider = Arc::new(AlphaVantageProvider::new(&config.alpha_vantage));

        Self::new(provider, limiter, cache, clock).with_fetch_timeout(config.fetch_timeout())
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn cache(&self) -> &DailyResultCache {
        &self.cache
    }

    /// Snapshot of the request counters.
    pub fn stats(&self) -> ServiceStats {
        self.lock_stats().clone()
    }

    fn lock_stats(&self) -> MutexGuard<'_, ServiceStats> {
        self.stats.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, HashMap<String, PairGate>> {
        self.in_flight.lock().unwrap_or_else(|poisoned| {
            warn!("In-flight map mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Volatility for `from`/`to` today. Always returns a usable result.
    pub async fn get_volatility(&self, from: &str, to: &str) -> VolatilityResult {
        let result = match CurrencyPair::new(from, to) {
            Ok(pair) => self.resolve(pair).await,
            Err(e) => self.reject_input(CurrencyPair::normalized(from, to), e),
        };
        self.lock_stats().record(result.source());
        result
    }

    /// Malformed codes never reach the cache, the limiter or the upstream.
    fn reject_input(&self, pair: CurrencyPair, e: VolatilityError) -> VolatilityResult {
        warn!("❌ Rejected pair {}: {}", pair, e);
        let estimate = self.fallback.estimate(&pair, self.clock.now());
        VolatilityResult::Fallback {
            pair,
            estimate,
            rate_limit_info: None,
            error: Some(format!("{} - using fallback data", e)),
            remaining_calls: None,
        }
    }

    /// Runs `op` against the cache on the blocking pool.
    async fn on_cache<T, F>(&self, op: F) -> Option<T>
    where
        F: FnOnce(&DailyResultCache) -> T + Send + 'static,
        T: Send + 'static,
    {
        let cache = Arc::clone(&self.cache);
        match tokio::task::spawn_blocking(move || op(&cache)).await {
            Ok(value) => Some(value),
            Err(e) => {
                error!("❌ Cache task failed: {}", e);
                None
            }
        }
    }

    /// Resolves several pairs concurrently, in input order.
    pub async fn get_volatility_many<S: AsRef<str>>(&self, pairs: &[(S, S)]) -> Vec<VolatilityResult> {
        join_all(
            pairs
                .iter()
                .map(|(from, to)| self.get_volatility(from.as_ref(), to.as_ref())),
        )
        .await
    }

    async fn resolve(&self, pair: CurrencyPair) -> VolatilityResult {
        if pair.is_same_currency() {
            debug!("Same currency {}, volatility is zero", pair.from);
            return VolatilityResult::SameCurrency { pair };
        }

        let key = pair.key();
        self.on_cache(|cache: &DailyResultCache| cache.purge_stale()).await;
        if let Some(hit) = self.cached(&pair, &key).await {
            info!("📅 Using daily cached volatility for {}", key);
            return hit;
        }

        let gate = self.pair_gate(&key);
        let result = {
            let mut last_failure = gate.lock().await;
            // Another request may have filled the cache while we waited.
            if let Some(hit) = self.cached(&pair, &key).await {
                debug!("📅 {} filled by a concurrent request", key);
                hit
            } else if let Some(failure) = last_failure.as_ref() {
                debug!("{} failed for a concurrent request, sharing its fallback", key);
                failure.clone()
            } else {
                info!("🔄 Calculating fresh daily volatility for {}", key);
                let result = self.compute(pair, &key).await;
                if result.source() == ResultSource::Fallback {
                    *last_failure = Some(result.clone());
                }
                result
            }
        };
        self.release_gate(&key, gate);

        result
    }

    async fn cached(&self, pair: &CurrencyPair, key: &str) -> Option<VolatilityResult> {
        self.lock_stats().cache_lookups += 1;
        let key = key.to_string();
        let entry = self
            .on_cache(move |cache: &DailyResultCache| cache.get(&key))
            .await
            .flatten()?;
        Some(VolatilityResult::DailyCache {
            pair: pair.clone(),
            report: entry.report,
        })
    }

    async fn compute(&self, pair: CurrencyPair, key: &str) -> VolatilityResult {
        self.lock_stats().limiter_checks += 1;
        if let Admission::Rejected {
            wait_time_secs,
            next_available,
        } = self.limiter.try_admit()
        {
            let config = self.limiter.config();
            warn!(
                "⏳ {} for {} ({} calls per {:?}), using fallback",
                VolatilityError::LocalQuotaExceeded { wait_time_secs },
                key,
                config.max_calls,
                config.window
            );
            let estimate = self.fallback.estimate(&pair, self.clock.now());
            return VolatilityResult::Fallback {
                pair,
                estimate,
                rate_limit_info: Some(RateLimitInfo {
                    wait_time: wait_time_secs,
                    next_available,
                    remaining_calls: 0,
                }),
                error: None,
                remaining_calls: None,
            };
        }

        match self.fetch_and_analyze(&pair).await {
            Ok(report) => {
                info!(
                    "📈 {} volatility {:.1}% from {} points",
                    key, report.volatility, report.data_points
                );
                let (key, stored) = (key.to_string(), report.clone());
                self.on_cache(move |cache: &DailyResultCache| cache.put(&key, stored))
                    .await;
                VolatilityResult::FreshCalculation {
                    pair,
                    report,
                    remaining_calls: self.remaining_quota(),
                }
            }
            Err(e) => {
                if e.is_rate_limit() {
                    warn!("⏳ Upstream throttled {}: {}", key, e);
                } else {
                    error!("❌ Error calculating volatility for {}: {}", key, e);
                }
                let estimate = self.fallback.estimate(&pair, self.clock.now());
                VolatilityResult::Fallback {
                    pair,
                    estimate,
                    rate_limit_info: None,
                    error: Some(format!("{} - using fallback data", e)),
                    remaining_calls: Some(self.remaining_quota()),
                }
            }
        }
    }

    async fn fetch_and_analyze(
        &self,
        pair: &CurrencyPair,
    ) -> Result<VolatilityReport, VolatilityError> {
        self.lock_stats().upstream_fetches += 1;

        let fetch = self.provider.fetch_daily_series(&pair.from, &pair.to);
        let series = match tokio::time::timeout(self.fetch_timeout, fetch).await {
            Ok(series) => series?,
            Err(_) => return Err(VolatilityError::Timeout(self.fetch_timeout)),
        };

        debug!(
            "{}: {} daily closes for {}",
            self.provider.id(),
            series.len(),
            pair
        );

        self.engine.analyze_at(&series, self.clock.now())
    }

    fn remaining_quota(&self) -> usize {
        self.limiter.remaining_quota()
    }

    fn pair_gate(&self, key: &str) -> PairGate {
        self.lock_in_flight()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(None)))
            .clone()
    }

    fn release_gate(&self, key: &str, gate: PairGate) {
        let mut gates = self.lock_in_flight();
        // The map and `gate` are the only holders: nobody is queued behind us.
        if Arc::strong_count(&gate) <= 2 {
            gates.remove(key);
        }
    }

    #[cfg(test)]
    fn in_flight_len(&self) -> usize {
        self.lock_in_flight().len()
    }
}
