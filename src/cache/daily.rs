use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::store::{CacheMap, CacheStore};
use crate::clock::Clock;
use crate::models::VolatilityReport;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub pair_key: String,
    pub report: VolatilityReport,
    /// UTC calendar date the report was calculated on.
    pub calculated_date: NaiveDate,
    pub stored_at: DateTime<Utc>,
}

/// Pair key -> report, valid only for the UTC calendar day it was computed on.
///
/// Stale entries are treated as misses and evicted lazily by `get`;
/// `purge_stale` sweeps them all. Every mutation is written through to the
/// backing store after the entries lock is released. Store failures are
/// logged and never reach the caller.
pub struct DailyResultCache {
    clock: Arc<dyn Clock>,
    store: Arc<dyn CacheStore>,
    state: Mutex<CacheState>,
    // Revision of the last snapshot the store accepted.
    saved_revision: Mutex<u64>,
}

#[derive(Default)]
struct CacheState {
    entries: CacheMap,
    revision: u64,
}

/// Copy of the entries taken under the lock, tagged with its revision.
struct Snapshot {
    revision: u64,
    entries: CacheMap,
}

impl CacheState {
    fn snapshot(&mut self) -> Snapshot {
        self.revision += 1;
        Snapshot {
            revision: self.revision,
            entries: self.entries.clone(),
        }
    }
}

impl DailyResultCache {
    pub fn new(store: Arc<dyn CacheStore>, clock: Arc<dyn Clock>) -> Self {
        let entries = match store.load() {
            Ok(entries) => {
                debug!("📅 Loaded {} cached volatility entries", entries.len());
                entries
            }
            Err(e) => {
                warn!("Failed to load volatility cache: {}", e);
                HashMap::new()
            }
        };

        Self {
            clock,
            store,
            state: Mutex::new(CacheState {
                entries,
                revision: 0,
            }),
            saved_revision: Mutex::new(0),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("Daily cache mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Writes `snapshot` unless a newer one already reached the store.
    fn persist(&self, snapshot: Snapshot) {
        let mut saved = self.saved_revision.lock().unwrap_or_else(|p| p.into_inner());
        if snapshot.revision <= *saved {
            debug!("Skipping cache snapshot {} (store at {})", snapshot.revision, *saved);
            return;
        }

        match self.store.save(&snapshot.entries) {
            Ok(()) => *saved = snapshot.revision,
            Err(e) => warn!("Failed to save volatility cache: {}", e),
        }
    }

    /// Today's entry for `pair_key`. An entry from another day is removed.
    pub fn get(&self, pair_key: &str) -> Option<CacheEntry> {
        let today = self.clock.today();

        let snapshot = {
            let mut state = self.lock_state();
            let entry = state.entries.get(pair_key)?;
            if entry.calculated_date == today {
                return Some(entry.clone());
            }

            debug!(
                "Cache entry for {} expired (calculated {})",
                pair_key, entry.calculated_date
            );
            state.entries.remove(pair_key);
            state.snapshot()
        };

        self.persist(snapshot);
        None
    }

    /// Stores `report` under `pair_key`, stamped with today's date.
    pub fn put(&self, pair_key: &str, report: VolatilityReport) -> CacheEntry {
        let now = self.clock.now();
        let entry = CacheEntry {
            pair_key: pair_key.to_string(),
            report,
            calculated_date: now.date_naive(),
            stored_at: now,
        };

        let snapshot = {
            let mut state = self.lock_state();
            state.entries.insert(pair_key.to_string(), entry.clone());
            state.snapshot()
        };

        self.persist(snapshot);
        entry
    }

    /// Removes every entry not dated today. Returns how many were removed.
    pub fn purge_stale(&self) -> usize {
        let today = self.clock.today();

        let (removed, snapshot) = {
            let mut state = self.lock_state();
            let before = state.entries.len();
            state.entries.retain(|_, entry| entry.calculated_date == today);
            let removed = before - state.entries.len();
            (removed, (removed > 0).then(|| state.snapshot()))
        };

        if let Some(snapshot) = snapshot {
            debug!("🧹 Purged {} stale volatility entries", removed);
            self.persist(snapshot);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.lock_state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_state().entries.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cache::store::InMemoryStore;
    use crate::clock::ManualClock;
    use crate::errors::VolatilityError;
    use crate::models::{
        Confidence, PriceRange, RiskLevel, RiskScore, Trend, TrendDirection,
    };
    use chrono::{TimeDelta, TimeZone};
    use std::sync::mpsc;

    pub(crate) fn sample_report() -> VolatilityReport {
        VolatilityReport {
            volatility: 7.4,
            trend: Trend {
                direction: TrendDirection::Sideways,
                percentage: 0.42,
                description: "Stable 0.4% over 30 days".to_string(),
            },
            price_range: PriceRange {
                min: 1.0712,
                max: 1.0934,
                current: 1.0851,
            },
            risk_score: RiskScore {
                level: RiskLevel::Low,
                score: 7.4,
                description: RiskLevel::Low.description().to_string(),
            },
            data_points: 30,
            period: "30_days_real_data".to_string(),
            confidence: Confidence::High,
            last_updated: Utc.with_ymd_and_hms(2024, 5, 10, 9, 0, 0).unwrap(),
        }
    }

    pub(crate) fn sample_entry(pair_key: &str) -> CacheEntry {
        CacheEntry {
            pair_key: pair_key.to_string(),
            report: sample_report(),
            calculated_date: NaiveDate::from_ymd_opt(2024, 5, 10).unwrap(),
            stored_at: Utc.with_ymd_and_hms(2024, 5, 10, 9, 0, 0).unwrap(),
        }
    }

    fn setup() -> (Arc<ManualClock>, Arc<InMemoryStore>, DailyResultCache) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 10, 9, 0, 0).unwrap(),
        ));
        let store = Arc::new(InMemoryStore::new());
        let cache = DailyResultCache::new(store.clone(), clock.clone());
        (clock, store, cache)
    }

    #[test]
    fn test_same_day_hit() {
        let (clock, _store, cache) = setup();

        cache.put("EURUSD", sample_report());
        clock.advance(TimeDelta::hours(14));

        let entry = cache.get("EURUSD").expect("entry should still be fresh");
        assert_eq!(entry.report, sample_report());
        assert_eq!(entry.calculated_date, clock.today());
    }

    #[test]
    fn test_miss_for_unknown_pair() {
        let (_clock, _store, cache) = setup();
        assert!(cache.get("USDJPY").is_none());
    }

    #[test]
    fn test_cross_day_miss_removes_entry() {
        let (clock, store, cache) = setup();

        cache.put("EURUSD", sample_report());
        clock.advance(TimeDelta::days(1));

        assert!(cache.get("EURUSD").is_none());
        assert!(cache.is_empty());
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_put_overwrites_and_restamps() {
        let (clock, _store, cache) = setup();

        cache.put("EURUSD", sample_report());
        clock.advance(TimeDelta::days(1));

        let mut updated = sample_report();
        updated.volatility = 8.1;
        cache.put("EURUSD", updated);

        let entry = cache.get("EURUSD").unwrap();
        assert_eq!(entry.report.volatility, 8.1);
        assert_eq!(entry.calculated_date, clock.today());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_purge_stale() {
        let (clock, _store, cache) = setup();

        cache.put("EURUSD", sample_report());
        cache.put("GBPUSD", sample_report());
        clock.advance(TimeDelta::days(1));
        cache.put("USDJPY", sample_report());

        assert_eq!(cache.purge_stale(), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("USDJPY").is_some());
        assert_eq!(cache.purge_stale(), 0);
    }

    #[test]
    fn test_loads_existing_entries_from_store() {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 10, 18, 0, 0).unwrap(),
        ));
        let store = Arc::new(InMemoryStore::new());
        let mut map = CacheMap::new();
        map.insert("EURUSD".to_string(), sample_entry("EURUSD"));
        store.save(&map).unwrap();

        let cache = DailyResultCache::new(store, clock);
        assert!(cache.get("EURUSD").is_some());
    }

    #[test]
    fn test_older_snapshot_never_overwrites_newer() {
        let (_clock, store, cache) = setup();

        cache.put("EURUSD", sample_report());
        let stale = Snapshot {
            revision: 1,
            entries: store.load().unwrap(),
        };
        cache.put("GBPUSD", sample_report());

        cache.persist(stale);
        assert_eq!(store.load().unwrap().len(), 2);
    }

    /// Parks `save` until the test releases it.
    struct ParkedStore {
        entered: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl CacheStore for ParkedStore {
        fn load(&self) -> Result<CacheMap, VolatilityError> {
            Ok(CacheMap::new())
        }

        fn save(&self, _entries: &CacheMap) -> Result<(), VolatilityError> {
            let _ = self.entered.lock().unwrap().send(());
            let _ = self.release.lock().unwrap().recv();
            Ok(())
        }
    }

    #[test]
    fn test_reads_proceed_while_store_is_writing() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let store = Arc::new(ParkedStore {
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        });
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 10, 9, 0, 0).unwrap(),
        ));
        let cache = Arc::new(DailyResultCache::new(store, clock));

        let writer = {
            let cache = cache.clone();
            std::thread::spawn(move || cache.put("EURUSD", sample_report()))
        };
        entered_rx.recv().unwrap();

        // The writer is parked inside `save`; the entries lock must be free.
        assert!(cache.get("EURUSD").is_some());
        assert_eq!(cache.len(), 1);

        release_tx.send(()).unwrap();
        writer.join().unwrap();
    }

    struct FailingStore;

    impl CacheStore for FailingStore {
        fn load(&self) -> Result<CacheMap, VolatilityError> {
            Err(VolatilityError::Storage("disk unavailable".to_string()))
        }

        fn save(&self, _entries: &CacheMap) -> Result<(), VolatilityError> {
            Err(VolatilityError::Storage("disk unavailable".to_string()))
        }
    }

    #[test]
    fn test_store_failures_do_not_break_cache() {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 10, 9, 0, 0).unwrap(),
        ));
        let cache = DailyResultCache::new(Arc::new(FailingStore), clock);

        cache.put("EURUSD", sample_report());
        assert!(cache.get("EURUSD").is_some());
    }
}
