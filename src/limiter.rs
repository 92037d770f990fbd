//! Sliding-window admission control for the upstream provider.
//!
//! The Alpha Vantage free tier allows 5 calls per minute. Every admitted call
//! is recorded; a call is admitted only while fewer than `max_calls` recorded
//! calls fall inside the trailing window. Rejections consume nothing.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::common::ring_buffer::CallWindow;

pub const DEFAULT_MAX_CALLS: usize = 5;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_calls: usize,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_calls: DEFAULT_MAX_CALLS,
            window: DEFAULT_WINDOW,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Rejected {
        /// Whole seconds until the oldest in-window call expires, rounded up.
        wait_time_secs: i64,
        next_available: DateTime<Utc>,
    },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted)
    }
}

pub struct RateLimiter {
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    calls: Mutex<CallWindow>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            calls: Mutex::new(CallWindow::new(config.max_calls)),
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Lock the call window, recovering from poison. A poisoned window only
    /// holds timestamps, all of which are still valid.
    fn lock_calls(&self) -> MutexGuard<'_, CallWindow> {
        self.calls.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn window(&self) -> TimeDelta {
        TimeDelta::from_std(self.config.window).unwrap_or(TimeDelta::MAX)
    }

    /// Start of the trailing window, clamped to the earliest representable instant.
    fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.window())
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Admits and records the call, or reports when the next slot frees up.
    pub fn try_admit(&self) -> Admission {
        let now = self.clock.now();
        let window = self.window();
        let mut calls = self.lock_calls();

        calls.prune(self.cutoff(now));

        if calls.len() < self.config.max_calls {
            calls.record(now);
            debug!(
                "Rate limiter: admitted ({}/{} in window)",
                calls.len(),
                self.config.max_calls
            );
            return Admission::Admitted;
        }

        // Quota is full, so the window holds at least one stamp.
        let oldest = calls.oldest().unwrap_or(now);
        let remaining_ms = (window - (now - oldest)).num_milliseconds();
        let wait_time_secs = (remaining_ms as f64 / 1000.0).ceil() as i64;

        Admission::Rejected {
            wait_time_secs,
            next_available: oldest
                .checked_add_signed(window)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// Calls still available in the current window. Does not record anything.
    pub fn remaining_quota(&self) -> usize {
        let calls = self.lock_calls();
        if calls.is_empty() {
            return self.config.max_calls;
        }
        let used = calls.count_after(self.cutoff(self.clock.now()));
        self.config.max_calls.saturating_sub(used)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    fn setup() -> (Arc<ManualClock>, RateLimiter) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap(),
        ));
        let limiter = RateLimiter::new(RateLimitConfig::default(), clock.clone());
        (clock, limiter)
    }

    #[test]
    fn test_admits_up_to_quota() {
        let (_clock, limiter) = setup();

        for _ in 0..5 {
            assert!(limiter.try_admit().is_admitted());
        }
        assert!(!limiter.try_admit().is_admitted());
        assert_eq!(limiter.remaining_quota(), 0);
    }

    #[test]
    fn test_rejection_math() {
        let (clock, limiter) = setup();
        let first = clock.now();

        for _ in 0..5 {
            assert!(limiter.try_admit().is_admitted());
            clock.advance(TimeDelta::seconds(2));
        }
        // now = first + 10s
        clock.advance(TimeDelta::milliseconds(500));

        match limiter.try_admit() {
            Admission::Rejected {
                wait_time_secs,
                next_available,
            } => {
                assert_eq!(next_available, first + TimeDelta::seconds(60));
                // ceil((60000 - 10500) / 1000)
                assert_eq!(wait_time_secs, 50);
            }
            Admission::Admitted => panic!("expected rejection"),
        }
    }

    #[test]
    fn test_rejections_do_not_consume_quota() {
        let (clock, limiter) = setup();

        for _ in 0..5 {
            limiter.try_admit();
        }
        for _ in 0..10 {
            assert!(!limiter.try_admit().is_admitted());
        }

        // Once the window has passed, the full quota is back.
        clock.advance(TimeDelta::seconds(61));
        assert_eq!(limiter.remaining_quota(), 5);
        for _ in 0..5 {
            assert!(limiter.try_admit().is_admitted());
        }
    }

    #[test]
    fn test_slot_frees_when_oldest_call_leaves_window() {
        let (clock, limiter) = setup();

        limiter.try_admit();
        clock.advance(TimeDelta::seconds(30));
        for _ in 0..4 {
            limiter.try_admit();
        }
        assert!(!limiter.try_admit().is_admitted());

        // Exactly at oldest + 60s the oldest stamp is no longer inside the window.
        clock.advance(TimeDelta::seconds(30));
        assert_eq!(limiter.remaining_quota(), 1);
        assert!(limiter.try_admit().is_admitted());
        assert!(!limiter.try_admit().is_admitted());
    }

    #[test]
    fn test_admission_bound_over_trailing_window() {
        let (clock, limiter) = setup();
        let mut admitted: Vec<DateTime<Utc>> = Vec::new();

        // One attempt every 3 seconds for five minutes.
        for _ in 0..100 {
            if limiter.try_admit().is_admitted() {
                admitted.push(clock.now());
            }
            clock.advance(TimeDelta::seconds(3));
        }

        for (i, start) in admitted.iter().enumerate() {
            let in_window = admitted[i..]
                .iter()
                .filter(|t| **t - *start < TimeDelta::seconds(60))
                .count();
            assert!(in_window <= 5, "{} admissions within 60s", in_window);
        }
        assert!(admitted.len() >= 25);
    }

    #[test]
    fn test_huge_window_does_not_overflow() {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap(),
        ));
        let limiter = RateLimiter::new(
            RateLimitConfig {
                max_calls: 1,
                window: Duration::from_secs(10_000_000_000_000),
            },
            clock,
        );

        assert!(limiter.try_admit().is_admitted());
        match limiter.try_admit() {
            Admission::Rejected { wait_time_secs, .. } => assert!(wait_time_secs > 0),
            Admission::Admitted => panic!("expected rejection"),
        }
        assert_eq!(limiter.remaining_quota(), 0);
    }

    #[test]
    fn test_concurrent_admission_never_exceeds_quota() {
        let (_clock, limiter) = setup();
        let limiter = Arc::new(limiter);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || limiter.try_admit().is_admitted())
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(admitted, 5);
    }
}
