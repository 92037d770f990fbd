//! Error taxonomy for the volatility core and its boundary clients.
//!
//! The service never surfaces these to its callers: each one is turned into a
//! fallback estimate annotated with the error text. They do propagate out of
//! the narrower APIs (engine, providers, converter, stores).

use std::time::Duration;

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VolatilityError {
    /// Fewer usable price points than the engine needs.
    #[error("Insufficient historical data: {found} points, need at least {required}")]
    InsufficientData { found: usize, required: usize },

    /// A close that makes daily returns undefined (zero, negative or non-finite).
    #[error("Invalid price on {date}: {price}")]
    InvalidPrice { date: NaiveDate, price: f64 },

    /// Network failure, non-success status, provider error message or malformed payload.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The provider signalled its own throttling.
    #[error("Upstream rate limited: {0}")]
    UpstreamRateLimited(String),

    /// The local limiter rejected the call.
    #[error("Local quota exceeded, next call in {wait_time_secs}s")]
    LocalQuotaExceeded { wait_time_secs: i64 },

    #[error("Upstream request timed out after {0:?}")]
    Timeout(Duration),

    /// Cache backing store failure.
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl VolatilityError {
    /// True for both the provider's throttling and the local quota.
    pub fn is_rate_limit(&self) -> bool {
        matches!(
            self,
            Self::UpstreamRateLimited(_) | Self::LocalQuotaExceeded { .. }
        )
    }
}
