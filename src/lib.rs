// src/lib.rs

pub mod cache;
pub mod clock;
pub mod common;
pub mod config;
pub mod converter;
pub mod errors;
pub mod exposure;
pub mod fallback;
pub mod indicators;
pub mod limiter;
pub mod models;
pub mod provider;
pub mod service;
pub mod stats;

pub use crate::cache::{CacheEntry, CacheStore, DailyResultCache, InMemoryStore, JsonFileStore};
pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::config::ServiceConfig;
pub use crate::errors::VolatilityError;
pub use crate::limiter::{Admission, RateLimitConfig, RateLimiter};
pub use crate::models::{CurrencyPair, PriceSeries, ResultSource, VolatilityResponse, VolatilityResult};
pub use crate::provider::HistoricalDataProvider;
pub use crate::service::VolatilityService;
pub use crate::stats::ServiceStats;
