//! Historical price collaborators.
//!
//! The service only depends on [`HistoricalDataProvider`]; any non-success
//! response, provider-embedded error or throttling marker, or malformed
//! payload must surface as an `Err`.

pub mod alpha_vantage;

use async_trait::async_trait;

use crate::errors::VolatilityError;
use crate::models::PriceSeries;

pub use alpha_vantage::AlphaVantageProvider;

#[async_trait]
pub trait HistoricalDataProvider: Send + Sync {
    /// Identifier used in logs, e.g. "ALPHA_VANTAGE".
    fn id(&self) -> &'static str;

    /// Daily closes for `from`/`to`, ascending by date. Providers may return
    /// more than the analysis window; the engine keeps the most recent points.
    async fn fetch_daily_series(&self, from: &str, to: &str)
        -> Result<PriceSeries, VolatilityError>;
}
