//! Alpha Vantage `FX_DAILY` client.
//!
//! Free tier allows 5 calls per minute; throttling is reported in-band through
//! a `Note` or `Information` field on an otherwise successful response.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use super::HistoricalDataProvider;
use crate::config::AlphaVantageConfig;
use crate::errors::VolatilityError;
use crate::models::{PricePoint, PriceSeries};

const PROVIDER_ID: &str = "ALPHA_VANTAGE";
const USER_AGENT: &str = "TradeTools/1.0";

#[derive(Debug, Deserialize)]
struct FxDailyResponse {
    #[serde(rename = "Time Series FX (Daily)")]
    time_series: Option<HashMap<String, FxDailyQuote>>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FxDailyQuote {
    #[serde(rename = "4. close")]
    close: String,
}

pub struct AlphaVantageProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl AlphaVantageProvider {
    pub fn new(config: &AlphaVantageConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
        }
    }

    async fn fetch(&self, params: &[(&str, &str)]) -> Result<String, VolatilityError> {
        let mut all_params: Vec<(&str, &str)> = params.to_vec();
        all_params.push(("apikey", self.api_key.as_str()));

        let url = reqwest::Url::parse_with_params(&self.base_url, &all_params).map_err(|e| {
            VolatilityError::UpstreamUnavailable(format!("Failed to build URL: {}", e))
        })?;

        debug!(
            "Alpha Vantage request: {}",
            url.as_str().replace(&self.api_key, "***")
        );

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                VolatilityError::UpstreamUnavailable(format!("{} request timed out", PROVIDER_ID))
            } else {
                VolatilityError::UpstreamUnavailable(e.to_string().replace(&self.api_key, "***"))
            }
        })?;

        Self::check_status(response.status())?;

        Ok(response.text().await?)
    }

    /// 429 is throttling; any other non-2xx status is an outage.
    fn check_status(status: StatusCode) -> Result<(), VolatilityError> {
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(VolatilityError::UpstreamRateLimited(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(VolatilityError::UpstreamUnavailable(format!(
                "Alpha Vantage API error: {}",
                status
            )));
        }
        Ok(())
    }

    /// Maps in-band error and throttling markers to errors.
    fn check_api_error(response: &FxDailyResponse) -> Result<(), VolatilityError> {
        if let Some(ref msg) = response.error_message {
            return Err(VolatilityError::UpstreamUnavailable(format!(
                "Alpha Vantage API error: {}",
                msg
            )));
        }

        // A Note on FX_DAILY is always the frequency warning.
        if let Some(ref msg) = response.note {
            return Err(VolatilityError::UpstreamRateLimited(msg.clone()));
        }

        if let Some(ref msg) = response.information {
            let lower = msg.to_ascii_lowercase();
            if lower.contains("call frequency") || lower.contains("rate limit") {
                return Err(VolatilityError::UpstreamRateLimited(msg.clone()));
            }
            warn!("Alpha Vantage info: {}", msg);
        }

        Ok(())
    }

    /// Parses an `FX_DAILY` payload into an ascending series. Rows with an
    /// unparseable date or close are skipped.
    fn parse_series(text: &str) -> Result<PriceSeries, VolatilityError> {
        let response: FxDailyResponse = serde_json::from_str(text).map_err(|e| {
            VolatilityError::UpstreamUnavailable(format!("Failed to parse response: {}", e))
        })?;

        Self::check_api_error(&response)?;

        let time_series = response.time_series.ok_or_else(|| {
            VolatilityError::UpstreamUnavailable("No historical data available".to_string())
        })?;

        let points = time_series.into_iter().filter_map(|(date_str, daily)| {
            let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").ok()?;
            let close = daily.close.trim().parse::<f64>().ok()?;
            Some(PricePoint { date, close })
        });

        Ok(PriceSeries::from_points(points))
    }
}

#[async_trait]
impl HistoricalDataProvider for AlphaVantageProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    async fn fetch_daily_series(
        &self,
        from: &str,
        to: &str,
    ) -> Result<PriceSeries, VolatilityError> {
        let params = [
            ("function", "FX_DAILY"),
            ("from_symbol", from),
            ("to_symbol", to),
            ("outputsize", "compact"),
        ];

        let text = self.fetch(&params).await?;
        let series = Self::parse_series(&text)?;

        debug!(
            "Alpha Vantage: fetched {} FX closes for {}/{}",
            series.len(),
            from,
            to
        );

        Ok(series)
    }
}
