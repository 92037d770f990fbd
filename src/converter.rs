//! Currency conversion pass-through backed by Frankfurter.
//!
//! Frankfurter rejects identical `from`/`to`, so same-currency input is
//! answered locally with a rate of 1.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ConverterConfig;
use crate::errors::VolatilityError;
use crate::models::CurrencyPair;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversion {
    pub amount: f64,
    pub base: String,
    /// Target currency -> converted amount.
    pub rates: HashMap<String, f64>,
    /// Units of the target currency per unit of the base.
    pub rate: f64,
    pub date: NaiveDate,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct FrankfurterResponse {
    amount: f64,
    base: String,
    date: NaiveDate,
    rates: HashMap<String, f64>,
}

pub struct CurrencyConverter {
    client: Client,
    base_url: String,
}

impl CurrencyConverter {
    pub fn new(config: &ConverterConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn convert(
        &self,
        amount: f64,
        from: &str,
        to: &str,
    ) -> Result<Conversion, VolatilityError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(VolatilityError::InvalidInput(format!(
                "amount must be a positive number, got {}",
                amount
            )));
        }

        let pair = CurrencyPair::new(from, to)?;
        let now = Utc::now();
        if pair.is_same_currency() {
            return Ok(same_currency(amount, &pair.from, now));
        }

        let url = format!("{}/latest", self.base_url);
        let amount_param = amount.to_string();
        debug!("Frankfurter request: {} {} -> {}", amount, pair.from, pair.to);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("amount", amount_param.as_str()),
                ("from", pair.from.as_str()),
                ("to", pair.to.as_str()),
            ])
            .send()
            .await
            .map_err(|e| VolatilityError::UpstreamUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VolatilityError::UpstreamUnavailable(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let text = response.text().await?;
        let parsed: FrankfurterResponse = serde_json::from_str(&text).map_err(|e| {
            VolatilityError::UpstreamUnavailable(format!("Failed to parse response: {}", e))
        })?;

        to_conversion(parsed, &pair.to, now)
    }
}

fn same_currency(amount: f64, currency: &str, now: DateTime<Utc>) -> Conversion {
    Conversion {
        amount,
        base: currency.to_string(),
        rates: HashMap::from([(currency.to_string(), amount)]),
        rate: 1.0,
        date: now.date_naive(),
        last_updated: now,
    }
}

fn to_conversion(
    response: FrankfurterResponse,
    to: &str,
    now: DateTime<Utc>,
) -> Result<Conversion, VolatilityError> {
    let converted = *response.rates.get(to).ok_or_else(|| {
        VolatilityError::UpstreamUnavailable(format!("No rate returned for {}", to))
    })?;

    if response.amount <= 0.0 || !converted.is_finite() || converted <= 0.0 {
        return Err(VolatilityError::UpstreamUnavailable(format!(
            "Invalid rate returned for {}: {}",
            to, converted
        )));
    }

    Ok(Conversion {
        amount: response.amount,
        base: response.base,
        rate: converted / response.amount,
        rates: response.rates,
        date: response.date,
        last_updated: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_currency_short_circuit() {
        // Unroutable base URL: any network call would fail the test.
        let converter = CurrencyConverter::new(&ConverterConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
        });

        let conversion = converter.convert(250.0, "usd", "USD").await.unwrap();
        assert_eq!(conversion.rate, 1.0);
        assert_eq!(conversion.base, "USD");
        assert_eq!(conversion.rates.get("USD"), Some(&250.0));
    }

    #[tokio::test]
    async fn test_rejects_non_positive_amount() {
        let converter = CurrencyConverter::new(&ConverterConfig::default());
        let err = converter.convert(0.0, "EUR", "USD").await.unwrap_err();
        assert!(matches!(err, VolatilityError::InvalidInput(_)));
    }

    #[test]
    fn test_to_conversion_derives_rate() {
        let response: FrankfurterResponse = serde_json::from_str(
            r#"{"amount": 100.0, "base": "EUR", "date": "2024-05-10", "rates": {"USD": 107.85}}"#,
        )
        .unwrap();

        let conversion = to_conversion(response, "USD", Utc::now()).unwrap();
        assert!((conversion.rate - 1.0785).abs() < 1e-12);
        assert_eq!(conversion.base, "EUR");
        assert_eq!(conversion.date, NaiveDate::from_ymd_opt(2024, 5, 10).unwrap());
    }

    #[test]
    fn test_to_conversion_missing_target() {
        let response: FrankfurterResponse = serde_json::from_str(
            r#"{"amount": 1.0, "base": "EUR", "date": "2024-05-10", "rates": {"GBP": 0.86}}"#,
        )
        .unwrap();

        assert!(to_conversion(response, "USD", Utc::now()).is_err());
    }
}
