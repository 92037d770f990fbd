//! Static volatility estimates used when no fresh calculation is possible.
//!
//! Table values are typical annualized volatilities in percent. Pairs that are
//! not tabulated get a default by classification: anything involving an
//! emerging-market currency is the most volatile, two majors the least.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::indicators::trend::flat_trend;
use crate::models::{Confidence, CurrencyPair, RiskLevel, RiskScore, Trend};

pub const EMERGING_CURRENCIES: &[&str] = &["BRL", "CNY"];
pub const MAJOR_CURRENCIES: &[&str] = &["USD", "EUR", "GBP", "JPY", "CHF", "CAD", "AUD"];

pub const EMERGING_DEFAULT_PCT: f64 = 18.5;
pub const MAJOR_DEFAULT_PCT: f64 = 12.0;
pub const OTHER_DEFAULT_PCT: f64 = 15.0;

pub const FALLBACK_PERIOD: &str = "30_days_estimated";
pub const FALLBACK_METHOD: &str = "fallback_estimate";

/// `estimateBasis` values: table row vs classification rule.
pub const BASIS_TABULATED: &str = "historical_data";
pub const BASIS_CLASSIFIED: &str = "estimated";

/// Unordered pairs; lookups try both orders.
const FALLBACK_VOLATILITIES: &[(&str, &str, f64)] = &[
    // Majors
    ("EUR", "USD", 12.5),
    ("GBP", "USD", 15.8),
    ("USD", "JPY", 10.2),
    ("EUR", "GBP", 8.7),
    ("AUD", "USD", 14.3),
    ("USD", "CAD", 9.8),
    ("USD", "CHF", 11.2),
    // Crosses
    ("EUR", "JPY", 13.1),
    ("EUR", "CHF", 6.8),
    ("GBP", "JPY", 16.9),
    ("AUD", "JPY", 15.7),
    ("GBP", "CHF", 14.2),
    ("AUD", "CAD", 12.6),
    ("CAD", "JPY", 11.8),
    // Emerging markets
    ("USD", "BRL", 22.4),
    ("EUR", "BRL", 24.1),
    ("USD", "CNY", 6.2),
    ("EUR", "CNY", 8.9),
    // Nordics
    ("EUR", "SEK", 11.3),
    ("EUR", "NOK", 13.7),
    ("EUR", "DKK", 2.1), // pegged
    ("USD", "SEK", 13.8),
    ("USD", "NOK", 15.2),
    ("USD", "DKK", 12.7),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackEstimate {
    pub volatility: f64,
    pub trend: Trend,
    pub risk_score: RiskScore,
    pub data_points: usize,
    pub period: String,
    pub confidence: Confidence,
    pub calculation_method: String,
    pub last_updated: DateTime<Utc>,
    /// Whether the value came from the table rather than the classification rule.
    pub tabulated: bool,
}

impl FallbackEstimate {
    pub fn basis(&self) -> &'static str {
        if self.tabulated {
            BASIS_TABULATED
        } else {
            BASIS_CLASSIFIED
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackEstimator;

impl FallbackEstimator {
    pub fn new() -> Self {
        Self
    }

    /// Tabulated volatility for the pair in either order.
    pub fn lookup(&self, pair: &CurrencyPair) -> Option<f64> {
        FALLBACK_VOLATILITIES
            .iter()
            .find(|(a, b, _)| {
                (*a == pair.from && *b == pair.to) || (*a == pair.to && *b == pair.from)
            })
            .map(|(_, _, vol)| *vol)
    }

    pub fn classify(&self, pair: &CurrencyPair) -> f64 {
        let is_emerging = |c: &str| EMERGING_CURRENCIES.contains(&c);
        let is_major = |c: &str| MAJOR_CURRENCIES.contains(&c);

        if is_emerging(pair.from.as_str()) || is_emerging(pair.to.as_str()) {
            EMERGING_DEFAULT_PCT
        } else if is_major(pair.from.as_str()) && is_major(pair.to.as_str()) {
            MAJOR_DEFAULT_PCT
        } else {
            OTHER_DEFAULT_PCT
        }
    }

    pub fn estimate(&self, pair: &CurrencyPair, as_of: DateTime<Utc>) -> FallbackEstimate {
        let (volatility, tabulated) = match self.lookup(pair) {
            Some(vol) => (vol, true),
            None => (self.classify(pair), false),
        };

        FallbackEstimate {
            volatility,
            trend: flat_trend("No trend data available (fallback mode)"),
            risk_score: RiskScore {
                level: RiskLevel::from_volatility(volatility),
                score: volatility,
                description: format!("Estimated risk based on {}% volatility", volatility),
            },
            data_points: 0,
            period: FALLBACK_PERIOD.to_string(),
            confidence: Confidence::Low,
            calculation_method: FALLBACK_METHOD.to_string(),
            last_updated: as_of,
            tabulated,
        }
    }
}
