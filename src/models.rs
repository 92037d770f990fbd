//! Data model: price series, the engine's report and the service result.
//!
//! `VolatilityResult` is a tagged enum; each variant carries only the fields
//! its path produces. It serializes to the flat camelCase JSON shape consumed
//! by the route layer, with optional fields omitted when absent.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::VolatilityError;
use crate::fallback::FallbackEstimate;

// ============================================================================
// Currency pair
// ============================================================================

/// Normalized (trimmed, upper-cased) currency pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyPair {
    pub from: String,
    pub to: String,
}

impl CurrencyPair {
    /// Normalizes both codes and requires each to be three ASCII letters.
    pub fn new(from: &str, to: &str) -> Result<Self, VolatilityError> {
        let pair = Self::normalized(from, to);
        for code in [&pair.from, &pair.to] {
            if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_uppercase()) {
                return Err(VolatilityError::InvalidInput(format!(
                    "currency code must be three letters, got {:?}",
                    code
                )));
            }
        }
        Ok(pair)
    }

    /// Normalizes without validating. Only for labelling rejected input.
    pub fn normalized(from: &str, to: &str) -> Self {
        Self {
            from: from.trim().to_ascii_uppercase(),
            to: to.trim().to_ascii_uppercase(),
        }
    }

    /// Cache key, e.g. `EURUSD`. Unique because both codes are three letters.
    pub fn key(&self) -> String {
        format!("{}{}", self.from, self.to)
    }

    pub fn is_same_currency(&self) -> bool {
        self.from == self.to
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.from, self.to)
    }
}

// ============================================================================
// Price series
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// Daily closes, strictly ascending by date with one point per date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Sorts by date and deduplicates; on a repeated date the later point wins.
    pub fn from_points(points: impl IntoIterator<Item = PricePoint>) -> Self {
        let by_date: BTreeMap<NaiveDate, f64> =
            points.into_iter().map(|p| (p.date, p.close)).collect();

        Self {
            points: by_date
                .into_iter()
                .map(|(date, close)| PricePoint { date, close })
                .collect(),
        }
    }

    /// Builds a series of consecutive calendar days starting at `start`.
    pub fn from_closes(start: NaiveDate, closes: &[f64]) -> Self {
        Self::from_points(
            start
                .iter_days()
                .zip(closes.iter())
                .map(|(date, &close)| PricePoint { date, close }),
        )
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    /// The most recent `n` points (all of them if fewer exist).
    pub fn tail(&self, n: usize) -> &[PricePoint] {
        let start = self.points.len().saturating_sub(n);
        &self.points[start..]
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

// ============================================================================
// Report
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Sideways,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub direction: TrendDirection,
    pub percentage: f64,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
    pub current: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    pub level: RiskLevel,
    pub score: f64,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Output of the volatility engine for one analyzed window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolatilityReport {
    /// Annualized volatility in percent, one decimal.
    pub volatility: f64,
    pub trend: Trend,
    pub price_range: PriceRange,
    pub risk_score: RiskScore,
    pub data_points: usize,
    pub period: String,
    pub confidence: Confidence,
    pub last_updated: DateTime<Utc>,
}

// ============================================================================
// Service result
// ============================================================================

pub const SOURCE_SAME_CURRENCY: &str = "same_currency";
pub const SOURCE_DAILY_CACHE: &str = "daily_cache";
pub const SOURCE_FRESH: &str = "alpha_vantage_historical";
pub const SOURCE_FALLBACK: &str = "fallback";

pub const METHOD_HISTORICAL: &str = "historical_standard_deviation";
pub const CACHE_TYPE_DAILY: &str = "daily";

/// Discriminant of [`VolatilityResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResultSource {
    SameCurrency,
    DailyCache,
    FreshCalculation,
    Fallback,
}

impl ResultSource {
    pub const ALL: [ResultSource; 4] = [
        ResultSource::SameCurrency,
        ResultSource::DailyCache,
        ResultSource::FreshCalculation,
        ResultSource::Fallback,
    ];

    /// Value of the `source` field on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SameCurrency => SOURCE_SAME_CURRENCY,
            Self::DailyCache => SOURCE_DAILY_CACHE,
            Self::FreshCalculation => SOURCE_FRESH,
            Self::Fallback => SOURCE_FALLBACK,
        }
    }
}

impl fmt::Display for ResultSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attached to a fallback produced by a local limiter rejection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitInfo {
    pub wait_time: i64,
    pub next_available: DateTime<Utc>,
    pub remaining_calls: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VolatilityResult {
    SameCurrency {
        pair: CurrencyPair,
    },
    DailyCache {
        pair: CurrencyPair,
        report: VolatilityReport,
    },
    FreshCalculation {
        pair: CurrencyPair,
        report: VolatilityReport,
        remaining_calls: usize,
    },
    Fallback {
        pair: CurrencyPair,
        estimate: FallbackEstimate,
        rate_limit_info: Option<RateLimitInfo>,
        error: Option<String>,
        remaining_calls: Option<usize>,
    },
}

impl VolatilityResult {
    pub fn source(&self) -> ResultSource {
        match self {
            Self::SameCurrency { .. } => ResultSource::SameCurrency,
            Self::DailyCache { .. } => ResultSource::DailyCache,
            Self::FreshCalculation { .. } => ResultSource::FreshCalculation,
            Self::Fallback { .. } => ResultSource::Fallback,
        }
    }

    pub fn pair(&self) -> &CurrencyPair {
        match self {
            Self::SameCurrency { pair }
            | Self::DailyCache { pair, .. }
            | Self::FreshCalculation { pair, .. }
            | Self::Fallback { pair, .. } => pair,
        }
    }

    /// Annualized volatility in percent.
    pub fn volatility(&self) -> f64 {
        match self {
            Self::SameCurrency { .. } => 0.0,
            Self::DailyCache { report, .. } | Self::FreshCalculation { report, .. } => {
                report.volatility
            }
            Self::Fallback { estimate, .. } => estimate.volatility,
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, Self::DailyCache { .. })
    }

    pub fn report(&self) -> Option<&VolatilityReport> {
        match self {
            Self::DailyCache { report, .. } | Self::FreshCalculation { report, .. } => Some(report),
            _ => None,
        }
    }

    /// Flattens the variant into the wire shape.
    pub fn to_response(&self) -> VolatilityResponse {
        let pair = self.pair();
        let mut response = VolatilityResponse {
            from: pair.from.clone(),
            to: pair.to.clone(),
            pair: pair.to_string(),
            volatility: self.volatility(),
            source: self.source().as_str().to_string(),
            period: String::new(),
            confidence: Confidence::High,
            trend: None,
            price_range: None,
            risk_score: None,
            data_points: None,
            last_updated: None,
            calculation_method: None,
            cached: None,
            cache_type: None,
            remaining_calls: None,
            rate_limit_info: None,
            estimate_basis: None,
            error: None,
        };

        match self {
            Self::SameCurrency { .. } => {
                response.period = "not_applicable".to_string();
            }
            Self::DailyCache { report, .. } => {
                response.apply_report(report);
                response.cached = Some(true);
                response.cache_type = Some(CACHE_TYPE_DAILY.to_string());
            }
            Self::FreshCalculation {
                report,
                remaining_calls,
                ..
            } => {
                response.apply_report(report);
                response.cached = Some(false);
                response.cache_type = Some(CACHE_TYPE_DAILY.to_string());
                response.remaining_calls = Some(*remaining_calls);
            }
            Self::Fallback {
                estimate,
                rate_limit_info,
                error,
                remaining_calls,
                ..
            } => {
                response.period = estimate.period.clone();
                response.confidence = estimate.confidence;
                response.trend = Some(estimate.trend.clone());
                response.risk_score = Some(estimate.risk_score.clone());
                response.data_points = Some(estimate.data_points);
                response.last_updated = Some(estimate.last_updated);
                response.calculation_method = Some(estimate.calculation_method.clone());
                response.rate_limit_info = rate_limit_info.clone();
                response.estimate_basis = Some(estimate.basis().to_string());
                response.error = error.clone();
                response.remaining_calls = *remaining_calls;
            }
        }

        response
    }
}

impl Serialize for VolatilityResult {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_response().serialize(serializer)
    }
}

/// Flat JSON shape of a [`VolatilityResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolatilityResponse {
    pub from: String,
    pub to: String,
    pub pair: String,
    pub volatility: f64,
    pub source: String,
    pub period: String,
    pub confidence: Confidence,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend: Option<Trend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_range: Option<PriceRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<RiskScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_points: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calculation_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_calls: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit_info: Option<RateLimitInfo>,
    /// Fallback only: `historical_data` for a table value, `estimated` otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimate_basis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VolatilityResponse {
    fn apply_report(&mut self, report: &VolatilityReport) {
        self.period = report.period.clone();
        self.confidence = report.confidence;
        self.trend = Some(report.trend.clone());
        self.price_range = Some(report.price_range);
        self.risk_score = Some(report.risk_score.clone());
        self.data_points = Some(report.data_points);
        self.last_updated = Some(report.last_updated);
        self.calculation_method = Some(METHOD_HISTORICAL.to_string());
    }
}
