use chrono::{DateTime, Utc};
use tracing::debug;

use super::returns::{daily_returns, mean, sample_variance};
use super::risk::risk_score;
use super::trend::classify_trend;
use crate::common::rounding::round_to;
use crate::errors::VolatilityError;
use crate::models::{Confidence, PriceRange, PriceSeries, VolatilityReport};

/// Most recent daily observations used in one analysis.
pub const ANALYSIS_WINDOW: usize = 30;
/// Fewer points than this is an error, not a degraded result.
pub const MIN_DATA_POINTS: usize = 5;
/// Windows this long or longer are reported with high confidence.
pub const HIGH_CONFIDENCE_POINTS: usize = 20;
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

pub const REPORT_PERIOD: &str = "30_days_real_data";

/// Historical (close-to-close) volatility over the trailing window of daily
/// closes, annualized with sqrt(252).
#[derive(Debug, Clone, Copy, Default)]
pub struct VolatilityEngine;

impl VolatilityEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, series: &PriceSeries) -> Result<VolatilityReport, VolatilityError> {
        self.analyze_at(series, Utc::now())
    }

    /// Same as [`analyze`](Self::analyze) with an explicit report timestamp.
    pub fn analyze_at(
        &self,
        series: &PriceSeries,
        as_of: DateTime<Utc>,
    ) -> Result<VolatilityReport, VolatilityError> {
        let window = series.tail(ANALYSIS_WINDOW);
        if window.len() < MIN_DATA_POINTS {
            return Err(VolatilityError::InsufficientData {
                found: window.len(),
                required: MIN_DATA_POINTS,
            });
        }

        if let Some(bad) = window
            .iter()
            .find(|p| !p.close.is_finite() || p.close <= 0.0)
        {
            return Err(VolatilityError::InvalidPrice {
                date: bad.date,
                price: bad.close,
            });
        }

        let closes: Vec<f64> = window.iter().map(|p| p.close).collect();
        let returns = daily_returns(&closes);

        // At least four returns here, so both are defined.
        let mean_return = mean(&returns).unwrap_or(0.0);
        let variance = sample_variance(&returns).unwrap_or(0.0);
        let daily_vol = variance.sqrt();
        let annualized = daily_vol * TRADING_DAYS_PER_YEAR.sqrt() * 100.0;

        debug!(
            "📈 {} points: annualized {:.2}% (daily {:.4}%, mean return {:.4}%)",
            closes.len(),
            annualized,
            daily_vol * 100.0,
            mean_return * 100.0
        );

        let first = closes[0];
        let last = closes[closes.len() - 1];
        let min = closes.iter().copied().fold(f64::INFINITY, f64::min);
        let max = closes.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let volatility = round_to(annualized, 1);
        let data_points = closes.len();

        Ok(VolatilityReport {
            volatility,
            trend: classify_trend(first, last),
            price_range: PriceRange {
                min: round_to(min, 4),
                max: round_to(max, 4),
                current: round_to(last, 4),
            },
            risk_score: risk_score(volatility),
            data_points,
            period: REPORT_PERIOD.to_string(),
            confidence: if data_points >= HIGH_CONFIDENCE_POINTS {
                Confidence::High
            } else {
                Confidence::Medium
            },
            last_updated: as_of,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RiskLevel, TrendDirection};
    use chrono::NaiveDate;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[test]
    fn test_regression_fixture() {
        let series = PriceSeries::from_closes(start(), &[1.0, 1.01, 0.995, 1.02, 1.015, 1.03]);
        let report = VolatilityEngine::new().analyze(&series).unwrap();

        assert_eq!(report.volatility, 25.3);
        assert_eq!(report.trend.direction, TrendDirection::Up);
        assert_eq!(report.trend.percentage, 3.0);
        assert_eq!(report.price_range.min, 0.995);
        assert_eq!(report.price_range.max, 1.03);
        assert_eq!(report.price_range.current, 1.03);
        assert_eq!(report.risk_score.level, RiskLevel::High);
        assert_eq!(report.risk_score.score, 25.3);
        assert_eq!(report.data_points, 6);
        assert_eq!(report.confidence, Confidence::Medium);
    }

    #[test]
    fn test_four_points_is_insufficient() {
        let series = PriceSeries::from_closes(start(), &[1.0, 1.01, 0.995, 1.02]);
        let err = VolatilityEngine::new().analyze(&series).unwrap_err();
        assert!(matches!(
            err,
            VolatilityError::InsufficientData {
                found: 4,
                required: 5
            }
        ));
    }

    #[test]
    fn test_five_points_succeeds() {
        let series = PriceSeries::from_closes(start(), &[1.0, 1.01, 0.995, 1.02, 1.015]);
        let report = VolatilityEngine::new().analyze(&series).unwrap();
        assert_eq!(report.data_points, 5);
        assert_eq!(report.volatility, 27.8);
    }

    #[test]
    fn test_empty_series_is_insufficient() {
        let err = VolatilityEngine::new()
            .analyze(&PriceSeries::default())
            .unwrap_err();
        assert!(matches!(err, VolatilityError::InsufficientData { found: 0, .. }));
    }

    #[test]
    fn test_only_last_thirty_points_are_used() {
        // A wild first half followed by a flat tail of 30 points.
        let mut closes = vec![1.0, 2.0, 0.5, 3.0, 0.2];
        closes.extend(std::iter::repeat(1.25).take(30));
        let series = PriceSeries::from_closes(start(), &closes);

        let report = VolatilityEngine::new().analyze(&series).unwrap();
        assert_eq!(report.data_points, 30);
        assert_eq!(report.volatility, 0.0);
        assert_eq!(report.trend.direction, TrendDirection::Sideways);
        assert_eq!(report.risk_score.level, RiskLevel::Low);
        assert_eq!(report.confidence, Confidence::High);
    }

    #[test]
    fn test_non_positive_price_rejected() {
        let series = PriceSeries::from_closes(start(), &[1.0, 1.01, 0.0, 1.02, 1.015]);
        let err = VolatilityEngine::new().analyze(&series).unwrap_err();
        assert!(matches!(err, VolatilityError::InvalidPrice { .. }));
    }
}
