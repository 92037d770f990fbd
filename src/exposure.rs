//! Parametric Value-at-Risk for a currency exposure.
//!
//! VaR = exposure x annual volatility x sqrt(days / 252) x 1.645 (95%, one tail).
//! Horizons beyond one trading year are capped at 252 days.

use serde::{Deserialize, Serialize};

use crate::errors::VolatilityError;
use crate::indicators::vol::TRADING_DAYS_PER_YEAR;

pub const Z_SCORE_95: f64 = 1.645;
/// Used when the caller has no volatility figure (0).
pub const DEFAULT_VOLATILITY_PCT: f64 = 12.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExposureRiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskMetrics {
    pub exposure_value: f64,
    pub value_at_risk: f64,
    pub potential_gain: f64,
    pub potential_loss: f64,
    pub risk_level: ExposureRiskLevel,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Exposure {
    pub amount: f64,
    pub rate: f64,
    /// Annualized volatility in percent.
    pub volatility_pct: f64,
    pub horizon_days: u32,
}

impl Exposure {
    pub fn assess(&self) -> Result<RiskMetrics, VolatilityError> {
        if !self.rate.is_finite() || self.rate <= 0.0 {
            return Err(VolatilityError::InvalidInput(format!(
                "exchange rate must be positive, got {}",
                self.rate
            )));
        }

        let volatility_pct = if self.volatility_pct == 0.0 {
            DEFAULT_VOLATILITY_PCT
        } else {
            self.volatility_pct
        };
        if !volatility_pct.is_finite() || volatility_pct < 0.0 {
            return Err(VolatilityError::InvalidInput(format!(
                "volatility must be positive, got {}",
                volatility_pct
            )));
        }

        let exposure_value = self.amount * self.rate;
        let days = (self.horizon_days as f64).min(TRADING_DAYS_PER_YEAR);
        let horizon_vol = volatility_pct / 100.0 * (days / TRADING_DAYS_PER_YEAR).sqrt();
        let value_at_risk = exposure_value * horizon_vol * Z_SCORE_95;

        if !exposure_value.is_finite() || !value_at_risk.is_finite() {
            return Err(VolatilityError::InvalidInput(
                "calculation overflowed, check the inputs".to_string(),
            ));
        }

        let risk_pct = if exposure_value != 0.0 {
            value_at_risk / exposure_value * 100.0
        } else {
            0.0
        };
        let risk_level = if risk_pct > 10.0 {
            ExposureRiskLevel::High
        } else if risk_pct > 5.0 {
            ExposureRiskLevel::Medium
        } else {
            ExposureRiskLevel::Low
        };

        Ok(RiskMetrics {
            exposure_value,
            value_at_risk,
            // Symmetric under the normal assumption.
            potential_gain: value_at_risk,
            potential_loss: value_at_risk,
            risk_level,
        })
    }
}
