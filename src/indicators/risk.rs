use crate::models::{RiskLevel, RiskScore};

pub const HIGH_RISK_ABOVE_PCT: f64 = 20.0;
pub const MEDIUM_RISK_ABOVE_PCT: f64 = 10.0;

impl RiskLevel {
    /// Level for an annualized volatility in percent.
    pub fn from_volatility(volatility_pct: f64) -> Self {
        if volatility_pct > HIGH_RISK_ABOVE_PCT {
            RiskLevel::High
        } else if volatility_pct > MEDIUM_RISK_ABOVE_PCT {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RiskLevel::High => "High volatility - significant price swings expected",
            RiskLevel::Medium => "Moderate volatility - some price fluctuation expected",
            RiskLevel::Low => "Low volatility - relatively stable price movements",
        }
    }
}

/// Score for a measured volatility; `score` repeats the rounded volatility.
pub fn risk_score(volatility_pct: f64) -> RiskScore {
    let level = RiskLevel::from_volatility(volatility_pct);
    RiskScore {
        level,
        score: volatility_pct,
        description: level.description().to_string(),
    }
}
