use crate::common::rounding::round_to;
use crate::models::{Trend, TrendDirection};

/// Moves within +/- this many percent are treated as sideways.
pub const SIDEWAYS_BAND_PCT: f64 = 1.0;

/// Classifies the move from `first` to `last` over the analyzed window.
pub fn classify_trend(first: f64, last: f64) -> Trend {
    let change_pct = (last - first) / first * 100.0;

    let direction = if change_pct > SIDEWAYS_BAND_PCT {
        TrendDirection::Up
    } else if change_pct < -SIDEWAYS_BAND_PCT {
        TrendDirection::Down
    } else {
        TrendDirection::Sideways
    };

    let label = match direction {
        TrendDirection::Up => "Strengthening",
        TrendDirection::Down => "Weakening",
        TrendDirection::Sideways => "Stable",
    };

    Trend {
        direction,
        percentage: round_to(change_pct, 2),
        description: format!(
            "{} {:.1}% over 30 days",
            label,
            round_to(change_pct.abs(), 1)
        ),
    }
}

/// Neutral trend attached to estimates that had no price history.
pub fn flat_trend(description: &str) -> Trend {
    Trend {
        direction: TrendDirection::Sideways,
        percentage: 0.0,
        description: description.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trend_up() {
        let trend = classify_trend(1.0, 1.03);
        assert_eq!(trend.direction, TrendDirection::Up);
        assert_eq!(trend.percentage, 3.0);
        assert_eq!(trend.description, "Strengthening 3.0% over 30 days");
    }

    #[test]
    fn test_trend_down() {
        let trend = classify_trend(1.0, 0.95);
        assert_eq!(trend.direction, TrendDirection::Down);
        assert_eq!(trend.percentage, -5.0);
        assert_eq!(trend.description, "Weakening 5.0% over 30 days");
    }

    #[test]
    fn test_trend_within_band_is_sideways() {
        assert_eq!(classify_trend(1.0, 1.005).direction, TrendDirection::Sideways);
        assert_eq!(classify_trend(1.0, 0.995).direction, TrendDirection::Sideways);
    }
}
