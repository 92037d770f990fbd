//! Return and dispersion calculators over daily closes.
//!
//! Nothing here rounds; rounding belongs to the presentation fields of the
//! report only.

/// Simple daily returns `(p_i - p_{i-1}) / p_{i-1}`.
pub fn daily_returns(closes: &[f64]) -> Vec<f64> {
    closes.windows(2).map(|w| (w[1] - w[0]) / w[0]).collect()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample variance with the n-1 denominator. Needs at least two values.
pub fn sample_variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mu = mean(values)?;
    let sum_sq: f64 = values.iter().map(|v| (v - mu).powi(2)).sum();
    Some(sum_sq / (values.len() - 1) as f64)
}

pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    sample_variance(values).map(f64::sqrt)
}
