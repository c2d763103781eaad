//! Hybrid point forecast
//!
//! Blends a short-window least-squares extrapolation with exponential
//! smoothing over the full window.

/// Smoothing factor applied to the newest value
pub const SMOOTHING_ALPHA: f64 = 0.3;

/// Number of trailing points used for the regression estimate
pub const REGRESSION_WINDOW: usize = 5;

/// Share of the regression estimate in the blended forecast
pub const REGRESSION_WEIGHT: f64 = 0.6;

/// Exponentially smoothed level of a series, iterating oldest to newest
pub fn exponential_smoothing(values: &[f64], alpha: f64) -> Option<f64> {
    let (first, rest) = values.split_first()?;
    Some(
        rest.iter()
            .fold(*first, |level, value| alpha * value + (1.0 - alpha) * level),
    )
}

/// Calculate linear regression slope against position index
pub fn linear_regression_slope(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let sum_x: f64 = (0..values.len()).map(|i| i as f64).sum();
    let sum_y: f64 = values.iter().sum();
    let sum_xy: f64 = values.iter().enumerate().map(|(i, y)| i as f64 * y).sum();
    let sum_x2: f64 = (0..values.len()).map(|i| (i as f64).powi(2)).sum();
    let denom = n * sum_x2 - sum_x.powi(2);
    if denom.abs() < f64::EPSILON {
        return 0.0;
    }
    (n * sum_xy - sum_x * sum_y) / denom
}

/// Fit ordinary least squares over the last `window` points and extrapolate
/// one step past the newest one
pub fn linear_regression_forecast(values: &[f64], window: usize) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let m = values.len().min(window.max(1));
    let tail = &values[values.len() - m..];
    if tail.len() < 2 {
        return tail.last().copied();
    }

    let n = tail.len() as f64;
    let slope = linear_regression_slope(tail);
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = tail.iter().sum::<f64>() / n;
    let intercept = mean_y - slope * mean_x;
    Some(intercept + slope * n)
}
