//! Forecasting engine
//!
//! Turns metric windows into near-future predictions and flags servers whose
//! latest round-trip time deviates from recent history.

mod anomaly;
mod hybrid;

pub use anomaly::{AnomalyDetector, LatestAnomaly, DEFAULT_Z_THRESHOLD};
pub use hybrid::{
    exponential_smoothing, linear_regression_forecast, linear_regression_slope,
    REGRESSION_WEIGHT, REGRESSION_WINDOW, SMOOTHING_ALPHA,
};

use crate::models::{ForecastResult, MetricKind, ServerId};
use crate::store::MetricStore;

/// Configuration for the forecaster
#[derive(Debug, Clone)]
pub struct ForecastConfig {
    /// Smoothing factor for the newest value (default: 0.3)
    pub smoothing_alpha: f64,
    /// Trailing points used by the regression (default: 5)
    pub regression_window: usize,
    /// Share of the regression estimate in the blend (default: 0.6)
    pub regression_weight: f64,
    /// Z-score threshold for anomaly detection (default: 2.0)
    pub anomaly_threshold: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            smoothing_alpha: SMOOTHING_ALPHA,
            regression_window: REGRESSION_WINDOW,
            regression_weight: REGRESSION_WEIGHT,
            anomaly_threshold: DEFAULT_Z_THRESHOLD,
        }
    }
}

/// Hybrid forecaster with latest-value anomaly detection
#[derive(Debug, Clone)]
pub struct Forecaster {
    config: ForecastConfig,
    detector: AnomalyDetector,
}

impl Forecaster {
    pub fn new() -> Self {
        Self::with_config(ForecastConfig::default())
    }

    pub fn with_config(config: ForecastConfig) -> Self {
        let detector = AnomalyDetector::new(config.anomaly_threshold);
        Self { config, detector }
    }

    /// Predict the next value of a window
    ///
    /// Empty windows have no prediction and a single value predicts itself.
    pub fn predict(&self, window: &[f64]) -> Option<f64> {
        match window {
            [] => None,
            [only] => Some(*only),
            _ => {
                let regression = linear_regression_forecast(window, self.config.regression_window)?;
                let smoothing = exponential_smoothing(window, self.config.smoothing_alpha)?;
                let weight = self.config.regression_weight;
                Some(weight * regression + (1.0 - weight) * smoothing)
            }
        }
    }

    pub fn is_anomaly(&self, window: &[f64]) -> bool {
        self.detector.is_anomaly(window)
    }

    pub fn anomaly(&self, window: &[f64]) -> Option<LatestAnomaly> {
        self.detector.detect(window)
    }

    /// Forecast every metric of a server from its current windows
    ///
    /// The anomaly flag tracks round-trip time.
    pub fn forecast(&self, store: &MetricStore, server: &ServerId) -> ForecastResult {
        let mut result = ForecastResult::default();
        for kind in MetricKind::ALL {
            result.set(kind, self.predict(&store.window(server, kind)));
        }
        result.anomaly = self.is_anomaly(&store.window(server, MetricKind::Rtt));
        result
    }
}

impl Default for Forecaster {
    fn default() -> Self {
        Self::new()
    }
}
