//! Weighted cost function
//!
//! Converts a forecast into a single comparable cost where lower is better.
//! A server without a round-trip prediction cannot be scored and costs `+inf`.

use crate::error::ConfigError;
use crate::models::ForecastResult;
use serde::{Deserialize, Serialize};

/// Bandwidth at or above which no bandwidth penalty applies (Mbps)
pub const BANDWIDTH_CAP_MBPS: f64 = 1000.0;

/// Cost multiplier for servers flagged as anomalous this round
pub const ANOMALY_SURCHARGE: f64 = 1.5;

/// Coefficients of the cost function
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    /// α: predicted round-trip time in seconds
    pub rtt: f64,
    /// β: predicted load fraction
    pub load: f64,
    /// γ: health penalty
    pub health: f64,
    /// δ: error rate
    pub error_rate: f64,
    /// ε: bandwidth shortfall penalty
    pub bandwidth: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            rtt: 1.0,
            load: 0.5,
            health: 0.3,
            error_rate: 0.2,
            bandwidth: 0.4,
        }
    }
}

impl ScoreWeights {
    /// Reject negative or non-finite coefficients
    pub fn validate(&self) -> Result<(), ConfigError> {
        let named = [
            ("rtt", self.rtt),
            ("load", self.load),
            ("health", self.health),
            ("error_rate", self.error_rate),
            ("bandwidth", self.bandwidth),
        ];
        for (name, value) in named {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidWeight { name, value });
            }
        }
        Ok(())
    }
}

/// Configuration for the scorer
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub weights: ScoreWeights,
    /// Bandwidth cap for the shortfall penalty (default: 1000 Mbps)
    pub bandwidth_cap_mbps: f64,
    /// Multiplier applied to anomalous servers (default: 1.5)
    pub anomaly_surcharge: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            bandwidth_cap_mbps: BANDWIDTH_CAP_MBPS,
            anomaly_surcharge: ANOMALY_SURCHARGE,
        }
    }
}

/// Computes server costs from forecasts
#[derive(Debug, Clone)]
pub struct Scorer {
    config: ScoringConfig,
}

impl Scorer {
    pub fn new(weights: ScoreWeights) -> Self {
        Self::with_config(ScoringConfig {
            weights,
            ..Default::default()
        })
    }

    pub fn with_config(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn weights(&self) -> &ScoreWeights {
        &self.config.weights
    }

    /// Cost of a forecast; `+inf` when no round-trip time is predicted
    ///
    /// Predictions are clamped to their valid domains first, so an
    /// extrapolated negative RTT or load never yields a negative cost.
    pub fn score(&self, forecast: &ForecastResult) -> f64 {
        let Some(rtt) = forecast.rtt else {
            return f64::INFINITY;
        };
        let w = &self.config.weights;

        let rtt = rtt.max(0.0);
        // Unknown load is treated as fully loaded
        let load_fraction = forecast
            .load
            .map(|l| l.clamp(0.0, 100.0) / 100.0)
            .unwrap_or(1.0);
        let health_penalty = self.health_penalty(forecast.health);
        let error_rate = forecast.error_rate.map(|e| e.clamp(0.0, 1.0)).unwrap_or(0.0);
        let bandwidth_penalty = self.bandwidth_penalty(forecast.bandwidth);

        let cost = w.rtt * rtt
            + w.load * load_fraction
            + w.health * health_penalty
            + w.error_rate * error_rate
            + w.bandwidth * bandwidth_penalty;

        if forecast.anomaly {
            cost * self.config.anomaly_surcharge
        } else {
            cost
        }
    }

    /// Unknown health is penalized as the worst case
    fn health_penalty(&self, health: Option<f64>) -> f64 {
        match health {
            Some(h) => (100.0 - h.clamp(0.0, 100.0)) / 100.0,
            None => 1.0,
        }
    }

    /// Unknown or non-positive bandwidth is not penalized
    fn bandwidth_penalty(&self, bandwidth: Option<f64>) -> f64 {
        match bandwidth {
            Some(bw) if bw > 0.0 => {
                let cap = self.config.bandwidth_cap_mbps;
                ((cap - bw) / cap).max(0.0)
            }
            _ => 0.0,
        }
    }
}

impl Default for Scorer {
    fn default() -> Self {
        Self::with_config(ScoringConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forecast(rtt: f64, load: f64, health: f64, error_rate: f64) -> ForecastResult {
        ForecastResult {
            rtt: Some(rtt),
            load: Some(load),
            health: Some(health),
            error_rate: Some(error_rate),
            bandwidth: None,
            anomaly: false,
        }
    }

    #[test]
    fn test_missing_rtt_is_infinite() {
        let scorer = Scorer::default();
        let f = ForecastResult {
            rtt: None,
            load: Some(10.0),
            health: Some(90.0),
            ..Default::default()
        };
        assert_eq!(scorer.score(&f), f64::INFINITY);
    }

    #[test]
    fn test_finite_whenever_rtt_present() {
        let scorer = Scorer::default();
        let f = ForecastResult {
            rtt: Some(0.1),
            ..Default::default()
        };
        assert!(scorer.score(&f).is_finite());
    }

    #[test]
    fn test_weighted_cost() {
        let scorer = Scorer::default();
        // 1.0*0.1 + 0.5*0.4 + 0.3*0.2 + 0.2*0.05 + 0.4*0
        let cost = scorer.score(&forecast(0.1, 40.0, 80.0, 0.05));
        assert!((cost - 0.37).abs() < 1e-9, "cost was {}", cost);
    }

    #[test]
    fn test_unknown_health_is_worst_case() {
        let scorer = Scorer::default();
        let mut f = forecast(0.1, 0.0, 100.0, 0.0);
        let healthy = scorer.score(&f);
        f.health = None;
        let unknown = scorer.score(&f);
        assert!((unknown - healthy - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_bandwidth_penalty() {
        let scorer = Scorer::default();
        let mut f = forecast(0.0, 0.0, 100.0, 0.0);

        f.bandwidth = Some(500.0);
        assert!((scorer.score(&f) - 0.4 * 0.5).abs() < 1e-9);

        f.bandwidth = Some(1500.0);
        assert_eq!(scorer.score(&f), 0.0);

        f.bandwidth = Some(0.0);
        assert_eq!(scorer.score(&f), 0.0);

        f.bandwidth = None;
        assert_eq!(scorer.score(&f), 0.0);
    }

    #[test]
    fn test_anomaly_surcharge() {
        let scorer = Scorer::default();
        let mut f = forecast(0.1, 40.0, 80.0, 0.05);
        let base = scorer.score(&f);
        f.anomaly = true;
        assert!((scorer.score(&f) - base * 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_negative_extrapolation_clamped() {
        let scorer = Scorer::default();
        let f = forecast(-0.2, -10.0, 130.0, -0.1);
        assert_eq!(scorer.score(&f), 0.0);
    }

    #[test]
    fn test_weights_validation() {
        assert!(ScoreWeights::default().validate().is_ok());

        let negative = ScoreWeights {
            load: -0.1,
            ..Default::default()
        };
        assert!(matches!(
            negative.validate(),
            Err(ConfigError::InvalidWeight { name: "load", .. })
        ));

        let nan = ScoreWeights {
            rtt: f64::NAN,
            ..Default::default()
        };
        assert!(nan.validate().is_err());
    }
}
