//! Decision round orchestration
//!
//! Each round probes every configured server concurrently, folds the
//! outcomes into the metric store in configuration order, forecasts, scores
//! and selects one server, then emits an immutable [`RoundRecord`].
//!
//! [`RoundRecord`]: crate::models::RoundRecord

mod round;

#[cfg(test)]
mod tests;

pub use round::{RoundCoordinator, RoundCoordinatorBuilder};

use crate::error::ConfigError;
use crate::forecast::{ForecastConfig, DEFAULT_Z_THRESHOLD};
use crate::report::DEFAULT_SERIES_CAPACITY;
use crate::scoring::{ScoreWeights, ScoringConfig, ANOMALY_SURCHARGE, BANDWIDTH_CAP_MBPS};
use crate::selection::{SelectionConfig, DEFAULT_ANTI_STICK_PENALTY, DEFAULT_EPSILON};
use crate::store::DEFAULT_HISTORY_CAPACITY;
use std::time::Duration;

/// Default per-probe timeout
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(600);

/// Default delay between rounds
pub const DEFAULT_ROUND_INTERVAL: Duration = Duration::from_secs(1);

/// Configuration for the round coordinator
#[derive(Debug, Clone)]
pub struct RoundConfig {
    /// Values kept per server and metric (default: 10)
    pub history_capacity: usize,
    /// Deadline for one probe exchange (default: 600ms)
    pub probe_timeout: Duration,
    /// Delay between the end of one round and the start of the next (default: 1s)
    pub round_interval: Duration,
    /// Stop after this many rounds; unbounded when `None`
    pub max_rounds: Option<u64>,
    pub weights: ScoreWeights,
    /// Exploration probability (default: 0.2)
    pub epsilon: f64,
    /// Cost added to the previous choice (default: 0.03)
    pub anti_stick_penalty: f64,
    /// Z-score above which the latest RTT is anomalous (default: 2.0)
    pub anomaly_threshold: f64,
    /// Cost multiplier for anomalous servers (default: 1.5)
    pub anomaly_surcharge: f64,
    /// Bandwidth with no shortfall penalty (default: 1000 Mbps)
    pub bandwidth_cap_mbps: f64,
    /// Points kept per server in the report series (default: 500)
    pub series_capacity: usize,
    /// Record channel buffer size (default: 100)
    pub channel_buffer: usize,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            round_interval: DEFAULT_ROUND_INTERVAL,
            max_rounds: None,
            weights: ScoreWeights::default(),
            epsilon: DEFAULT_EPSILON,
            anti_stick_penalty: DEFAULT_ANTI_STICK_PENALTY,
            anomaly_threshold: DEFAULT_Z_THRESHOLD,
            anomaly_surcharge: ANOMALY_SURCHARGE,
            bandwidth_cap_mbps: BANDWIDTH_CAP_MBPS,
            series_capacity: DEFAULT_SERIES_CAPACITY,
            channel_buffer: 100,
        }
    }
}

impl RoundConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        self.weights.validate()?;
        self.selection_config().validate()?;

        let positive = [
            ("anomaly_threshold", self.anomaly_threshold),
            ("bandwidth_cap_mbps", self.bandwidth_cap_mbps),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidWeight { name, value });
            }
        }
        if !self.anomaly_surcharge.is_finite() || self.anomaly_surcharge < 0.0 {
            return Err(ConfigError::InvalidWeight {
                name: "anomaly_surcharge",
                value: self.anomaly_surcharge,
            });
        }
        Ok(())
    }

    pub fn forecast_config(&self) -> ForecastConfig {
        ForecastConfig {
            anomaly_threshold: self.anomaly_threshold,
            ..Default::default()
        }
    }

    pub fn scoring_config(&self) -> ScoringConfig {
        ScoringConfig {
            weights: self.weights,
            bandwidth_cap_mbps: self.bandwidth_cap_mbps,
            anomaly_surcharge: self.anomaly_surcharge,
        }
    }

    pub fn selection_config(&self) -> SelectionConfig {
        SelectionConfig {
            epsilon: self.epsilon,
            anti_stick_penalty: self.anti_stick_penalty,
        }
    }
}
