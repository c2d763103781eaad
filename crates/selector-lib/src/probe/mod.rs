//! Server probing
//!
//! A probe performs one request/response exchange with a server and returns
//! its self-reported metrics. Round-trip time is measured by the caller
//! around the whole exchange, so probes never report it themselves.

mod tcp;

pub use tcp::{TcpProbe, MAX_RESPONSE_BYTES, PROBE_REQUEST};

use crate::error::ProbeError;
use crate::models::{MetricSample, ServerEndpoint};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use async_trait::async_trait;

/// Trait for probe implementations
#[async_trait]
pub trait Probe: Send + Sync {
    /// Perform one exchange with the server at `endpoint`
    async fn probe(&self, endpoint: &ServerEndpoint) -> Result<ProbeResponse, ProbeError>;
}

fn default_health_score() -> f64 {
    50.0
}

fn default_total_handled() -> u64 {
    1
}

/// Metrics a server reports about itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResponse {
    /// Load percentage (0-100)
    pub load: f64,
    #[serde(default = "default_health_score")]
    pub health_score: f64,
    #[serde(default)]
    pub total_errors: u64,
    #[serde(default = "default_total_handled")]
    pub total_handled: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bandwidth_mbps: Option<f64>,
}

impl ProbeResponse {
    /// Errors per handled request, as a fraction
    pub fn error_rate(&self) -> f64 {
        self.total_errors as f64 / self.total_handled.max(1) as f64
    }

    /// Combine the response with the measured round-trip time
    ///
    /// Load outside 0-100 is rejected. Health is clamped to 0-100, and a
    /// non-positive bandwidth counts as not reported.
    pub fn into_sample(self, rtt: Duration) -> Result<MetricSample, ProbeError> {
        if !self.load.is_finite() || !(0.0..=100.0).contains(&self.load) {
            return Err(ProbeError::InvalidField {
                field: "load",
                value: self.load,
            });
        }
        if !self.health_score.is_finite() {
            return Err(ProbeError::InvalidField {
                field: "health_score",
                value: self.health_score,
            });
        }

        let error_rate = self.error_rate();
        Ok(MetricSample {
            rtt_secs: rtt.as_secs_f64(),
            load: self.load,
            health: self.health_score.clamp(0.0, 100.0),
            error_rate,
            bandwidth_mbps: self.bandwidth_mbps.filter(|bw| bw.is_finite() && *bw > 0.0),
        })
    }
}
