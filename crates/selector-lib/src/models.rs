//! Core data models for the server selector

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque identifier of a monitored server (typically its port)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(String);

impl ServerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ServerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u16> for ServerId {
    fn from(port: u16) -> Self {
        Self(port.to_string())
    }
}

/// Network location of a monitored server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEndpoint {
    pub id: ServerId,
    pub host: String,
    pub port: u16,
}

impl ServerEndpoint {
    pub fn new(id: impl Into<ServerId>, host: impl Into<String>, port: u16) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
            port,
        }
    }

    /// Socket address string suitable for `TcpStream::connect`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parses `[id=]host:port`; without an explicit id the port becomes the id
impl FromStr for ServerEndpoint {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidEndpoint(s.to_string());
        let s = s.trim();

        let (id, addr) = match s.split_once('=') {
            Some((id, addr)) if !id.trim().is_empty() => (Some(id.trim()), addr.trim()),
            Some(_) => return Err(invalid()),
            None => (None, s),
        };

        let (host, port) = addr.rsplit_once(':').ok_or_else(invalid)?;
        if host.is_empty() {
            return Err(invalid());
        }
        let port: u16 = port.parse().map_err(|_| invalid())?;

        let id = id.map(ServerId::from).unwrap_or_else(|| ServerId::from(port));
        Ok(Self::new(id, host, port))
    }
}

/// Kinds of metric tracked per server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Rtt,
    Load,
    Health,
    ErrorRate,
    Bandwidth,
}

impl MetricKind {
    pub const ALL: [MetricKind; 5] = [
        MetricKind::Rtt,
        MetricKind::Load,
        MetricKind::Health,
        MetricKind::ErrorRate,
        MetricKind::Bandwidth,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Rtt => "rtt",
            MetricKind::Load => "load",
            MetricKind::Health => "health",
            MetricKind::ErrorRate => "error_rate",
            MetricKind::Bandwidth => "bandwidth",
        }
    }
}

/// One successful observation of a server within a round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// Wall-clock duration of the probe exchange in seconds
    pub rtt_secs: f64,
    /// Load percentage (0-100)
    pub load: f64,
    /// Health score (0-100, higher is healthier)
    pub health: f64,
    /// Error fraction (0-1)
    pub error_rate: f64,
    /// Bandwidth in Mbps, only when the server reported one
    pub bandwidth_mbps: Option<f64>,
}

impl MetricSample {
    /// Value reported for a metric kind, if any
    pub fn value(&self, kind: MetricKind) -> Option<f64> {
        match kind {
            MetricKind::Rtt => Some(self.rtt_secs),
            MetricKind::Load => Some(self.load),
            MetricKind::Health => Some(self.health),
            MetricKind::ErrorRate => Some(self.error_rate),
            MetricKind::Bandwidth => self.bandwidth_mbps,
        }
    }

    /// Iterate over every (kind, value) pair this sample actually reports
    pub fn reported(&self) -> impl Iterator<Item = (MetricKind, f64)> + '_ {
        MetricKind::ALL
            .into_iter()
            .filter_map(move |kind| self.value(kind).map(|v| (kind, v)))
    }
}

/// Forecast of near-future behavior for one server
///
/// Every prediction is `None` until the server has history for that metric.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub rtt: Option<f64>,
    pub load: Option<f64>,
    pub health: Option<f64>,
    pub error_rate: Option<f64>,
    pub bandwidth: Option<f64>,
    pub anomaly: bool,
}

impl ForecastResult {
    pub fn predicted(&self, kind: MetricKind) -> Option<f64> {
        match kind {
            MetricKind::Rtt => self.rtt,
            MetricKind::Load => self.load,
            MetricKind::Health => self.health,
            MetricKind::ErrorRate => self.error_rate,
            MetricKind::Bandwidth => self.bandwidth,
        }
    }

    pub fn set(&mut self, kind: MetricKind, value: Option<f64>) {
        match kind {
            MetricKind::Rtt => self.rtt = value,
            MetricKind::Load => self.load = value,
            MetricKind::Health => self.health = value,
            MetricKind::ErrorRate => self.error_rate = value,
            MetricKind::Bandwidth => self.bandwidth = value,
        }
    }
}

/// Which branch of the selection policy produced a choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionBranch {
    Exploit,
    Explore,
}

impl SelectionBranch {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionBranch::Exploit => "exploit",
            SelectionBranch::Explore => "explore",
        }
    }
}

/// Per-server slice of a round record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerRound {
    pub server: ServerId,
    /// Whether the probe succeeded this round
    pub reachable: bool,
    /// Short failure reason when the probe did not succeed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    /// Raw values observed this round
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample: Option<MetricSample>,
    pub forecast: ForecastResult,
    /// Cost before the anti-stickiness adjustment; `null` when unscorable
    #[serde(serialize_with = "crate::models::serialize_score")]
    pub score: f64,
}

/// Cumulative number of times a server has been chosen this session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionCount {
    pub server: ServerId,
    pub count: u64,
}

/// Immutable outcome of one decision round
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundRecord {
    pub round: u64,
    /// Unix timestamp (milliseconds) at which the round started
    pub started_at: i64,
    pub duration_ms: u64,
    /// Servers in configuration order
    pub servers: Vec<ServerRound>,
    pub chosen: ServerId,
    pub branch: SelectionBranch,
    /// False when every server was unscorable and the choice is a fallback
    pub viable: bool,
    pub selection_counts: Vec<SelectionCount>,
}

impl RoundRecord {
    pub fn server(&self, id: &ServerId) -> Option<&ServerRound> {
        self.servers.iter().find(|s| &s.server == id)
    }

    pub fn reachable_count(&self) -> usize {
        self.servers.iter().filter(|s| s.reachable).count()
    }
}

/// Serialize a cost with `+inf` (unscorable) rendered as `null`
pub fn serialize_score<S>(score: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    if score.is_finite() {
        serializer.serialize_some(score)
    } else {
        serializer.serialize_none()
    }
}
