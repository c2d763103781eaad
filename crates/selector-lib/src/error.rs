//! Error types for configuration and probing

use crate::models::ServerId;
use std::time::Duration;
use thiserror::Error;

/// Fatal configuration problems, surfaced before the first round runs
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no servers configured")]
    EmptyServerSet,

    #[error("server id '{0}' is configured more than once")]
    DuplicateServer(ServerId),

    #[error("history capacity must be at least 1")]
    ZeroCapacity,

    #[error("exploration rate must be within [0, 1], got {0}")]
    InvalidEpsilon(f64),

    #[error("{name} must be a finite non-negative number, got {value}")]
    InvalidWeight { name: &'static str, value: f64 },

    #[error("anti-stickiness penalty must be finite and non-negative, got {0}")]
    InvalidPenalty(f64),

    #[error("invalid server endpoint '{0}', expected [id=]host:port")]
    InvalidEndpoint(String),

    #[error("{0} is required")]
    Missing(&'static str),
}

/// Reasons a single probe produced no sample
///
/// Never fatal: the affected server simply has no data for that round.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connect(#[source] std::io::Error),

    #[error("i/o error during exchange: {0}")]
    Io(#[source] std::io::Error),

    #[error("server closed the connection without a response")]
    EmptyResponse,

    #[error("malformed response: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("invalid value {value} for field {field}")]
    InvalidField { field: &'static str, value: f64 },

    #[error("probe task aborted: {0}")]
    Aborted(String),
}

impl ProbeError {
    /// Short label used in logs and metric labels
    pub fn reason(&self) -> &'static str {
        match self {
            ProbeError::Timeout(_) => "timeout",
            ProbeError::Connect(_) => "connect",
            ProbeError::Io(_) => "io",
            ProbeError::EmptyResponse => "empty_response",
            ProbeError::Malformed(_) => "malformed",
            ProbeError::InvalidField { .. } => "invalid_field",
            ProbeError::Aborted(_) => "aborted",
        }
    }
}
