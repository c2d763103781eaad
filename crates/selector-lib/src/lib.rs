//! Predictive server selection library
//!
//! This crate provides the core functionality for:
//! - Bounded per-server metric history
//! - Hybrid forecasting and RTT anomaly detection
//! - Weighted cost scoring
//! - Epsilon-greedy selection with anti-stickiness
//! - Concurrent probing and round orchestration
//! - Health checks, reporting and observability

pub mod coordinator;
pub mod error;
pub mod forecast;
pub mod health;
pub mod models;
pub mod observability;
pub mod probe;
pub mod report;
pub mod scoring;
pub mod selection;
pub mod store;

pub use coordinator::{RoundConfig, RoundCoordinator, RoundCoordinatorBuilder};
pub use error::{ConfigError, ProbeError};
pub use forecast::Forecaster;
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{SelectorMetrics, StructuredLogger};
pub use probe::{Probe, ProbeResponse, TcpProbe};
pub use report::{ReportHandle, SeriesPoint, ServerSummary, SessionInfo};
pub use scoring::{ScoreWeights, Scorer};
pub use selection::{RandomSource, SeededRandom, SelectionPolicy, SequenceRandom};
pub use store::MetricStore;
