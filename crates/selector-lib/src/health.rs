//! Health tracking for the selector
//!
//! Two components are tracked: the prober (reachability of the configured
//! servers) and the engine (whether rounds still produce a viable choice).
//! Statuses are derived from each completed round.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a component, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Operational with reduced fidelity
    Degraded,
    Unhealthy,
}

impl ComponentStatus {
    pub fn is_operational(&self) -> bool {
        *self != ComponentStatus::Unhealthy
    }
}

/// Last known state of one component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn new(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn healthy() -> Self {
        Self::new(ComponentStatus::Healthy, None)
    }

    /// Prober health from one round's probe outcomes
    pub fn from_probe_outcomes(reachable: usize, total: usize) -> Self {
        if reachable >= total {
            Self::healthy()
        } else if reachable == 0 {
            Self::new(
                ComponentStatus::Unhealthy,
                Some(format!("all {} servers unreachable", total)),
            )
        } else {
            Self::new(
                ComponentStatus::Degraded,
                Some(format!("{} of {} servers unreachable", total - reachable, total)),
            )
        }
    }

    /// Engine health from the viability of the last choice
    pub fn from_viability(viable: bool) -> Self {
        if viable {
            Self::healthy()
        } else {
            Self::new(
                ComponentStatus::Degraded,
                Some("no viable server, falling back to first in order".to_string()),
            )
        }
    }
}

/// Overall health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Worst status across components; healthy when none are registered
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        components
            .values()
            .map(|c| c.status)
            .max()
            .unwrap_or(ComponentStatus::Healthy)
    }
}

/// Readiness response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names for health tracking
pub mod components {
    pub const PROBER: &str = "prober";
    pub const ENGINE: &str = "engine";
}

#[derive(Debug, Default)]
struct RegistryState {
    components: HashMap<String, ComponentHealth>,
    rounds_recorded: u64,
}

/// Shared registry of component health
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    state: Arc<RwLock<RegistryState>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component with initial healthy status
    pub async fn register(&self, name: &str) {
        let mut state = self.state.write().await;
        state
            .components
            .insert(name.to_string(), ComponentHealth::healthy());
    }

    /// Update both components from a completed round
    ///
    /// The first recorded round also makes the selector ready.
    pub async fn record_round(&self, reachable: usize, total: usize, viable: bool) {
        let mut state = self.state.write().await;
        state.components.insert(
            components::PROBER.to_string(),
            ComponentHealth::from_probe_outcomes(reachable, total),
        );
        state.components.insert(
            components::ENGINE.to_string(),
            ComponentHealth::from_viability(viable),
        );
        state.rounds_recorded += 1;
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.state.read().await.components.clone();
        let status = HealthResponse::compute_status(&components);
        HealthResponse { status, components }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        let state = self.state.read().await;

        let reason = if state.rounds_recorded == 0 {
            Some("No round completed yet")
        } else if !HealthResponse::compute_status(&state.components).is_operational() {
            Some("All servers unreachable")
        } else {
            None
        };

        ReadinessResponse {
            ready: reason.is_none(),
            reason: reason.map(str::to_string),
        }
    }
}
