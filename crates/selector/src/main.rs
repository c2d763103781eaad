//! Nexus Selector - predictive server selection daemon
//!
//! Probes the configured servers every round, forecasts their behavior and
//! picks the best one, exposing the results over HTTP.

use anyhow::{Context, Result};
use selector_lib::{
    health::{components, HealthRegistry},
    observability::{SelectorMetrics, StructuredLogger},
    RoundCoordinatorBuilder, SeededRandom, TcpProbe,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const SELECTOR_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting nexus-selector");

    let config = config::SelectorConfig::load()?;
    let endpoints = config.endpoints().context("Invalid server list")?;
    info!(instance = %config.instance, servers = endpoints.len(), "Selector configured");

    let health_registry = HealthRegistry::new();
    health_registry.register(components::PROBER).await;
    health_registry.register(components::ENGINE).await;

    let logger = StructuredLogger::new(&config.instance);

    let mut builder = RoundCoordinatorBuilder::new()
        .servers(endpoints)
        .probe(Arc::new(TcpProbe::new()))
        .health(health_registry.clone())
        .logger(logger.clone())
        .config(config.round_config());
    if let Some(seed) = config.seed {
        builder = builder.random_source(SeededRandom::from_seed(seed));
    }
    let (coordinator, mut records) = builder.build().context("Invalid selector configuration")?;

    logger.log_startup(SELECTOR_VERSION, coordinator.servers().len());

    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        SelectorMetrics::new(),
        coordinator.report(),
    ));
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    // Round records are consumed here for logging only
    let record_logger = logger.clone();
    let records_handle = tokio::spawn(async move {
        while let Some(record) = records.recv().await {
            record_logger.log_round(&record);
        }
    });

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let mut coordinator_handle = tokio::spawn(coordinator.run(shutdown_rx));

    // Stop on SIGINT, or when the round limit is reached
    let (reason, rounds) = tokio::select! {
        joined = &mut coordinator_handle => {
            ("round limit reached", joined.context("Round coordinator failed")?)
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for shutdown signal")?;
            let _ = shutdown_tx.send(());
            // The in-flight round finishes before the coordinator stops
            let rounds = coordinator_handle.await.context("Round coordinator failed")?;
            ("SIGINT received", rounds)
        }
    };

    let _ = records_handle.await;
    logger.log_shutdown(reason, rounds);
    api_handle.abort();

    Ok(())
}
