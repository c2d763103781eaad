//! Round coordinator and its builder

use super::RoundConfig;
use crate::error::{ConfigError, ProbeError};
use crate::forecast::Forecaster;
use crate::health::HealthRegistry;
use crate::models::{
    MetricSample, RoundRecord, SelectionCount, ServerEndpoint, ServerId, ServerRound,
};
use crate::observability::{SelectorMetrics, StructuredLogger};
use crate::probe::Probe;
use crate::report::ReportHandle;
use crate::scoring::Scorer;
use crate::selection::{RandomSource, SeededRandom, Selection, SelectionPolicy};
use crate::store::MetricStore;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info};

type ProbeOutcome = Result<MetricSample, ProbeError>;

/// Owns the session state and runs decision rounds one at a time
pub struct RoundCoordinator {
    servers: Vec<ServerEndpoint>,
    probe: Arc<dyn Probe>,
    config: RoundConfig,
    store: MetricStore,
    forecaster: Forecaster,
    scorer: Scorer,
    policy: SelectionPolicy,
    rng: Box<dyn RandomSource>,
    /// Selection counts aligned with `servers`
    selection_counts: Vec<u64>,
    next_round: u64,
    report: ReportHandle,
    health: Option<HealthRegistry>,
    metrics: SelectorMetrics,
    logger: StructuredLogger,
    records_tx: mpsc::Sender<RoundRecord>,
}

impl RoundCoordinator {
    fn new(
        servers: Vec<ServerEndpoint>,
        probe: Arc<dyn Probe>,
        rng: Box<dyn RandomSource>,
        health: Option<HealthRegistry>,
        logger: StructuredLogger,
        config: RoundConfig,
    ) -> (Self, mpsc::Receiver<RoundRecord>) {
        let (records_tx, records_rx) = mpsc::channel(config.channel_buffer.max(1));
        let ids: Vec<ServerId> = servers.iter().map(|s| s.id.clone()).collect();

        let coordinator = Self {
            store: MetricStore::new(&ids, config.history_capacity),
            forecaster: Forecaster::with_config(config.forecast_config()),
            scorer: Scorer::with_config(config.scoring_config()),
            policy: SelectionPolicy::new(config.selection_config()),
            selection_counts: vec![0; servers.len()],
            next_round: 0,
            report: ReportHandle::new(ids, config.series_capacity),
            metrics: SelectorMetrics::new(),
            servers,
            probe,
            config,
            rng,
            health,
            logger,
            records_tx,
        };

        (coordinator, records_rx)
    }

    pub fn servers(&self) -> &[ServerEndpoint] {
        &self.servers
    }

    pub fn config(&self) -> &RoundConfig {
        &self.config
    }

    pub fn store(&self) -> &MetricStore {
        &self.store
    }

    /// Index the next round will carry
    pub fn next_round(&self) -> u64 {
        self.next_round
    }

    /// Read-only handle for reporting consumers
    pub fn report(&self) -> ReportHandle {
        self.report.clone()
    }

    pub fn selection_counts(&self) -> Vec<SelectionCount> {
        self.servers
            .iter()
            .zip(&self.selection_counts)
            .map(|(endpoint, count)| SelectionCount {
                server: endpoint.id.clone(),
                count: *count,
            })
            .collect()
    }

    /// Run rounds until shutdown or the round limit
    ///
    /// Shutdown is only observed between rounds; an in-flight round always
    /// completes and is published. Returns the number of rounds run.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> u64 {
        info!(
            servers = self.servers.len(),
            interval_ms = self.config.round_interval.as_millis() as u64,
            max_rounds = ?self.config.max_rounds,
            "Starting round coordinator"
        );

        let mut rounds = 0u64;
        // A dropped sender closes the channel without asking for a stop
        let mut shutdown_open = true;
        while !self.limit_reached() {
            self.run_round().await;
            rounds += 1;

            if self.limit_reached() {
                info!(rounds, "Round limit reached");
                break;
            }

            let pause = tokio::time::sleep(self.config.round_interval);
            tokio::pin!(pause);
            loop {
                tokio::select! {
                    _ = &mut pause => break,
                    signal = shutdown.recv(), if shutdown_open => match signal {
                        Ok(()) | Err(RecvError::Lagged(_)) => {
                            info!(rounds, "Shutting down round coordinator");
                            return rounds;
                        }
                        Err(RecvError::Closed) => {
                            debug!("Shutdown channel closed, running until the round limit");
                            shutdown_open = false;
                        }
                    },
                }
            }
        }

        rounds
    }

    fn limit_reached(&self) -> bool {
        self.config
            .max_rounds
            .map(|max| self.next_round >= max)
            .unwrap_or(false)
    }

    /// Probe every server, then complete and publish the round
    pub async fn run_round(&mut self) -> RoundRecord {
        let started_at = Utc::now();
        let started = Instant::now();

        let outcomes = self.probe_all().await;
        let record = self.finish_round(outcomes, started_at, started);
        self.publish(&record).await;
        record
    }

    /// Probe all servers concurrently, returning outcomes in server order
    async fn probe_all(&self) -> Vec<ProbeOutcome> {
        let timeout = self.config.probe_timeout;
        let mut tasks = JoinSet::new();

        for (idx, endpoint) in self.servers.iter().cloned().enumerate() {
            let probe = Arc::clone(&self.probe);
            tasks.spawn(async move {
                let started = Instant::now();
                let outcome = match tokio::time::timeout(timeout, probe.probe(&endpoint)).await {
                    Ok(Ok(response)) => response.into_sample(started.elapsed()),
                    Ok(Err(e)) => Err(e),
                    Err(_) => Err(ProbeError::Timeout(timeout)),
                };
                (idx, outcome)
            });
        }

        let mut slots: Vec<Option<ProbeOutcome>> = self.servers.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, outcome)) => slots[idx] = Some(outcome),
                Err(e) => debug!(error = %e, "Probe task did not complete"),
            }
        }

        slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| Err(ProbeError::Aborted("probe task did not complete".into())))
            })
            .collect()
    }

    /// Complete a round from already gathered probe outcomes
    ///
    /// `outcomes` are matched to servers by position; missing entries count
    /// as failed probes. Nothing is published to the report or the channel.
    pub fn complete_round(&mut self, outcomes: Vec<ProbeOutcome>) -> RoundRecord {
        self.finish_round(outcomes, Utc::now(), Instant::now())
    }

    fn finish_round(
        &mut self,
        outcomes: Vec<ProbeOutcome>,
        started_at: DateTime<Utc>,
        started: Instant,
    ) -> RoundRecord {
        let round = self.next_round;
        let mut outcomes = outcomes.into_iter();

        // Ingest strictly in configuration order
        let mut observed = Vec::with_capacity(self.servers.len());
        for endpoint in &self.servers {
            let outcome = outcomes
                .next()
                .unwrap_or_else(|| Err(ProbeError::Aborted("no probe outcome".into())));
            match outcome {
                Ok(sample) => {
                    self.metrics.observe_probe_latency(&endpoint.id, sample.rtt_secs);
                    self.store.ingest_sample(&endpoint.id, &sample);
                    observed.push((Some(sample), None));
                }
                Err(e) => {
                    self.metrics.inc_probe_failure(&endpoint.id, &e);
                    self.logger.log_probe_failure(&endpoint.id, &e);
                    observed.push((None, Some(e.reason().to_string())));
                }
            }
        }

        let mut servers = Vec::with_capacity(self.servers.len());
        for (endpoint, (sample, failure)) in self.servers.iter().zip(observed) {
            let forecast = self.forecaster.forecast(&self.store, &endpoint.id);
            let score = self.scorer.score(&forecast);
            servers.push(ServerRound {
                server: endpoint.id.clone(),
                reachable: sample.is_some(),
                failure,
                sample,
                forecast,
                score,
            });
        }

        let scores: Vec<(ServerId, f64)> = servers
            .iter()
            .map(|s| (s.server.clone(), s.score))
            .collect();
        // The builder rejects an empty server set, so `choose` always picks
        let selection = self
            .policy
            .choose(&scores, self.rng.as_mut())
            .unwrap_or_else(|| Selection::fallback(scores[0].0.clone()));

        if let Some(idx) = self.servers.iter().position(|s| s.id == selection.server) {
            self.selection_counts[idx] += 1;
        }
        self.next_round += 1;

        RoundRecord {
            round,
            started_at: started_at.timestamp_millis(),
            duration_ms: started.elapsed().as_millis() as u64,
            servers,
            viable: selection.is_viable(),
            chosen: selection.server,
            branch: selection.branch,
            selection_counts: self.selection_counts(),
        }
    }

    async fn publish(&self, record: &RoundRecord) {
        self.metrics.record_round(record);

        if let Some(health) = &self.health {
            health
                .record_round(record.reachable_count(), record.servers.len(), record.viable)
                .await;
        }

        self.report.publish(record.clone()).await;

        if self.records_tx.send(record.clone()).await.is_err() {
            debug!(round = record.round, "Record receiver dropped");
        }
    }

    /// Discard all history, counters and the previous choice
    ///
    /// The next round is round 0 of a fresh session.
    pub async fn reset(&mut self) {
        self.store.clear();
        self.policy.reset();
        self.selection_counts.iter_mut().for_each(|c| *c = 0);
        self.next_round = 0;
        self.report.reset().await;
        info!("Session reset");
    }
}

/// Builder for the round coordinator
pub struct RoundCoordinatorBuilder {
    servers: Vec<ServerEndpoint>,
    probe: Option<Arc<dyn Probe>>,
    rng: Option<Box<dyn RandomSource>>,
    health: Option<HealthRegistry>,
    logger: Option<StructuredLogger>,
    config: RoundConfig,
}

impl RoundCoordinatorBuilder {
    pub fn new() -> Self {
        Self {
            servers: Vec::new(),
            probe: None,
            rng: None,
            health: None,
            logger: None,
            config: RoundConfig::default(),
        }
    }

    pub fn server(mut self, endpoint: ServerEndpoint) -> Self {
        self.servers.push(endpoint);
        self
    }

    pub fn servers(mut self, endpoints: impl IntoIterator<Item = ServerEndpoint>) -> Self {
        self.servers.extend(endpoints);
        self
    }

    pub fn probe(mut self, probe: Arc<dyn Probe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Random source for exploration (default: seeded from OS entropy)
    pub fn random_source(mut self, rng: impl RandomSource + 'static) -> Self {
        self.rng = Some(Box::new(rng));
        self
    }

    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn config(mut self, config: RoundConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_rounds(mut self, rounds: u64) -> Self {
        self.config.max_rounds = Some(rounds);
        self
    }

    pub fn round_interval(mut self, interval: std::time::Duration) -> Self {
        self.config.round_interval = interval;
        self
    }

    pub fn probe_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.config.probe_timeout = timeout;
        self
    }

    pub fn epsilon(mut self, epsilon: f64) -> Self {
        self.config.epsilon = epsilon;
        self
    }

    /// Validate the configuration and build the coordinator
    pub fn build(self) -> Result<(RoundCoordinator, mpsc::Receiver<RoundRecord>), ConfigError> {
        if self.servers.is_empty() {
            return Err(ConfigError::EmptyServerSet);
        }
        let mut seen = HashSet::new();
        for endpoint in &self.servers {
            if !seen.insert(&endpoint.id) {
                return Err(ConfigError::DuplicateServer(endpoint.id.clone()));
            }
        }
        self.config.validate()?;

        let probe = self.probe.ok_or(ConfigError::Missing("probe"))?;
        let rng = self
            .rng
            .unwrap_or_else(|| Box::new(SeededRandom::from_entropy()));
        let logger = self
            .logger
            .unwrap_or_else(|| StructuredLogger::new("server-selector"));

        Ok(RoundCoordinator::new(
            self.servers,
            probe,
            rng,
            self.health,
            logger,
            self.config,
        ))
    }
}

impl Default for RoundCoordinatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
