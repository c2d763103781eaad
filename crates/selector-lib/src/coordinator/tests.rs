//! Scenario tests for decision rounds
//!
//! Deterministic scenarios feed probe outcomes straight into
//! `complete_round`; the async tests drive real rounds through scripted
//! probes and loopback TCP servers.

use super::*;
use crate::error::{ConfigError, ProbeError};
use crate::health::{components, ComponentStatus, HealthRegistry};
use crate::models::{MetricKind, MetricSample, SelectionBranch, ServerEndpoint, ServerId};
use crate::probe::{async_trait, Probe, ProbeResponse, TcpProbe};
use crate::selection::SequenceRandom;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

/// Scripted behavior for one server
#[derive(Clone)]
enum Script {
    Respond { load: f64, delay: Duration },
    Refuse,
    Hang,
}

/// Probe that answers from a per-server script
struct ScriptedProbe {
    scripts: HashMap<ServerId, Script>,
    calls: AtomicUsize,
}

impl ScriptedProbe {
    fn new(scripts: impl IntoIterator<Item = (&'static str, Script)>) -> Self {
        Self {
            scripts: scripts
                .into_iter()
                .map(|(id, script)| (ServerId::from(id), script))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    async fn probe(&self, endpoint: &ServerEndpoint) -> Result<ProbeResponse, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.scripts.get(&endpoint.id).cloned() {
            Some(Script::Respond { load, delay }) => {
                tokio::time::sleep(delay).await;
                Ok(ProbeResponse {
                    load,
                    health_score: 80.0,
                    total_errors: 0,
                    total_handled: 10,
                    bandwidth_mbps: None,
                })
            }
            Some(Script::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ProbeError::EmptyResponse)
            }
            Some(Script::Refuse) | None => Err(ProbeError::Connect(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "refused",
            ))),
        }
    }
}

fn endpoints(ids: &[&str]) -> Vec<ServerEndpoint> {
    ids.iter()
        .enumerate()
        .map(|(i, id)| ServerEndpoint::new(*id, "127.0.0.1", 9000 + i as u16))
        .collect()
}

fn sample(rtt_secs: f64) -> MetricSample {
    MetricSample {
        rtt_secs,
        load: 40.0,
        health: 70.0,
        error_rate: 0.01,
        bandwidth_mbps: None,
    }
}

fn refused() -> ProbeError {
    ProbeError::Connect(std::io::Error::new(
        std::io::ErrorKind::ConnectionRefused,
        "refused",
    ))
}

/// Coordinator with exploration disabled
fn deterministic(
    ids: &[&str],
    probe: Arc<dyn Probe>,
) -> (RoundCoordinator, tokio::sync::mpsc::Receiver<crate::models::RoundRecord>) {
    RoundCoordinatorBuilder::new()
        .servers(endpoints(ids))
        .probe(probe)
        .epsilon(0.0)
        .random_source(SequenceRandom::new([0.0]))
        .build()
        .unwrap()
}

fn unused_probe() -> Arc<dyn Probe> {
    Arc::new(ScriptedProbe::new(Vec::new()))
}

#[test]
fn test_lowest_cost_server_selected_and_unscored_is_infinite() {
    let (mut coordinator, _rx) = deterministic(&["A", "B", "C"], unused_probe());

    let mut record = None;
    for _ in 0..3 {
        record = Some(coordinator.complete_round(vec![
            Ok(sample(0.05)),
            Ok(sample(0.20)),
            Err(refused()),
        ]));
    }
    let record = record.unwrap();

    let a = ServerId::from("A");
    assert_eq!(
        coordinator.store().window(&a, MetricKind::Rtt),
        vec![0.05, 0.05, 0.05]
    );

    let c = record.server(&ServerId::from("C")).unwrap();
    assert!(c.score.is_infinite());
    assert!(!c.reachable);
    assert_eq!(c.failure.as_deref(), Some("connect"));
    assert_eq!(c.forecast.rtt, None);

    let score_a = record.server(&a).unwrap().score;
    let score_b = record.server(&ServerId::from("B")).unwrap().score;
    assert!(score_a < score_b);
    assert!((score_b - score_a - 0.15).abs() < 1e-9);

    assert!(record.viable);
    assert_eq!(record.round, 2);
}

#[test]
fn test_anti_stickiness_breaks_tie_against_previous_choice() {
    let (mut coordinator, _rx) = deterministic(&["A", "B", "C"], unused_probe());
    let outcomes = || vec![Ok(sample(0.1)), Ok(sample(0.1)), Ok(sample(0.9))];

    let first = coordinator.complete_round(outcomes());
    assert_eq!(first.chosen.as_str(), "A");

    let second = coordinator.complete_round(outcomes());
    let a = second.server(&ServerId::from("A")).unwrap().score;
    let b = second.server(&ServerId::from("B")).unwrap().score;
    assert_eq!(a, b);
    assert_eq!(second.chosen.as_str(), "B");
    assert_eq!(second.branch, SelectionBranch::Exploit);
}

#[test]
fn test_cold_start_with_every_probe_failing() {
    let (mut coordinator, _rx) = deterministic(&["A", "B", "C"], unused_probe());

    for round in 0..3 {
        let record = coordinator.complete_round(vec![
            Err(refused()),
            Err(ProbeError::Timeout(Duration::from_millis(600))),
            Err(ProbeError::EmptyResponse),
        ]);

        assert_eq!(record.round, round);
        assert_eq!(record.chosen.as_str(), "A");
        assert!(!record.viable);
        assert_eq!(record.reachable_count(), 0);
        assert!(record.servers.iter().all(|s| s.score.is_infinite()));
    }

    assert_eq!(coordinator.store().total_values(), 0);
    let counts = coordinator.selection_counts();
    assert_eq!(counts[0].count, 3);
    assert_eq!(counts[1].count, 0);
}

#[test]
fn test_missing_outcomes_count_as_failures() {
    let (mut coordinator, _rx) = deterministic(&["A", "B"], unused_probe());

    let record = coordinator.complete_round(vec![Ok(sample(0.05))]);
    let b = record.server(&ServerId::from("B")).unwrap();
    assert!(!b.reachable);
    assert_eq!(b.failure.as_deref(), Some("aborted"));
}

#[test]
fn test_selection_counts_accumulate() {
    let (mut coordinator, _rx) = deterministic(&["A", "B"], unused_probe());

    for _ in 0..4 {
        coordinator.complete_round(vec![Ok(sample(0.05)), Ok(sample(0.50))]);
    }

    let record = coordinator.complete_round(vec![Ok(sample(0.05)), Ok(sample(0.50))]);
    let total: u64 = record.selection_counts.iter().map(|c| c.count).sum();
    assert_eq!(total, 5);
    assert_eq!(record.selection_counts[0].count, 5);
}

#[test]
fn test_build_rejects_invalid_configuration() {
    let empty = RoundCoordinatorBuilder::new().probe(unused_probe()).build();
    assert!(matches!(empty, Err(ConfigError::EmptyServerSet)));

    let duplicate = RoundCoordinatorBuilder::new()
        .servers(endpoints(&["A", "A"]))
        .probe(unused_probe())
        .build();
    assert!(matches!(duplicate, Err(ConfigError::DuplicateServer(_))));

    let no_probe = RoundCoordinatorBuilder::new()
        .servers(endpoints(&["A"]))
        .build();
    assert!(matches!(no_probe, Err(ConfigError::Missing("probe"))));

    let zero_capacity = RoundCoordinatorBuilder::new()
        .servers(endpoints(&["A"]))
        .probe(unused_probe())
        .config(RoundConfig {
            history_capacity: 0,
            ..Default::default()
        })
        .build();
    assert!(matches!(zero_capacity, Err(ConfigError::ZeroCapacity)));

    let bad_epsilon = RoundCoordinatorBuilder::new()
        .servers(endpoints(&["A"]))
        .probe(unused_probe())
        .epsilon(1.2)
        .build();
    assert!(matches!(bad_epsilon, Err(ConfigError::InvalidEpsilon(_))));
}

#[tokio::test]
async fn test_results_independent_of_completion_order() {
    // Later servers answer first
    let probe = Arc::new(ScriptedProbe::new([
        ("A", Script::Respond { load: 10.0, delay: Duration::from_millis(60) }),
        ("B", Script::Respond { load: 20.0, delay: Duration::from_millis(30) }),
        ("C", Script::Respond { load: 30.0, delay: Duration::ZERO }),
    ]));
    let (mut coordinator, _rx) = deterministic(&["A", "B", "C"], probe.clone());

    let record = coordinator.run_round().await;

    let ids: Vec<&str> = record.servers.iter().map(|s| s.server.as_str()).collect();
    assert_eq!(ids, vec!["A", "B", "C"]);
    let loads: Vec<Option<f64>> = record
        .servers
        .iter()
        .map(|s| s.sample.as_ref().map(|x| x.load))
        .collect();
    assert_eq!(loads, vec![Some(10.0), Some(20.0), Some(30.0)]);
    assert_eq!(probe.calls.load(Ordering::SeqCst), 3);

    // Measured RTT covers the scripted delay
    let rtt_a = record.servers[0].sample.as_ref().unwrap().rtt_secs;
    assert!(rtt_a >= 0.06);
}

#[tokio::test]
async fn test_slow_server_times_out_without_stalling_round() {
    let probe = Arc::new(ScriptedProbe::new([
        ("A", Script::Hang),
        ("B", Script::Respond { load: 50.0, delay: Duration::ZERO }),
    ]));
    let (mut coordinator, _rx) = RoundCoordinatorBuilder::new()
        .servers(endpoints(&["A", "B"]))
        .probe(probe)
        .probe_timeout(Duration::from_millis(100))
        .epsilon(0.0)
        .build()
        .unwrap();

    let started = std::time::Instant::now();
    let record = coordinator.run_round().await;
    assert!(started.elapsed() < Duration::from_secs(2));

    let a = &record.servers[0];
    assert_eq!(a.failure.as_deref(), Some("timeout"));
    assert_eq!(record.chosen.as_str(), "B");
    assert!(record.viable);
}

#[tokio::test]
async fn test_round_publishes_to_report_channel_and_health() {
    let probe = Arc::new(ScriptedProbe::new([
        ("A", Script::Respond { load: 25.0, delay: Duration::ZERO }),
        ("B", Script::Refuse),
    ]));
    let health = HealthRegistry::new();
    let (mut coordinator, mut rx) = RoundCoordinatorBuilder::new()
        .servers(endpoints(&["A", "B"]))
        .probe(probe)
        .health(health.clone())
        .epsilon(0.0)
        .build()
        .unwrap();
    let report = coordinator.report();

    let record = coordinator.run_round().await;

    let received = rx.recv().await.unwrap();
    assert_eq!(received, record);
    assert_eq!(report.latest_round().await, Some(record));
    assert_eq!(report.series(&ServerId::from("A")).await.unwrap().len(), 1);

    let status = health.health().await;
    assert_eq!(
        status.components[components::PROBER].status,
        ComponentStatus::Degraded
    );
    assert_eq!(
        status.components[components::ENGINE].status,
        ComponentStatus::Healthy
    );
    assert!(health.readiness().await.ready);
}

#[tokio::test]
async fn test_reset_starts_a_fresh_session() {
    let probe = Arc::new(ScriptedProbe::new([
        ("A", Script::Respond { load: 25.0, delay: Duration::ZERO }),
    ]));
    let (mut coordinator, _rx) = deterministic(&["A"], probe);
    let report = coordinator.report();

    coordinator.run_round().await;
    coordinator.run_round().await;
    coordinator.reset().await;

    assert_eq!(coordinator.next_round(), 0);
    assert_eq!(coordinator.store().total_values(), 0);
    assert_eq!(coordinator.selection_counts()[0].count, 0);
    assert!(report.latest_round().await.is_none());

    let record = coordinator.run_round().await;
    assert_eq!(record.round, 0);
    assert_eq!(record.selection_counts[0].count, 1);
}

#[tokio::test]
async fn test_run_stops_at_round_limit() {
    let probe = Arc::new(ScriptedProbe::new([
        ("A", Script::Respond { load: 25.0, delay: Duration::ZERO }),
    ]));
    let (coordinator, mut rx) = RoundCoordinatorBuilder::new()
        .servers(endpoints(&["A"]))
        .probe(probe)
        .round_interval(Duration::from_millis(5))
        .max_rounds(3)
        .build()
        .unwrap();
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let rounds = coordinator.run(shutdown_rx).await;
    assert_eq!(rounds, 3);

    let mut seen = Vec::new();
    while let Ok(record) = rx.try_recv() {
        seen.push(record.round);
    }
    assert_eq!(seen, vec![0, 1, 2]);
}

#[tokio::test]
async fn test_dropped_shutdown_sender_runs_to_round_limit() {
    let probe = Arc::new(ScriptedProbe::new([
        ("A", Script::Respond { load: 25.0, delay: Duration::ZERO }),
    ]));
    let (coordinator, mut rx) = RoundCoordinatorBuilder::new()
        .servers(endpoints(&["A"]))
        .probe(probe)
        .round_interval(Duration::from_millis(5))
        .max_rounds(5)
        .build()
        .unwrap();
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    drop(shutdown_tx);

    let rounds = tokio::time::timeout(Duration::from_secs(5), coordinator.run(shutdown_rx))
        .await
        .unwrap();
    assert_eq!(rounds, 5);

    let mut seen = 0;
    while rx.try_recv().is_ok() {
        seen += 1;
    }
    assert_eq!(seen, 5);
}

#[tokio::test]
async fn test_shutdown_completes_in_flight_round() {
    let probe = Arc::new(ScriptedProbe::new([
        ("A", Script::Respond { load: 25.0, delay: Duration::from_millis(50) }),
    ]));
    let (coordinator, mut rx) = RoundCoordinatorBuilder::new()
        .servers(endpoints(&["A"]))
        .probe(probe)
        .round_interval(Duration::from_secs(60))
        .build()
        .unwrap();
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let handle = tokio::spawn(coordinator.run(shutdown_rx));
    // Raised while the first probe is still in flight
    tokio::time::sleep(Duration::from_millis(10)).await;
    shutdown_tx.send(()).unwrap();

    let rounds = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(rounds, 1);

    let record = rx.recv().await.unwrap();
    assert!(record.servers[0].reachable);
}

/// Loopback server answering every connection with `body`
async fn spawn_backend(body: &'static str) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut request = [0u8; 16];
                let _ = socket.read(&mut request).await;
                let _ = socket.write_all(body.as_bytes()).await;
            });
        }
    });
    port
}

#[tokio::test]
async fn test_rounds_over_tcp() {
    let fast = spawn_backend(r#"{"load": 10, "health_score": 95, "total_errors": 0, "total_handled": 50}"#).await;
    let busy = spawn_backend(r#"{"load": 90, "health_score": 20, "total_errors": 10, "total_handled": 50}"#).await;
    let closed = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };

    let (mut coordinator, _rx) = RoundCoordinatorBuilder::new()
        .server(ServerEndpoint::new(fast, "127.0.0.1", fast))
        .server(ServerEndpoint::new(busy, "127.0.0.1", busy))
        .server(ServerEndpoint::new(closed, "127.0.0.1", closed))
        .probe(Arc::new(TcpProbe::new()))
        .epsilon(0.0)
        .build()
        .unwrap();

    let mut last = None;
    for _ in 0..3 {
        last = Some(coordinator.run_round().await);
    }
    let record = last.unwrap();

    assert_eq!(record.chosen, ServerId::from(fast));
    assert_eq!(record.reachable_count(), 2);
    let busy_round = record.server(&ServerId::from(busy)).unwrap();
    assert!((busy_round.sample.as_ref().unwrap().error_rate - 0.2).abs() < 1e-12);
    assert!(record.server(&ServerId::from(closed)).unwrap().score.is_infinite());
}
