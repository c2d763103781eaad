//! Read-only reporting surface
//!
//! The coordinator publishes every round into a [`ReportHandle`]; readers
//! (the HTTP API, tests) only query it. Per-server series are bounded.

use crate::models::{
    serialize_score, ForecastResult, RoundRecord, SelectionCount, ServerId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Default number of points kept per server series
pub const DEFAULT_SERIES_CAPACITY: usize = 500;

/// One round of raw observations for a server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub round: u64,
    pub rtt: Option<f64>,
    pub load: Option<f64>,
    pub health: Option<f64>,
    pub error_rate: Option<f64>,
    pub bandwidth: Option<f64>,
    pub chosen: bool,
}

/// Latest view of one server
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerSummary {
    pub server: ServerId,
    pub reachable: bool,
    pub forecast: ForecastResult,
    #[serde(serialize_with = "serialize_score")]
    pub score: f64,
    pub selections: u64,
}

/// Session bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionInfo {
    pub started_at: DateTime<Utc>,
    pub last_round_at: Option<DateTime<Utc>>,
    pub rounds: u64,
}

#[derive(Debug)]
struct SessionReport {
    servers: Vec<ServerId>,
    series_capacity: usize,
    started_at: DateTime<Utc>,
    last_round_at: Option<DateTime<Utc>>,
    rounds: u64,
    latest: Option<RoundRecord>,
    series: HashMap<ServerId, VecDeque<SeriesPoint>>,
}

impl SessionReport {
    fn new(servers: Vec<ServerId>, series_capacity: usize) -> Self {
        let series = servers
            .iter()
            .map(|id| (id.clone(), VecDeque::new()))
            .collect();
        Self {
            servers,
            series_capacity: series_capacity.max(1),
            started_at: Utc::now(),
            last_round_at: None,
            rounds: 0,
            latest: None,
            series,
        }
    }

    fn publish(&mut self, record: RoundRecord) {
        for server in &record.servers {
            let sample = server.sample.as_ref();
            let point = SeriesPoint {
                round: record.round,
                rtt: sample.map(|s| s.rtt_secs),
                load: sample.map(|s| s.load),
                health: sample.map(|s| s.health),
                error_rate: sample.map(|s| s.error_rate),
                bandwidth: sample.and_then(|s| s.bandwidth_mbps),
                chosen: server.server == record.chosen,
            };

            let series = self.series.entry(server.server.clone()).or_default();
            while series.len() >= self.series_capacity {
                series.pop_front();
            }
            series.push_back(point);
        }

        self.rounds += 1;
        self.last_round_at = Some(Utc::now());
        self.latest = Some(record);
    }
}

/// Cloneable handle to the session report
#[derive(Debug, Clone)]
pub struct ReportHandle {
    inner: Arc<RwLock<SessionReport>>,
}

impl ReportHandle {
    pub fn new(servers: Vec<ServerId>, series_capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(SessionReport::new(servers, series_capacity))),
        }
    }

    pub(crate) async fn publish(&self, record: RoundRecord) {
        self.inner.write().await.publish(record);
    }

    /// Discard all rounds and start a new session
    pub(crate) async fn reset(&self) {
        let mut report = self.inner.write().await;
        let servers = std::mem::take(&mut report.servers);
        let capacity = report.series_capacity;
        *report = SessionReport::new(servers, capacity);
    }

    pub async fn latest_round(&self) -> Option<RoundRecord> {
        self.inner.read().await.latest.clone()
    }

    pub async fn session(&self) -> SessionInfo {
        let report = self.inner.read().await;
        SessionInfo {
            started_at: report.started_at,
            last_round_at: report.last_round_at,
            rounds: report.rounds,
        }
    }

    /// Latest forecast, score and selection count per server, in order
    pub async fn servers(&self) -> Vec<ServerSummary> {
        let report = self.inner.read().await;
        let latest = report.latest.as_ref();

        report
            .servers
            .iter()
            .map(|id| {
                let round = latest.and_then(|r| r.server(id));
                let selections = latest
                    .and_then(|r| r.selection_counts.iter().find(|c| &c.server == id))
                    .map(|c| c.count)
                    .unwrap_or(0);
                ServerSummary {
                    server: id.clone(),
                    reachable: round.map(|r| r.reachable).unwrap_or(false),
                    forecast: round.map(|r| r.forecast.clone()).unwrap_or_default(),
                    score: round.map(|r| r.score).unwrap_or(f64::INFINITY),
                    selections,
                }
            })
            .collect()
    }

    /// Series for a server, oldest first; `None` for an unknown server
    pub async fn series(&self, server: &ServerId) -> Option<Vec<SeriesPoint>> {
        let report = self.inner.read().await;
        report
            .series
            .get(server)
            .map(|points| points.iter().cloned().collect())
    }

    pub async fn selection_counts(&self) -> Vec<SelectionCount> {
        let report = self.inner.read().await;
        match &report.latest {
            Some(record) => record.selection_counts.clone(),
            None => report
                .servers
                .iter()
                .map(|id| SelectionCount {
                    server: id.clone(),
                    count: 0,
                })
                .collect(),
        }
    }
}
