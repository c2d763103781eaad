//! Bounded per-server metric history
//!
//! Each (server, metric kind) pair owns a FIFO window of the most recent
//! values. Windows only grow by appending; once at capacity the oldest value
//! is evicted. A failed probe appends nothing, so the window simply ages.

use crate::models::{MetricKind, MetricSample, ServerId};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Default number of values kept per window
pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

/// Sliding-window history for a fixed set of servers
#[derive(Debug, Clone)]
pub struct MetricStore {
    capacity: usize,
    windows: HashMap<(ServerId, MetricKind), VecDeque<f64>>,
}

impl MetricStore {
    /// Create an empty store with one window per server and metric kind
    pub fn new<'a>(servers: impl IntoIterator<Item = &'a ServerId>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut windows = HashMap::new();
        for server in servers {
            for kind in MetricKind::ALL {
                windows.insert((server.clone(), kind), VecDeque::with_capacity(capacity));
            }
        }
        Self { capacity, windows }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a value, evicting the oldest one when the window is full
    ///
    /// `None` means the probe produced nothing this round and is ignored.
    pub fn ingest(&mut self, server: &ServerId, kind: MetricKind, value: Option<f64>) {
        let Some(value) = value else {
            return;
        };

        let capacity = self.capacity;
        let window = self
            .windows
            .entry((server.clone(), kind))
            .or_insert_with(|| {
                debug!(server = %server, kind = kind.as_str(), "Creating window for unknown server");
                VecDeque::with_capacity(capacity)
            });

        while window.len() >= capacity {
            window.pop_front();
        }
        window.push_back(value);
    }

    /// Ingest every kind a sample reports
    pub fn ingest_sample(&mut self, server: &ServerId, sample: &MetricSample) {
        for (kind, value) in sample.reported() {
            self.ingest(server, kind, Some(value));
        }
    }

    /// Current window, oldest first; empty when nothing was recorded yet
    pub fn window(&self, server: &ServerId, kind: MetricKind) -> Vec<f64> {
        self.windows
            .get(&(server.clone(), kind))
            .map(|w| w.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Most recently recorded value
    pub fn latest(&self, server: &ServerId, kind: MetricKind) -> Option<f64> {
        self.windows
            .get(&(server.clone(), kind))
            .and_then(|w| w.back().copied())
    }

    pub fn len(&self, server: &ServerId, kind: MetricKind) -> usize {
        self.windows
            .get(&(server.clone(), kind))
            .map(VecDeque::len)
            .unwrap_or(0)
    }

    /// Total number of stored values across all windows
    pub fn total_values(&self) -> usize {
        self.windows.values().map(VecDeque::len).sum()
    }

    /// Drop every recorded value, keeping the configured windows
    pub fn clear(&mut self) {
        for window in self.windows.values_mut() {
            window.clear();
        }
    }
}
