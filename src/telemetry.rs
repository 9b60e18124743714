//! In-process metrics for the arbiter and the snapshot store. Callers share
//! one registry behind an `Arc`; all recording methods take `&self`.

use parking_lot::Mutex;
use std::collections::HashMap;
use thiserror::Error;

pub const METRIC_MASTER_CHANGES: &str = "mastership.master_changes";
pub const METRIC_REMOTE_MASTER_CHANGES: &str = "mastership.remote_master_changes";
pub const METRIC_ROLE_REINFORCED: &str = "mastership.reinforced";
pub const METRIC_TOPOLOGY_ACCEPTED: &str = "topology.snapshots_accepted";
pub const METRIC_TOPOLOGY_STALE: &str = "topology.snapshots_stale";
pub const METRIC_TOPOLOGY_COMPUTE_US: &str = "topology.compute_us";
pub const METRIC_TOPOLOGY_CLUSTERS: &str = "topology.clusters";
pub const METRIC_BROADCAST_PUBLISHED: &str = "broadcast.sets_published";
pub const METRIC_BROADCAST_WITHDRAWN: &str = "broadcast.sets_withdrawn";

/// Upper bucket for topology compute-cost histograms, in microseconds.
pub const COMPUTE_COST_MAX_US: u64 = 10_000_000;

#[derive(Debug)]
pub struct MetricsRegistry {
    namespace: String,
    inner: Mutex<RegistryState>,
}

#[derive(Debug, Default)]
struct RegistryState {
    counters: HashMap<String, u64>,
    histograms: HashMap<String, Histogram>,
    gauges: HashMap<String, u64>,
}

#[derive(Debug, Clone)]
pub struct Histogram {
    buckets: Vec<u64>,
    counts: Vec<u64>,
}

impl MetricsRegistry {
    pub fn new(namespace: impl Into<String>) -> Self {
        let registry = Self {
            namespace: namespace.into(),
            inner: Mutex::new(RegistryState::default()),
        };
        registry.register_histogram(METRIC_TOPOLOGY_COMPUTE_US, COMPUTE_COST_MAX_US);
        registry
    }

    pub fn inc_counter(&self, name: &str, delta: u64) -> u64 {
        let key = self.qualify(name);
        let mut state = self.inner.lock();
        let counter = state.counters.entry(key).or_insert(0);
        *counter = counter.saturating_add(delta);
        *counter
    }

    pub fn counter(&self, name: &str) -> u64 {
        let key = self.qualify(name);
        self.inner.lock().counters.get(&key).copied().unwrap_or(0)
    }

    pub fn register_histogram(&self, name: &str, max_value: u64) {
        let key = self.qualify(name);
        self.inner
            .lock()
            .histograms
            .entry(key)
            .or_insert_with(|| Histogram::canonical(max_value));
    }

    pub fn observe_histogram(&self, name: &str, value: u64) -> Result<(), TelemetryError> {
        let key = self.qualify(name);
        let mut state = self.inner.lock();
        let histogram = state
            .histograms
            .get_mut(&key)
            .ok_or_else(|| TelemetryError::UnknownHistogram(key.clone()))?;
        histogram.observe(value);
        Ok(())
    }

    pub fn set_gauge(&self, name: &str, value: u64) {
        let key = self.qualify(name);
        self.inner.lock().gauges.insert(key, value);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let state = self.inner.lock();
        MetricsSnapshot {
            counters: state.counters.clone(),
            histograms: state
                .histograms
                .iter()
                .map(|(name, hist)| (name.clone(), hist.counts.clone()))
                .collect(),
            gauges: state.gauges.clone(),
        }
    }

    fn qualify(&self, name: &str) -> String {
        let namespace = if self.namespace.ends_with('.') {
            self.namespace.clone()
        } else {
            format!("{}.", self.namespace)
        };
        if name.starts_with(&namespace) {
            name.to_string()
        } else {
            format!("{}{}", namespace, name)
        }
    }
}

impl Histogram {
    pub fn canonical(max_value: u64) -> Self {
        let mut buckets = Vec::new();
        let mut current = 1u64;
        while current < max_value {
            buckets.push(current);
            current = (current as f64 * 1.5).ceil() as u64;
        }
        buckets.push(max_value);
        let counts = vec![0; buckets.len()];
        Self { buckets, counts }
    }

    pub fn observe(&mut self, value: u64) {
        if let Some(idx) = self.buckets.iter().position(|bucket| value <= *bucket) {
            self.counts[idx] = self.counts[idx].saturating_add(1);
        } else if let Some(last) = self.counts.last_mut() {
            *last = last.saturating_add(1);
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub counters: HashMap<String, u64>,
    pub histograms: HashMap<String, Vec<u64>>,
    pub gauges: HashMap<String, u64>,
}

impl MetricsSnapshot {
    pub fn histogram_total(&self, qualified: &str) -> u64 {
        self.histograms
            .get(qualified)
            .map(|counts| counts.iter().sum())
            .unwrap_or(0)
    }
}

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("unknown histogram {0}")]
    UnknownHistogram(String),
}
