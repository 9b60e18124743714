use super::broadcast::{BroadcastPointCoordinator, BroadcastRefresh};
use super::builder::{duration_micros, TopologyBuilder};
use super::model::{GraphDescription, TopologyEvent, TopologyReason};
use super::snapshot::{BroadcastPointSource, Topology};
use crate::event::{ListenerId, ListenerRegistry};
use crate::identity::ProviderId;
use crate::telemetry::{
    MetricsRegistry, METRIC_TOPOLOGY_ACCEPTED, METRIC_TOPOLOGY_CLUSTERS,
    METRIC_TOPOLOGY_COMPUTE_US, METRIC_TOPOLOGY_STALE,
};
use arc_swap::ArcSwap;
use log::{info, warn};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Holds the current topology snapshot.
///
/// Readers load the snapshot without blocking. Updates are serialized by an
/// internal lock; the TOPOLOGY_CHANGED event is posted after it is released.
pub struct TopologySnapshotStore {
    builder: TopologyBuilder,
    coordinator: Option<Arc<BroadcastPointCoordinator>>,
    current: ArcSwap<Topology>,
    update_lock: Mutex<()>,
    listeners: ListenerRegistry<TopologyEvent>,
    metrics: Arc<MetricsRegistry>,
}

impl TopologySnapshotStore {
    /// Starts from an empty snapshot owned by `provider_id`.
    pub fn new(
        provider_id: ProviderId,
        builder: TopologyBuilder,
        coordinator: Option<Arc<BroadcastPointCoordinator>>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        let empty = builder.empty(provider_id);
        Self {
            builder,
            coordinator,
            current: ArcSwap::from_pointee(empty),
            update_lock: Mutex::new(()),
            listeners: ListenerRegistry::new(),
            metrics,
        }
    }

    pub fn current_topology(&self) -> Arc<Topology> {
        self.current.load_full()
    }

    /// Whether `topology` is the snapshot currently held, by identity.
    pub fn is_latest(&self, topology: &Arc<Topology>) -> bool {
        Arc::ptr_eq(&*self.current.load(), topology)
    }

    pub fn coordinator(&self) -> Option<&Arc<BroadcastPointCoordinator>> {
        self.coordinator.as_ref()
    }

    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&TopologyEvent) + Send + Sync + 'static,
    {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Builds and installs a snapshot from `description` unless it is not
    /// newer than the current one. Returns the posted event.
    pub fn update_topology(
        &self,
        provider_id: ProviderId,
        description: &GraphDescription,
        reasons: Vec<TopologyReason>,
    ) -> Option<TopologyEvent> {
        let event = {
            let _guard = self.update_lock.lock();
            let current = self.current.load();
            if description.timestamp <= current.time() {
                self.metrics.inc_counter(METRIC_TOPOLOGY_STALE, 1);
                warn!(
                    "event=topology_update_stale provider={} time={} current={}",
                    provider_id,
                    description.timestamp,
                    current.time()
                );
                return None;
            }

            let source = self
                .coordinator
                .as_ref()
                .map(|coordinator| Arc::clone(coordinator) as Arc<dyn BroadcastPointSource>);
            let topology = Arc::new(self.builder.build(provider_id, description, source));
            if let Some(coordinator) = &self.coordinator {
                coordinator.refresh(&topology);
            }
            self.current.store(Arc::clone(&topology));

            self.metrics.inc_counter(METRIC_TOPOLOGY_ACCEPTED, 1);
            self.metrics
                .set_gauge(METRIC_TOPOLOGY_CLUSTERS, topology.cluster_count() as u64);
            if let Err(err) = self.metrics.observe_histogram(
                METRIC_TOPOLOGY_COMPUTE_US,
                duration_micros(topology.compute_cost()),
            ) {
                warn!("event=topology_metrics_failed error={}", err);
            }
            info!(
                "event=topology_changed provider={} time={} devices={} links={} clusters={} reasons={}",
                topology.provider_id(),
                topology.time(),
                topology.device_count(),
                topology.link_count(),
                topology.cluster_count(),
                reasons.len()
            );
            TopologyEvent { topology, reasons }
        };
        self.listeners.post(&event);
        Some(event)
    }

    /// Re-runs the coordinator against the current snapshot.
    pub fn refresh_broadcast_points(&self) -> BroadcastRefresh {
        let Some(coordinator) = &self.coordinator else {
            return BroadcastRefresh::default();
        };
        let _guard = self.update_lock.lock();
        coordinator.refresh(&self.current.load())
    }
}

impl fmt::Debug for TopologySnapshotStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopologySnapshotStore")
            .field("current", &*self.current.load())
            .field("listeners", &self.listeners)
            .finish()
    }
}
