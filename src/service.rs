//! Per-node wiring of the mastership arbiter, broadcast coordinator and
//! topology snapshot store.

use crate::config::{CoreConfig, ReplicationConfig};
use crate::event::ListenerId;
use crate::identity::{ConnectPoint, DeviceId, NodeId, ProviderId};
use crate::mastership::{MastershipArbiter, MastershipEvent, MastershipRole, RoleStore, RoleValue};
use crate::mastership::{ROLE_MAP_NAME, TERM_MAP_NAME};
use crate::replica::ReplicationFabric;
use crate::telemetry::MetricsRegistry;
use crate::topology::{
    pruning_for, BroadcastPointCoordinator, GraphDescription, Topology, TopologyBuilder,
    TopologyEvent, TopologyReason, TopologySnapshotStore, BROADCAST_MAP_NAME,
};
use crate::util::error::{MastershipError, ReplicationError};
use log::{info, warn};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::{Arc, Weak};

/// In-process transports shared by every node of one cluster.
#[derive(Debug, Clone)]
pub struct ClusterFabrics {
    pub roles: Arc<ReplicationFabric<DeviceId, RoleValue>>,
    pub terms: Arc<ReplicationFabric<DeviceId, u64>>,
    pub broadcast: Arc<ReplicationFabric<DeviceId, BTreeSet<ConnectPoint>>>,
}

impl ClusterFabrics {
    pub fn new(config: &ReplicationConfig) -> Self {
        Self {
            roles: ReplicationFabric::new(ROLE_MAP_NAME, config.delivery, config.anti_entropy_seed),
            terms: ReplicationFabric::new(TERM_MAP_NAME, config.delivery, config.anti_entropy_seed),
            broadcast: ReplicationFabric::new(
                BROADCAST_MAP_NAME,
                config.delivery,
                config.anti_entropy_seed,
            ),
        }
    }

    /// Flushes queued updates on every fabric; returns the number delivered.
    /// Terms flush before roles so a peer never sees a master without its term.
    pub fn deliver_pending(&self) -> usize {
        self.terms.deliver_pending() + self.roles.deliver_pending() + self.broadcast.deliver_pending()
    }

    /// Reconciles `node` with one random peer on every fabric.
    pub fn anti_entropy_round(&self, node: &NodeId) -> Result<usize, ReplicationError> {
        Ok(self.terms.anti_entropy_round(node)?
            + self.roles.anti_entropy_round(node)?
            + self.broadcast.anti_entropy_round(node)?)
    }
}

/// One controller node: identity, replicated maps, arbiter, coordinator and
/// snapshot store.
#[derive(Debug)]
pub struct ControllerCore {
    config: CoreConfig,
    provider_id: ProviderId,
    metrics: Arc<MetricsRegistry>,
    arbiter: Arc<MastershipArbiter>,
    topology: Arc<TopologySnapshotStore>,
    fabrics: Option<ClusterFabrics>,
    mastership_listener: Mutex<Option<ListenerId>>,
}

impl ControllerCore {
    /// Node without peers; its maps are not replicated.
    pub fn standalone(config: CoreConfig) -> Self {
        let metrics = Arc::new(MetricsRegistry::new(config.metrics_namespace.clone()));
        let store = Arc::new(RoleStore::new(config.node_id.clone()));
        let arbiter = Arc::new(MastershipArbiter::new(store, Arc::clone(&metrics)));
        let coordinator = Arc::new(BroadcastPointCoordinator::new(
            Arc::clone(&arbiter),
            pruning_for(config.broadcast.pruning),
            Arc::clone(&metrics),
        ));
        let provider_id = ProviderId::new(format!("core:{}", config.node_id));
        let topology = Arc::new(TopologySnapshotStore::new(
            provider_id.clone(),
            TopologyBuilder::new(config.topology.clone()),
            Some(coordinator),
            Arc::clone(&metrics),
        ));
        Self {
            config,
            provider_id,
            metrics,
            arbiter,
            topology,
            fabrics: None,
            mastership_listener: Mutex::new(None),
        }
    }

    /// Node whose role, term and broadcast replicas join `fabrics`.
    pub fn join(config: CoreConfig, fabrics: &ClusterFabrics) -> Result<Self, ReplicationError> {
        let mut core = Self::standalone(config);
        // Set first so a failed join still leaves the fabrics on drop.
        core.fabrics = Some(fabrics.clone());
        let store = core.arbiter.store();
        fabrics.roles.join(store.roles_map())?;
        fabrics.terms.join(store.terms_map())?;
        if let Some(coordinator) = core.topology.coordinator() {
            fabrics.broadcast.join(coordinator.points_map())?;
        }
        Ok(core)
    }

    pub fn node_id(&self) -> &NodeId {
        &self.config.node_id
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub fn arbiter(&self) -> &Arc<MastershipArbiter> {
        &self.arbiter
    }

    pub fn topology_store(&self) -> &Arc<TopologySnapshotStore> {
        &self.topology
    }

    pub fn is_running(&self) -> bool {
        self.mastership_listener.lock().is_some()
    }

    /// Subscribes the broadcast refresh to MASTER_CHANGED. Idempotent.
    pub fn start(&self) {
        let mut slot = self.mastership_listener.lock();
        if slot.is_some() {
            return;
        }
        let store: Weak<TopologySnapshotStore> = Arc::downgrade(&self.topology);
        let id = self.arbiter.add_listener(move |event: &MastershipEvent| {
            let Some(store) = store.upgrade() else {
                return;
            };
            let topology = store.current_topology();
            let is_root = topology
                .cluster_for(&event.device_id)
                .is_some_and(|cluster| cluster.root == event.device_id);
            if is_root {
                store.refresh_broadcast_points();
            }
        });
        *slot = Some(id);
        info!("event=core_started node={}", self.config.node_id);
    }

    /// Relinquishes every local role, withdraws published broadcast sets and
    /// unsubscribes. The replicas stay joined so peers observe the release.
    pub fn stop(&self) -> Vec<MastershipEvent> {
        let Some(id) = self.mastership_listener.lock().take() else {
            return Vec::new();
        };
        let events = self.arbiter.relinquish_all_roles();
        let refresh = self.topology.refresh_broadcast_points();
        self.arbiter.remove_listener(id);
        info!(
            "event=core_stopped node={} master_changes={} withdrawn={}",
            self.config.node_id,
            events.len(),
            refresh.withdrawn.len()
        );
        events
    }

    pub fn device_connected(&self, device: &DeviceId) -> Result<MastershipRole, MastershipError> {
        self.arbiter.request_role(device)
    }

    pub fn device_disconnected(
        &self,
        device: &DeviceId,
    ) -> Result<Option<MastershipEvent>, MastershipError> {
        let event = self.arbiter.relinquish_role(&self.config.node_id, device)?;
        if event.is_none() {
            // No MASTER_CHANGED is posted when nobody took over; withdraw directly.
            self.topology.refresh_broadcast_points();
        }
        Ok(event)
    }

    pub fn update_topology(
        &self,
        description: &GraphDescription,
        reasons: Vec<TopologyReason>,
    ) -> Option<TopologyEvent> {
        self.topology
            .update_topology(self.provider_id.clone(), description, reasons)
    }

    pub fn current_topology(&self) -> Arc<Topology> {
        self.topology.current_topology()
    }

    pub fn fabrics(&self) -> Option<&ClusterFabrics> {
        self.fabrics.as_ref()
    }
}

impl Drop for ControllerCore {
    fn drop(&mut self) {
        if let Some(id) = self.mastership_listener.get_mut().take() {
            warn!("event=core_dropped_running node={}", self.config.node_id);
            self.arbiter.remove_listener(id);
        }
        if let Some(fabrics) = &self.fabrics {
            let node = &self.config.node_id;
            for result in [
                fabrics.roles.leave(node),
                fabrics.terms.leave(node),
                fabrics.broadcast.leave(node),
            ] {
                if let Err(err) = result {
                    warn!("event=core_leave_failed node={} error={}", node, err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Link;

    fn did(id: &str) -> DeviceId {
        DeviceId::from(id)
    }

    fn ring(timestamp: i64) -> GraphDescription {
        let pairs = [("s1", 1, "s2", 1), ("s2", 2, "s3", 1), ("s3", 2, "s1", 2)];
        let links = pairs.into_iter().flat_map(|(s, sp, d, dp)| {
            let forward = Link::direct(ConnectPoint::new(s, sp), ConnectPoint::new(d, dp));
            [forward.reversed(), forward]
        });
        GraphDescription::new(timestamp, 0, ["s1", "s2", "s3"].map(did), links)
    }

    #[test]
    fn mastering_the_root_publishes_broadcast_points() {
        let core = ControllerCore::standalone(CoreConfig::new("c1"));
        core.start();
        core.update_topology(&ring(1), vec![TopologyReason::Resync]).unwrap();

        let coordinator = core.topology_store().coordinator().unwrap().clone();
        assert!(coordinator.published_roots().is_empty());

        assert_eq!(core.device_connected(&did("s1")).unwrap(), MastershipRole::Master);
        assert_eq!(coordinator.published_roots(), vec![did("s1")]);

        let events = core.stop();
        assert!(events.is_empty());
        assert!(coordinator.published_roots().is_empty());
        assert_eq!(core.arbiter().local_role(&did("s1")), MastershipRole::None);
        assert!(!core.is_running());
    }

    #[test]
    fn disconnect_withdraws_without_a_successor() {
        let core = ControllerCore::standalone(CoreConfig::new("c1"));
        core.start();
        core.update_topology(&ring(1), vec![]).unwrap();
        core.device_connected(&did("s1")).unwrap();
        assert!(core.device_disconnected(&did("s1")).unwrap().is_none());
        let coordinator = core.topology_store().coordinator().unwrap();
        assert!(coordinator.published_roots().is_empty());
        assert!(coordinator.points_map().is_empty());
    }
}
