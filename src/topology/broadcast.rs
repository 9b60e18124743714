//! Broadcast-eligible connect points per cluster, published by the node
//! mastering the cluster root.

use super::model::TopologyCluster;
use super::snapshot::{BroadcastPointSource, Topology};
use crate::config::PruningKind;
use crate::identity::{ConnectPoint, DeviceId, NodeId};
use crate::mastership::MastershipArbiter;
use crate::replica::EventuallyConsistentMap;
use crate::telemetry::{MetricsRegistry, METRIC_BROADCAST_PUBLISHED, METRIC_BROADCAST_WITHDRAWN};
use log::{debug, info};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

pub const BROADCAST_MAP_NAME: &str = "broadcast-points";

pub type BroadcastPointMap = EventuallyConsistentMap<DeviceId, BTreeSet<ConnectPoint>>;

/// Chooses which infrastructure points of a cluster may carry floods.
pub trait BroadcastPruning: Send + Sync {
    fn name(&self) -> &'static str;

    fn broadcast_set(&self, topology: &Topology, cluster: &TopologyCluster)
        -> BTreeSet<ConnectPoint>;
}

/// Every endpoint of every cluster link; no pruning.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullClusterPruning;

impl BroadcastPruning for FullClusterPruning {
    fn name(&self) -> &'static str {
        "full_cluster"
    }

    fn broadcast_set(
        &self,
        topology: &Topology,
        cluster: &TopologyCluster,
    ) -> BTreeSet<ConnectPoint> {
        topology
            .cluster_links(cluster.id)
            .iter()
            .flat_map(|link| [link.src.clone(), link.dst.clone()])
            .collect()
    }
}

/// Endpoints of the hop-count shortest-path tree rooted at the cluster root.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpanningTreePruning;

impl BroadcastPruning for SpanningTreePruning {
    fn name(&self) -> &'static str {
        "spanning_tree"
    }

    fn broadcast_set(
        &self,
        topology: &Topology,
        cluster: &TopologyCluster,
    ) -> BTreeSet<ConnectPoint> {
        topology.spanning_tree_points(cluster)
    }
}

pub fn pruning_for(kind: PruningKind) -> Box<dyn BroadcastPruning> {
    match kind {
        PruningKind::FullCluster => Box::new(FullClusterPruning),
        PruningKind::SpanningTree => Box::new(SpanningTreePruning),
    }
}

/// What one refresh changed in the replicated map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastRefresh {
    pub published: Vec<DeviceId>,
    pub withdrawn: Vec<DeviceId>,
    pub unchanged: usize,
}

impl BroadcastRefresh {
    pub fn is_noop(&self) -> bool {
        self.published.is_empty() && self.withdrawn.is_empty()
    }
}

pub struct BroadcastPointCoordinator {
    local: NodeId,
    arbiter: Arc<MastershipArbiter>,
    points: Arc<BroadcastPointMap>,
    pruning: Box<dyn BroadcastPruning>,
    published: Mutex<BTreeSet<DeviceId>>,
    metrics: Arc<MetricsRegistry>,
}

impl BroadcastPointCoordinator {
    pub fn new(
        arbiter: Arc<MastershipArbiter>,
        pruning: Box<dyn BroadcastPruning>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        let local = arbiter.local_node().clone();
        Self {
            points: Arc::new(EventuallyConsistentMap::new(
                BROADCAST_MAP_NAME,
                local.clone(),
            )),
            local,
            arbiter,
            pruning,
            published: Mutex::new(BTreeSet::new()),
            metrics,
        }
    }

    /// Broadcast replica, for joining a replication fabric.
    pub fn points_map(&self) -> &Arc<BroadcastPointMap> {
        &self.points
    }

    pub fn pruning(&self) -> &dyn BroadcastPruning {
        self.pruning.as_ref()
    }

    /// Roots this node currently publishes for.
    pub fn published_roots(&self) -> Vec<DeviceId> {
        self.published.lock().iter().cloned().collect()
    }

    /// Publishes the set of every cluster whose root this node masters when
    /// it differs from the replicated value, and withdraws its own entries
    /// for roots it no longer masters or that stopped being roots.
    pub fn refresh(&self, topology: &Topology) -> BroadcastRefresh {
        let mut published = self.published.lock();
        let mut outcome = BroadcastRefresh::default();
        let mut mastered = BTreeSet::new();

        for cluster in topology.clusters() {
            if !self.arbiter.is_local_master(&cluster.root) {
                continue;
            }
            mastered.insert(cluster.root.clone());
            let points = self.pruning.broadcast_set(topology, cluster);
            published.insert(cluster.root.clone());
            // Re-stamp a set inherited from a previous master.
            if self.points.get(&cluster.root).as_ref() == Some(&points)
                && self.owns_entry(&cluster.root)
            {
                outcome.unchanged += 1;
                continue;
            }
            info!(
                "event=broadcast_points_published node={} root={} cluster={} points={} pruning={}",
                self.local,
                cluster.root,
                cluster.id,
                points.len(),
                self.pruning.name()
            );
            self.points.put(cluster.root.clone(), points);
            outcome.published.push(cluster.root.clone());
        }

        let stale: Vec<DeviceId> = published
            .iter()
            .filter(|root| !mastered.contains(*root))
            .cloned()
            .collect();
        for root in stale {
            published.remove(&root);
            if !self.owns_entry(&root) {
                debug!(
                    "event=broadcast_points_left node={} root={} reason=foreign_entry",
                    self.local, root
                );
                continue;
            }
            // Left for the successor to overwrite.
            if let Some(master) = self
                .arbiter
                .get_master(&root)
                .filter(|master| *master != self.local)
            {
                debug!(
                    "event=broadcast_points_left node={} root={} reason=handed_over master={}",
                    self.local, root, master
                );
                continue;
            }
            if self.points.remove(&root).is_some() {
                info!(
                    "event=broadcast_points_withdrawn node={} root={}",
                    self.local, root
                );
                outcome.withdrawn.push(root);
            }
        }
        drop(published);

        self.metrics
            .inc_counter(METRIC_BROADCAST_PUBLISHED, outcome.published.len() as u64);
        self.metrics
            .inc_counter(METRIC_BROADCAST_WITHDRAWN, outcome.withdrawn.len() as u64);
        outcome
    }

    fn owns_entry(&self, root: &DeviceId) -> bool {
        self.points
            .timestamp_of(root)
            .is_some_and(|timestamp| timestamp.origin == self.local)
    }
}

impl BroadcastPointSource for BroadcastPointCoordinator {
    fn broadcast_points(&self, root: &DeviceId) -> Option<BTreeSet<ConnectPoint>> {
        self.points.get(root)
    }
}

impl fmt::Debug for BroadcastPointCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastPointCoordinator")
            .field("local", &self.local)
            .field("pruning", &self.pruning.name())
            .field("published", &*self.published.lock())
            .finish()
    }
}
