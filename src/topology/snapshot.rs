use super::graph::{TopologyGraph, VertexId};
use super::model::{ClusterId, DisjointPath, Path, TopologyCluster};
use super::search::{
    disjoint_pair, k_shortest, srlg_disjoint_pair, DisjointPair, GraphPath, RiskProfile,
    ShortestPaths,
};
use super::weight::{HopCountWeigher, LinkWeigher};
use crate::config::TopologyConfig;
use crate::identity::{ConnectPoint, DeviceId, Link, ProviderId};
use log::debug;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Published broadcast restrictions, keyed by cluster root.
pub trait BroadcastPointSource: Send + Sync {
    /// `None` when nothing is published for `root`.
    fn broadcast_points(&self, root: &DeviceId) -> Option<BTreeSet<ConnectPoint>>;
}

/// Immutable computed view of connectivity. Built by
/// [`TopologyBuilder`](super::builder::TopologyBuilder); superseded, never
/// edited.
pub struct Topology {
    pub(super) provider_id: ProviderId,
    pub(super) time: i64,
    pub(super) creation_time: i64,
    pub(super) compute_cost: Duration,
    pub(super) config: TopologyConfig,
    pub(super) graph: TopologyGraph,
    pub(super) clusters: Vec<TopologyCluster>,
    pub(super) cluster_of: Vec<ClusterId>,
    pub(super) cluster_devices: Vec<Vec<DeviceId>>,
    pub(super) cluster_links: Vec<Vec<Link>>,
    pub(super) infrastructure: HashSet<ConnectPoint>,
    pub(super) weigher: HopCountWeigher,
    pub(super) paths: Vec<OnceLock<ShortestPaths>>,
    pub(super) broadcast: Option<Arc<dyn BroadcastPointSource>>,
    pub(super) local_broadcast: OnceLock<Vec<BTreeSet<ConnectPoint>>>,
}

impl Topology {
    pub fn provider_id(&self) -> &ProviderId {
        &self.provider_id
    }

    /// Monotonic timestamp of the description this snapshot was built from.
    pub fn time(&self) -> i64 {
        self.time
    }

    pub fn creation_time(&self) -> i64 {
        self.creation_time
    }

    pub fn compute_cost(&self) -> Duration {
        self.compute_cost
    }

    pub fn graph(&self) -> &TopologyGraph {
        &self.graph
    }

    pub fn device_count(&self) -> usize {
        self.graph.vertex_count()
    }

    pub fn link_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }

    pub fn default_weigher(&self) -> &HopCountWeigher {
        &self.weigher
    }

    pub fn clusters(&self) -> &[TopologyCluster] {
        &self.clusters
    }

    pub fn cluster(&self, id: ClusterId) -> Option<&TopologyCluster> {
        self.clusters.get(id.index())
    }

    pub fn cluster_for(&self, device: &DeviceId) -> Option<&TopologyCluster> {
        let vertex = self.graph.vertex(device)?;
        self.cluster(self.cluster_of[vertex.0])
    }

    /// Devices of a cluster in id order; empty for an unknown cluster.
    pub fn cluster_devices(&self, id: ClusterId) -> &[DeviceId] {
        self.cluster_devices
            .get(id.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn cluster_links(&self, id: ClusterId) -> &[Link] {
        self.cluster_links
            .get(id.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether `point` terminates any link of this topology.
    pub fn is_infrastructure(&self, point: &ConnectPoint) -> bool {
        self.infrastructure.contains(point)
    }

    /// Host-facing points always qualify. An infrastructure point qualifies
    /// when its cluster has no published restriction or the restriction
    /// lists it. Without a published source the snapshot falls back to its
    /// own spanning-tree sets.
    pub fn is_broadcast_point(&self, point: &ConnectPoint) -> bool {
        if !self.is_infrastructure(point) {
            return true;
        }
        let Some(cluster) = self.cluster_for(&point.device_id) else {
            return true;
        };
        match &self.broadcast {
            Some(source) => match source.broadcast_points(&cluster.root) {
                Some(points) => points.is_empty() || points.contains(point),
                None => true,
            },
            None => self.local_broadcast_sets()[cluster.id.index()].contains(point),
        }
    }

    /// Endpoints of the first parent link of every non-root device on the
    /// hop-count shortest-path tree rooted at the cluster root.
    pub fn spanning_tree_points(&self, cluster: &TopologyCluster) -> BTreeSet<ConnectPoint> {
        let mut points = BTreeSet::new();
        let Some(root) = self.graph.vertex(&cluster.root) else {
            return points;
        };
        let tree = self.shortest_from(root);
        for device in self.cluster_devices(cluster.id) {
            let Some(vertex) = self.graph.vertex(device) else {
                continue;
            };
            if let Some(first) = tree.parents(vertex).first() {
                let link = &self.graph.edge(*first).link;
                points.insert(link.src.clone());
                points.insert(link.dst.clone());
            }
        }
        points
    }

    /// Every minimum-cost path under the default weight, bounded by the
    /// configured `max_paths`. `src == dst` yields one zero-length path.
    pub fn get_paths(&self, src: &DeviceId, dst: &DeviceId) -> Vec<Path> {
        let (Some(from), Some(to)) = (self.graph.vertex(src), self.graph.vertex(dst)) else {
            return Vec::new();
        };
        self.shortest_from(from)
            .paths_to(&self.graph, to, self.config.max_paths)
            .into_iter()
            .map(|path| self.to_path(from, path))
            .collect()
    }

    /// Minimum-cost paths under `weigher`, computed on demand.
    pub fn get_paths_with(
        &self,
        src: &DeviceId,
        dst: &DeviceId,
        weigher: &dyn LinkWeigher,
        max_paths: Option<usize>,
    ) -> Vec<Path> {
        let (Some(from), Some(to)) = (self.graph.vertex(src), self.graph.vertex(dst)) else {
            return Vec::new();
        };
        ShortestPaths::search(&self.graph, from, weigher, None)
            .paths_to(&self.graph, to, max_paths)
            .into_iter()
            .map(|path| self.to_path(from, path))
            .collect()
    }

    /// Up to `k` loopless paths in non-decreasing cost order.
    pub fn get_k_shortest_paths(
        &self,
        src: &DeviceId,
        dst: &DeviceId,
        k: usize,
        weigher: Option<&dyn LinkWeigher>,
    ) -> Vec<Path> {
        let (Some(from), Some(to)) = (self.graph.vertex(src), self.graph.vertex(dst)) else {
            return Vec::new();
        };
        let weigher = weigher.unwrap_or(&self.weigher);
        k_shortest(&self.graph, from, to, weigher, k)
            .into_iter()
            .map(|path| self.to_path(from, path))
            .collect()
    }

    /// The cheapest pair of paths sharing no link and no interior device,
    /// and no risk group when a profile is given. Empty when no pair exists.
    pub fn get_disjoint_paths(
        &self,
        src: &DeviceId,
        dst: &DeviceId,
        weigher: Option<&dyn LinkWeigher>,
        risk: Option<&RiskProfile>,
    ) -> Vec<DisjointPath> {
        let (Some(from), Some(to)) = (self.graph.vertex(src), self.graph.vertex(dst)) else {
            return Vec::new();
        };
        let weigher = weigher.unwrap_or(&self.weigher);
        let pair = match risk {
            Some(risk) if !risk.is_empty() => srlg_disjoint_pair(
                &self.graph,
                from,
                to,
                weigher,
                risk,
                self.config.srlg_candidate_limit,
            ),
            _ => disjoint_pair(&self.graph, from, to, weigher),
        };
        match pair {
            Some(DisjointPair { primary, backup }) => vec![DisjointPath {
                primary: self.to_path(from, primary),
                backup: self.to_path(from, backup),
            }],
            None => {
                debug!(
                    "event=disjoint_paths_unavailable src={} dst={} risk_profile={}",
                    src,
                    dst,
                    risk.is_some()
                );
                Vec::new()
            }
        }
    }

    pub(crate) fn shortest_from(&self, source: VertexId) -> &ShortestPaths {
        self.paths[source.0]
            .get_or_init(|| ShortestPaths::search(&self.graph, source, &self.weigher, None))
    }

    fn local_broadcast_sets(&self) -> &[BTreeSet<ConnectPoint>] {
        self.local_broadcast.get_or_init(|| {
            self.clusters
                .iter()
                .map(|cluster| self.spanning_tree_points(cluster))
                .collect()
        })
    }

    fn to_path(&self, source: VertexId, path: GraphPath) -> Path {
        let dst = path
            .edges
            .last()
            .map(|edge| self.graph.edge(*edge).dst)
            .unwrap_or(source);
        Path {
            src: self.graph.device(source).clone(),
            dst: self.graph.device(dst).clone(),
            links: path
                .edges
                .iter()
                .map(|edge| self.graph.edge(*edge).link.clone())
                .collect(),
            cost: path.cost,
        }
    }
}

impl fmt::Debug for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Topology")
            .field("provider_id", &self.provider_id)
            .field("time", &self.time)
            .field("devices", &self.device_count())
            .field("links", &self.link_count())
            .field("clusters", &self.cluster_count())
            .field("compute_cost", &self.compute_cost)
            .finish()
    }
}
