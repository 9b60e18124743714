//! Topology snapshots: graph construction, clustering, path queries and
//! broadcast-point coordination.

pub mod broadcast;
pub mod builder;
pub mod graph;
pub mod model;
pub mod search;
pub mod snapshot;
pub mod store;
pub mod weight;

pub use broadcast::{
    pruning_for, BroadcastPointCoordinator, BroadcastPointMap, BroadcastPruning, BroadcastRefresh,
    FullClusterPruning, SpanningTreePruning, BROADCAST_MAP_NAME,
};
pub use builder::TopologyBuilder;
pub use graph::{EdgeId, TopologyEdge, TopologyGraph, VertexId};
pub use model::{
    ClusterId, DisjointPath, GraphDescription, Path, TopologyCluster, TopologyEvent,
    TopologyReason,
};
pub use search::RiskProfile;
pub use snapshot::{BroadcastPointSource, Topology};
pub use store::TopologySnapshotStore;
pub use weight::{HopCountWeigher, LinkWeigher, NoIndirectWeigher};
