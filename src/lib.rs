//! Device mastership arbitration and topology snapshots for a clustered
//! network controller.
//!
//! Each controller node runs one [`ControllerCore`]: a [`MastershipArbiter`]
//! over replicated role and term maps, a [`TopologySnapshotStore`] holding the
//! current immutable [`Topology`], and a [`BroadcastPointCoordinator`] that
//! publishes flood-eligible connect points for the clusters whose root the
//! node masters. Nodes share state only through eventually consistent,
//! last-writer-wins maps joined by a [`ReplicationFabric`].

pub mod config;
pub mod event;
pub mod identity;
pub mod mastership;
pub mod prelude;
pub mod replica;
pub mod service;
pub mod telemetry;
pub mod topology;
pub mod util;

pub use config::{
    BroadcastConfig, CoreConfig, DeliveryMode, PruningKind, ReplicationConfig, TopologyConfig,
};
pub use event::{ListenerId, ListenerRegistry};
pub use identity::{ConnectPoint, DeviceId, Link, LinkType, NodeId, PortNumber, ProviderId};
pub use mastership::{
    MastershipArbiter, MastershipEvent, MastershipRole, MastershipTerm, RoleInfo, RoleStore,
    RoleValue,
};
pub use replica::{
    EventOrigin, EventuallyConsistentMap, MapEvent, ReplicationFabric, Timestamp, UpdateEntry,
};
pub use service::{ClusterFabrics, ControllerCore};
pub use telemetry::{MetricsRegistry, MetricsSnapshot, TelemetryError};
pub use topology::{
    BroadcastPointCoordinator, BroadcastPruning, BroadcastRefresh, ClusterId, DisjointPath,
    FullClusterPruning, GraphDescription, HopCountWeigher, LinkWeigher, NoIndirectWeigher, Path,
    RiskProfile, SpanningTreePruning, Topology, TopologyBuilder, TopologyCluster, TopologyEvent,
    TopologyReason, TopologySnapshotStore,
};
pub use util::error::{
    ConfigError, MastershipError, ReplicationError, Result, SerializationError, SwitchyardError,
};
