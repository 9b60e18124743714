//! Convenience re-exports for downstream crates. Pull this module in via
//! `use switchyard::prelude::*;` for the types a controller node touches
//! most.

pub use crate::config::CoreConfig;
pub use crate::identity::{ConnectPoint, DeviceId, Link, NodeId};
pub use crate::mastership::{MastershipArbiter, MastershipEvent, MastershipRole};
pub use crate::service::{ClusterFabrics, ControllerCore};
pub use crate::topology::{GraphDescription, Path, Topology, TopologyEvent, TopologyReason};
pub use crate::util::error::{Result as SwitchyardResult, SwitchyardError};
