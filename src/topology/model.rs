use super::snapshot::Topology;
use crate::identity::{DeviceId, Link};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Observed devices and links at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDescription {
    /// Monotonic nanoseconds; orders descriptions from one provider.
    pub timestamp: i64,
    /// Wall-clock milliseconds when the description was assembled.
    pub creation_time: i64,
    pub devices: BTreeSet<DeviceId>,
    pub links: BTreeSet<Link>,
}

impl GraphDescription {
    pub fn new(
        timestamp: i64,
        creation_time: i64,
        devices: impl IntoIterator<Item = DeviceId>,
        links: impl IntoIterator<Item = Link>,
    ) -> Self {
        Self {
            timestamp,
            creation_time,
            devices: devices.into_iter().collect(),
            links: links.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClusterId(u32);

impl ClusterId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cluster-{}", self.0)
    }
}

/// Maximal set of devices mutually reachable over direct links.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopologyCluster {
    pub id: ClusterId,
    /// Smallest device id in the cluster.
    pub root: DeviceId,
    pub device_count: usize,
    pub link_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub src: DeviceId,
    pub dst: DeviceId,
    pub links: Vec<Link>,
    pub cost: f64,
}

impl Path {
    pub fn hop_count(&self) -> usize {
        self.links.len()
    }

    /// Devices visited in order, endpoints included.
    pub fn devices(&self) -> Vec<DeviceId> {
        let mut devices = Vec::with_capacity(self.links.len() + 1);
        devices.push(self.src.clone());
        devices.extend(self.links.iter().map(|link| link.dst.device_id.clone()));
        devices
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisjointPath {
    pub primary: Path,
    pub backup: Path,
}

impl DisjointPath {
    pub fn cost(&self) -> f64 {
        self.primary.cost + self.backup.cost
    }
}

/// Why a provider submitted a new description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopologyReason {
    DeviceAdded(DeviceId),
    DeviceRemoved(DeviceId),
    LinkAdded(Link),
    LinkRemoved(Link),
    Resync,
}

impl fmt::Display for TopologyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopologyReason::DeviceAdded(device) => write!(f, "device_added:{device}"),
            TopologyReason::DeviceRemoved(device) => write!(f, "device_removed:{device}"),
            TopologyReason::LinkAdded(link) => write!(f, "link_added:{link}"),
            TopologyReason::LinkRemoved(link) => write!(f, "link_removed:{link}"),
            TopologyReason::Resync => f.write_str("resync"),
        }
    }
}

/// TOPOLOGY_CHANGED notification.
#[derive(Debug, Clone)]
pub struct TopologyEvent {
    pub topology: Arc<Topology>,
    pub reasons: Vec<TopologyReason>,
}
