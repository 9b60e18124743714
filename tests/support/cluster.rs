#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use switchyard::{
    ClusterFabrics, ConnectPoint, ControllerCore, CoreConfig, DeliveryMode, DeviceId,
    GraphDescription, Link, MastershipEvent, NodeId, PruningKind, ReplicationConfig,
};

pub fn did(id: &str) -> DeviceId {
    DeviceId::from(id)
}

pub fn nid(id: &str) -> NodeId {
    NodeId::from(id)
}

pub fn cp(device: &str, port: u64) -> ConnectPoint {
    ConnectPoint::new(device, port)
}

/// Both directions of a direct adjacency.
pub fn bidirectional(a: &str, a_port: u64, b: &str, b_port: u64) -> [Link; 2] {
    let forward = Link::direct(cp(a, a_port), cp(b, b_port));
    [forward.reversed(), forward]
}

/// `d1 - d2 - ... - dN` over direct links; port 2 faces right, port 1 left.
pub fn line(timestamp: i64, devices: &[&str]) -> GraphDescription {
    let links = devices
        .windows(2)
        .flat_map(|pair| bidirectional(pair[0], 2, pair[1], 1))
        .collect::<Vec<_>>();
    GraphDescription::new(timestamp, 0, devices.iter().map(|d| did(d)), links)
}

/// Controller nodes joined to one set of fabrics.
pub struct TestCluster {
    pub fabrics: ClusterFabrics,
    pub nodes: Vec<ControllerCore>,
}

impl TestCluster {
    pub fn new(names: &[&str], delivery: DeliveryMode) -> Self {
        Self::with_pruning(names, delivery, PruningKind::FullCluster)
    }

    pub fn with_pruning(names: &[&str], delivery: DeliveryMode, pruning: PruningKind) -> Self {
        let replication = ReplicationConfig {
            delivery,
            ..ReplicationConfig::default()
        };
        let fabrics = ClusterFabrics::new(&replication);
        let nodes = names
            .iter()
            .map(|name| {
                let mut config = CoreConfig::new(*name);
                config.replication = replication.clone();
                config.broadcast.pruning = pruning;
                let core = ControllerCore::join(config, &fabrics).unwrap();
                core.start();
                core
            })
            .collect();
        Self { fabrics, nodes }
    }

    pub fn node(&self, name: &str) -> &ControllerCore {
        self.nodes
            .iter()
            .find(|core| core.node_id().as_str() == name)
            .unwrap()
    }

    pub fn flush(&self) -> usize {
        self.fabrics.deliver_pending()
    }

    /// Flushes until no queued update is left.
    pub fn settle(&self) {
        for _ in 0..16 {
            if self.flush() == 0 {
                return;
            }
        }
        panic!("replication did not settle");
    }
}

/// Records every event a listener sees.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<MastershipEvent>>>,
}

impl EventLog {
    pub fn attach(core: &ControllerCore) -> Self {
        let log = Self::default();
        let sink = Arc::clone(&log.events);
        core.arbiter().add_listener(move |event| {
            sink.lock().unwrap().push(event.clone());
        });
        log
    }

    pub fn take(&self) -> Vec<MastershipEvent> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}
