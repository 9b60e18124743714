#[path = "support/cluster.rs"]
mod cluster;

use cluster::{bidirectional, cp, did, line, nid, TestCluster};
use std::sync::Arc;
use switchyard::{
    ConnectPoint, DeliveryMode, GraphDescription, Link, MastershipRole, MetricsRegistry,
    PruningKind, RiskProfile, TopologyBuilder, TopologyReason, TopologySnapshotStore,
};

fn snapshot_store() -> TopologySnapshotStore {
    TopologySnapshotStore::new(
        "test".into(),
        TopologyBuilder::default(),
        None,
        Arc::new(MetricsRegistry::new("test")),
    )
}

// Ring s1-s2-s3-s4-s1.
fn ring(timestamp: i64) -> GraphDescription {
    let links = [
        bidirectional("s1", 2, "s2", 1),
        bidirectional("s2", 2, "s3", 1),
        bidirectional("s3", 2, "s4", 1),
        bidirectional("s4", 2, "s1", 1),
    ]
    .into_iter()
    .flatten();
    GraphDescription::new(timestamp, 0, ["s1", "s2", "s3", "s4"].map(did), links)
}

#[test]
fn topology_checkpoint_line_graph() {
    let store = snapshot_store();
    store
        .update_topology("test".into(), &line(1, &["d1", "d2", "d3", "d4"]), vec![])
        .unwrap();
    let topology = store.current_topology();

    assert_eq!(topology.cluster_count(), 1);
    let cluster = topology.cluster_for(&did("d4")).unwrap();
    assert_eq!(cluster.root, did("d1"));
    assert_eq!(cluster.device_count, 4);
    assert_eq!(topology.cluster_devices(cluster.id).len(), 4);
    assert_eq!(topology.cluster_links(cluster.id).len(), 6);

    let paths = topology.get_paths(&did("d1"), &did("d4"));
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].hop_count(), 3);
    assert_eq!(paths[0].links[0].src, cp("d1", 2));

    let own = topology.get_paths(&did("d1"), &did("d1"));
    assert_eq!(own.len(), 1);
    assert_eq!(own[0].hop_count(), 0);

    assert!(topology.is_infrastructure(&cp("d2", 1)));
    assert!(!topology.is_infrastructure(&cp("d2", 7)));
    assert!(topology.is_broadcast_point(&cp("d2", 7)));
}

#[test]
fn topology_checkpoint_disconnected_components() {
    let links = bidirectional("a1", 1, "a2", 1)
        .into_iter()
        .chain(bidirectional("b1", 1, "b2", 1));
    let description = GraphDescription::new(1, 0, ["a1", "a2", "b1", "b2"].map(did), links);
    let topology = TopologyBuilder::default().build("test".into(), &description, None);

    assert_eq!(topology.cluster_count(), 2);
    let roots: Vec<_> = topology.clusters().iter().map(|c| c.root.clone()).collect();
    assert_eq!(roots, vec![did("a1"), did("b1")]);
    assert!(topology.get_paths(&did("a1"), &did("b2")).is_empty());
    assert!(topology
        .get_disjoint_paths(&did("a1"), &did("b2"), None, None)
        .is_empty());
}

#[test]
fn topology_checkpoint_ring_paths() {
    let topology = TopologyBuilder::default().build("test".into(), &ring(1), None);

    // Opposite corners: two equal-cost routes.
    let paths = topology.get_paths(&did("s1"), &did("s3"));
    assert_eq!(paths.len(), 2);
    assert!(paths.iter().all(|path| path.cost == 2.0));

    let k = topology.get_k_shortest_paths(&did("s1"), &did("s2"), 3, None);
    assert_eq!(k.len(), 2);
    assert_eq!(k[0].cost, 1.0);
    assert_eq!(k[1].cost, 3.0);

    let disjoint = topology.get_disjoint_paths(&did("s1"), &did("s3"), None, None);
    assert_eq!(disjoint.len(), 1);
    let pair = &disjoint[0];
    assert_eq!(pair.cost(), 4.0);
    let primary = pair.primary.devices();
    let backup = pair.backup.devices();
    assert_ne!(primary[1], backup[1]);
    assert_eq!(primary.last(), Some(&did("s3")));
    assert_eq!(backup.last(), Some(&did("s3")));
}

#[test]
fn topology_checkpoint_risk_profile_blocks_shared_groups() {
    let topology = TopologyBuilder::default().build("test".into(), &ring(1), None);
    let mut risk = RiskProfile::new();
    // Both links leaving s1 share a duct; no diverse pair survives.
    risk.tag(Link::direct(cp("s1", 2), cp("s2", 1)), "duct-1");
    risk.tag(Link::direct(cp("s1", 1), cp("s4", 2)), "duct-1");
    assert!(topology
        .get_disjoint_paths(&did("s1"), &did("s3"), None, Some(&risk))
        .is_empty());

    let mut unrelated = RiskProfile::new();
    unrelated.tag(Link::direct(cp("s2", 2), cp("s3", 1)), "duct-2");
    assert_eq!(
        topology
            .get_disjoint_paths(&did("s1"), &did("s3"), None, Some(&unrelated))
            .len(),
        1
    );
}

#[test]
fn topology_checkpoint_custom_weigher() {
    let topology = TopologyBuilder::default().build("test".into(), &ring(1), None);
    // Make s1-s2 expensive so the long way round wins.
    let weigher = |link: &Link| {
        let pricey = link.src.device_id == did("s1") && link.dst.device_id == did("s2");
        Some(if pricey { 10.0 } else { 1.0 })
    };
    let paths = topology.get_paths_with(&did("s1"), &did("s2"), &weigher, None);
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].cost, 3.0);
    assert_eq!(
        paths[0].devices(),
        ["s1", "s4", "s3", "s2"].map(did).to_vec()
    );
}

#[test]
fn topology_checkpoint_stale_updates_are_ignored() {
    let store = snapshot_store();
    let accepted = store
        .update_topology(
            "test".into(),
            &ring(10),
            vec![TopologyReason::DeviceAdded(did("s1"))],
        )
        .unwrap();
    assert!(store
        .update_topology("test".into(), &line(10, &["x", "y"]), vec![])
        .is_none());
    assert!(store
        .update_topology("test".into(), &line(3, &["x", "y"]), vec![])
        .is_none());
    assert!(store.is_latest(&accepted.topology));
    assert_eq!(store.current_topology().device_count(), 4);
}

#[test]
fn topology_checkpoint_broadcast_points_replicate_across_nodes() {
    let cluster = TestCluster::new(&["n1", "n2"], DeliveryMode::Immediate);
    let n1 = cluster.node("n1");
    let n2 = cluster.node("n2");
    let description = ring(5);
    n1.update_topology(&description, vec![]).unwrap();
    n2.update_topology(&description, vec![]).unwrap();

    n1.device_connected(&did("s1")).unwrap();
    let published = n2
        .topology_store()
        .coordinator()
        .unwrap()
        .points_map()
        .get(&did("s1"))
        .unwrap();
    assert_eq!(published.len(), 8);

    let topology = n2.current_topology();
    assert!(topology.is_broadcast_point(&cp("s3", 1)));
    assert!(topology.is_broadcast_point(&ConnectPoint::new("s3", 42u64)));

    // n2 does not master the root, so it never publishes.
    assert!(n2
        .topology_store()
        .coordinator()
        .unwrap()
        .published_roots()
        .is_empty());
}

#[test]
fn topology_checkpoint_broadcast_points_survive_failover() {
    let cluster = TestCluster::with_pruning(
        &["n1", "n2"],
        DeliveryMode::Queued,
        PruningKind::SpanningTree,
    );
    let n1 = cluster.node("n1");
    let n2 = cluster.node("n2");
    let description = ring(5);
    n1.update_topology(&description, vec![]).unwrap();
    n2.update_topology(&description, vec![]).unwrap();

    assert_eq!(
        n2.device_connected(&did("s1")).unwrap(),
        MastershipRole::Master
    );
    cluster.settle();
    assert_eq!(
        n1.device_connected(&did("s1")).unwrap(),
        MastershipRole::Standby
    );
    cluster.settle();
    let coordinator = |core: &switchyard::ControllerCore| {
        core.topology_store().coordinator().unwrap().clone()
    };
    assert_eq!(
        coordinator(n1).points_map().get(&did("s1")).map(|set| set.len()),
        Some(6)
    );

    n2.device_disconnected(&did("s1")).unwrap().unwrap();
    cluster.settle();

    assert_eq!(n1.arbiter().get_master(&did("s1")), Some(nid("n1")));
    assert_eq!(coordinator(n1).published_roots(), vec![did("s1")]);
    assert!(coordinator(n2).published_roots().is_empty());
    for core in [n1, n2] {
        let owner = coordinator(core);
        let points = owner.points_map();
        assert_eq!(points.get(&did("s1")).map(|set| set.len()), Some(6));
        assert_eq!(points.timestamp_of(&did("s1")).unwrap().origin, nid("n1"));
    }

    // The spanning tree over the ring still drops one link on the new master.
    let topology = n1.current_topology();
    let ring_points = ["s1", "s2", "s3", "s4"]
        .into_iter()
        .flat_map(|device| [cp(device, 1), cp(device, 2)]);
    let pruned = ring_points
        .filter(|point| !topology.is_broadcast_point(point))
        .count();
    assert_eq!(pruned, 2);
}
