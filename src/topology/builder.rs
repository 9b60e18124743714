use super::graph::TopologyGraph;
use super::model::{ClusterId, GraphDescription, TopologyCluster};
use super::search::{strongly_connected, ShortestPaths};
use super::snapshot::{BroadcastPointSource, Topology};
use super::weight::{HopCountWeigher, NoIndirectWeigher};
use crate::config::TopologyConfig;
use crate::identity::{ConnectPoint, DeviceId, ProviderId};
use log::debug;
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

/// Turns a description into an immutable [`Topology`]. Holds configuration
/// only; every build is independent.
#[derive(Debug, Clone, Default)]
pub struct TopologyBuilder {
    config: TopologyConfig,
}

impl TopologyBuilder {
    /// Timestamp of the placeholder snapshot; any real description is newer.
    pub const EMPTY_TIMESTAMP: i64 = i64::MIN;

    pub fn new(config: TopologyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TopologyConfig {
        &self.config
    }

    /// Snapshot with no devices, used before the first description arrives.
    pub fn empty(&self, provider_id: ProviderId) -> Topology {
        let description = GraphDescription {
            timestamp: Self::EMPTY_TIMESTAMP,
            ..GraphDescription::default()
        };
        self.build(provider_id, &description, None)
    }

    pub fn build(
        &self,
        provider_id: ProviderId,
        description: &GraphDescription,
        broadcast: Option<Arc<dyn BroadcastPointSource>>,
    ) -> Topology {
        let started = Instant::now();
        let graph = TopologyGraph::new(&description.devices, &description.links);
        if graph.synthesized_vertices() > 0 {
            debug!(
                "event=topology_vertices_synthesized provider={} count={}",
                provider_id,
                graph.synthesized_vertices()
            );
        }

        let scc = strongly_connected(&graph, &NoIndirectWeigher);
        let mut clusters = Vec::with_capacity(scc.components.len());
        let mut cluster_devices = Vec::with_capacity(scc.components.len());
        let mut cluster_links = Vec::with_capacity(scc.components.len());
        for (idx, component) in scc.components.iter().enumerate() {
            let devices: Vec<DeviceId> = component
                .iter()
                .map(|vertex| graph.device(*vertex).clone())
                .collect();
            let Some(root) = devices.iter().min().cloned() else {
                continue;
            };
            let links: Vec<_> = scc.component_edges[idx]
                .iter()
                .map(|edge| graph.edge(*edge).link.clone())
                .collect();
            clusters.push(TopologyCluster {
                id: ClusterId::new(idx as u32),
                root,
                device_count: devices.len(),
                link_count: links.len(),
            });
            cluster_devices.push(devices);
            cluster_links.push(links);
        }
        let cluster_of = scc
            .membership
            .iter()
            .map(|idx| ClusterId::new(*idx as u32))
            .collect();

        let infrastructure: HashSet<ConnectPoint> = description
            .links
            .iter()
            .flat_map(|link| [link.src.clone(), link.dst.clone()])
            .collect();

        let weigher = HopCountWeigher::new(graph.vertex_count());
        let paths: Vec<OnceLock<ShortestPaths>> =
            (0..graph.vertex_count()).map(|_| OnceLock::new()).collect();
        if self.config.precompute_paths {
            for source in graph.vertex_ids() {
                let _ = paths[source.index()].set(ShortestPaths::search(
                    &graph, source, &weigher, None,
                ));
            }
        }

        let compute_cost = started.elapsed();
        debug!(
            "event=topology_built provider={} time={} devices={} links={} clusters={} compute_us={}",
            provider_id,
            description.timestamp,
            graph.vertex_count(),
            graph.edge_count(),
            clusters.len(),
            duration_micros(compute_cost)
        );

        Topology {
            provider_id,
            time: description.timestamp,
            creation_time: description.creation_time,
            compute_cost,
            config: self.config.clone(),
            graph,
            clusters,
            cluster_of,
            cluster_devices,
            cluster_links,
            infrastructure,
            weigher,
            paths,
            broadcast,
            local_broadcast: OnceLock::new(),
        }
    }
}

pub(crate) fn duration_micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Link;

    fn did(id: &str) -> DeviceId {
        DeviceId::from(id)
    }

    fn bidirectional(a: &str, ap: u64, b: &str, bp: u64) -> [Link; 2] {
        let forward = Link::direct(ConnectPoint::new(a, ap), ConnectPoint::new(b, bp));
        [forward.reversed(), forward]
    }

    fn line() -> GraphDescription {
        let devices = ["d1", "d2", "d3", "d4"].map(did);
        let links = [
            bidirectional("d1", 2, "d2", 1),
            bidirectional("d2", 2, "d3", 1),
            bidirectional("d3", 2, "d4", 1),
        ]
        .into_iter()
        .flatten();
        GraphDescription::new(10, 1_000, devices, links)
    }

    #[test]
    fn line_graph_forms_one_cluster_rooted_at_smallest_id() {
        let topology = TopologyBuilder::default().build("test".into(), &line(), None);
        assert_eq!(topology.device_count(), 4);
        assert_eq!(topology.link_count(), 6);
        assert_eq!(topology.cluster_count(), 1);
        let cluster = &topology.clusters()[0];
        assert_eq!(cluster.root, did("d1"));
        assert_eq!(cluster.device_count, 4);
        assert_eq!(cluster.link_count, 6);
        assert_eq!(topology.cluster_for(&did("d3")), Some(cluster));
    }

    #[test]
    fn line_graph_paths() {
        let topology = TopologyBuilder::default().build("test".into(), &line(), None);
        let paths = topology.get_paths(&did("d1"), &did("d4"));
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].hop_count(), 3);
        assert_eq!(paths[0].cost, 3.0);
        assert_eq!(paths[0].devices(), ["d1", "d2", "d3", "d4"].map(did).to_vec());

        let own = topology.get_paths(&did("d1"), &did("d1"));
        assert_eq!(own.len(), 1);
        assert!(own[0].links.is_empty());
        assert_eq!(own[0].cost, 0.0);

        assert!(topology.get_paths(&did("d1"), &did("d9")).is_empty());
    }

    #[test]
    fn lazy_and_precomputed_searches_agree() {
        let lazy = TopologyBuilder::new(TopologyConfig {
            precompute_paths: false,
            ..TopologyConfig::default()
        })
        .build("test".into(), &line(), None);
        let eager = TopologyBuilder::default().build("test".into(), &line(), None);
        for src in ["d1", "d2", "d3", "d4"] {
            for dst in ["d1", "d2", "d3", "d4"] {
                assert_eq!(
                    lazy.get_paths(&did(src), &did(dst)),
                    eager.get_paths(&did(src), &did(dst))
                );
            }
        }
    }

    #[test]
    fn indirect_links_split_clusters_but_carry_paths() {
        let mut description = GraphDescription::new(
            1,
            0,
            ["a", "b", "c", "d"].map(did),
            bidirectional("a", 1, "b", 1)
                .into_iter()
                .chain(bidirectional("c", 1, "d", 1)),
        );
        let bridge = Link::indirect(ConnectPoint::new("b", 2), ConnectPoint::new("c", 2));
        description.links.insert(bridge.reversed());
        description.links.insert(bridge);

        let topology = TopologyBuilder::default().build("test".into(), &description, None);
        assert_eq!(topology.cluster_count(), 2);
        let roots: Vec<_> = topology.clusters().iter().map(|c| c.root.clone()).collect();
        assert_eq!(roots, vec![did("a"), did("c")]);

        let paths = topology.get_paths(&did("a"), &did("d"));
        assert_eq!(paths.len(), 1);
        // Two direct hops plus one indirect hop priced at the vertex count.
        assert_eq!(paths[0].cost, 6.0);
    }

    #[test]
    fn max_paths_bounds_equal_cost_results() {
        let links = [
            bidirectional("a", 1, "b", 1),
            bidirectional("a", 2, "c", 1),
            bidirectional("b", 2, "d", 1),
            bidirectional("c", 2, "d", 2),
        ]
        .into_iter()
        .flatten();
        let description = GraphDescription::new(1, 0, [], links);
        let unbounded = TopologyBuilder::default().build("test".into(), &description, None);
        assert_eq!(unbounded.get_paths(&did("a"), &did("d")).len(), 2);

        let bounded = TopologyBuilder::new(TopologyConfig {
            max_paths: Some(1),
            ..TopologyConfig::default()
        })
        .build("test".into(), &description, None);
        assert_eq!(bounded.get_paths(&did("a"), &did("d")).len(), 1);
        assert_eq!(
            bounded
                .get_paths_with(&did("a"), &did("d"), unbounded.default_weigher(), None)
                .len(),
            2
        );
    }

    #[test]
    fn empty_snapshot_predates_everything() {
        let empty = TopologyBuilder::default().empty("test".into());
        assert_eq!(empty.time(), i64::MIN);
        assert_eq!(empty.cluster_count(), 0);
        assert!(empty.get_paths(&did("a"), &did("a")).is_empty());
    }
}
