//! Disjoint path pairs.
//!
//! Without a risk profile the pair comes from a two-unit min-cost flow over
//! the vertex-split graph, which yields the cheapest pair of paths sharing
//! no interior vertex. With a risk profile the search walks primary
//! candidates in cost order and picks the cheapest combined pair whose backup
//! avoids every risk group the primary touches.

use super::super::graph::{EdgeId, TopologyGraph, VertexId};
use super::super::weight::{viable_cost, LinkWeigher};
use super::{k_shortest, Cost, GraphPath, SearchMask, ShortestPaths};
use crate::identity::Link;
use std::collections::{BTreeSet, HashMap, HashSet};

#[derive(Debug, Clone, PartialEq)]
pub struct DisjointPair {
    pub primary: GraphPath,
    pub backup: GraphPath,
}

impl DisjointPair {
    fn ordered(a: GraphPath, b: GraphPath) -> Self {
        let a_first = Cost(a.cost)
            .cmp(&Cost(b.cost))
            .then(a.edges.len().cmp(&b.edges.len()))
            .then_with(|| a.edges.cmp(&b.edges))
            .is_le();
        if a_first {
            Self { primary: a, backup: b }
        } else {
            Self { primary: b, backup: a }
        }
    }

    pub fn cost(&self) -> f64 {
        self.primary.cost + self.backup.cost
    }
}

/// Shared-risk groups per link. Links sharing a group fail together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RiskProfile {
    groups: HashMap<Link, BTreeSet<String>>,
}

impl RiskProfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tag(&mut self, link: Link, group: impl Into<String>) -> &mut Self {
        self.groups.entry(link).or_default().insert(group.into());
        self
    }

    pub fn groups(&self, link: &Link) -> impl Iterator<Item = &str> {
        self.groups
            .get(link)
            .into_iter()
            .flat_map(|groups| groups.iter().map(String::as_str))
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[derive(Debug, Clone)]
struct FlowArc {
    to: usize,
    capacity: u8,
    cost: f64,
    edge: Option<EdgeId>,
}

struct FlowNetwork {
    arcs: Vec<FlowArc>,
    adjacency: Vec<Vec<usize>>,
}

impl FlowNetwork {
    fn new(nodes: usize) -> Self {
        Self {
            arcs: Vec::new(),
            adjacency: vec![Vec::new(); nodes],
        }
    }

    fn add_arc(&mut self, from: usize, to: usize, capacity: u8, cost: f64, edge: Option<EdgeId>) {
        self.adjacency[from].push(self.arcs.len());
        self.arcs.push(FlowArc {
            to,
            capacity,
            cost,
            edge,
        });
        self.adjacency[to].push(self.arcs.len());
        self.arcs.push(FlowArc {
            to: from,
            capacity: 0,
            cost: -cost,
            edge: None,
        });
    }

    /// Cheapest residual path by Bellman-Ford; residual costs may be negative.
    fn augment(&mut self, source: usize, sink: usize) -> bool {
        let nodes = self.adjacency.len();
        let mut dist: Vec<Option<f64>> = vec![None; nodes];
        let mut via: Vec<Option<usize>> = vec![None; nodes];
        dist[source] = Some(0.0);
        for _ in 0..nodes {
            let mut changed = false;
            for from in 0..nodes {
                let Some(base) = dist[from] else { continue };
                for &arc_id in &self.adjacency[from] {
                    let arc = &self.arcs[arc_id];
                    if arc.capacity == 0 {
                        continue;
                    }
                    let candidate = base + arc.cost;
                    if dist[arc.to].map_or(true, |current| candidate < current - super::COST_EPSILON) {
                        dist[arc.to] = Some(candidate);
                        via[arc.to] = Some(arc_id);
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }
        if dist[sink].is_none() {
            return false;
        }
        let mut node = sink;
        let mut steps = 0;
        while node != source {
            let Some(arc_id) = via[node] else {
                return false;
            };
            self.arcs[arc_id].capacity -= 1;
            self.arcs[arc_id ^ 1].capacity += 1;
            node = self.arcs[arc_id ^ 1].to;
            steps += 1;
            if steps > self.arcs.len() {
                return false;
            }
        }
        true
    }

    /// Graph edges carrying one unit of flow.
    fn saturated_edges(&self) -> Vec<EdgeId> {
        self.arcs
            .iter()
            .filter(|arc| arc.edge.is_some() && arc.capacity == 0)
            .filter_map(|arc| arc.edge)
            .collect()
    }
}

fn vertex_in(vertex: VertexId) -> usize {
    vertex.0 * 2
}

fn vertex_out(vertex: VertexId) -> usize {
    vertex.0 * 2 + 1
}

/// Cheapest pair of paths from `source` to `target` with no interior vertex
/// in common. `None` when the target is unreachable, when source and target
/// coincide, or when no second disjoint path exists.
pub fn disjoint_pair(
    graph: &TopologyGraph,
    source: VertexId,
    target: VertexId,
    weigher: &dyn LinkWeigher,
) -> Option<DisjointPair> {
    if source == target {
        return None;
    }
    let mut network = FlowNetwork::new(graph.vertex_count() * 2);
    for vertex in graph.vertex_ids() {
        if vertex != source && vertex != target {
            network.add_arc(vertex_in(vertex), vertex_out(vertex), 1, 0.0, None);
        }
    }
    for (idx, edge) in graph.edges().iter().enumerate() {
        if edge.src == edge.dst || edge.dst == source || edge.src == target {
            continue;
        }
        let Some(cost) = viable_cost(weigher, &edge.link) else {
            continue;
        };
        network.add_arc(vertex_out(edge.src), vertex_in(edge.dst), 1, cost, Some(EdgeId(idx)));
    }

    let (from, to) = (vertex_out(source), vertex_in(target));
    if !network.augment(from, to) || !network.augment(from, to) {
        return None;
    }

    let mut unused: Vec<EdgeId> = network.saturated_edges();
    let first = walk(graph, &mut unused, source, target)?;
    let second = walk(graph, &mut unused, source, target)?;
    let first = GraphPath::priced(graph, first, weigher)?;
    let second = GraphPath::priced(graph, second, weigher)?;
    Some(DisjointPair::ordered(first, second))
}

fn walk(
    graph: &TopologyGraph,
    unused: &mut Vec<EdgeId>,
    source: VertexId,
    target: VertexId,
) -> Option<Vec<EdgeId>> {
    let mut path = Vec::new();
    let mut at = source;
    while at != target {
        let position = unused.iter().position(|edge| graph.edge(*edge).src == at)?;
        let edge = unused.swap_remove(position);
        at = graph.edge(edge).dst;
        path.push(edge);
    }
    Some(path)
}

/// Cheapest pair whose backup shares no interior vertex, no link and no risk
/// group with the primary. Primaries are drawn from the `candidate_limit`
/// shortest paths.
pub fn srlg_disjoint_pair(
    graph: &TopologyGraph,
    source: VertexId,
    target: VertexId,
    weigher: &dyn LinkWeigher,
    risk: &RiskProfile,
    candidate_limit: usize,
) -> Option<DisjointPair> {
    if source == target {
        return None;
    }
    let mut best: Option<DisjointPair> = None;
    for primary in k_shortest(graph, source, target, weigher, candidate_limit) {
        let mut mask = SearchMask::new(graph);
        let mut shared: HashSet<&str> = HashSet::new();
        for edge in &primary.edges {
            mask.block_edge(*edge);
            shared.extend(risk.groups(&graph.edge(*edge).link));
        }
        let vertices = primary.vertices(graph, source);
        for vertex in &vertices[1..vertices.len() - 1] {
            mask.block_vertex(*vertex);
        }
        if !shared.is_empty() {
            for (idx, edge) in graph.edges().iter().enumerate() {
                if risk.groups(&edge.link).any(|group| shared.contains(group)) {
                    mask.block_edge(EdgeId(idx));
                }
            }
        }

        let Some(backup) = ShortestPaths::search(graph, source, weigher, Some(&mask))
            .first_path(graph, target)
        else {
            continue;
        };
        let pair = DisjointPair {
            primary,
            backup,
        };
        let better = best
            .as_ref()
            .map_or(true, |current| Cost(pair.cost()) < Cost(current.cost()));
        if better {
            best = Some(pair);
        }
    }
    best
}
