//! Graph searches over a [`TopologyGraph`](super::graph::TopologyGraph).

pub mod dijkstra;
pub mod disjoint;
pub mod tarjan;
pub mod yen;

use super::graph::{EdgeId, TopologyGraph, VertexId};
use super::weight::{viable_cost, LinkWeigher};
use std::cmp::Ordering;

pub use dijkstra::ShortestPaths;
pub use disjoint::{disjoint_pair, srlg_disjoint_pair, DisjointPair, RiskProfile};
pub use tarjan::{strongly_connected, SccResult};
pub use yen::k_shortest;

/// Costs within this distance are equal.
pub const COST_EPSILON: f64 = 1e-9;

/// Totally ordered cost for heap keys.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Cost(pub(crate) f64);

impl PartialEq for Cost {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Cost {}

impl PartialOrd for Cost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cost {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Edge sequence with its total cost, still in graph indices.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphPath {
    pub edges: Vec<EdgeId>,
    pub cost: f64,
}

impl GraphPath {
    /// Vertices along the path, starting at `source`.
    pub fn vertices(&self, graph: &TopologyGraph, source: VertexId) -> Vec<VertexId> {
        let mut vertices = Vec::with_capacity(self.edges.len() + 1);
        vertices.push(source);
        vertices.extend(self.edges.iter().map(|edge| graph.edge(*edge).dst));
        vertices
    }

    /// Sums the weigher's cost over the edges; `None` if any edge is not viable.
    pub fn priced(graph: &TopologyGraph, edges: Vec<EdgeId>, weigher: &dyn LinkWeigher) -> Option<Self> {
        let mut cost = 0.0;
        for edge in &edges {
            cost += viable_cost(weigher, &graph.edge(*edge).link)?;
        }
        Some(Self { edges, cost })
    }
}

/// Edges and vertices a search must not traverse.
#[derive(Debug, Clone)]
pub struct SearchMask {
    edges: Vec<bool>,
    vertices: Vec<bool>,
}

impl SearchMask {
    pub fn new(graph: &TopologyGraph) -> Self {
        Self {
            edges: vec![false; graph.edge_count()],
            vertices: vec![false; graph.vertex_count()],
        }
    }

    pub fn block_edge(&mut self, edge: EdgeId) {
        self.edges[edge.0] = true;
    }

    pub fn block_vertex(&mut self, vertex: VertexId) {
        self.vertices[vertex.0] = true;
    }

    pub fn blocks_edge(&self, edge: EdgeId) -> bool {
        self.edges[edge.0]
    }

    pub fn blocks_vertex(&self, vertex: VertexId) -> bool {
        self.vertices[vertex.0]
    }
}
