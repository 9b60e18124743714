//! Single-source multi-path shortest path search.

use super::super::graph::{EdgeId, TopologyGraph, VertexId};
use super::super::weight::{viable_cost, LinkWeigher};
use super::{Cost, GraphPath, SearchMask, COST_EPSILON};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Costs and equal-cost parent edges from one source to every reachable
/// vertex.
#[derive(Debug, Clone)]
pub struct ShortestPaths {
    source: VertexId,
    costs: Vec<Option<f64>>,
    parents: Vec<Vec<EdgeId>>,
}

impl ShortestPaths {
    /// Dijkstra that keeps every parent edge reaching a vertex within
    /// [`COST_EPSILON`] of its best cost.
    pub fn search(
        graph: &TopologyGraph,
        source: VertexId,
        weigher: &dyn LinkWeigher,
        mask: Option<&SearchMask>,
    ) -> Self {
        let n = graph.vertex_count();
        let mut costs: Vec<Option<f64>> = vec![None; n];
        let mut parents: Vec<Vec<EdgeId>> = vec![Vec::new(); n];
        let mut heap = BinaryHeap::new();
        costs[source.0] = Some(0.0);
        heap.push(Reverse((Cost(0.0), source)));

        while let Some(Reverse((Cost(cost), vertex))) = heap.pop() {
            match costs[vertex.0] {
                Some(best) if cost > best + COST_EPSILON => continue,
                _ => {}
            }
            for &edge_id in graph.outgoing(vertex) {
                if mask.is_some_and(|mask| mask.blocks_edge(edge_id)) {
                    continue;
                }
                let edge = graph.edge(edge_id);
                if edge.dst == source || mask.is_some_and(|mask| mask.blocks_vertex(edge.dst)) {
                    continue;
                }
                let Some(weight) = viable_cost(weigher, &edge.link) else {
                    continue;
                };
                let candidate = cost + weight;
                match costs[edge.dst.0] {
                    Some(current) if (candidate - current).abs() <= COST_EPSILON => {
                        if !parents[edge.dst.0].contains(&edge_id) {
                            parents[edge.dst.0].push(edge_id);
                        }
                    }
                    Some(current) if candidate > current => {}
                    _ => {
                        costs[edge.dst.0] = Some(candidate);
                        parents[edge.dst.0] = vec![edge_id];
                        heap.push(Reverse((Cost(candidate), edge.dst)));
                    }
                }
            }
        }

        Self {
            source,
            costs,
            parents,
        }
    }

    pub fn source(&self) -> VertexId {
        self.source
    }

    pub fn cost(&self, target: VertexId) -> Option<f64> {
        self.costs.get(target.0).copied().flatten()
    }

    pub fn parents(&self, target: VertexId) -> &[EdgeId] {
        &self.parents[target.0]
    }

    /// Enumerates minimum-cost loopless paths to `target`, stopping after
    /// `limit` when one is given. A search whose source is `target` yields a
    /// single empty path.
    pub fn paths_to(
        &self,
        graph: &TopologyGraph,
        target: VertexId,
        limit: Option<usize>,
    ) -> Vec<GraphPath> {
        let Some(cost) = self.cost(target) else {
            return Vec::new();
        };
        let limit = limit.unwrap_or(usize::MAX);
        if limit == 0 {
            return Vec::new();
        }

        let mut found = Vec::new();
        let mut on_path = vec![false; graph.vertex_count()];
        // Edges walked backwards from the target; one per frame past the first.
        let mut reversed: Vec<EdgeId> = Vec::new();
        let mut frames: Vec<(VertexId, usize)> = vec![(target, 0)];
        on_path[target.0] = true;

        while let Some(frame) = frames.last_mut() {
            let (vertex, pos) = *frame;
            if vertex == self.source {
                found.push(GraphPath {
                    edges: reversed.iter().rev().copied().collect(),
                    cost,
                });
                if found.len() >= limit {
                    break;
                }
                frames.pop();
                on_path[vertex.0] = false;
                reversed.pop();
                continue;
            }
            let parents = &self.parents[vertex.0];
            if pos < parents.len() {
                frame.1 += 1;
                let edge_id = parents[pos];
                let previous = graph.edge(edge_id).src;
                if on_path[previous.0] {
                    continue;
                }
                on_path[previous.0] = true;
                reversed.push(edge_id);
                frames.push((previous, 0));
            } else {
                frames.pop();
                on_path[vertex.0] = false;
                reversed.pop();
            }
        }
        found
    }

    /// First minimum-cost path to `target`, if any.
    pub fn first_path(&self, graph: &TopologyGraph, target: VertexId) -> Option<GraphPath> {
        self.paths_to(graph, target, Some(1)).into_iter().next()
    }
}
