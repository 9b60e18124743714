//! Yen's k-shortest loopless paths.

use super::super::graph::{TopologyGraph, VertexId};
use super::super::weight::LinkWeigher;
use super::{Cost, GraphPath, SearchMask, ShortestPaths};

/// Up to `k` loopless paths from `source` to `target` in ascending cost
/// order. Ties keep the shorter path first, then the lower edge indices.
pub fn k_shortest(
    graph: &TopologyGraph,
    source: VertexId,
    target: VertexId,
    weigher: &dyn LinkWeigher,
    k: usize,
) -> Vec<GraphPath> {
    if k == 0 {
        return Vec::new();
    }
    let Some(first) = ShortestPaths::search(graph, source, weigher, None).first_path(graph, target)
    else {
        return Vec::new();
    };

    let mut accepted = vec![first];
    let mut candidates: Vec<GraphPath> = Vec::new();

    while accepted.len() < k {
        let previous = accepted[accepted.len() - 1].clone();
        let previous_vertices = previous.vertices(graph, source);

        for spur_index in 0..previous.edges.len() {
            let spur = previous_vertices[spur_index];
            let root = &previous.edges[..spur_index];

            let mut mask = SearchMask::new(graph);
            for path in &accepted {
                if path.edges.len() > spur_index && &path.edges[..spur_index] == root {
                    mask.block_edge(path.edges[spur_index]);
                }
            }
            for vertex in &previous_vertices[..spur_index] {
                mask.block_vertex(*vertex);
            }

            let Some(spur_path) = ShortestPaths::search(graph, spur, weigher, Some(&mask))
                .first_path(graph, target)
            else {
                continue;
            };
            let mut edges = root.to_vec();
            edges.extend(spur_path.edges);
            let Some(candidate) = GraphPath::priced(graph, edges, weigher) else {
                continue;
            };
            let known = accepted
                .iter()
                .chain(candidates.iter())
                .any(|path| path.edges == candidate.edges);
            if !known {
                candidates.push(candidate);
            }
        }

        let best = candidates
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                Cost(a.cost)
                    .cmp(&Cost(b.cost))
                    .then(a.edges.len().cmp(&b.edges.len()))
                    .then_with(|| a.edges.cmp(&b.edges))
            })
            .map(|(idx, _)| idx);
        match best {
            Some(idx) => accepted.push(candidates.swap_remove(idx)),
            None => break,
        }
    }
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{ConnectPoint, DeviceId, Link};
    use crate::topology::weight::HopCountWeigher;
    use std::collections::BTreeSet;

    fn link(s: &str, sp: u64, d: &str, dp: u64) -> Link {
        Link::direct(ConnectPoint::new(s, sp), ConnectPoint::new(d, dp))
    }

    // a-b-d, a-c-d, a-d through e and f (three hops).
    fn graph() -> TopologyGraph {
        let links: BTreeSet<Link> = [
            link("a", 1, "b", 1),
            link("b", 2, "d", 1),
            link("a", 2, "c", 1),
            link("c", 2, "d", 2),
            link("a", 3, "e", 1),
            link("e", 2, "f", 1),
            link("f", 2, "d", 3),
        ]
        .into_iter()
        .collect();
        TopologyGraph::new(&BTreeSet::new(), &links)
    }

    fn vid(graph: &TopologyGraph, id: &str) -> VertexId {
        graph.vertex(&DeviceId::from(id)).unwrap()
    }

    #[test]
    fn returns_paths_in_cost_order() {
        let graph = graph();
        let weigher = HopCountWeigher::new(graph.vertex_count());
        let paths = k_shortest(&graph, vid(&graph, "a"), vid(&graph, "d"), &weigher, 5);
        let costs: Vec<f64> = paths.iter().map(|path| path.cost).collect();
        assert_eq!(costs, vec![2.0, 2.0, 3.0]);
    }

    #[test]
    fn limits_and_unreachable_targets() {
        let graph = graph();
        let weigher = HopCountWeigher::new(graph.vertex_count());
        assert_eq!(
            k_shortest(&graph, vid(&graph, "a"), vid(&graph, "d"), &weigher, 1).len(),
            1
        );
        assert!(k_shortest(&graph, vid(&graph, "d"), vid(&graph, "a"), &weigher, 3).is_empty());
        assert!(k_shortest(&graph, vid(&graph, "a"), vid(&graph, "d"), &weigher, 0).is_empty());
    }
}
