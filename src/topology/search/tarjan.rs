//! Iterative Tarjan strongly-connected-components search.

use super::super::graph::{EdgeId, TopologyGraph, VertexId};
use super::super::weight::{viable_cost, LinkWeigher};

#[derive(Debug, Clone, Default)]
pub struct SccResult {
    /// Components in ascending order of their lowest vertex.
    pub components: Vec<Vec<VertexId>>,
    /// Viable edges whose endpoints share a component, per component.
    pub component_edges: Vec<Vec<EdgeId>>,
    /// Component index per vertex.
    pub membership: Vec<usize>,
}

const UNVISITED: usize = usize::MAX;

/// Partitions the graph into strongly connected components, traversing only
/// edges `weigher` considers viable. Every vertex lands in exactly one
/// component; isolated vertices form singletons.
pub fn strongly_connected(graph: &TopologyGraph, weigher: &dyn LinkWeigher) -> SccResult {
    let n = graph.vertex_count();
    let viable: Vec<bool> = graph
        .edges()
        .iter()
        .map(|edge| viable_cost(weigher, &edge.link).is_some())
        .collect();

    let mut order = vec![UNVISITED; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut membership = vec![UNVISITED; n];
    let mut found: Vec<Vec<VertexId>> = Vec::new();
    let mut counter = 0usize;

    for start in 0..n {
        if order[start] != UNVISITED {
            continue;
        }
        // Explicit call stack of (vertex, next outgoing edge position).
        let mut frames: Vec<(usize, usize)> = Vec::new();
        order[start] = counter;
        lowlink[start] = counter;
        counter += 1;
        stack.push(start);
        on_stack[start] = true;
        frames.push((start, 0));

        while let Some(frame) = frames.last_mut() {
            let (v, pos) = *frame;
            let outgoing = graph.outgoing(VertexId(v));
            if pos < outgoing.len() {
                frame.1 += 1;
                let edge_id = outgoing[pos];
                if !viable[edge_id.0] {
                    continue;
                }
                let w = graph.edge(edge_id).dst.0;
                if order[w] == UNVISITED {
                    order[w] = counter;
                    lowlink[w] = counter;
                    counter += 1;
                    stack.push(w);
                    on_stack[w] = true;
                    frames.push((w, 0));
                } else if on_stack[w] {
                    lowlink[v] = lowlink[v].min(order[w]);
                }
                continue;
            }

            frames.pop();
            if let Some(&(parent, _)) = frames.last() {
                lowlink[parent] = lowlink[parent].min(lowlink[v]);
            }
            if lowlink[v] == order[v] {
                let mut component = Vec::new();
                while let Some(w) = stack.pop() {
                    on_stack[w] = false;
                    component.push(VertexId(w));
                    if w == v {
                        break;
                    }
                }
                component.sort();
                found.push(component);
            }
        }
    }

    found.sort_by_key(|component| component[0]);
    for (idx, component) in found.iter().enumerate() {
        for vertex in component {
            membership[vertex.0] = idx;
        }
    }
    let mut component_edges = vec![Vec::new(); found.len()];
    for (idx, edge) in graph.edges().iter().enumerate() {
        if !viable[idx] {
            continue;
        }
        let component = membership[edge.src.0];
        if component == membership[edge.dst.0] {
            component_edges[component].push(EdgeId(idx));
        }
    }

    SccResult {
        components: found,
        component_edges,
        membership,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{ConnectPoint, DeviceId, Link};
    use crate::topology::weight::NoIndirectWeigher;
    use std::collections::BTreeSet;

    fn bidirectional(a: &str, b: &str) -> Vec<Link> {
        let forward = Link::direct(ConnectPoint::new(a, 1), ConnectPoint::new(b, 1));
        vec![forward.reversed(), forward]
    }

    fn graph(devices: &[&str], links: Vec<Link>) -> TopologyGraph {
        let devices: BTreeSet<DeviceId> = devices.iter().map(|d| DeviceId::from(*d)).collect();
        TopologyGraph::new(&devices, &links.into_iter().collect())
    }

    #[test]
    fn ring_and_isolated_vertex() {
        let mut links = bidirectional("a", "b");
        links.extend(bidirectional("b", "c"));
        links.extend(bidirectional("c", "a"));
        let graph = graph(&["a", "b", "c", "d"], links);
        let result = strongly_connected(&graph, &NoIndirectWeigher);
        assert_eq!(result.components.len(), 2);
        assert_eq!(result.components[0].len(), 3);
        assert_eq!(result.component_edges[0].len(), 6);
        assert_eq!(result.components[1], vec![VertexId(3)]);
        assert!(result.component_edges[1].is_empty());
    }

    #[test]
    fn one_way_links_split_components() {
        let links = vec![
            Link::direct(ConnectPoint::new("a", 1), ConnectPoint::new("b", 1)),
            Link::direct(ConnectPoint::new("b", 2), ConnectPoint::new("c", 1)),
        ];
        let graph = graph(&["a", "b", "c"], links);
        let result = strongly_connected(&graph, &NoIndirectWeigher);
        assert_eq!(result.components.len(), 3);
        assert!(result.component_edges.iter().all(|edges| edges.is_empty()));
    }

    #[test]
    fn indirect_links_do_not_join_components() {
        let forward = Link::indirect(ConnectPoint::new("a", 1), ConnectPoint::new("b", 1));
        let graph = graph(&["a", "b"], vec![forward.reversed(), forward]);
        let result = strongly_connected(&graph, &NoIndirectWeigher);
        assert_eq!(result.components.len(), 2);
    }

    #[test]
    fn deep_chains_do_not_recurse() {
        let names: Vec<String> = (0..5000).map(|i| format!("d{i:05}")).collect();
        let mut links = Vec::new();
        for pair in names.windows(2) {
            links.extend(bidirectional(&pair[0], &pair[1]));
        }
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let graph = graph(&refs, links);
        let result = strongly_connected(&graph, &NoIndirectWeigher);
        assert_eq!(result.components.len(), 1);
        assert_eq!(result.component_edges[0].len(), 2 * 4999);
    }
}
