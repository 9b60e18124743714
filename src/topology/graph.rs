//! Arena graph: vertices and edges live in vectors and refer to each other
//! by dense index.

use crate::identity::{DeviceId, Link};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VertexId(pub(crate) usize);

impl VertexId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeId(pub(crate) usize);

impl EdgeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyEdge {
    pub src: VertexId,
    pub dst: VertexId,
    pub link: Link,
}

#[derive(Debug, Clone, Default)]
pub struct TopologyGraph {
    vertices: Vec<DeviceId>,
    index: HashMap<DeviceId, VertexId>,
    edges: Vec<TopologyEdge>,
    outgoing: Vec<Vec<EdgeId>>,
    synthesized: usize,
}

impl TopologyGraph {
    /// Builds the graph from a device set and a link set. Devices referenced
    /// only by a link get a vertex anyway. Vertex indices follow device id
    /// order, so the lowest index in any vertex set is its smallest id.
    pub fn new(devices: &BTreeSet<DeviceId>, links: &BTreeSet<Link>) -> Self {
        let mut all: BTreeSet<&DeviceId> = devices.iter().collect();
        for link in links {
            all.insert(&link.src.device_id);
            all.insert(&link.dst.device_id);
        }
        let synthesized = all.len() - devices.len();
        let vertices: Vec<DeviceId> = all.into_iter().cloned().collect();
        let index: HashMap<DeviceId, VertexId> = vertices
            .iter()
            .enumerate()
            .map(|(idx, device)| (device.clone(), VertexId(idx)))
            .collect();

        let mut outgoing = vec![Vec::new(); vertices.len()];
        let mut edges = Vec::with_capacity(links.len());
        for link in links {
            let src = index[&link.src.device_id];
            let dst = index[&link.dst.device_id];
            let id = EdgeId(edges.len());
            outgoing[src.0].push(id);
            edges.push(TopologyEdge {
                src,
                dst,
                link: link.clone(),
            });
        }
        Self {
            vertices,
            index,
            edges,
            outgoing,
            synthesized,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Vertices created for devices that appeared only as link endpoints.
    pub fn synthesized_vertices(&self) -> usize {
        self.synthesized
    }

    pub fn vertex(&self, device: &DeviceId) -> Option<VertexId> {
        self.index.get(device).copied()
    }

    pub fn device(&self, vertex: VertexId) -> &DeviceId {
        &self.vertices[vertex.0]
    }

    pub fn devices(&self) -> &[DeviceId] {
        &self.vertices
    }

    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId> {
        (0..self.vertices.len()).map(VertexId)
    }

    pub fn edge(&self, edge: EdgeId) -> &TopologyEdge {
        &self.edges[edge.0]
    }

    pub fn edges(&self) -> &[TopologyEdge] {
        &self.edges
    }

    pub fn outgoing(&self, vertex: VertexId) -> &[EdgeId] {
        &self.outgoing[vertex.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::ConnectPoint;

    #[test]
    fn link_endpoints_become_vertices() {
        let devices: BTreeSet<DeviceId> = [DeviceId::from("b")].into_iter().collect();
        let links: BTreeSet<Link> = [Link::direct(
            ConnectPoint::new("b", 1),
            ConnectPoint::new("a", 1),
        )]
        .into_iter()
        .collect();
        let graph = TopologyGraph::new(&devices, &links);
        assert_eq!(graph.vertex_count(), 2);
        assert_eq!(graph.synthesized_vertices(), 1);
        let a = graph.vertex(&DeviceId::from("a")).unwrap();
        let b = graph.vertex(&DeviceId::from("b")).unwrap();
        assert!(a < b);
        assert_eq!(graph.outgoing(b).len(), 1);
        assert!(graph.outgoing(a).is_empty());
        assert_eq!(graph.edge(graph.outgoing(b)[0]).dst, a);
    }
}
