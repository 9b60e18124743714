use crate::identity::{Link, LinkType};

/// Assigns a traversal cost to a link. `None` marks the link non-viable;
/// negative or NaN costs are treated the same way.
pub trait LinkWeigher: Send + Sync {
    fn weight(&self, link: &Link) -> Option<f64>;
}

impl<F> LinkWeigher for F
where
    F: Fn(&Link) -> Option<f64> + Send + Sync,
{
    fn weight(&self, link: &Link) -> Option<f64> {
        self(link)
    }
}

pub(crate) fn viable_cost(weigher: &dyn LinkWeigher, link: &Link) -> Option<f64> {
    weigher
        .weight(link)
        .filter(|cost| cost.is_finite() && *cost >= 0.0)
}

/// Default weight: one per direct hop, and the vertex count per indirect
/// hop, so an indirect link is used only when no direct-only path exists.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HopCountWeigher {
    indirect_cost: f64,
}

impl HopCountWeigher {
    pub fn new(vertex_count: usize) -> Self {
        Self {
            indirect_cost: vertex_count.max(1) as f64,
        }
    }
}

impl LinkWeigher for HopCountWeigher {
    fn weight(&self, link: &Link) -> Option<f64> {
        match link.link_type {
            LinkType::Direct => Some(1.0),
            LinkType::Indirect => Some(self.indirect_cost),
        }
    }
}

/// Clustering weight: direct links only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoIndirectWeigher;

impl LinkWeigher for NoIndirectWeigher {
    fn weight(&self, link: &Link) -> Option<f64> {
        match link.link_type {
            LinkType::Direct => Some(1.0),
            LinkType::Indirect => None,
        }
    }
}
