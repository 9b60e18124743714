use crate::identity::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Write timestamp for last-writer-wins resolution. Ordered by counter first
/// and origin second, so two writers never produce equal timestamps.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub counter: u64,
    pub origin: NodeId,
}

impl Timestamp {
    pub fn new(counter: u64, origin: impl Into<NodeId>) -> Self {
        Self {
            counter,
            origin: origin.into(),
        }
    }

    pub fn is_newer_than(&self, other: &Timestamp) -> bool {
        self > other
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.counter, self.origin)
    }
}

/// Lamport clock owned by one replica.
#[derive(Debug)]
pub struct LogicalClock {
    origin: NodeId,
    counter: AtomicU64,
}

impl LogicalClock {
    pub fn new(origin: NodeId) -> Self {
        Self {
            origin,
            counter: AtomicU64::new(0),
        }
    }

    pub fn origin(&self) -> &NodeId {
        &self.origin
    }

    /// Issues a timestamp newer than every timestamp issued or observed so far.
    pub fn tick(&self) -> Timestamp {
        let counter = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Timestamp {
            counter,
            origin: self.origin.clone(),
        }
    }

    pub fn observe(&self, remote: &Timestamp) {
        self.counter.fetch_max(remote.counter, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observed_remote_time_pushes_local_ticks_forward() {
        let clock = LogicalClock::new(NodeId::from("a"));
        let first = clock.tick();
        clock.observe(&Timestamp::new(40, "b"));
        let second = clock.tick();
        assert_eq!(second.counter, 41);
        assert!(second.is_newer_than(&first));
        assert!(second.is_newer_than(&Timestamp::new(40, "b")));
    }

    #[test]
    fn origin_breaks_counter_ties() {
        assert!(Timestamp::new(3, "b").is_newer_than(&Timestamp::new(3, "a")));
        assert!(!Timestamp::new(3, "a").is_newer_than(&Timestamp::new(3, "a")));
    }
}
