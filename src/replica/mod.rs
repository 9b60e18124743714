//! Eventually consistent replicated maps.
//!
//! Consistency level: eventual, last-writer-wins per key, ordered by Lamport
//! timestamps tagged with the writing node. There is no locking across
//! nodes; concurrent writes to one key converge on the highest timestamp
//! once every replica has seen both.

pub mod clock;
pub mod fabric;
pub mod map;

pub use clock::{LogicalClock, Timestamp};
pub use fabric::ReplicationFabric;
pub use map::{EventOrigin, EventuallyConsistentMap, MapEvent, Replicator, UpdateEntry};
