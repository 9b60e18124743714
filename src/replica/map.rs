use super::clock::{LogicalClock, Timestamp};
use crate::event::{ListenerId, ListenerRegistry};
use crate::identity::NodeId;
use log::{debug, trace};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::hash::Hash;
use std::sync::Arc;

/// One replicated write. `value == None` is a tombstone.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateEntry<K, V> {
    pub key: K,
    pub value: Option<V>,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOrigin {
    Local,
    Remote(NodeId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapEvent<K, V> {
    pub key: K,
    pub previous: Option<V>,
    pub current: Option<V>,
    pub origin: EventOrigin,
}

/// Outbound side of a replica; implemented by the transport joining peers.
pub trait Replicator<K, V>: Send + Sync {
    fn publish(&self, update: UpdateEntry<K, V>);
}

#[derive(Debug, Clone)]
struct Versioned<V> {
    value: Option<V>,
    timestamp: Timestamp,
}

/// Eventually consistent, last-writer-wins map replica.
///
/// Local writes are visible to `get` before `put` returns; remote writes
/// arrive through [`EventuallyConsistentMap::apply`] and win only when their
/// timestamp is newer than the stored one. Removals leave tombstones so a
/// delayed older put cannot resurrect the key.
pub struct EventuallyConsistentMap<K, V> {
    name: String,
    clock: LogicalClock,
    entries: RwLock<HashMap<K, Versioned<V>>>,
    listeners: ListenerRegistry<MapEvent<K, V>>,
    replicator: RwLock<Option<Arc<dyn Replicator<K, V>>>>,
}

impl<K, V> EventuallyConsistentMap<K, V>
where
    K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, origin: NodeId) -> Self {
        Self {
            name: name.into(),
            clock: LogicalClock::new(origin),
            entries: RwLock::new(HashMap::new()),
            listeners: ListenerRegistry::new(),
            replicator: RwLock::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn origin(&self) -> &NodeId {
        self.clock.origin()
    }

    pub fn attach(&self, replicator: Arc<dyn Replicator<K, V>>) {
        *self.replicator.write() = Some(replicator);
    }

    pub fn detach(&self) {
        self.replicator.write().take();
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.entries
            .read()
            .get(key)
            .and_then(|versioned| versioned.value.clone())
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> Vec<K> {
        self.entries
            .read()
            .iter()
            .filter(|(_, versioned)| versioned.value.is_some())
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .values()
            .filter(|versioned| versioned.value.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn timestamp_of(&self, key: &K) -> Option<Timestamp> {
        self.entries
            .read()
            .get(key)
            .map(|versioned| versioned.timestamp.clone())
    }

    pub fn put(&self, key: K, value: V) -> Timestamp {
        self.write_local(key, Some(value))
    }

    /// Removes `key`, returning the value it held. Absent keys are left alone.
    pub fn remove(&self, key: &K) -> Option<V> {
        let previous = self.get(key)?;
        self.write_local(key.clone(), None);
        Some(previous)
    }

    fn write_local(&self, key: K, value: Option<V>) -> Timestamp {
        let (timestamp, previous) = {
            let mut entries = self.entries.write();
            // Stamped under the lock so it is newer than every stored entry.
            let timestamp = self.clock.tick();
            let previous = entries
                .insert(
                    key.clone(),
                    Versioned {
                        value: value.clone(),
                        timestamp: timestamp.clone(),
                    },
                )
                .and_then(|versioned| versioned.value);
            (timestamp, previous)
        };
        trace!(
            "event=ecmap_local_write map={} key={:?} tombstone={} ts={}",
            self.name,
            key,
            value.is_none(),
            timestamp
        );
        self.listeners.post(&MapEvent {
            key: key.clone(),
            previous,
            current: value.clone(),
            origin: EventOrigin::Local,
        });
        let replicator = self.replicator.read().clone();
        if let Some(replicator) = replicator {
            replicator.publish(UpdateEntry {
                key,
                value,
                timestamp: timestamp.clone(),
            });
        }
        timestamp
    }

    /// Applies an update received from a peer. Returns `true` when the update
    /// replaced local state. Updates that originated here are echoes and are
    /// dropped without notifying listeners.
    pub fn apply(&self, update: UpdateEntry<K, V>) -> bool {
        if &update.timestamp.origin == self.origin() {
            trace!(
                "event=ecmap_echo_suppressed map={} key={:?} ts={}",
                self.name,
                update.key,
                update.timestamp
            );
            return false;
        }
        let previous = {
            let mut entries = self.entries.write();
            self.clock.observe(&update.timestamp);
            match entries.get(&update.key) {
                Some(existing) if !update.timestamp.is_newer_than(&existing.timestamp) => {
                    debug!(
                        "event=ecmap_remote_stale map={} key={:?} local_ts={} remote_ts={}",
                        self.name, update.key, existing.timestamp, update.timestamp
                    );
                    return false;
                }
                _ => {}
            }
            entries
                .insert(
                    update.key.clone(),
                    Versioned {
                        value: update.value.clone(),
                        timestamp: update.timestamp.clone(),
                    },
                )
                .and_then(|versioned| versioned.value)
        };
        if previous.is_none() && update.value.is_none() {
            return true;
        }
        self.listeners.post(&MapEvent {
            key: update.key,
            previous,
            current: update.value,
            origin: EventOrigin::Remote(update.timestamp.origin),
        });
        true
    }

    /// Every entry including tombstones, as used by anti-entropy exchanges.
    pub fn updates(&self) -> Vec<UpdateEntry<K, V>> {
        self.entries
            .read()
            .iter()
            .map(|(key, versioned)| UpdateEntry {
                key: key.clone(),
                value: versioned.value.clone(),
                timestamp: versioned.timestamp.clone(),
            })
            .collect()
    }

    /// Pulls every entry from `peer` that is newer than ours. Returns the
    /// number of entries adopted.
    pub fn reconcile_from(&self, peer: &EventuallyConsistentMap<K, V>) -> usize {
        peer.updates()
            .into_iter()
            .filter(|update| self.apply(update.clone()))
            .count()
    }

    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&MapEvent<K, V>) + Send + Sync + 'static,
    {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }
}

impl<K, V> fmt::Debug for EventuallyConsistentMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventuallyConsistentMap")
            .field("name", &self.name)
            .field("origin", self.clock.origin())
            .field("entries", &self.entries.read().len())
            .finish()
    }
}
