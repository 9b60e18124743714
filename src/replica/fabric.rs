use super::map::{EventuallyConsistentMap, Replicator, UpdateEntry};
use crate::config::DeliveryMode;
use crate::identity::NodeId;
use crate::util::error::ReplicationError;
use log::{debug, info};
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::collections::VecDeque;
use std::fmt::{self, Debug};
use std::hash::Hash;
use std::sync::{Arc, Weak};

/// In-process transport joining the replicas of one named map.
///
/// Members are held weakly; a dropped replica silently leaves the fabric.
/// Every update is offered to every member, including its origin, which
/// discards the echo.
pub struct ReplicationFabric<K, V> {
    name: String,
    mode: DeliveryMode,
    members: Mutex<Vec<(NodeId, Weak<EventuallyConsistentMap<K, V>>)>>,
    pending: Mutex<VecDeque<UpdateEntry<K, V>>>,
    rng: Mutex<ChaCha20Rng>,
}

impl<K, V> ReplicationFabric<K, V>
where
    K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, mode: DeliveryMode, seed: u64) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            mode,
            members: Mutex::new(Vec::new()),
            pending: Mutex::new(VecDeque::new()),
            rng: Mutex::new(ChaCha20Rng::seed_from_u64(seed)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn join(
        self: &Arc<Self>,
        replica: &Arc<EventuallyConsistentMap<K, V>>,
    ) -> Result<(), ReplicationError> {
        let node = replica.origin().clone();
        {
            let mut members = self.members.lock();
            members.retain(|(_, weak)| weak.strong_count() > 0);
            if members.iter().any(|(member, _)| *member == node) {
                return Err(ReplicationError::DuplicateMember {
                    map: self.name.clone(),
                    node,
                });
            }
            members.push((node.clone(), Arc::downgrade(replica)));
        }
        let replicator: Arc<dyn Replicator<K, V>> = self.clone();
        replica.attach(replicator);
        info!(
            "event=fabric_join map={} node={} mode={:?}",
            self.name, node, self.mode
        );
        Ok(())
    }

    pub fn leave(&self, node: &NodeId) -> Result<(), ReplicationError> {
        let removed = {
            let mut members = self.members.lock();
            let position = members.iter().position(|(member, _)| member == node);
            position.map(|idx| members.remove(idx))
        };
        let (_, weak) = removed.ok_or_else(|| ReplicationError::UnknownMember {
            map: self.name.clone(),
            node: node.clone(),
        })?;
        if let Some(replica) = weak.upgrade() {
            replica.detach();
        }
        info!("event=fabric_leave map={} node={}", self.name, node);
        Ok(())
    }

    pub fn members(&self) -> Vec<NodeId> {
        self.live_members()
            .into_iter()
            .map(|(node, _)| node)
            .collect()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Flushes queued updates to all members. Returns the number of updates
    /// delivered.
    pub fn deliver_pending(&self) -> usize {
        let drained: Vec<UpdateEntry<K, V>> = self.pending.lock().drain(..).collect();
        let count = drained.len();
        for update in drained {
            self.fan_out(update);
        }
        if count > 0 {
            debug!(
                "event=fabric_flush map={} delivered={}",
                self.name, count
            );
        }
        count
    }

    /// Discards queued updates, modelling messages lost in transit. Only
    /// anti-entropy can repair the resulting divergence.
    pub fn drop_pending(&self) -> usize {
        let mut pending = self.pending.lock();
        let count = pending.len();
        pending.clear();
        count
    }

    /// Reconciles `node` with one randomly chosen peer in both directions.
    /// Returns the number of entries adopted across the pair.
    pub fn anti_entropy_round(&self, node: &NodeId) -> Result<usize, ReplicationError> {
        let members = self.live_members();
        let local = members
            .iter()
            .find(|(member, _)| member == node)
            .map(|(_, replica)| Arc::clone(replica))
            .ok_or_else(|| ReplicationError::UnknownMember {
                map: self.name.clone(),
                node: node.clone(),
            })?;
        let peers: Vec<&(NodeId, Arc<EventuallyConsistentMap<K, V>>)> = members
            .iter()
            .filter(|(member, _)| member != node)
            .collect();
        if peers.is_empty() {
            return Ok(0);
        }
        let pick = self.rng.lock().gen_range(0..peers.len());
        let (peer_id, peer) = peers[pick];
        let pulled = local.reconcile_from(peer);
        let pushed = peer.reconcile_from(&local);
        debug!(
            "event=fabric_anti_entropy map={} node={} peer={} pulled={} pushed={}",
            self.name, node, peer_id, pulled, pushed
        );
        Ok(pulled + pushed)
    }

    fn live_members(&self) -> Vec<(NodeId, Arc<EventuallyConsistentMap<K, V>>)> {
        self.members
            .lock()
            .iter()
            .filter_map(|(node, weak)| weak.upgrade().map(|replica| (node.clone(), replica)))
            .collect()
    }

    fn fan_out(&self, update: UpdateEntry<K, V>) {
        for (_, replica) in self.live_members() {
            replica.apply(update.clone());
        }
    }
}

impl<K, V> Replicator<K, V> for ReplicationFabric<K, V>
where
    K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn publish(&self, update: UpdateEntry<K, V>) {
        match self.mode {
            DeliveryMode::Immediate => self.fan_out(update),
            DeliveryMode::Queued => self.pending.lock().push_back(update),
        }
    }
}

impl<K, V> fmt::Debug for ReplicationFabric<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicationFabric")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("members", &self.members.lock().len())
            .field("pending", &self.pending.lock().len())
            .finish()
    }
}
