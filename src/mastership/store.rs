use super::role::RoleValue;
use crate::identity::{DeviceId, NodeId};
use crate::replica::EventuallyConsistentMap;
use crate::util::error::MastershipError;
use dashmap::DashMap;
use log::error;
use parking_lot::Mutex;
use std::sync::Arc;

pub const ROLE_MAP_NAME: &str = "mastership-roles";
pub const TERM_MAP_NAME: &str = "mastership-terms";

/// Replicated role and term maps for one node, with a single-writer critical
/// section per device.
#[derive(Debug)]
pub struct RoleStore {
    local: NodeId,
    roles: Arc<EventuallyConsistentMap<DeviceId, RoleValue>>,
    terms: Arc<EventuallyConsistentMap<DeviceId, u64>>,
    locks: DashMap<DeviceId, Arc<Mutex<()>>>,
}

/// Outcome of a role transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition<T> {
    pub output: T,
    pub value: RoleValue,
    pub term: u64,
}

impl RoleStore {
    pub fn new(local: NodeId) -> Self {
        Self {
            roles: Arc::new(EventuallyConsistentMap::new(ROLE_MAP_NAME, local.clone())),
            terms: Arc::new(EventuallyConsistentMap::new(TERM_MAP_NAME, local.clone())),
            locks: DashMap::new(),
            local,
        }
    }

    pub fn local_node(&self) -> &NodeId {
        &self.local
    }

    /// Role replica, for joining a replication fabric.
    pub fn roles_map(&self) -> &Arc<EventuallyConsistentMap<DeviceId, RoleValue>> {
        &self.roles
    }

    /// Term replica, for joining a replication fabric.
    pub fn terms_map(&self) -> &Arc<EventuallyConsistentMap<DeviceId, u64>> {
        &self.terms
    }

    pub fn role_value(&self, device: &DeviceId) -> RoleValue {
        self.roles.get(device).unwrap_or_default()
    }

    pub fn term(&self, device: &DeviceId) -> u64 {
        self.terms.get(device).unwrap_or(0)
    }

    pub fn devices(&self) -> Vec<DeviceId> {
        self.roles.keys()
    }

    /// Runs `mutate` against a working copy of the device's role value and
    /// term while holding the device's lock. The copy is written back only
    /// when `mutate` succeeds and the result passes the invariant check; a
    /// corrupt stored value aborts the transaction before `mutate` runs.
    pub fn transact<T, F>(
        &self,
        device: &DeviceId,
        mutate: F,
    ) -> Result<Transition<T>, MastershipError>
    where
        F: FnOnce(&mut RoleValue, &mut u64) -> T,
    {
        let lock = self.device_lock(device);
        let _guard = lock.lock();

        let stored = self.roles.get(device);
        let stored_term = self.terms.get(device);
        let mut value = stored.clone().unwrap_or_default();
        let mut term = stored_term.unwrap_or(0);
        if let Err(err) = value.check(device) {
            error!(
                "event=mastership_invariant_violation phase=load device={} node={} error={}",
                device, self.local, err
            );
            return Err(err);
        }

        let output = mutate(&mut value, &mut term);
        if let Err(err) = value.check(device) {
            error!(
                "event=mastership_invariant_violation phase=commit device={} node={} error={}",
                device, self.local, err
            );
            return Err(err);
        }

        // Term lands first so a peer that sees the new master also sees its term.
        if stored_term != Some(term) {
            self.terms.put(device.clone(), term);
        }
        if stored.as_ref() != Some(&value) {
            self.roles.put(device.clone(), value.clone());
        }
        Ok(Transition {
            output,
            value,
            term,
        })
    }

    /// Runs `read` against a consistent role value and term pair.
    pub fn read_locked<T, F>(&self, device: &DeviceId, read: F) -> T
    where
        F: FnOnce(&RoleValue, u64) -> T,
    {
        let lock = self.device_lock(device);
        let _guard = lock.lock();
        read(&self.role_value(device), self.term(device))
    }

    fn device_lock(&self, device: &DeviceId) -> Arc<Mutex<()>> {
        self.locks.entry(device.clone()).or_default().clone()
    }
}
