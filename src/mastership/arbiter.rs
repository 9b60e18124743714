use super::role::{MastershipEvent, MastershipRole, MastershipTerm, RoleInfo, RoleValue};
use super::store::RoleStore;
use crate::event::{ListenerId, ListenerRegistry};
use crate::identity::{DeviceId, NodeId};
use crate::replica::{EventOrigin, MapEvent};
use crate::telemetry::{
    MetricsRegistry, METRIC_MASTER_CHANGES, METRIC_REMOTE_MASTER_CHANGES, METRIC_ROLE_REINFORCED,
};
use crate::util::error::MastershipError;
use log::{debug, error, info};
use std::fmt;
use std::sync::Arc;

/// Per-device mastership state machine for one cluster node.
///
/// Mutations run inside the device's critical section in [`RoleStore`];
/// MASTER_CHANGED events are posted after the section is released, so a
/// listener may call back into the arbiter.
pub struct MastershipArbiter {
    local: NodeId,
    store: Arc<RoleStore>,
    listeners: Arc<ListenerRegistry<MastershipEvent>>,
    metrics: Arc<MetricsRegistry>,
    remote_listener: ListenerId,
}

impl MastershipArbiter {
    pub fn new(store: Arc<RoleStore>, metrics: Arc<MetricsRegistry>) -> Self {
        let listeners = Arc::new(ListenerRegistry::new());
        let remote_listener = {
            let listeners = Arc::clone(&listeners);
            let metrics = Arc::clone(&metrics);
            store
                .roles_map()
                .add_listener(move |event: &MapEvent<DeviceId, RoleValue>| {
                    if let Some(changed) = remote_master_change(event) {
                        metrics.inc_counter(METRIC_REMOTE_MASTER_CHANGES, 1);
                        listeners.post(&changed);
                    }
                })
        };
        Self {
            local: store.local_node().clone(),
            store,
            listeners,
            metrics,
            remote_listener,
        }
    }

    pub fn local_node(&self) -> &NodeId {
        &self.local
    }

    pub fn store(&self) -> &Arc<RoleStore> {
        &self.store
    }

    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&MastershipEvent) + Send + Sync + 'static,
    {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    pub fn get_role(&self, node: &NodeId, device: &DeviceId) -> MastershipRole {
        self.store.role_value(device).role_of(node)
    }

    pub fn local_role(&self, device: &DeviceId) -> MastershipRole {
        self.get_role(&self.local, device)
    }

    pub fn is_local_master(&self, device: &DeviceId) -> bool {
        self.local_role(device) == MastershipRole::Master
    }

    pub fn get_master(&self, device: &DeviceId) -> Option<NodeId> {
        self.store.role_value(device).master().cloned()
    }

    pub fn get_nodes(&self, device: &DeviceId) -> RoleInfo {
        self.store.role_value(device).role_info()
    }

    /// Devices currently mastered by `node`, in id order.
    pub fn get_devices(&self, node: &NodeId) -> Vec<DeviceId> {
        let mut devices: Vec<DeviceId> = self
            .store
            .devices()
            .into_iter()
            .filter(|device| self.store.role_value(device).master() == Some(node))
            .collect();
        devices.sort();
        devices
    }

    pub fn get_term_for(&self, device: &DeviceId) -> Option<MastershipTerm> {
        self.store.read_locked(device, |value, term| {
            value.master().map(|master| MastershipTerm {
                master: master.clone(),
                term,
            })
        })
    }

    pub fn set_master(
        &self,
        node: &NodeId,
        device: &DeviceId,
    ) -> Result<Option<MastershipEvent>, MastershipError> {
        let transition = self.store.transact(device, |value, term| {
            if value.master() == Some(node) {
                value.remove_standby(node);
                return false;
            }
            if let Some(previous) = value.clear_master() {
                value.add_standby(previous);
            }
            value.remove_standby(node);
            value.set_master(node.clone());
            *term += 1;
            true
        })?;
        if !transition.output {
            self.reinforced("set_master", node, device);
            return Ok(None);
        }
        Ok(Some(self.master_changed("set_master", device, &transition.value, transition.term)))
    }

    pub fn set_standby(
        &self,
        node: &NodeId,
        device: &DeviceId,
    ) -> Result<Option<MastershipEvent>, MastershipError> {
        let transition = self.store.transact(device, |value, term| {
            let mut promoted = None;
            if value.master() == Some(node) {
                promoted = reelect(value, node);
                if promoted.is_some() {
                    *term += 1;
                }
            }
            value.add_standby(node.clone());
            promoted
        })?;
        match transition.output {
            Some(_) => Ok(Some(self.master_changed(
                "set_standby",
                device,
                &transition.value,
                transition.term,
            ))),
            None => {
                debug!(
                    "event=mastership_standby device={} node={} local={}",
                    device, node, self.local
                );
                Ok(None)
            }
        }
    }

    /// Claims a role for the local node: master when the device has none,
    /// standby otherwise. An existing role is reinforced.
    pub fn request_role(&self, device: &DeviceId) -> Result<MastershipRole, MastershipError> {
        let local = self.local.clone();
        let transition = self.store.transact(device, |value, term| {
            match value.role_of(&local) {
                MastershipRole::Master => (MastershipRole::Master, false),
                MastershipRole::Standby if value.master().is_some() => {
                    (MastershipRole::Standby, false)
                }
                MastershipRole::Standby | MastershipRole::None => {
                    if value.master().is_none() {
                        value.remove_standby(&local);
                        value.set_master(local.clone());
                        *term += 1;
                        (MastershipRole::Master, true)
                    } else {
                        value.add_standby(local.clone());
                        (MastershipRole::Standby, false)
                    }
                }
            }
        })?;
        let (role, changed) = transition.output;
        if changed {
            self.master_changed("request_role", device, &transition.value, transition.term);
        } else {
            debug!(
                "event=mastership_request device={} node={} role={}",
                device, self.local, role
            );
        }
        Ok(role)
    }

    pub fn relinquish_role(
        &self,
        node: &NodeId,
        device: &DeviceId,
    ) -> Result<Option<MastershipEvent>, MastershipError> {
        let transition = self.store.transact(device, |value, term| {
            let mut promoted = None;
            if value.master() == Some(node) {
                promoted = reelect(value, node);
                if promoted.is_some() {
                    *term += 1;
                }
            }
            value.remove_standby(node);
            promoted
        })?;
        match transition.output {
            Some(_) => Ok(Some(self.master_changed(
                "relinquish_role",
                device,
                &transition.value,
                transition.term,
            ))),
            None => {
                info!(
                    "event=mastership_relinquish device={} node={} master={}",
                    device,
                    node,
                    display_master(&transition.value)
                );
                Ok(None)
            }
        }
    }

    /// Applies `role` for `node` through the matching transition.
    pub fn set_role(
        &self,
        node: &NodeId,
        device: &DeviceId,
        role: MastershipRole,
    ) -> Result<Option<MastershipEvent>, MastershipError> {
        match role {
            MastershipRole::Master => self.set_master(node, device),
            MastershipRole::Standby => self.set_standby(node, device),
            MastershipRole::None => self.relinquish_role(node, device),
        }
    }

    /// Gives up every role the local node holds. Failures are logged and
    /// skipped so one corrupt device cannot pin the others.
    pub fn relinquish_all_roles(&self) -> Vec<MastershipEvent> {
        let mut events = Vec::new();
        let mut devices = self.store.devices();
        devices.sort();
        for device in devices {
            if self.local_role(&device) == MastershipRole::None {
                continue;
            }
            match self.relinquish_role(&self.local, &device) {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(err) => error!(
                    "event=mastership_relinquish_failed device={} node={} error={}",
                    device, self.local, err
                ),
            }
        }
        events
    }

    fn reinforced(&self, op: &str, node: &NodeId, device: &DeviceId) {
        self.metrics.inc_counter(METRIC_ROLE_REINFORCED, 1);
        debug!(
            "event=mastership_reinforce op={} device={} node={}",
            op, device, node
        );
    }

    fn master_changed(
        &self,
        op: &str,
        device: &DeviceId,
        value: &RoleValue,
        term: u64,
    ) -> MastershipEvent {
        let event = MastershipEvent {
            device_id: device.clone(),
            role_info: value.role_info(),
            origin: EventOrigin::Local,
        };
        self.metrics.inc_counter(METRIC_MASTER_CHANGES, 1);
        info!(
            "event=mastership_master_changed op={} device={} master={} term={} backups={}",
            op,
            device,
            display_master(value),
            term,
            value.standbys().len()
        );
        self.listeners.post(&event);
        event
    }
}

impl fmt::Debug for MastershipArbiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MastershipArbiter")
            .field("local", &self.local)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Drop for MastershipArbiter {
    fn drop(&mut self) {
        self.store.roles_map().remove_listener(self.remote_listener);
    }
}

/// Promotes the smallest-id standby other than `departing`. Without a
/// candidate the departing master is removed and the device has no master.
fn reelect(value: &mut RoleValue, departing: &NodeId) -> Option<NodeId> {
    let candidate = value
        .standbys()
        .iter()
        .filter(|node| *node != departing)
        .min()
        .cloned();
    match candidate {
        Some(next) => {
            value.remove_standby(&next);
            value.set_master(next.clone());
            Some(next)
        }
        None => {
            if value.master() == Some(departing) {
                value.clear_master();
            }
            None
        }
    }
}

fn remote_master_change(event: &MapEvent<DeviceId, RoleValue>) -> Option<MastershipEvent> {
    let EventOrigin::Remote(_) = &event.origin else {
        return None;
    };
    let previous = event.previous.as_ref().and_then(RoleValue::master);
    let current_value = event.current.as_ref()?;
    if let Err(err) = current_value.check(&event.key) {
        error!(
            "event=mastership_invariant_violation phase=remote device={} error={}",
            event.key, err
        );
        return None;
    }
    if previous == current_value.master() {
        return None;
    }
    Some(MastershipEvent {
        device_id: event.key.clone(),
        role_info: current_value.role_info(),
        origin: event.origin.clone(),
    })
}

fn display_master(value: &RoleValue) -> &str {
    value.master().map(NodeId::as_str).unwrap_or("none")
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn nid(id: &str) -> NodeId {
        NodeId::from(id)
    }

    fn arbiter(local: &str) -> MastershipArbiter {
        MastershipArbiter::new(
            Arc::new(RoleStore::new(nid(local))),
            Arc::new(MetricsRegistry::new("test")),
        )
    }

    fn recorded(arbiter: &MastershipArbiter) -> Arc<Mutex<Vec<MastershipEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        arbiter.add_listener(move |event| sink.lock().push(event.clone()));
        events
    }

    #[test]
    fn set_master_demotes_previous_and_bumps_term() {
        let arbiter = arbiter("a");
        let device = DeviceId::from("of:1");
        let events = recorded(&arbiter);

        arbiter.set_master(&nid("a"), &device).unwrap();
        let event = arbiter.set_master(&nid("b"), &device).unwrap().unwrap();
        assert_eq!(event.role_info.master, Some(nid("b")));
        assert_eq!(event.role_info.backups, vec![nid("a")]);
        assert_eq!(arbiter.get_role(&nid("a"), &device), MastershipRole::Standby);
        assert_eq!(
            arbiter.get_term_for(&device),
            Some(MastershipTerm {
                master: nid("b"),
                term: 2
            })
        );
        assert_eq!(events.lock().len(), 2);
    }

    #[test]
    fn reinforcing_master_keeps_term_and_is_silent() {
        let arbiter = arbiter("a");
        let device = DeviceId::from("of:1");
        arbiter.set_master(&nid("a"), &device).unwrap();
        let events = recorded(&arbiter);
        assert_eq!(arbiter.set_master(&nid("a"), &device).unwrap(), None);
        assert_eq!(arbiter.request_role(&device).unwrap(), MastershipRole::Master);
        assert_eq!(arbiter.get_term_for(&device).unwrap().term, 1);
        assert!(events.lock().is_empty());
    }

    #[test]
    fn set_standby_on_master_promotes_smallest_backup() {
        let arbiter = arbiter("a");
        let device = DeviceId::from("of:1");
        arbiter.set_master(&nid("a"), &device).unwrap();
        arbiter.set_standby(&nid("d"), &device).unwrap();
        arbiter.set_standby(&nid("c"), &device).unwrap();

        let event = arbiter.set_standby(&nid("a"), &device).unwrap().unwrap();
        assert_eq!(event.role_info.master, Some(nid("c")));
        assert_eq!(event.role_info.backups, vec![nid("d"), nid("a")]);
        assert_eq!(arbiter.get_term_for(&device).unwrap().term, 2);
    }

    #[test]
    fn set_standby_on_sole_master_leaves_device_unmastered() {
        let arbiter = arbiter("a");
        let device = DeviceId::from("of:1");
        arbiter.set_master(&nid("a"), &device).unwrap();
        assert_eq!(arbiter.set_standby(&nid("a"), &device).unwrap(), None);
        assert_eq!(arbiter.get_master(&device), None);
        assert_eq!(arbiter.local_role(&device), MastershipRole::Standby);
        assert_eq!(arbiter.get_term_for(&device), None);

        // A standby with no master above it takes over on request.
        assert_eq!(arbiter.request_role(&device).unwrap(), MastershipRole::Master);
        assert_eq!(arbiter.get_term_for(&device).unwrap().term, 2);
    }

    #[test]
    fn request_role_joins_standby_behind_existing_master() {
        let arbiter = arbiter("b");
        let device = DeviceId::from("of:1");
        arbiter.set_master(&nid("a"), &device).unwrap();
        assert_eq!(arbiter.request_role(&device).unwrap(), MastershipRole::Standby);
        assert_eq!(arbiter.request_role(&device).unwrap(), MastershipRole::Standby);
        assert_eq!(arbiter.get_nodes(&device).backups, vec![nid("b")]);
        assert_eq!(arbiter.get_term_for(&device).unwrap().term, 1);
    }

    #[test]
    fn relinquish_without_backup_then_request_bumps_term_once() {
        let arbiter = arbiter("a");
        let device = DeviceId::from("of:1");
        assert_eq!(arbiter.request_role(&device).unwrap(), MastershipRole::Master);
        assert_eq!(arbiter.relinquish_role(&nid("a"), &device).unwrap(), None);
        assert_eq!(arbiter.local_role(&device), MastershipRole::None);
        assert_eq!(arbiter.get_term_for(&device), None);
        assert_eq!(arbiter.request_role(&device).unwrap(), MastershipRole::Master);
        assert_eq!(arbiter.get_term_for(&device).unwrap().term, 2);
    }

    #[test]
    fn relinquish_with_backup_hands_over() {
        let arbiter = arbiter("a");
        let device = DeviceId::from("of:1");
        arbiter.set_master(&nid("a"), &device).unwrap();
        arbiter.set_standby(&nid("b"), &device).unwrap();
        let event = arbiter.relinquish_role(&nid("a"), &device).unwrap().unwrap();
        assert_eq!(event.role_info.master, Some(nid("b")));
        assert!(event.role_info.backups.is_empty());
        assert_eq!(arbiter.get_devices(&nid("b")), vec![device.clone()]);
        assert!(arbiter.get_devices(&nid("a")).is_empty());
        assert_eq!(arbiter.get_term_for(&device).unwrap().term, 2);
    }

    #[test]
    fn set_role_dispatches_and_relinquish_all_clears_local() {
        let arbiter = arbiter("a");
        let d1 = DeviceId::from("of:1");
        let d2 = DeviceId::from("of:2");
        arbiter.set_role(&nid("a"), &d1, MastershipRole::Master).unwrap();
        arbiter.set_role(&nid("b"), &d1, MastershipRole::Standby).unwrap();
        arbiter.set_role(&nid("a"), &d2, MastershipRole::Standby).unwrap();
        let events = arbiter.relinquish_all_roles();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].device_id, d1);
        assert_eq!(arbiter.local_role(&d1), MastershipRole::None);
        assert_eq!(arbiter.local_role(&d2), MastershipRole::None);
        assert_eq!(arbiter.get_master(&d1), Some(nid("b")));
    }
}
