use crate::identity::{DeviceId, NodeId};
use crate::replica::EventOrigin;
use crate::util::error::MastershipError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MastershipRole {
    Master,
    Standby,
    None,
}

impl MastershipRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MastershipRole::Master => "MASTER",
            MastershipRole::Standby => "STANDBY",
            MastershipRole::None => "NONE",
        }
    }
}

impl fmt::Display for MastershipRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MastershipRole {
    type Err = MastershipError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "MASTER" => Ok(MastershipRole::Master),
            "STANDBY" => Ok(MastershipRole::Standby),
            "NONE" => Ok(MastershipRole::None),
            _ => Err(MastershipError::UnknownRole(raw.to_string())),
        }
    }
}

/// Role assignment for one device: at most one master plus an ordered list
/// of standbys. Every other node implicitly holds `NONE`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleValue {
    master: Option<NodeId>,
    standbys: Vec<NodeId>,
}

impl RoleValue {
    /// Builds a value from raw parts without validation; use [`RoleValue::check`]
    /// before trusting one that came from outside this process.
    pub fn from_parts(master: Option<NodeId>, standbys: Vec<NodeId>) -> Self {
        Self { master, standbys }
    }

    pub fn master(&self) -> Option<&NodeId> {
        self.master.as_ref()
    }

    pub fn standbys(&self) -> &[NodeId] {
        &self.standbys
    }

    pub fn role_of(&self, node: &NodeId) -> MastershipRole {
        if self.master.as_ref() == Some(node) {
            MastershipRole::Master
        } else if self.standbys.contains(node) {
            MastershipRole::Standby
        } else {
            MastershipRole::None
        }
    }

    pub(crate) fn set_master(&mut self, node: NodeId) -> Option<NodeId> {
        self.master.replace(node)
    }

    pub(crate) fn clear_master(&mut self) -> Option<NodeId> {
        self.master.take()
    }

    pub(crate) fn add_standby(&mut self, node: NodeId) {
        if self.master.as_ref() != Some(&node) && !self.standbys.contains(&node) {
            self.standbys.push(node);
        }
    }

    pub(crate) fn remove_standby(&mut self, node: &NodeId) -> bool {
        let before = self.standbys.len();
        self.standbys.retain(|existing| existing != node);
        self.standbys.len() != before
    }

    /// Verifies the structural invariants: the master is not also a standby
    /// and no standby appears twice.
    pub fn check(&self, device: &DeviceId) -> Result<(), MastershipError> {
        if let Some(master) = &self.master {
            if self.standbys.contains(master) {
                return Err(MastershipError::MasterListedAsStandby {
                    device: device.clone(),
                    node: master.clone(),
                });
            }
        }
        for (idx, node) in self.standbys.iter().enumerate() {
            if self.standbys[..idx].contains(node) {
                return Err(MastershipError::DuplicateStandby {
                    device: device.clone(),
                    node: node.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn role_info(&self) -> RoleInfo {
        RoleInfo {
            master: self.master.clone(),
            backups: self.standbys.clone(),
        }
    }
}

/// Public view of a device's role assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleInfo {
    pub master: Option<NodeId>,
    pub backups: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MastershipTerm {
    pub master: NodeId,
    pub term: u64,
}

/// MASTER_CHANGED notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MastershipEvent {
    pub device_id: DeviceId,
    pub role_info: RoleInfo,
    pub origin: EventOrigin,
}
