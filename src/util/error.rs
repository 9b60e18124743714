use crate::identity::{DeviceId, NodeId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serialization(#[from] SerializationError),
    #[error("invalid config field {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Serialization(SerializationError::from(err))
    }
}

/// Fatal local invariant violations raised by the mastership state machine.
/// The mutation that observed one is abandoned; prior state stays intact.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MastershipError {
    #[error("unrecognized mastership role {0:?}")]
    UnknownRole(String),
    #[error("role value for {device} lists master {node} as standby")]
    MasterListedAsStandby { device: DeviceId, node: NodeId },
    #[error("role value for {device} lists standby {node} more than once")]
    DuplicateStandby { device: DeviceId, node: NodeId },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReplicationError {
    #[error("replica {node} already joined map {map}")]
    DuplicateMember { map: String, node: NodeId },
    #[error("map {map} has no replica for {node}")]
    UnknownMember { map: String, node: NodeId },
}

#[derive(Debug, Error)]
pub enum SwitchyardError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Mastership(#[from] MastershipError),
    #[error(transparent)]
    Replication(#[from] ReplicationError),
    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

pub type Result<T> = std::result::Result<T, SwitchyardError>;
