//! Shared helpers: error types and config path resolution.

pub mod error;

pub use error::{
    ConfigError, MastershipError, ReplicationError, Result, SerializationError, SwitchyardError,
};
