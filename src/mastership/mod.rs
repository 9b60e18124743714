//! Per-device mastership: replicated role/term store and the arbiter state
//! machine that elects one master per device.

pub mod arbiter;
pub mod role;
pub mod store;

pub use arbiter::MastershipArbiter;
pub use role::{MastershipEvent, MastershipRole, MastershipTerm, RoleInfo, RoleValue};
pub use store::{RoleStore, Transition, ROLE_MAP_NAME, TERM_MAP_NAME};
