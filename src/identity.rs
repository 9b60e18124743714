//! Identifiers shared by the mastership and topology halves of the crate.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                $name::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                $name::new(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Identity of a managed network element, e.g. `of:0000000000000001`.
    DeviceId
);
string_id!(
    /// Identity of a controller instance within the cluster.
    NodeId
);
string_id!(
    /// Identity of the component that supplied a topology description.
    ProviderId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortNumber(u64);

impl PortNumber {
    pub fn new(port: u64) -> Self {
        Self(port)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for PortNumber {
    fn from(value: u64) -> Self {
        PortNumber(value)
    }
}

impl fmt::Display for PortNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A directed attachment point on a device.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConnectPoint {
    pub device_id: DeviceId,
    pub port: PortNumber,
}

impl ConnectPoint {
    pub fn new(device_id: impl Into<DeviceId>, port: impl Into<PortNumber>) -> Self {
        Self {
            device_id: device_id.into(),
            port: port.into(),
        }
    }
}

impl fmt::Display for ConnectPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.device_id, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkType {
    /// Point-to-point adjacency observed directly by the controller.
    Direct,
    /// Adjacency inferred across a segment the controller does not manage.
    Indirect,
}

/// A unidirectional link; an adjacency usable both ways is two links.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Link {
    pub src: ConnectPoint,
    pub dst: ConnectPoint,
    pub link_type: LinkType,
}

impl Link {
    pub fn new(src: ConnectPoint, dst: ConnectPoint, link_type: LinkType) -> Self {
        Self {
            src,
            dst,
            link_type,
        }
    }

    pub fn direct(src: ConnectPoint, dst: ConnectPoint) -> Self {
        Self::new(src, dst, LinkType::Direct)
    }

    pub fn indirect(src: ConnectPoint, dst: ConnectPoint) -> Self {
        Self::new(src, dst, LinkType::Indirect)
    }

    pub fn is_direct(&self) -> bool {
        self.link_type == LinkType::Direct
    }

    /// The same adjacency traversed in the opposite direction.
    pub fn reversed(&self) -> Self {
        Self::new(self.dst.clone(), self.src.clone(), self.link_type)
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.src, self.dst)
    }
}
