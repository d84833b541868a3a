use core::fmt;
use core::num::NonZeroU8;

use crate::CoreError;

/// FLOW-BUS node address, valid range 1..=127.
///
/// - `NonZero` keeps `Option<NodeAddress>` one byte wide
/// - construction is the only place the range is checked
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u8", into = "u8"))]
pub struct NodeAddress(NonZeroU8);

impl NodeAddress {
    pub const MAX: u8 = 127;

    pub fn new(value: u8) -> Result<Self, CoreError> {
        match NonZeroU8::new(value) {
            Some(nz) if value <= Self::MAX => Ok(Self(nz)),
            _ => Err(CoreError::NodeAddressRange { value }),
        }
    }

    pub fn get(self) -> u8 {
        self.0.get()
    }
}

impl TryFrom<u8> for NodeAddress {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NodeAddress> for u8 {
    fn from(addr: NodeAddress) -> Self {
        addr.get()
    }
}

impl fmt::Debug for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.get())
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// Identifier of one physical serial port ("COM1", "/dev/ttyUSB0").
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PortName(String);

impl PortName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PortName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PortName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Debug for PortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Port({})", self.0)
    }
}

impl fmt::Display for PortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
