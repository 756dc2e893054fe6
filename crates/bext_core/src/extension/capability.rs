//! Capability (interface) identifiers.

use super::abi::Guid;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Interface identifier compared by value during capability queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InterfaceId(Uuid);

impl InterfaceId {
    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    pub const fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn to_guid(self) -> Guid {
        Guid::from(self.0)
    }
}

impl From<Guid> for InterfaceId {
    fn from(value: Guid) -> Self {
        Self(Uuid::from(value))
    }
}

impl Display for InterfaceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{:X}}}", self.0.hyphenated())
    }
}

impl FromStr for InterfaceId {
    type Err = uuid::Error;

    /// Accepts hyphenated, braced, simple and URN forms.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Universal base capability every object answers to.
pub const IID_IUNKNOWN: InterfaceId =
    InterfaceId::from_u128(0x00000000_0000_0000_C000_000000000046);

/// Primary capability of bundle extension objects.
pub const IID_IBUNDLE_EXTENSION: InterfaceId =
    InterfaceId::from_u128(0x93123C9D_796B_4FCD_A507_6EDEF9A925FD);

const EXTENSION_CAPABILITIES: &[InterfaceId] = &[IID_IBUNDLE_EXTENSION, IID_IUNKNOWN];

/// Capability ids a bundle extension object can be queried for.
pub fn extension_capabilities() -> &'static [InterfaceId] {
    EXTENSION_CAPABILITIES
}
