//! Fixed-width version codec.
//!
//! # Responsibility
//! - Pack a four-part dotted version into one 64-bit host value and back.
//! - Validate loosely-typed versions before they are packed.
//!
//! # Invariants
//! - Lane layout is `major:minor:build:revision`, 16 bits each, major highest.
//! - `encode` truncates each component to 16 bits; only `normalize` validates.
//! - `decode(encode(v)) == v` for every component in `0..=65535`.

use crate::status::HResult;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

const LANE_BITS: u32 = 16;
const LANE_MASK: u64 = 0xFFFF;

/// Sentinel used by [`LooseVersion`] for an unspecified build or revision.
pub const UNDEFINED_COMPONENT: i32 = -1;

/// Validated four-part version as understood by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct BundleVersion {
    pub major: u16,
    pub minor: u16,
    pub build: u16,
    pub revision: u16,
}

impl BundleVersion {
    pub const fn new(major: u16, minor: u16, build: u16, revision: u16) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }

    /// Packs this version into the host's 64-bit representation.
    pub const fn to_packed(self) -> u64 {
        encode(
            self.major as u32,
            self.minor as u32,
            self.build as u32,
            self.revision as u32,
        )
    }

    /// Unpacks a host 64-bit version value.
    pub const fn from_packed(packed: u64) -> Self {
        decode(packed)
    }
}

impl Display for BundleVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

impl FromStr for BundleVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        normalize(&s.parse::<LooseVersion>()?)
    }
}

impl From<BundleVersion> for u64 {
    fn from(value: BundleVersion) -> Self {
        value.to_packed()
    }
}

impl From<u64> for BundleVersion {
    fn from(value: u64) -> Self {
        decode(value)
    }
}

/// Caller-supplied version before validation.
///
/// Components are signed so out-of-range input can be represented and
/// rejected. `build`/`revision` may be [`UNDEFINED_COMPONENT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LooseVersion {
    pub major: i64,
    pub minor: i64,
    pub build: i64,
    pub revision: i64,
}

impl LooseVersion {
    pub const fn new(major: i64, minor: i64, build: i64, revision: i64) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }

    /// `major.minor` with build and revision left undefined.
    pub const fn major_minor(major: i64, minor: i64) -> Self {
        Self::new(
            major,
            minor,
            UNDEFINED_COMPONENT as i64,
            UNDEFINED_COMPONENT as i64,
        )
    }
}

impl FromStr for LooseVersion {
    type Err = VersionError;

    /// Parses `major.minor[.build[.revision]]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let parts: Vec<&str> = trimmed.split('.').collect();
        if !(2..=4).contains(&parts.len()) {
            return Err(VersionError::Malformed(trimmed.to_string()));
        }

        let mut components = [UNDEFINED_COMPONENT as i64; 4];
        for (slot, part) in components.iter_mut().zip(parts.iter()) {
            if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
                return Err(VersionError::Malformed(trimmed.to_string()));
            }
            *slot = part
                .parse::<i64>()
                .map_err(|_| VersionError::Malformed(trimmed.to_string()))?;
        }

        Ok(Self::new(
            components[0],
            components[1],
            components[2],
            components[3],
        ))
    }
}

/// Version component names used in range errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionComponent {
    Major,
    Minor,
    Build,
    Revision,
}

impl VersionComponent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Major => "major",
            Self::Minor => "minor",
            Self::Build => "build",
            Self::Revision => "revision",
        }
    }
}

/// Version validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    ComponentOutOfRange {
        component: VersionComponent,
        value: i64,
    },
    Malformed(String),
}

impl VersionError {
    /// Native status equivalent of this error.
    pub fn status(&self) -> HResult {
        HResult::E_INVALIDARG
    }
}

impl Display for VersionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ComponentOutOfRange { component, value } => write!(
                f,
                "version {} component {value} is outside 0..={}",
                component.as_str(),
                u16::MAX
            ),
            Self::Malformed(value) => write!(f, "version string is malformed: `{value}`"),
        }
    }
}

impl Error for VersionError {}

/// Packs four components, truncating each to its 16-bit lane.
pub const fn encode(major: u32, minor: u32, build: u32, revision: u32) -> u64 {
    ((major as u16 as u64) << (LANE_BITS * 3))
        | ((minor as u16 as u64) << (LANE_BITS * 2))
        | ((build as u16 as u64) << LANE_BITS)
        | (revision as u16 as u64)
}

/// Extracts the four 16-bit lanes of a packed version.
pub const fn decode(packed: u64) -> BundleVersion {
    BundleVersion {
        major: ((packed >> (LANE_BITS * 3)) & LANE_MASK) as u16,
        minor: ((packed >> (LANE_BITS * 2)) & LANE_MASK) as u16,
        build: ((packed >> LANE_BITS) & LANE_MASK) as u16,
        revision: (packed & LANE_MASK) as u16,
    }
}

/// Validates a loose version for packing.
///
/// # Contract
/// - Undefined (`-1`) build or revision becomes `0` before validation.
/// - Any component outside `0..=65535` is rejected; nothing is truncated.
pub fn normalize(version: &LooseVersion) -> Result<BundleVersion, VersionError> {
    let build = undefined_to_zero(version.build);
    let revision = undefined_to_zero(version.revision);

    Ok(BundleVersion {
        major: lane(VersionComponent::Major, version.major)?,
        minor: lane(VersionComponent::Minor, version.minor)?,
        build: lane(VersionComponent::Build, build)?,
        revision: lane(VersionComponent::Revision, revision)?,
    })
}

fn undefined_to_zero(value: i64) -> i64 {
    if value == UNDEFINED_COMPONENT as i64 {
        0
    } else {
        value
    }
}

fn lane(component: VersionComponent, value: i64) -> Result<u16, VersionError> {
    u16::try_from(value).map_err(|_| VersionError::ComponentOutOfRange { component, value })
}
