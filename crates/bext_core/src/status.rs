//! Host status vocabulary.
//!
//! # Responsibility
//! - Name the native status codes exchanged with the host engine.
//! - Classify codes into the few categories core logic branches on.
//!
//! # Invariants
//! - Success is any non-negative code (`S_OK`, `S_FALSE`).
//! - `E_INSUFFICIENT_BUFFER` and `E_MOREDATA` are equivalent "buffer too small" signals.
//! - `E_NOTFOUND` is the only reliable "variable absent" signal.

use std::fmt::{Display, Formatter};

/// Native status code returned by every host call.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HResult(pub i32);

impl HResult {
    pub const S_OK: Self = Self(0);
    pub const S_FALSE: Self = Self(1);
    pub const E_NOTIMPL: Self = Self::from_bits(0x8000_4001);
    pub const E_NOINTERFACE: Self = Self::from_bits(0x8000_4002);
    pub const E_POINTER: Self = Self::from_bits(0x8000_4003);
    pub const E_FAIL: Self = Self::from_bits(0x8000_4005);
    pub const E_ACCESSDENIED: Self = Self::from_bits(0x8007_0005);
    pub const E_INVALIDDATA: Self = Self::from_bits(0x8007_000D);
    pub const E_OUTOFMEMORY: Self = Self::from_bits(0x8007_000E);
    pub const E_INVALIDARG: Self = Self::from_bits(0x8007_0057);
    /// `HRESULT_FROM_WIN32(ERROR_INSUFFICIENT_BUFFER)`.
    pub const E_INSUFFICIENT_BUFFER: Self = Self::from_bits(0x8007_007A);
    /// `HRESULT_FROM_WIN32(ERROR_MORE_DATA)`.
    pub const E_MOREDATA: Self = Self::from_bits(0x8007_00EA);
    /// `HRESULT_FROM_WIN32(ERROR_NOT_FOUND)`.
    pub const E_NOTFOUND: Self = Self::from_bits(0x8007_0490);
    /// `HRESULT_FROM_WIN32(ERROR_CANCELLED)`.
    pub const E_CANCELLED: Self = Self::from_bits(0x8007_04C7);
    /// `HRESULT_FROM_WIN32(ERROR_ALREADY_INITIALIZED)`.
    pub const E_ALREADY_INITIALIZED: Self = Self::from_bits(0x8007_04DF);

    /// Builds a status from its unsigned bit pattern.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits as i32)
    }

    /// Unsigned bit pattern, as printed by native tooling.
    pub const fn bits(self) -> u32 {
        self.0 as u32
    }

    pub const fn is_success(self) -> bool {
        self.0 >= 0
    }

    pub const fn is_failure(self) -> bool {
        self.0 < 0
    }

    pub const fn is_buffer_too_small(self) -> bool {
        self.0 == Self::E_INSUFFICIENT_BUFFER.0 || self.0 == Self::E_MOREDATA.0
    }

    pub const fn is_not_found(self) -> bool {
        self.0 == Self::E_NOTFOUND.0
    }

    /// Converts a status into `Result`, keeping the failure code.
    pub fn ok(self) -> Result<(), HResult> {
        if self.is_success() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl Display for HResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:08X}", self.bits())
    }
}

impl From<i32> for HResult {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl From<HResult> for i32 {
    fn from(value: HResult) -> Self {
        value.0
    }
}
