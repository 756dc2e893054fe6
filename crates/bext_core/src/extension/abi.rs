//! Binary layout shared with the host.
//!
//! # Invariants
//! - Every type here is `repr(C)` (or `repr(transparent)`) and append-only.
//! - Interface pointers point at an object whose first field is a vtable
//!   reference.
//! - Strings crossing the boundary are zero-terminated UTF-16.

use super::ExtensionError;
use crate::status::HResult;
use std::ffi::c_void;
use uuid::Uuid;

/// Native GUID layout.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl From<Uuid> for Guid {
    fn from(value: Uuid) -> Self {
        let (data1, data2, data3, data4) = value.as_fields();
        Self {
            data1,
            data2,
            data3,
            data4: *data4,
        }
    }
}

impl From<Guid> for Uuid {
    fn from(value: Guid) -> Self {
        Uuid::from_fields(value.data1, value.data2, value.data3, &value.data4)
    }
}

pub type QueryInterfaceFn = unsafe extern "system" fn(
    this: *mut c_void,
    riid: *const Guid,
    out: *mut *mut c_void,
) -> HResult;
pub type AddRefFn = unsafe extern "system" fn(this: *mut c_void) -> u32;
pub type ReleaseFn = unsafe extern "system" fn(this: *mut c_void) -> u32;
pub type SearchFn =
    unsafe extern "system" fn(this: *mut c_void, id: *const u16, variable: *const u16) -> HResult;
pub type ExtensionProcMethodFn = unsafe extern "system" fn(
    this: *mut c_void,
    message: u32,
    args: *const c_void,
    results: *mut c_void,
    context: *mut c_void,
) -> HResult;

/// Free-standing proc callback handed to the host at creation.
pub type BundleExtensionProcFn = unsafe extern "system" fn(
    message: u32,
    args: *const c_void,
    results: *mut c_void,
    context: *mut c_void,
) -> HResult;

/// Method table of a bundle extension interface pointer.
#[repr(C)]
pub struct BundleExtensionVtbl {
    pub query_interface: QueryInterfaceFn,
    pub add_ref: AddRefFn,
    pub release: ReleaseFn,
    pub search: SearchFn,
    pub bundle_extension_proc: ExtensionProcMethodFn,
}

/// Messages routed through the extension proc.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BundleExtensionMessage {
    Search = 0,
}

impl BundleExtensionMessage {
    pub fn from_raw(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Search),
            _ => None,
        }
    }
}

/// Payload of [`BundleExtensionMessage::Search`].
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct BundleExtensionSearchArgs {
    pub cb_size: u32,
    pub id: *const u16,
    pub variable: *const u16,
}

/// Results of [`BundleExtensionMessage::Search`].
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct BundleExtensionSearchResults {
    pub cb_size: u32,
}

/// Reads a zero-terminated UTF-16 string.
///
/// # Safety
/// `ptr` must be null or point to a readable, zero-terminated UTF-16 sequence.
pub unsafe fn read_wide_str(
    ptr: *const u16,
    what: &'static str,
) -> Result<String, ExtensionError> {
    if ptr.is_null() {
        return Err(ExtensionError::InvalidArgument(what));
    }
    let mut len = 0usize;
    while *ptr.add(len) != 0 {
        len += 1;
    }
    String::from_utf16(std::slice::from_raw_parts(ptr, len))
        .map_err(|_| ExtensionError::InvalidArgument(what))
}

/// Encodes `value` as a zero-terminated UTF-16 vector.
pub fn to_wide(value: &str) -> Vec<u16> {
    value.encode_utf16().chain(std::iter::once(0)).collect()
}
