//! Bundle extension object model.
//!
//! # Responsibility
//! - Define the hooks an extension implements ([`BundleExtension`]).
//! - Wrap an implementation in a reference-counted object that native hosts
//!   drive through a vtable ([`ExtensionRef`], [`RawExtension`]).
//! - Map extension failures onto native statuses.
//!
//! # Invariants
//! - Every object retains exactly one engine reference, released when the
//!   object is destroyed.
//! - Initialization runs once per object.
//!
//! # See also
//! - `abi` for the binary layout shared with the host.

pub mod abi;
pub mod capability;
mod factory;
mod object;

pub use capability::{extension_capabilities, InterfaceId, IID_IBUNDLE_EXTENSION, IID_IUNKNOWN};
pub use factory::{create_extension, dispatch_extension_proc};
pub use object::{ExtensionObject, ExtensionRef, RawExtension};

use crate::engine::{Engine, EngineError};
use crate::status::HResult;
use std::error::Error;
use std::ffi::c_void;
use std::fmt::{Display, Formatter};

/// Failure of an extension call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionError {
    /// A required argument was null, malformed or missing.
    InvalidArgument(&'static str),
    /// The object does not answer to this capability id.
    NoInterface(InterfaceId),
    /// The hook has no implementation.
    NotImplemented(&'static str),
    /// `initialize` was called a second time.
    AlreadyInitialized,
    /// A named item (search id, file) does not exist.
    NotFound(String),
    /// Extension data could not be read or parsed.
    InvalidData(String),
    /// An engine call made by the extension failed.
    Engine(EngineError),
}

impl ExtensionError {
    /// Native status equivalent of this error.
    pub fn status(&self) -> HResult {
        match self {
            Self::InvalidArgument(_) => HResult::E_INVALIDARG,
            Self::NoInterface(_) => HResult::E_NOINTERFACE,
            Self::NotImplemented(_) => HResult::E_NOTIMPL,
            Self::AlreadyInitialized => HResult::E_ALREADY_INITIALIZED,
            Self::NotFound(_) => HResult::E_NOTFOUND,
            Self::InvalidData(_) => HResult::E_INVALIDDATA,
            Self::Engine(err) => err.status(),
        }
    }
}

impl Display for ExtensionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument(what) => write!(f, "invalid argument: {what}"),
            Self::NoInterface(iid) => write!(f, "capability not supported: {iid}"),
            Self::NotImplemented(call) => write!(f, "not implemented: {call}"),
            Self::AlreadyInitialized => write!(f, "extension already initialized"),
            Self::NotFound(name) => write!(f, "not found: {name}"),
            Self::InvalidData(detail) => write!(f, "invalid extension data: {detail}"),
            Self::Engine(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ExtensionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Engine(err) => Some(err),
            _ => None,
        }
    }
}

impl From<EngineError> for ExtensionError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

/// Creation arguments copied into the object by `initialize`.
#[derive(Debug, Clone, Copy)]
pub struct ExtensionCreateArgs<'a> {
    /// Directory holding the extension's bundle data.
    pub data_path: &'a str,
}

/// What a hook sees of its owning object.
#[derive(Debug, Clone, Copy)]
pub struct ExtensionContext<'a> {
    pub engine: &'a Engine,
    /// `None` until `initialize` has run.
    pub data_path: Option<&'a str>,
}

/// Raw message routed through the generic extension proc.
#[derive(Debug, Clone, Copy)]
pub struct ExtensionProcCall {
    pub message: u32,
    pub args: *const c_void,
    pub results: *mut c_void,
    pub context: *mut c_void,
}

/// Hooks of a bundle extension.
///
/// Every hook has a default, so an implementation overrides only what it
/// supports; the rest answer `E_NOTIMPL`.
pub trait BundleExtension: Send + Sync + 'static {
    /// Runs once after the data path is recorded.
    fn initialize(&self, _context: &ExtensionContext<'_>) -> Result<(), ExtensionError> {
        Ok(())
    }

    /// Runs the search registered under `id`, storing its result in `variable`.
    fn search(
        &self,
        _context: &ExtensionContext<'_>,
        _id: &str,
        _variable: &str,
    ) -> Result<(), ExtensionError> {
        Err(ExtensionError::NotImplemented("search"))
    }

    /// Handles a message that has no typed hook.
    fn extension_proc(
        &self,
        _context: &ExtensionContext<'_>,
        _call: &ExtensionProcCall,
    ) -> Result<(), ExtensionError> {
        Err(ExtensionError::NotImplemented("bundle_extension_proc"))
    }
}

#[cfg(test)]
mod tests {
    use super::{
        BundleExtension, ExtensionCreateArgs, ExtensionError, ExtensionRef, InterfaceId,
        IID_IBUNDLE_EXTENSION, IID_IUNKNOWN,
    };
    use crate::engine::{Engine, EngineError};
    use crate::host::InMemoryHost;
    use crate::status::HResult;
    use std::sync::Arc;

    struct Bare;

    impl BundleExtension for Bare {}

    fn bare() -> ExtensionRef<Bare> {
        ExtensionRef::new(Engine::new(Arc::new(InMemoryHost::new())), Bare)
    }

    #[test]
    fn default_hooks_are_not_implemented() {
        let extension = bare();
        let err = extension.search("S", "V").expect_err("no search hook");
        assert_eq!(err.status(), HResult::E_NOTIMPL);
    }

    #[test]
    fn second_initialize_is_rejected() {
        let extension = bare();
        let args = ExtensionCreateArgs { data_path: "data" };
        extension.initialize(&args).expect("first initialize");
        assert_eq!(
            extension.initialize(&args),
            Err(ExtensionError::AlreadyInitialized)
        );
        assert_eq!(extension.data_path(), Some("data"));
    }

    #[test]
    fn query_adds_one_reference_per_success() {
        let extension = bare();
        let mut slot = None;
        extension
            .query_capability(&IID_IBUNDLE_EXTENSION, Some(&mut slot))
            .expect("primary capability");
        assert_eq!(extension.reference_count(), 2);
        let mut base = None;
        extension
            .query_capability(&IID_IUNKNOWN, Some(&mut base))
            .expect("base capability");
        assert_eq!(extension.reference_count(), 3);
        drop(slot);
        drop(base);
        assert_eq!(extension.reference_count(), 1);
    }

    #[test]
    fn foreign_capability_leaves_slot_empty() {
        let extension = bare();
        let foreign = InterfaceId::from_u128(0x0123_4567_89AB_CDEF_0123_4567_89AB_CDEF);
        let mut slot = Some(extension.clone());
        let err = extension
            .query_capability(&foreign, Some(&mut slot))
            .expect_err("foreign id");
        assert_eq!(err, ExtensionError::NoInterface(foreign));
        assert!(slot.is_none());
        assert_eq!(extension.reference_count(), 1);
    }

    #[test]
    fn raw_round_trip_keeps_one_reference() {
        let raw = bare().into_raw();
        let back = unsafe { ExtensionRef::<Bare>::from_raw(raw) }.expect("non-null pointer");
        assert_eq!(back.reference_count(), 1);
        assert_eq!(back.as_raw(), raw);
    }

    #[test]
    fn engine_errors_keep_their_status() {
        let err = ExtensionError::from(EngineError::VariableNotFound("X".to_string()));
        assert_eq!(err.status(), HResult::E_NOTFOUND);
    }
}
