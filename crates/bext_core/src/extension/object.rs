//! Reference-counted extension object.
//!
//! # Responsibility
//! - Lay out one heap object as a native interface pointer (vtable first).
//! - Implement capability query, add-reference and release with an atomic
//!   count, and destroy the object exactly when the count reaches zero.
//!
//! # Invariants
//! - Construction starts at count 1, owned by the creator.
//! - A successful capability query adds exactly one reference.
//! - The retained engine and data path are dropped with the object and
//!   never before.
//! - Hook panics are caught before they can unwind into the host.

use super::abi::{read_wide_str, BundleExtensionVtbl, Guid};
use super::capability::{extension_capabilities, InterfaceId};
use super::{
    BundleExtension, ExtensionContext, ExtensionCreateArgs, ExtensionError, ExtensionProcCall,
};
use crate::engine::Engine;
use crate::status::HResult;
use log::{debug, error};
use once_cell::sync::OnceCell;
use std::ffi::c_void;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr::NonNull;
use std::sync::atomic::{fence, AtomicI32, Ordering};

/// Heap layout behind every extension interface pointer.
#[repr(C)]
pub struct ExtensionObject<E: BundleExtension> {
    // Read through the interface pointer only.
    #[allow(dead_code)]
    vtbl: &'static BundleExtensionVtbl,
    references: AtomicI32,
    engine: Engine,
    data_path: OnceCell<String>,
    extension: E,
}

impl<E: BundleExtension> ExtensionObject<E> {
    const VTBL: BundleExtensionVtbl = BundleExtensionVtbl {
        query_interface: Self::raw_query_interface,
        add_ref: Self::raw_add_ref,
        release: Self::raw_release,
        search: Self::raw_search,
        bundle_extension_proc: Self::raw_extension_proc,
    };

    fn supports(iid: &InterfaceId) -> bool {
        extension_capabilities().contains(iid)
    }

    fn context(&self) -> ExtensionContext<'_> {
        ExtensionContext {
            engine: &self.engine,
            data_path: self.data_path.get().map(String::as_str),
        }
    }

    fn add_ref(&self) -> u32 {
        let count = self.references.fetch_add(1, Ordering::Relaxed) + 1;
        count as u32
    }

    /// Drops one reference and destroys the object when none remain.
    ///
    /// # Safety
    /// `this` must be a live object created by [`ExtensionRef::new`] and the
    /// caller must own the reference being released.
    unsafe fn release(this: NonNull<Self>) -> u32 {
        let remaining = this.as_ref().references.fetch_sub(1, Ordering::Release) - 1;
        if remaining > 0 {
            return remaining as u32;
        }
        fence(Ordering::Acquire);
        drop(Box::from_raw(this.as_ptr()));
        0
    }

    fn initialize(&self, args: &ExtensionCreateArgs<'_>) -> Result<(), ExtensionError> {
        self.data_path
            .set(args.data_path.to_string())
            .map_err(|_| ExtensionError::AlreadyInitialized)?;
        self.extension.initialize(&self.context())
    }

    unsafe extern "system" fn raw_query_interface(
        this: *mut c_void,
        riid: *const Guid,
        out: *mut *mut c_void,
    ) -> HResult {
        if out.is_null() {
            return HResult::E_INVALIDARG;
        }
        *out = std::ptr::null_mut();
        if riid.is_null() {
            return HResult::E_INVALIDARG;
        }

        if !Self::supports(&InterfaceId::from(*riid)) {
            return HResult::E_NOINTERFACE;
        }
        (*(this as *const Self)).add_ref();
        *out = this;
        HResult::S_OK
    }

    unsafe extern "system" fn raw_add_ref(this: *mut c_void) -> u32 {
        (*(this as *const Self)).add_ref()
    }

    unsafe extern "system" fn raw_release(this: *mut c_void) -> u32 {
        match NonNull::new(this as *mut Self) {
            Some(object) => Self::release(object),
            None => 0,
        }
    }

    unsafe extern "system" fn raw_search(
        this: *mut c_void,
        id: *const u16,
        variable: *const u16,
    ) -> HResult {
        let object = &*(this as *const Self);
        let id = match read_wide_str(id, "id") {
            Ok(value) => value,
            Err(err) => return err.status(),
        };
        let variable = match read_wide_str(variable, "variable") {
            Ok(value) => value,
            Err(err) => return err.status(),
        };
        guard("search", || {
            object
                .extension
                .search(&object.context(), id.as_str(), variable.as_str())
        })
    }

    unsafe extern "system" fn raw_extension_proc(
        this: *mut c_void,
        message: u32,
        args: *const c_void,
        results: *mut c_void,
        context: *mut c_void,
    ) -> HResult {
        let object = &*(this as *const Self);
        let call = ExtensionProcCall {
            message,
            args,
            results,
            context,
        };
        guard("bundle_extension_proc", || {
            object.extension.extension_proc(&object.context(), &call)
        })
    }
}

impl<E: BundleExtension> Drop for ExtensionObject<E> {
    fn drop(&mut self) {
        debug!("event=extension_destroy module=extension status=ok");
    }
}

fn guard(call: &'static str, body: impl FnOnce() -> Result<(), ExtensionError>) -> HResult {
    match catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(())) => HResult::S_OK,
        Ok(Err(err)) => {
            debug!(
                "event=extension_call module=extension status=error call={} hr={} error={}",
                call,
                err.status(),
                err
            );
            err.status()
        }
        Err(_) => {
            error!(
                "event=extension_call module=extension status=error call={} error_code=panic",
                call
            );
            HResult::E_FAIL
        }
    }
}

/// One counted reference to an extension object.
///
/// `Clone` adds a reference and `Drop` releases it, so the object lives
/// exactly as long as the last reference held on either side of the boundary.
pub struct ExtensionRef<E: BundleExtension> {
    ptr: NonNull<ExtensionObject<E>>,
}

// SAFETY: the object is immutable after construction except for the atomic
// count and the one-time data path cell; `E` is itself `Send + Sync`.
unsafe impl<E: BundleExtension> Send for ExtensionRef<E> {}
unsafe impl<E: BundleExtension> Sync for ExtensionRef<E> {}

impl<E: BundleExtension> ExtensionRef<E> {
    /// Allocates a new object with a count of 1 and one retained engine.
    pub fn new(engine: Engine, extension: E) -> Self {
        let object = Box::new(ExtensionObject {
            vtbl: &ExtensionObject::<E>::VTBL,
            references: AtomicI32::new(1),
            engine,
            data_path: OnceCell::new(),
            extension,
        });
        Self {
            ptr: NonNull::from(Box::leak(object)),
        }
    }

    fn object(&self) -> &ExtensionObject<E> {
        // SAFETY: holding a counted reference keeps the object alive.
        unsafe { self.ptr.as_ref() }
    }

    /// Current count; diagnostic only, it may change concurrently.
    pub fn reference_count(&self) -> u32 {
        self.object().references.load(Ordering::Acquire) as u32
    }

    pub fn extension(&self) -> &E {
        &self.object().extension
    }

    pub fn engine(&self) -> &Engine {
        &self.object().engine
    }

    pub fn data_path(&self) -> Option<&str> {
        self.object().data_path.get().map(String::as_str)
    }

    /// Copies the creation arguments and runs the extension's setup hook.
    ///
    /// Runs once; later calls fail with [`ExtensionError::AlreadyInitialized`].
    pub fn initialize(&self, args: &ExtensionCreateArgs<'_>) -> Result<(), ExtensionError> {
        self.object().initialize(args)
    }

    /// Queries for a capability.
    ///
    /// A `None` slot is an invalid argument and nothing is touched. On a
    /// foreign id the slot is left empty.
    pub fn query_capability(
        &self,
        iid: &InterfaceId,
        slot: Option<&mut Option<ExtensionRef<E>>>,
    ) -> Result<(), ExtensionError> {
        let Some(slot) = slot else {
            return Err(ExtensionError::InvalidArgument("capability output slot"));
        };
        *slot = None;
        if !ExtensionObject::<E>::supports(iid) {
            return Err(ExtensionError::NoInterface(*iid));
        }
        *slot = Some(self.clone());
        Ok(())
    }

    pub fn search(&self, id: &str, variable: &str) -> Result<(), ExtensionError> {
        let object = self.object();
        object.extension.search(&object.context(), id, variable)
    }

    pub fn extension_proc(&self, call: &ExtensionProcCall) -> Result<(), ExtensionError> {
        let object = self.object();
        object.extension.extension_proc(&object.context(), call)
    }

    /// Interface pointer for this object; does not add a reference.
    pub fn as_raw(&self) -> *mut c_void {
        self.ptr.as_ptr().cast()
    }

    /// Hands this reference to native code as an interface pointer.
    pub fn into_raw(self) -> *mut c_void {
        let raw = self.as_raw();
        std::mem::forget(self);
        raw
    }

    /// Takes ownership of one reference held by native code.
    ///
    /// # Safety
    /// `ptr` must come from [`ExtensionRef::into_raw`] (or a successful query
    /// on such a pointer) for the same `E`, and the caller must own the
    /// reference it represents.
    pub unsafe fn from_raw(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr.cast::<ExtensionObject<E>>()).map(|ptr| Self { ptr })
    }
}

impl<E: BundleExtension> Clone for ExtensionRef<E> {
    fn clone(&self) -> Self {
        self.object().add_ref();
        Self { ptr: self.ptr }
    }
}

impl<E: BundleExtension> Drop for ExtensionRef<E> {
    fn drop(&mut self) {
        // SAFETY: this handle owns exactly one reference.
        unsafe {
            ExtensionObject::release(self.ptr);
        }
    }
}

/// Host-side view of a native extension interface pointer.
///
/// Holds no reference of its own; every call goes through the vtable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawExtension {
    ptr: NonNull<c_void>,
}

impl RawExtension {
    /// # Safety
    /// `ptr` must be null or a live extension interface pointer.
    pub unsafe fn from_ptr(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| Self { ptr })
    }

    pub fn as_ptr(&self) -> *mut c_void {
        self.ptr.as_ptr()
    }

    unsafe fn vtbl(&self) -> &'static BundleExtensionVtbl {
        *self.ptr.as_ptr().cast::<&'static BundleExtensionVtbl>()
    }

    /// # Safety
    /// The object must be alive; `out` is written as the native contract says.
    pub unsafe fn query_interface(&self, iid: &InterfaceId, out: *mut *mut c_void) -> HResult {
        let guid = iid.to_guid();
        (self.vtbl().query_interface)(self.as_ptr(), &guid, out)
    }

    /// # Safety
    /// The object must be alive.
    pub unsafe fn add_ref(&self) -> u32 {
        (self.vtbl().add_ref)(self.as_ptr())
    }

    /// # Safety
    /// The caller must own the reference it releases; after a zero result
    /// the pointer is dangling.
    pub unsafe fn release(&self) -> u32 {
        (self.vtbl().release)(self.as_ptr())
    }

    /// # Safety
    /// The object must be alive; strings must be null or zero-terminated.
    pub unsafe fn search(&self, id: *const u16, variable: *const u16) -> HResult {
        (self.vtbl().search)(self.as_ptr(), id, variable)
    }

    /// # Safety
    /// The object must be alive; payload pointers follow the message contract.
    pub unsafe fn bundle_extension_proc(
        &self,
        message: u32,
        args: *const c_void,
        results: *mut c_void,
        context: *mut c_void,
    ) -> HResult {
        (self.vtbl().bundle_extension_proc)(self.as_ptr(), message, args, results, context)
    }
}
