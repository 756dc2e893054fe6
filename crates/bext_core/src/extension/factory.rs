//! Object construction and proc routing.

use super::abi::{
    BundleExtensionMessage, BundleExtensionSearchArgs, BundleExtensionSearchResults,
};
use super::object::RawExtension;
use super::{BundleExtension, ExtensionCreateArgs, ExtensionError, ExtensionRef};
use crate::engine::Engine;
use crate::status::HResult;
use log::{info, warn};
use std::ffi::c_void;

/// Constructs an extension object and runs its one-time initialization.
///
/// The object starts with one reference owned by the caller. When
/// initialization fails that reference is released before the error is
/// returned, so nothing outlives the failed call.
pub fn create_extension<E: BundleExtension>(
    engine: Engine,
    args: &ExtensionCreateArgs<'_>,
    extension: E,
) -> Result<ExtensionRef<E>, ExtensionError> {
    let object = ExtensionRef::new(engine, extension);
    if let Err(err) = object.initialize(args) {
        warn!(
            "event=extension_create module=extension status=error hr={} error={}",
            err.status(),
            err
        );
        drop(object);
        return Err(err);
    }

    info!(
        "event=extension_create module=extension status=ok data_path_len={}",
        args.data_path.len()
    );
    Ok(object)
}

/// Proc callback handed to the host alongside the interface pointer.
///
/// `context` is the extension interface pointer. Search messages are
/// validated and routed to the `search` slot; every other message goes to
/// the generic proc slot unchanged. Search payloads whose `cb_size` is
/// smaller than this library's layout are rejected with `E_INVALIDARG`.
///
/// # Safety
/// `context` must be a live extension interface pointer, and `args` /
/// `results` must match the layout the message defines.
pub unsafe extern "system" fn dispatch_extension_proc(
    message: u32,
    args: *const c_void,
    results: *mut c_void,
    context: *mut c_void,
) -> HResult {
    let Some(extension) = RawExtension::from_ptr(context) else {
        return HResult::E_INVALIDARG;
    };

    match BundleExtensionMessage::from_raw(message) {
        Some(BundleExtensionMessage::Search) => {
            if args.is_null() || results.is_null() {
                return HResult::E_INVALIDARG;
            }
            let search = &*(args as *const BundleExtensionSearchArgs);
            let search_results = &*(results as *const BundleExtensionSearchResults);
            if (search.cb_size as usize) < std::mem::size_of::<BundleExtensionSearchArgs>()
                || (search_results.cb_size as usize)
                    < std::mem::size_of::<BundleExtensionSearchResults>()
            {
                return HResult::E_INVALIDARG;
            }
            extension.search(search.id, search.variable)
        }
        None => extension.bundle_extension_proc(message, args, results, context),
    }
}
