//! Exported entry points loaded by the bundle engine.
//!
//! # Responsibility
//! - Validate the creation structures, wrap the engine callbacks and hand
//!   back one extension interface pointer plus its proc callback.
//!
//! # Invariants
//! - Exported functions never unwind across the boundary.
//! - On failure nothing is written to the results and every reference taken
//!   during the attempt is released.
//! - The interface pointer handed back carries the creator's single reference.

use crate::config::{ensure_logging, report_logging_failure, runtime_config};
use crate::host::{BextEngineCallbacks, NativeHost};
use crate::search::FileSearchExtension;
use bext_core::extension::abi::{read_wide_str, BundleExtensionProcFn};
use bext_core::extension::{create_extension, dispatch_extension_proc, ExtensionCreateArgs};
use bext_core::{Engine, HResult};
use log::{error, info, warn};
use std::ffi::c_void;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Arguments passed by the engine to `BundleExtensionCreate`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct BundleExtensionCreateArgs {
    pub cb_size: u32,
    pub engine: *const BextEngineCallbacks,
    /// Zero-terminated UTF-16 path of the extension's bundle data.
    pub data_path: *const u16,
}

/// Results filled by `BundleExtensionCreate` on success.
#[repr(C)]
#[derive(Debug)]
pub struct BundleExtensionCreateResults {
    pub cb_size: u32,
    pub extension: *mut c_void,
    pub proc_fn: Option<BundleExtensionProcFn>,
    pub proc_context: *mut c_void,
}

/// Creates the file-search extension for one engine.
///
/// # FFI contract
/// - Returns `S_OK` and fills `results` on success.
/// - Returns the failing status otherwise; `results` is left untouched.
/// - Never panics across the boundary.
///
/// # Safety
/// `args` and `results` must be null or point to valid structures whose
/// `cb_size` is at least this library's layout size.
#[no_mangle]
pub unsafe extern "system" fn BundleExtensionCreate(
    args: *const BundleExtensionCreateArgs,
    results: *mut BundleExtensionCreateResults,
) -> HResult {
    // SAFETY: forwarded caller contract.
    let outcome = catch_unwind(AssertUnwindSafe(|| unsafe { create(args, results) }));
    match outcome {
        Ok(Ok(())) => HResult::S_OK,
        Ok(Err(status)) => {
            warn!(
                "event=extension_load module=ffi status=error hr={}",
                status
            );
            status
        }
        Err(_) => {
            error!("event=extension_load module=ffi status=error error_code=panic");
            HResult::E_FAIL
        }
    }
}

/// Called by the engine before it unloads the library.
#[no_mangle]
pub extern "system" fn BundleExtensionDestroy() {
    info!("event=extension_unload module=ffi status=ok");
    log::logger().flush();
}

unsafe fn create(
    args: *const BundleExtensionCreateArgs,
    results: *mut BundleExtensionCreateResults,
) -> Result<(), HResult> {
    // Logging is best effort; a bad configuration must not block the bundle.
    let logging = ensure_logging(runtime_config());

    if args.is_null() || results.is_null() {
        return Err(HResult::E_INVALIDARG);
    }
    let args = &*args;
    let results = &mut *results;
    if (args.cb_size as usize) < std::mem::size_of::<BundleExtensionCreateArgs>()
        || (results.cb_size as usize) < std::mem::size_of::<BundleExtensionCreateResults>()
    {
        return Err(HResult::E_INVALIDARG);
    }

    let data_path = read_wide_str(args.data_path, "data_path").map_err(|err| err.status())?;
    let host = NativeHost::new(args.engine)?;
    if let Err(err) = &logging {
        report_logging_failure(&host, err);
    }
    let extension = create_extension(
        Engine::new(Arc::new(host)),
        &ExtensionCreateArgs {
            data_path: &data_path,
        },
        FileSearchExtension::new(),
    )
    .map_err(|err| err.status())?;

    let searches = extension.extension().definitions().count();
    let raw = extension.into_raw();
    results.extension = raw;
    results.proc_fn = Some(dispatch_extension_proc);
    results.proc_context = raw;

    info!(
        "event=extension_load module=ffi status=ok searches={}",
        searches
    );
    Ok(())
}
