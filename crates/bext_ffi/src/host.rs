//! Host engine reached through a native callback table.
//!
//! # Responsibility
//! - Adapt the engine callbacks a host passes at creation to [`HostEngine`].
//! - Hold exactly one native engine reference for the adapter's lifetime.
//!
//! # Invariants
//! - `add_ref` is called once in [`NativeHost::new`] and `release` once on drop.
//! - Capacities handed to the host never exceed the Rust buffer behind them.
//! - Missing optional callbacks answer `E_NOTIMPL`.

use bext_core::buffer::{TextBuilder, WideBuffer};
use bext_core::extension::abi::to_wide;
use bext_core::host::{HostEngine, HostResult, LogLevel};
use bext_core::HResult;
use log::debug;
use std::ffi::c_void;

pub type EngineAddRefFn = unsafe extern "system" fn(context: *mut c_void) -> u32;
pub type EngineReleaseFn = unsafe extern "system" fn(context: *mut c_void) -> u32;
pub type GetVariableNumericFn =
    unsafe extern "system" fn(context: *mut c_void, name: *const u16, value: *mut i64) -> HResult;
pub type SetVariableNumericFn =
    unsafe extern "system" fn(context: *mut c_void, name: *const u16, value: i64) -> HResult;
pub type GetVariableStringFn = unsafe extern "system" fn(
    context: *mut c_void,
    name: *const u16,
    value: *mut u16,
    capacity: *mut usize,
) -> HResult;
pub type SetVariableStringFn = unsafe extern "system" fn(
    context: *mut c_void,
    name: *const u16,
    value: *const u16,
    formatted: i32,
) -> HResult;
pub type GetVariableVersionFn =
    unsafe extern "system" fn(context: *mut c_void, name: *const u16, value: *mut u64) -> HResult;
pub type SetVariableVersionFn =
    unsafe extern "system" fn(context: *mut c_void, name: *const u16, value: u64) -> HResult;
pub type TransformStringFn = unsafe extern "system" fn(
    context: *mut c_void,
    input: *const u16,
    output: *mut u16,
    capacity: *mut usize,
) -> HResult;
pub type EvaluateConditionFn = unsafe extern "system" fn(
    context: *mut c_void,
    condition: *const u16,
    value: *mut i32,
) -> HResult;
pub type LogFn =
    unsafe extern "system" fn(context: *mut c_void, level: u32, message: *const u16) -> HResult;

/// Engine callback table passed by the host in the creation arguments.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct BextEngineCallbacks {
    pub cb_size: u32,
    pub context: *mut c_void,
    pub add_ref: Option<EngineAddRefFn>,
    pub release: Option<EngineReleaseFn>,
    pub get_variable_numeric: Option<GetVariableNumericFn>,
    pub set_variable_numeric: Option<SetVariableNumericFn>,
    pub get_variable_string: Option<GetVariableStringFn>,
    pub set_variable_string: Option<SetVariableStringFn>,
    pub get_variable_version: Option<GetVariableVersionFn>,
    pub set_variable_version: Option<SetVariableVersionFn>,
    pub format_string: Option<TransformStringFn>,
    pub escape_string: Option<TransformStringFn>,
    pub evaluate_condition: Option<EvaluateConditionFn>,
    pub log: Option<LogFn>,
}

/// [`HostEngine`] backed by a native callback table.
pub struct NativeHost {
    callbacks: BextEngineCallbacks,
    release: EngineReleaseFn,
}

// SAFETY: the host engine is free-threaded; callbacks may be invoked from any
// thread and the table itself is an immutable copy.
unsafe impl Send for NativeHost {}
unsafe impl Sync for NativeHost {}

impl NativeHost {
    /// Copies the table and takes one engine reference.
    ///
    /// # Safety
    /// `callbacks` must be null or point to a table that stays valid, with a
    /// `context` that stays valid until the matching release.
    pub unsafe fn new(callbacks: *const BextEngineCallbacks) -> Result<Self, HResult> {
        if callbacks.is_null() {
            return Err(HResult::E_INVALIDARG);
        }
        let callbacks = *callbacks;
        if (callbacks.cb_size as usize) < std::mem::size_of::<BextEngineCallbacks>() {
            return Err(HResult::E_INVALIDARG);
        }
        let required = callbacks.get_variable_numeric.is_some()
            && callbacks.set_variable_numeric.is_some()
            && callbacks.get_variable_string.is_some()
            && callbacks.set_variable_string.is_some()
            && callbacks.get_variable_version.is_some()
            && callbacks.set_variable_version.is_some()
            && callbacks.log.is_some();
        let (Some(add_ref), Some(release), true) = (callbacks.add_ref, callbacks.release, required)
        else {
            return Err(HResult::E_POINTER);
        };

        add_ref(callbacks.context);
        debug!("event=engine_retain module=ffi status=ok");
        Ok(Self { callbacks, release })
    }

    fn context(&self) -> *mut c_void {
        self.callbacks.context
    }

    fn transform(
        &self,
        call: Option<TransformStringFn>,
        input: &str,
        output: &mut TextBuilder,
        capacity: &mut usize,
    ) -> HResult {
        let Some(call) = call else {
            return HResult::E_NOTIMPL;
        };
        let input = to_wide(input);
        let mut buffer = WideBuffer::allocate(output.capacity());
        let mut native_capacity = (*capacity).min(buffer.capacity());
        // SAFETY: `buffer` holds at least `native_capacity` units.
        let status = unsafe {
            call(
                self.context(),
                input.as_ptr(),
                buffer.as_mut_ptr(),
                &mut native_capacity,
            )
        };
        *capacity = native_capacity;
        if !status.is_success() {
            return status;
        }
        let len = buffer.terminated_len(buffer.capacity());
        match buffer.decode(len) {
            Ok(text) => {
                output.set_text(&text);
                status
            }
            Err(_) => HResult::E_INVALIDDATA,
        }
    }
}

impl Drop for NativeHost {
    fn drop(&mut self) {
        // SAFETY: balances the add_ref taken in `new`.
        unsafe {
            (self.release)(self.context());
        }
        debug!("event=engine_release module=ffi status=ok");
    }
}

impl HostEngine for NativeHost {
    fn get_variable_numeric(&self, name: &str) -> HostResult<i64> {
        let Some(call) = self.callbacks.get_variable_numeric else {
            return Err(HResult::E_NOTIMPL);
        };
        let name = to_wide(name);
        let mut value = 0i64;
        // SAFETY: both pointers are live for the duration of the call.
        let status = unsafe { call(self.context(), name.as_ptr(), &mut value) };
        status.ok().map(|()| value)
    }

    fn set_variable_numeric(&self, name: &str, value: i64) -> HResult {
        let Some(call) = self.callbacks.set_variable_numeric else {
            return HResult::E_NOTIMPL;
        };
        let name = to_wide(name);
        // SAFETY: `name` is zero-terminated and live for the call.
        unsafe { call(self.context(), name.as_ptr(), value) }
    }

    fn get_variable_string(
        &self,
        name: &str,
        buffer: &mut [u16],
        capacity: &mut usize,
    ) -> HResult {
        let Some(call) = self.callbacks.get_variable_string else {
            return HResult::E_NOTIMPL;
        };
        let name = to_wide(name);
        let mut native_capacity = (*capacity).min(buffer.len());
        let value = if buffer.is_empty() {
            std::ptr::null_mut()
        } else {
            buffer.as_mut_ptr()
        };
        // SAFETY: `value` is null or holds at least `native_capacity` units.
        let status = unsafe { call(self.context(), name.as_ptr(), value, &mut native_capacity) };
        *capacity = native_capacity;
        status
    }

    fn set_variable_string(&self, name: &str, value: &[u16]) -> HResult {
        let Some(call) = self.callbacks.set_variable_string else {
            return HResult::E_NOTIMPL;
        };
        if value.last() != Some(&0) {
            return HResult::E_INVALIDARG;
        }
        let name = to_wide(name);
        // SAFETY: `value` ends with a terminator, checked above.
        unsafe { call(self.context(), name.as_ptr(), value.as_ptr(), 0) }
    }

    fn get_variable_version(&self, name: &str) -> HostResult<u64> {
        let Some(call) = self.callbacks.get_variable_version else {
            return Err(HResult::E_NOTIMPL);
        };
        let name = to_wide(name);
        let mut value = 0u64;
        // SAFETY: both pointers are live for the duration of the call.
        let status = unsafe { call(self.context(), name.as_ptr(), &mut value) };
        status.ok().map(|()| value)
    }

    fn set_variable_version(&self, name: &str, value: u64) -> HResult {
        let Some(call) = self.callbacks.set_variable_version else {
            return HResult::E_NOTIMPL;
        };
        let name = to_wide(name);
        // SAFETY: `name` is zero-terminated and live for the call.
        unsafe { call(self.context(), name.as_ptr(), value) }
    }

    fn log(&self, level: LogLevel, message: &str) -> HResult {
        let Some(call) = self.callbacks.log else {
            return HResult::E_NOTIMPL;
        };
        let message = to_wide(message);
        // SAFETY: `message` is zero-terminated and live for the call.
        unsafe { call(self.context(), level as u32, message.as_ptr()) }
    }

    fn escape_string(
        &self,
        input: &str,
        output: &mut TextBuilder,
        capacity: &mut usize,
    ) -> HResult {
        self.transform(self.callbacks.escape_string, input, output, capacity)
    }

    fn format_string(
        &self,
        input: &str,
        output: &mut TextBuilder,
        capacity: &mut usize,
    ) -> HResult {
        self.transform(self.callbacks.format_string, input, output, capacity)
    }

    fn evaluate_condition(&self, condition: &str) -> HostResult<bool> {
        let Some(call) = self.callbacks.evaluate_condition else {
            return Err(HResult::E_NOTIMPL);
        };
        let condition = to_wide(condition);
        let mut value = 0i32;
        // SAFETY: both pointers are live for the duration of the call.
        let status = unsafe { call(self.context(), condition.as_ptr(), &mut value) };
        status.ok().map(|()| value != 0)
    }
}
