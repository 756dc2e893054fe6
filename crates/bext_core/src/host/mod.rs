//! Host engine call surface.
//!
//! # Responsibility
//! - Describe the low-level calls the host engine exposes to extension code.
//! - Keep the status-code shape of the boundary: every call reports an
//!   [`HResult`], string outputs use in/out capacities.
//!
//! # Invariants
//! - Implementations are free-threaded (`Send + Sync`).
//! - Variable calls are mandatory; orchestration calls default to `E_NOTIMPL`
//!   so partial hosts (bundle extension engines) stay small.
//! - A host never writes past `buffer.len()` in string calls.
//!
//! # See also
//! - `engine` for the typed facade built on top of this trait.

#[cfg(feature = "memory-host")]
pub mod memory;

use crate::buffer::TextBuilder;
use crate::status::HResult;

#[cfg(feature = "memory-host")]
pub use memory::{EmbeddedMessage, InMemoryHost, ScriptedCall, Variable};

/// Result of a value-returning host call; the error is the native status.
pub type HostResult<T> = Result<T, HResult>;

/// Log severity understood by the host log sink.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    None = 0,
    Standard = 1,
    Verbose = 2,
    Debug = 3,
    Error = 4,
}

impl LogLevel {
    pub fn from_raw(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::Standard),
            2 => Some(Self::Verbose),
            3 => Some(Self::Debug),
            4 => Some(Self::Error),
            _ => None,
        }
    }
}

/// Action requested from the host planner.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LaunchAction {
    Unknown = 0,
    Help = 1,
    Layout = 2,
    Uninstall = 3,
    Cache = 4,
    Install = 5,
    Modify = 6,
    Repair = 7,
    UpdateReplace = 8,
    UpdateReplaceEmbedded = 9,
}

/// Hash algorithm of an update payload.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateHashType {
    None = 0,
    Sha1 = 1,
    Sha512 = 2,
}

/// Opaque parent window value forwarded to the host.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct WindowHandle(pub isize);

impl WindowHandle {
    pub const NONE: Self = Self(0);
}

/// Update source registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateRequest<'a> {
    pub local_source: &'a str,
    pub download_source: Option<&'a str>,
    pub size: u64,
    pub hash_type: UpdateHashType,
    pub hash: &'a [u8],
}

/// Download source override for one package, container or payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadSource<'a> {
    pub package_or_container_id: &'a str,
    pub payload_id: Option<&'a str>,
    pub url: &'a str,
    pub user: Option<&'a str>,
    pub password: Option<&'a str>,
}

/// Low-level call surface of the host engine.
pub trait HostEngine: Send + Sync {
    fn get_variable_numeric(&self, name: &str) -> HostResult<i64>;

    fn set_variable_numeric(&self, name: &str, value: i64) -> HResult;

    /// Copies the string value of `name` into `buffer`.
    ///
    /// `capacity` is in/out: on entry the usable size in code units, on a
    /// "buffer too small" status the size the host needs. An empty `buffer`
    /// is a size/existence probe.
    fn get_variable_string(
        &self,
        name: &str,
        buffer: &mut [u16],
        capacity: &mut usize,
    ) -> HResult;

    /// Sets a string variable from a zero-terminated UTF-16 buffer.
    fn set_variable_string(&self, name: &str, value: &[u16]) -> HResult;

    fn get_variable_version(&self, name: &str) -> HostResult<u64>;

    fn set_variable_version(&self, name: &str, value: u64) -> HResult;

    fn log(&self, level: LogLevel, message: &str) -> HResult;

    fn get_package_count(&self) -> HostResult<u32> {
        Err(HResult::E_NOTIMPL)
    }

    /// Escapes `input` so `format_string` yields it literally.
    fn escape_string(
        &self,
        _input: &str,
        _output: &mut TextBuilder,
        _capacity: &mut usize,
    ) -> HResult {
        HResult::E_NOTIMPL
    }

    /// Expands variable references in `input`.
    fn format_string(
        &self,
        _input: &str,
        _output: &mut TextBuilder,
        _capacity: &mut usize,
    ) -> HResult {
        HResult::E_NOTIMPL
    }

    fn evaluate_condition(&self, _condition: &str) -> HostResult<bool> {
        Err(HResult::E_NOTIMPL)
    }

    fn send_embedded_error(
        &self,
        _error_code: u32,
        _message: &str,
        _ui_hint: u32,
    ) -> HostResult<i32> {
        Err(HResult::E_NOTIMPL)
    }

    fn send_embedded_progress(&self, _progress: u32, _overall_progress: u32) -> HostResult<i32> {
        Err(HResult::E_NOTIMPL)
    }

    fn set_update(&self, _update: &UpdateRequest<'_>) -> HResult {
        HResult::E_NOTIMPL
    }

    fn set_local_source(
        &self,
        _package_or_container_id: &str,
        _payload_id: Option<&str>,
        _path: &str,
    ) -> HResult {
        HResult::E_NOTIMPL
    }

    fn set_download_source(&self, _source: &DownloadSource<'_>) -> HResult {
        HResult::E_NOTIMPL
    }

    fn close_splash_screen(&self) -> HResult {
        HResult::E_NOTIMPL
    }

    fn detect(&self, _parent: WindowHandle) -> HResult {
        HResult::E_NOTIMPL
    }

    fn plan(&self, _action: LaunchAction) -> HResult {
        HResult::E_NOTIMPL
    }

    fn elevate(&self, _parent: WindowHandle) -> HResult {
        HResult::E_NOTIMPL
    }

    fn apply(&self, _parent: WindowHandle) -> HResult {
        HResult::E_NOTIMPL
    }

    fn launch_approved_exe(
        &self,
        _parent: WindowHandle,
        _approved_exe_id: &str,
        _arguments: Option<&str>,
        _wait_for_input_idle_timeout_ms: u32,
    ) -> HResult {
        HResult::E_NOTIMPL
    }

    fn quit(&self, _exit_code: u32) -> HResult {
        HResult::E_NOTIMPL
    }
}

#[cfg(test)]
mod tests {
    use super::LogLevel;

    #[test]
    fn log_level_round_trips_raw_values() {
        for level in [
            LogLevel::None,
            LogLevel::Standard,
            LogLevel::Verbose,
            LogLevel::Debug,
            LogLevel::Error,
        ] {
            assert_eq!(LogLevel::from_raw(level as u32), Some(level));
        }
        assert_eq!(LogLevel::from_raw(5), None);
    }
}
