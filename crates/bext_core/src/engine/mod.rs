//! Engine facade over the host call surface.
//!
//! # Responsibility
//! - Hold the single retained reference to the host and hand typed variable
//!   views out by borrow.
//! - Forward orchestration calls 1:1 and translate host statuses into
//!   booleans, values or [`EngineError`].
//!
//! # Invariants
//! - Cloning an [`Engine`] is the only way to take another host reference.
//! - Host failures always carry the original native status.
//! - `elevate`: success and already-initialized are `true`, cancelled is
//!   `false`, anything else is an error.

mod variables;

pub use variables::{NumericVariables, SecureStringVariables, StringVariables, VersionVariables};

use crate::buffer::{negotiate, TextBuilder, INITIAL_CAPACITY};
use crate::host::{
    DownloadSource, HostEngine, LaunchAction, LogLevel, UpdateRequest, WindowHandle,
};
use crate::status::HResult;
use crate::version::VersionError;
use log::warn;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

pub type EngineResult<T> = Result<T, EngineError>;

/// Failure of an engine facade operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The host reported `E_NOTFOUND` for this variable name.
    VariableNotFound(String),
    /// The host returned a string value that is not valid UTF-16.
    InvalidString(String),
    /// A version was rejected before anything was sent to the host.
    InvalidVersion(VersionError),
    /// Any other non-success host status.
    HostCall { call: &'static str, status: HResult },
}

impl EngineError {
    pub(crate) fn host_call(call: &'static str, status: HResult) -> Self {
        warn!(
            "event=host_call module=engine status=error call={} hr={}",
            call, status
        );
        Self::HostCall { call, status }
    }

    /// Native status equivalent of this error.
    pub fn status(&self) -> HResult {
        match self {
            Self::VariableNotFound(_) => HResult::E_NOTFOUND,
            Self::InvalidString(_) => HResult::E_INVALIDDATA,
            Self::InvalidVersion(_) => HResult::E_INVALIDARG,
            Self::HostCall { status, .. } => *status,
        }
    }
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VariableNotFound(name) => write!(f, "variable not found: {name}"),
            Self::InvalidString(name) => write!(f, "variable {name} is not valid UTF-16"),
            Self::InvalidVersion(err) => write!(f, "{err}"),
            Self::HostCall { call, status } => write!(f, "host call {call} failed: {status}"),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidVersion(err) => Some(err),
            Self::VariableNotFound(_) | Self::InvalidString(_) | Self::HostCall { .. } => None,
        }
    }
}

impl From<VersionError> for EngineError {
    fn from(value: VersionError) -> Self {
        Self::InvalidVersion(value)
    }
}

/// Typed facade over one host engine.
#[derive(Clone)]
pub struct Engine {
    host: Arc<dyn HostEngine>,
}

impl Engine {
    pub fn new(host: Arc<dyn HostEngine>) -> Self {
        Self { host }
    }

    /// Borrows the underlying call surface.
    pub fn host(&self) -> &dyn HostEngine {
        self.host.as_ref()
    }

    pub fn numeric_variables(&self) -> NumericVariables<'_> {
        NumericVariables::new(self.host())
    }

    pub fn string_variables(&self) -> StringVariables<'_> {
        StringVariables::new(self.host())
    }

    pub fn secure_string_variables(&self) -> SecureStringVariables<'_> {
        SecureStringVariables::new(self.host())
    }

    pub fn version_variables(&self) -> VersionVariables<'_> {
        VersionVariables::new(self.host())
    }

    pub fn package_count(&self) -> EngineResult<u32> {
        self.host
            .get_package_count()
            .map_err(|status| EngineError::host_call("get_package_count", status))
    }

    pub fn detect(&self, parent: WindowHandle) -> EngineResult<()> {
        check("detect", self.host.detect(parent))
    }

    pub fn plan(&self, action: LaunchAction) -> EngineResult<()> {
        check("plan", self.host.plan(action))
    }

    pub fn apply(&self, parent: WindowHandle) -> EngineResult<()> {
        check("apply", self.host.apply(parent))
    }

    /// Requests elevation.
    ///
    /// Returns `Ok(false)` when the user cancelled the prompt.
    pub fn elevate(&self, parent: WindowHandle) -> EngineResult<bool> {
        match self.host.elevate(parent) {
            HResult::S_OK | HResult::E_ALREADY_INITIALIZED => Ok(true),
            HResult::E_CANCELLED => Ok(false),
            status => Err(EngineError::host_call("elevate", status)),
        }
    }

    pub fn escape_string(&self, input: &str) -> EngineResult<String> {
        self.negotiate_text("escape_string", |output, capacity| {
            self.host.escape_string(input, output, capacity)
        })
    }

    pub fn format_string(&self, input: &str) -> EngineResult<String> {
        self.negotiate_text("format_string", |output, capacity| {
            self.host.format_string(input, output, capacity)
        })
    }

    /// Hands `condition` to the host evaluator.
    pub fn evaluate_condition(&self, condition: &str) -> EngineResult<bool> {
        self.host
            .evaluate_condition(condition)
            .map_err(|status| EngineError::host_call("evaluate_condition", status))
    }

    pub fn launch_approved_exe(
        &self,
        parent: WindowHandle,
        approved_exe_id: &str,
        arguments: Option<&str>,
        wait_for_input_idle_timeout_ms: u32,
    ) -> EngineResult<()> {
        check(
            "launch_approved_exe",
            self.host.launch_approved_exe(
                parent,
                approved_exe_id,
                arguments,
                wait_for_input_idle_timeout_ms,
            ),
        )
    }

    pub fn log(&self, level: LogLevel, message: &str) -> EngineResult<()> {
        check("log", self.host.log(level, message))
    }

    /// Reports an error to the parent engine in embedded mode.
    ///
    /// Returns the parent's response code.
    pub fn send_embedded_error(
        &self,
        error_code: u32,
        message: &str,
        ui_hint: u32,
    ) -> EngineResult<i32> {
        self.host
            .send_embedded_error(error_code, message, ui_hint)
            .map_err(|status| EngineError::host_call("send_embedded_error", status))
    }

    /// Reports progress to the parent engine in embedded mode.
    pub fn send_embedded_progress(
        &self,
        progress: u32,
        overall_progress: u32,
    ) -> EngineResult<i32> {
        self.host
            .send_embedded_progress(progress, overall_progress)
            .map_err(|status| EngineError::host_call("send_embedded_progress", status))
    }

    pub fn set_update(&self, update: &UpdateRequest<'_>) -> EngineResult<()> {
        check("set_update", self.host.set_update(update))
    }

    pub fn set_local_source(
        &self,
        package_or_container_id: &str,
        payload_id: Option<&str>,
        path: &str,
    ) -> EngineResult<()> {
        check(
            "set_local_source",
            self.host
                .set_local_source(package_or_container_id, payload_id, path),
        )
    }

    pub fn set_download_source(&self, source: &DownloadSource<'_>) -> EngineResult<()> {
        check("set_download_source", self.host.set_download_source(source))
    }

    pub fn close_splash_screen(&self) -> EngineResult<()> {
        check("close_splash_screen", self.host.close_splash_screen())
    }

    pub fn quit(&self, exit_code: u32) -> EngineResult<()> {
        check("quit", self.host.quit(exit_code))
    }

    fn negotiate_text(
        &self,
        call: &'static str,
        invoke: impl FnMut(&mut TextBuilder, &mut usize) -> HResult,
    ) -> EngineResult<String> {
        negotiate::<TextBuilder, _>(INITIAL_CAPACITY, invoke)
            .map(|negotiated| negotiated.buffer.into_string())
            .map_err(|status| EngineError::host_call(call, status))
    }
}

impl Debug for Engine {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("host_references", &Arc::strong_count(&self.host))
            .finish()
    }
}

fn check(call: &'static str, status: HResult) -> EngineResult<()> {
    status
        .ok()
        .map_err(|status| EngineError::host_call(call, status))
}

#[cfg(test)]
mod tests {
    use super::{Engine, EngineError};
    use crate::host::{InMemoryHost, ScriptedCall, WindowHandle};
    use crate::status::HResult;
    use std::sync::Arc;

    #[test]
    fn elevate_maps_three_outcomes() {
        let host = Arc::new(InMemoryHost::new());
        let engine = Engine::new(host.clone());

        host.script(ScriptedCall::Elevate, HResult::E_ALREADY_INITIALIZED);
        assert_eq!(engine.elevate(WindowHandle::NONE), Ok(true));

        host.script(ScriptedCall::Elevate, HResult::E_CANCELLED);
        assert_eq!(engine.elevate(WindowHandle::NONE), Ok(false));

        host.script(ScriptedCall::Elevate, HResult::E_ACCESSDENIED);
        let err = engine
            .elevate(WindowHandle::NONE)
            .expect_err("access denied must fail");
        assert_eq!(err.status(), HResult::E_ACCESSDENIED);
        assert!(matches!(err, EngineError::HostCall { call: "elevate", .. }));
    }

    #[test]
    fn clones_share_one_host() {
        let host = Arc::new(InMemoryHost::new());
        let engine = Engine::new(host.clone());
        assert_eq!(Arc::strong_count(&host), 2);
        let second = engine.clone();
        assert_eq!(Arc::strong_count(&host), 3);
        drop(second);
        drop(engine);
        assert_eq!(Arc::strong_count(&host), 1);
    }
}
