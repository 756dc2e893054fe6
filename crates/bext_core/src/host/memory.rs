//! In-process host engine.
//!
//! Test double, compiled only with the `memory-host` feature. Its format,
//! escape and condition handling cover what tests exercise and are not a
//! general implementation of the host's grammar.
//!
//! # Responsibility
//! - Provide a complete, thread-safe [`HostEngine`] for tests and smoke runs.
//! - Follow the host's observable protocol: typed storage with coercion,
//!   `E_NOTFOUND` for absent names, `E_MOREDATA` with the required capacity
//!   (terminator included) when an output buffer is too small.
//!
//! # Invariants
//! - Injected statuses win over stored values for the affected name.
//! - Orchestration calls are recorded in call order.

use super::{
    DownloadSource, HostEngine, HostResult, LaunchAction, LogLevel, UpdateRequest, WindowHandle,
};
use crate::buffer::TextBuilder;
use crate::status::HResult;
use crate::version::BundleVersion;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// `[Name]` variable reference or `[\c]` escaped literal.
static FORMAT_TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[(?:\\(.)|([A-Za-z_][A-Za-z0-9_.]*))\]").expect("valid format token regex")
});
static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.]*$").expect("valid identifier regex"));

/// Stored variable value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Variable {
    Numeric(i64),
    String(String),
    Version(u64),
}

impl Variable {
    fn as_numeric(&self) -> HostResult<i64> {
        match self {
            Self::Numeric(value) => Ok(*value),
            Self::String(value) => value.trim().parse().map_err(|_| HResult::E_INVALIDARG),
            Self::Version(value) => i64::try_from(*value).map_err(|_| HResult::E_INVALIDARG),
        }
    }

    fn as_text(&self) -> String {
        match self {
            Self::Numeric(value) => value.to_string(),
            Self::String(value) => value.clone(),
            Self::Version(value) => BundleVersion::from_packed(*value).to_string(),
        }
    }

    fn as_version(&self) -> HostResult<u64> {
        match self {
            Self::Version(value) => Ok(*value),
            Self::Numeric(value) => u64::try_from(*value).map_err(|_| HResult::E_INVALIDARG),
            Self::String(value) => value
                .parse::<BundleVersion>()
                .map(BundleVersion::to_packed)
                .map_err(|_| HResult::E_INVALIDARG),
        }
    }

    fn is_truthy(&self) -> bool {
        match self {
            Self::Numeric(value) => *value != 0,
            Self::String(value) => !value.is_empty(),
            Self::Version(value) => *value != 0,
        }
    }
}

/// Orchestration calls whose status can be scripted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScriptedCall {
    Detect,
    Plan,
    Elevate,
    Apply,
    LaunchApprovedExe,
    CloseSplashScreen,
    SetUpdate,
    SetLocalSource,
    SetDownloadSource,
    Quit,
}

/// Embedded-mode message received from the extension side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbeddedMessage {
    Error {
        code: u32,
        message: String,
        ui_hint: u32,
    },
    Progress {
        progress: u32,
        overall_progress: u32,
    },
}

#[derive(Debug, Default)]
struct HostState {
    variables: BTreeMap<String, Variable>,
    injected: BTreeMap<String, HResult>,
    scripted: BTreeMap<ScriptedCall, HResult>,
    calls: Vec<ScriptedCall>,
    package_count: u32,
    log: Vec<(LogLevel, String)>,
    embedded: Vec<EmbeddedMessage>,
    planned_action: Option<LaunchAction>,
    quit_code: Option<u32>,
    local_sources: BTreeMap<String, String>,
    download_sources: BTreeMap<String, String>,
    update_source: Option<String>,
}

/// Thread-safe in-memory implementation of [`HostEngine`].
#[derive(Debug, Default)]
pub struct InMemoryHost {
    state: Mutex<HostState>,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a value directly, bypassing the call surface.
    pub fn insert(&self, name: impl Into<String>, value: Variable) {
        self.state().variables.insert(name.into(), value);
    }

    /// Returns the stored value of `name`.
    pub fn variable(&self, name: &str) -> Option<Variable> {
        self.state().variables.get(name).cloned()
    }

    /// Makes every getter for `name` report `status`.
    pub fn inject_status(&self, name: impl Into<String>, status: HResult) {
        self.state().injected.insert(name.into(), status);
    }

    /// Makes `call` report `status` instead of `S_OK`.
    pub fn script(&self, call: ScriptedCall, status: HResult) {
        self.state().scripted.insert(call, status);
    }

    pub fn set_package_count(&self, count: u32) {
        self.state().package_count = count;
    }

    pub fn calls(&self) -> Vec<ScriptedCall> {
        self.state().calls.clone()
    }

    pub fn log_lines(&self) -> Vec<(LogLevel, String)> {
        self.state().log.clone()
    }

    pub fn embedded_messages(&self) -> Vec<EmbeddedMessage> {
        self.state().embedded.clone()
    }

    pub fn planned_action(&self) -> Option<LaunchAction> {
        self.state().planned_action
    }

    pub fn quit_code(&self) -> Option<u32> {
        self.state().quit_code
    }

    pub fn local_source(&self, package_or_container_id: &str) -> Option<String> {
        self.state()
            .local_sources
            .get(package_or_container_id)
            .cloned()
    }

    pub fn download_source(&self, package_or_container_id: &str) -> Option<String> {
        self.state()
            .download_sources
            .get(package_or_container_id)
            .cloned()
    }

    pub fn update_source(&self) -> Option<String> {
        self.state().update_source.clone()
    }

    fn state(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lookup<T>(
        &self,
        name: &str,
        read: impl FnOnce(&Variable) -> HostResult<T>,
    ) -> HostResult<T> {
        let state = self.state();
        if let Some(status) = state.injected.get(name) {
            return Err(*status);
        }
        match state.variables.get(name) {
            Some(variable) => read(variable),
            None => Err(HResult::E_NOTFOUND),
        }
    }

    fn scripted(&self, call: ScriptedCall) -> HResult {
        let mut state = self.state();
        state.calls.push(call);
        state.scripted.get(&call).copied().unwrap_or(HResult::S_OK)
    }

    fn expand(&self, input: &str) -> String {
        let state = self.state();
        FORMAT_TOKEN_RE
            .replace_all(input, |caps: &Captures<'_>| {
                if let Some(literal) = caps.get(1) {
                    return literal.as_str().to_string();
                }
                state
                    .variables
                    .get(&caps[2])
                    .map(Variable::as_text)
                    .unwrap_or_default()
            })
            .into_owned()
    }

    fn evaluate(&self, condition: &str) -> HostResult<bool> {
        let trimmed = condition.trim();
        if trimmed.is_empty() {
            return Ok(true);
        }
        if let Some(rest) = strip_not(trimmed) {
            return self.evaluate(rest).map(|value| !value);
        }
        if let Ok(number) = trimmed.parse::<i64>() {
            return Ok(number != 0);
        }
        if IDENTIFIER_RE.is_match(trimmed) {
            return Ok(self
                .state()
                .variables
                .get(trimmed)
                .is_some_and(Variable::is_truthy));
        }
        Err(HResult::E_INVALIDDATA)
    }
}

impl HostEngine for InMemoryHost {
    fn get_variable_numeric(&self, name: &str) -> HostResult<i64> {
        self.lookup(name, Variable::as_numeric)
    }

    fn set_variable_numeric(&self, name: &str, value: i64) -> HResult {
        self.insert(name, Variable::Numeric(value));
        HResult::S_OK
    }

    fn get_variable_string(
        &self,
        name: &str,
        buffer: &mut [u16],
        capacity: &mut usize,
    ) -> HResult {
        let text = match self.lookup(name, |variable| Ok(variable.as_text())) {
            Ok(text) => text,
            Err(status) => return status,
        };
        let units: Vec<u16> = text.encode_utf16().collect();
        let required = units.len() + 1;
        if *capacity < required || buffer.len() < required {
            *capacity = required;
            return HResult::E_MOREDATA;
        }

        buffer[..units.len()].copy_from_slice(&units);
        buffer[units.len()] = 0;
        HResult::S_OK
    }

    fn set_variable_string(&self, name: &str, value: &[u16]) -> HResult {
        let len = value.iter().position(|unit| *unit == 0).unwrap_or(value.len());
        match String::from_utf16(&value[..len]) {
            Ok(text) => {
                self.insert(name, Variable::String(text));
                HResult::S_OK
            }
            Err(_) => HResult::E_INVALIDARG,
        }
    }

    fn get_variable_version(&self, name: &str) -> HostResult<u64> {
        self.lookup(name, Variable::as_version)
    }

    fn set_variable_version(&self, name: &str, value: u64) -> HResult {
        self.insert(name, Variable::Version(value));
        HResult::S_OK
    }

    fn log(&self, level: LogLevel, message: &str) -> HResult {
        self.state().log.push((level, message.to_string()));
        HResult::S_OK
    }

    fn get_package_count(&self) -> HostResult<u32> {
        Ok(self.state().package_count)
    }

    fn escape_string(
        &self,
        input: &str,
        output: &mut TextBuilder,
        capacity: &mut usize,
    ) -> HResult {
        write_text(&escape(input), output, capacity)
    }

    fn format_string(
        &self,
        input: &str,
        output: &mut TextBuilder,
        capacity: &mut usize,
    ) -> HResult {
        write_text(&self.expand(input), output, capacity)
    }

    fn evaluate_condition(&self, condition: &str) -> HostResult<bool> {
        self.evaluate(condition)
    }

    fn send_embedded_error(
        &self,
        error_code: u32,
        message: &str,
        ui_hint: u32,
    ) -> HostResult<i32> {
        self.state().embedded.push(EmbeddedMessage::Error {
            code: error_code,
            message: message.to_string(),
            ui_hint,
        });
        Ok(0)
    }

    fn send_embedded_progress(&self, progress: u32, overall_progress: u32) -> HostResult<i32> {
        self.state().embedded.push(EmbeddedMessage::Progress {
            progress,
            overall_progress,
        });
        Ok(0)
    }

    fn set_update(&self, update: &UpdateRequest<'_>) -> HResult {
        let status = self.scripted(ScriptedCall::SetUpdate);
        if status.is_success() {
            self.state().update_source = Some(update.local_source.to_string());
        }
        status
    }

    fn set_local_source(
        &self,
        package_or_container_id: &str,
        _payload_id: Option<&str>,
        path: &str,
    ) -> HResult {
        let status = self.scripted(ScriptedCall::SetLocalSource);
        if status.is_success() {
            self.state()
                .local_sources
                .insert(package_or_container_id.to_string(), path.to_string());
        }
        status
    }

    fn set_download_source(&self, source: &DownloadSource<'_>) -> HResult {
        let status = self.scripted(ScriptedCall::SetDownloadSource);
        if status.is_success() {
            self.state().download_sources.insert(
                source.package_or_container_id.to_string(),
                source.url.to_string(),
            );
        }
        status
    }

    fn close_splash_screen(&self) -> HResult {
        self.scripted(ScriptedCall::CloseSplashScreen)
    }

    fn detect(&self, _parent: WindowHandle) -> HResult {
        self.scripted(ScriptedCall::Detect)
    }

    fn plan(&self, action: LaunchAction) -> HResult {
        let status = self.scripted(ScriptedCall::Plan);
        if status.is_success() {
            self.state().planned_action = Some(action);
        }
        status
    }

    fn elevate(&self, _parent: WindowHandle) -> HResult {
        self.scripted(ScriptedCall::Elevate)
    }

    fn apply(&self, _parent: WindowHandle) -> HResult {
        self.scripted(ScriptedCall::Apply)
    }

    fn launch_approved_exe(
        &self,
        _parent: WindowHandle,
        _approved_exe_id: &str,
        _arguments: Option<&str>,
        _wait_for_input_idle_timeout_ms: u32,
    ) -> HResult {
        self.scripted(ScriptedCall::LaunchApprovedExe)
    }

    fn quit(&self, exit_code: u32) -> HResult {
        let status = self.scripted(ScriptedCall::Quit);
        if status.is_success() {
            self.state().quit_code = Some(exit_code);
        }
        status
    }
}

fn write_text(text: &str, output: &mut TextBuilder, capacity: &mut usize) -> HResult {
    let required = text.encode_utf16().count() + 1;
    if *capacity < required || !output.fits(text) {
        *capacity = required;
        return HResult::E_MOREDATA;
    }
    output.set_text(text);
    HResult::S_OK
}

fn escape(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '[' => escaped.push_str("[\\[]"),
            ']' => escaped.push_str("[\\]]"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn strip_not(condition: &str) -> Option<&str> {
    let (head, rest) = condition.split_once(char::is_whitespace)?;
    head.eq_ignore_ascii_case("NOT").then_some(rest)
}

#[cfg(test)]
mod tests {
    use super::{InMemoryHost, Variable};
    use crate::buffer::TextBuilder;
    use crate::host::HostEngine;
    use crate::status::HResult;

    #[test]
    fn string_get_reports_required_capacity_with_terminator() {
        let host = InMemoryHost::new();
        host.insert("Name", Variable::String("abcd".to_string()));

        let mut buffer = [0u16; 2];
        let mut capacity = buffer.len();
        let status = host.get_variable_string("Name", &mut buffer, &mut capacity);
        assert_eq!(status, HResult::E_MOREDATA);
        assert_eq!(capacity, 5);
    }

    #[test]
    fn coerces_between_stored_types() {
        let host = InMemoryHost::new();
        host.insert("Count", Variable::String(" 42 ".to_string()));
        host.insert("Ver", Variable::String("1.2.3.4".to_string()));
        assert_eq!(host.get_variable_numeric("Count"), Ok(42));
        assert_eq!(host.get_variable_version("Ver"), Ok(0x0001_0002_0003_0004));
        assert_eq!(
            host.get_variable_numeric("Missing"),
            Err(HResult::E_NOTFOUND)
        );
    }

    #[test]
    fn format_expands_references_and_escapes() {
        let host = InMemoryHost::new();
        host.insert("Dir", Variable::String("C:\\App".to_string()));
        let mut output = TextBuilder::with_capacity(64);
        let mut capacity = 64;
        let status = host.format_string("[Dir]\\[\\[]x[\\]] [Nope]", &mut output, &mut capacity);
        assert_eq!(status, HResult::S_OK);
        assert_eq!(output.as_str(), "C:\\App\\[x] ");
    }

    #[test]
    fn escape_brackets_round_trip_through_format() {
        let host = InMemoryHost::new();
        let mut escaped = TextBuilder::with_capacity(64);
        let mut capacity = 64;
        assert!(host
            .escape_string("[Literal]", &mut escaped, &mut capacity)
            .is_success());

        let mut formatted = TextBuilder::with_capacity(64);
        let mut capacity = 64;
        assert!(host
            .format_string(escaped.as_str(), &mut formatted, &mut capacity)
            .is_success());
        assert_eq!(formatted.as_str(), "[Literal]");
    }

    #[test]
    fn conditions_support_truthiness_and_not() {
        let host = InMemoryHost::new();
        host.insert("Installed", Variable::Numeric(1));
        host.insert("Empty", Variable::String(String::new()));
        assert_eq!(host.evaluate_condition("Installed"), Ok(true));
        assert_eq!(host.evaluate_condition("NOT Installed"), Ok(false));
        assert_eq!(host.evaluate_condition("Empty"), Ok(false));
        assert_eq!(host.evaluate_condition("not Missing"), Ok(true));
        assert_eq!(
            host.evaluate_condition("Installed <> 1"),
            Err(HResult::E_INVALIDDATA)
        );
    }
}
