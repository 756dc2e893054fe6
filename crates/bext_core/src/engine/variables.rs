//! Typed views over the host's named-variable store.
//!
//! # Responsibility
//! - Expose integer, string, secure-string and version views with
//!   `get`/`set`/`contains` over one shared host reference.
//!
//! # Invariants
//! - Views borrow the host; they never retain or duplicate it.
//! - `contains` is `false` only for `E_NOTFOUND`; any other status (success
//!   or an unrelated failure) counts as present.
//! - Transient native buffers are released on every path.
//! - String values are decoded strictly; unpaired surrogates fail with
//!   `E_INVALIDDATA` instead of being replaced.

use super::{EngineError, EngineResult};
use crate::buffer::{negotiate, Negotiated, SecureString, WideBuffer, INITIAL_CAPACITY};
use crate::host::{HostEngine, HostResult};
use crate::status::HResult;
use crate::version::{normalize, BundleVersion, LooseVersion};
use log::warn;

/// Integer variables.
#[derive(Clone, Copy)]
pub struct NumericVariables<'h> {
    host: &'h dyn HostEngine,
}

impl<'h> NumericVariables<'h> {
    pub(crate) fn new(host: &'h dyn HostEngine) -> Self {
        Self { host }
    }

    pub fn get(&self, name: &str) -> EngineResult<i64> {
        value_result(name, "get_variable_numeric", self.host.get_variable_numeric(name))
    }

    pub fn set(&self, name: &str, value: i64) -> EngineResult<()> {
        status_result(
            "set_variable_numeric",
            self.host.set_variable_numeric(name, value),
        )
    }

    pub fn contains(&self, name: &str) -> bool {
        present(self.host.get_variable_numeric(name).err())
    }
}

/// Plain string variables.
#[derive(Clone, Copy)]
pub struct StringVariables<'h> {
    host: &'h dyn HostEngine,
}

impl<'h> StringVariables<'h> {
    pub(crate) fn new(host: &'h dyn HostEngine) -> Self {
        Self { host }
    }

    pub fn get(&self, name: &str) -> EngineResult<String> {
        let (buffer, len) = fetch_string(self.host, name)?;
        buffer.decode(len).map_err(|_| {
            warn!(
                "event=variable_decode module=engine status=error hr={}",
                HResult::E_INVALIDDATA
            );
            EngineError::InvalidString(name.to_string())
        })
    }

    /// Copies `value` into a transient native buffer for one host call.
    pub fn set(&self, name: &str, value: &str) -> EngineResult<()> {
        let buffer = WideBuffer::from_text(value);
        let status = self.host.set_variable_string(name, buffer.as_slice());
        drop(buffer);
        status_result("set_variable_string", status)
    }

    pub fn contains(&self, name: &str) -> bool {
        probe_string(self.host, name)
    }
}

/// Secret string variables.
#[derive(Clone, Copy)]
pub struct SecureStringVariables<'h> {
    host: &'h dyn HostEngine,
}

impl<'h> SecureStringVariables<'h> {
    pub(crate) fn new(host: &'h dyn HostEngine) -> Self {
        Self { host }
    }

    /// Moves the value into a [`SecureString`] one code unit at a time.
    ///
    /// Each unit is wiped from the native buffer right after it is copied;
    /// the full value never exists as a `String`.
    pub fn get(&self, name: &str) -> EngineResult<SecureString> {
        let (mut buffer, len) = fetch_string(self.host, name)?;
        let mut value = SecureString::with_capacity(len);
        for index in 0..len {
            let unit = buffer.as_slice()[index];
            // Pre-sized and fresh, so append cannot fail.
            let _ = value.push_unit(unit);
            buffer.wipe_unit(index);
        }
        Ok(value)
    }

    pub fn set(&self, name: &str, value: &SecureString) -> EngineResult<()> {
        let buffer = value.to_plain_buffer();
        let status = self.host.set_variable_string(name, buffer.as_slice());
        drop(buffer);
        status_result("set_variable_string", status)
    }

    pub fn contains(&self, name: &str) -> bool {
        probe_string(self.host, name)
    }
}

/// Version variables, stored by the host as packed 64-bit values.
#[derive(Clone, Copy)]
pub struct VersionVariables<'h> {
    host: &'h dyn HostEngine,
}

impl<'h> VersionVariables<'h> {
    pub(crate) fn new(host: &'h dyn HostEngine) -> Self {
        Self { host }
    }

    pub fn get(&self, name: &str) -> EngineResult<BundleVersion> {
        value_result(name, "get_variable_version", self.host.get_variable_version(name))
            .map(BundleVersion::from_packed)
    }

    pub fn set(&self, name: &str, value: BundleVersion) -> EngineResult<()> {
        status_result(
            "set_variable_version",
            self.host.set_variable_version(name, value.to_packed()),
        )
    }

    /// Validates `value` and stores it; nothing reaches the host on a range error.
    pub fn set_loose(&self, name: &str, value: &LooseVersion) -> EngineResult<()> {
        self.set(name, normalize(value)?)
    }

    pub fn contains(&self, name: &str) -> bool {
        present(self.host.get_variable_version(name).err())
    }
}

/// Negotiates the string value of `name` and returns it with its scanned length.
fn fetch_string(host: &dyn HostEngine, name: &str) -> EngineResult<(WideBuffer, usize)> {
    let Negotiated { buffer, capacity } =
        negotiate::<WideBuffer, _>(INITIAL_CAPACITY, |buffer, capacity| {
            host.get_variable_string(name, buffer.as_mut_slice(), capacity)
        })
        .map_err(|status| lookup_error(name, "get_variable_string", status))?;

    // Only the resize path reports an exact size; rescan for the terminator.
    let len = buffer.terminated_len(capacity);
    Ok((buffer, len))
}

fn probe_string(host: &dyn HostEngine, name: &str) -> bool {
    let mut capacity = 0;
    let status = host.get_variable_string(name, &mut [], &mut capacity);
    !status.is_not_found()
}

fn present(failure: Option<HResult>) -> bool {
    !failure.is_some_and(HResult::is_not_found)
}

fn value_result<T>(name: &str, call: &'static str, result: HostResult<T>) -> EngineResult<T> {
    result.map_err(|status| lookup_error(name, call, status))
}

fn status_result(call: &'static str, status: HResult) -> EngineResult<()> {
    status
        .ok()
        .map_err(|status| EngineError::host_call(call, status))
}

fn lookup_error(name: &str, call: &'static str, status: HResult) -> EngineError {
    if status.is_not_found() {
        EngineError::VariableNotFound(name.to_string())
    } else {
        EngineError::host_call(call, status)
    }
}

#[cfg(test)]
mod tests {
    use super::{present, NumericVariables, StringVariables};
    use crate::engine::EngineError;
    use crate::host::{InMemoryHost, Variable};
    use crate::status::HResult;

    #[test]
    fn only_not_found_means_absent() {
        assert!(!present(Some(HResult::E_NOTFOUND)));
        assert!(present(None));
        assert!(present(Some(HResult::E_ACCESSDENIED)));
    }

    #[test]
    fn missing_numeric_get_is_not_found() {
        let host = InMemoryHost::new();
        let err = NumericVariables::new(&host)
            .get("Absent")
            .expect_err("absent variable");
        assert_eq!(err, EngineError::VariableNotFound("Absent".to_string()));
    }

    #[test]
    fn string_contains_probes_without_a_buffer() {
        let host = InMemoryHost::new();
        host.insert("Present", Variable::String(String::new()));
        let strings = StringVariables::new(&host);
        assert!(strings.contains("Present"));
        assert!(!strings.contains("Absent"));
    }
}
