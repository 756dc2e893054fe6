use bext_core::buffer::{buffer_ledger, BufferLedger, INITIAL_CAPACITY};
use bext_core::host::{HostEngine, HostResult, LogLevel};
use bext_core::{Engine, EngineError, HResult, InMemoryHost};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Host whose string getter asks for `required` units, then writes `value`.
struct ResizingHost {
    required: usize,
    value: String,
    second_status: HResult,
    calls: AtomicUsize,
}

impl ResizingHost {
    fn new(required: usize, value: &str) -> Self {
        Self {
            required,
            value: value.to_string(),
            second_status: HResult::S_OK,
            calls: AtomicUsize::new(0),
        }
    }
}

impl HostEngine for ResizingHost {
    fn get_variable_numeric(&self, _name: &str) -> HostResult<i64> {
        Err(HResult::E_NOTFOUND)
    }

    fn set_variable_numeric(&self, _name: &str, _value: i64) -> HResult {
        HResult::E_NOTIMPL
    }

    fn get_variable_string(
        &self,
        _name: &str,
        buffer: &mut [u16],
        capacity: &mut usize,
    ) -> HResult {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            assert_eq!(*capacity, INITIAL_CAPACITY);
            *capacity = self.required;
            return HResult::E_INSUFFICIENT_BUFFER;
        }
        assert_eq!(buffer.len(), self.required);
        if self.second_status.is_failure() {
            return self.second_status;
        }
        for (slot, unit) in buffer.iter_mut().zip(self.value.encode_utf16()) {
            *slot = unit;
        }
        HResult::S_OK
    }

    fn set_variable_string(&self, _name: &str, _value: &[u16]) -> HResult {
        HResult::E_NOTIMPL
    }

    fn get_variable_version(&self, _name: &str) -> HostResult<u64> {
        Err(HResult::E_NOTFOUND)
    }

    fn set_variable_version(&self, _name: &str, _value: u64) -> HResult {
        HResult::E_NOTIMPL
    }

    fn log(&self, _level: LogLevel, _message: &str) -> HResult {
        HResult::S_OK
    }
}

#[test]
fn resize_returns_scanned_prefix_and_releases_both_buffers() {
    let value = "C".repeat(100);
    let host = Arc::new(ResizingHost::new(120, &value));
    let engine = Engine::new(host.clone());

    let before = buffer_ledger();
    let fetched = engine
        .string_variables()
        .get("Long")
        .expect("negotiated string");
    let used = buffer_ledger().since(before);

    assert_eq!(fetched, value);
    assert_eq!(host.calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        used,
        BufferLedger {
            allocated: 2,
            released: 2
        }
    );
}

#[test]
fn failed_resize_call_still_releases_both_buffers() {
    let mut host = ResizingHost::new(200, "unused");
    host.second_status = HResult::E_ACCESSDENIED;
    let engine = Engine::new(Arc::new(host));

    let before = buffer_ledger();
    let err = engine
        .string_variables()
        .get("Guarded")
        .expect_err("second call fails");
    let used = buffer_ledger().since(before);

    assert_eq!(err.status(), HResult::E_ACCESSDENIED);
    assert!(matches!(err, EngineError::HostCall { .. }));
    assert_eq!(used.allocated, 2);
    assert_eq!(used.outstanding(), 0);
}

#[test]
fn short_values_fit_the_first_buffer() {
    let host = Arc::new(InMemoryHost::new());
    let engine = Engine::new(host);
    engine
        .string_variables()
        .set("Short", "abc")
        .expect("set string");

    let before = buffer_ledger();
    assert_eq!(engine.string_variables().get("Short").as_deref(), Ok("abc"));
    assert_eq!(buffer_ledger().since(before).allocated, 1);
    assert_eq!(buffer_ledger().outstanding(), 0);
}

#[test]
fn format_and_escape_negotiate_long_output() {
    let host = Arc::new(InMemoryHost::new());
    let engine = Engine::new(host);
    let long = "x".repeat(300);
    engine
        .string_variables()
        .set("Long", &long)
        .expect("set string");

    let formatted = engine.format_string("<[Long]>").expect("format");
    assert_eq!(formatted, format!("<{long}>"));

    let escaped = engine.escape_string("[a]").expect("escape");
    assert_eq!(escaped, "[\\[]a[\\]]");
    assert_eq!(engine.format_string(&escaped).as_deref(), Ok("[a]"));
}
