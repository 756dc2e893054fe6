use bext_core::buffer::buffer_ledger;
use bext_core::host::{HostEngine, HostResult, LogLevel, Variable};
use bext_core::{
    BundleVersion, Engine, EngineError, HResult, InMemoryHost, LooseVersion, SecureString,
    VersionError,
};
use std::sync::Arc;

/// Host holding raw string units and a fixed answer for string sets.
struct RawStringHost {
    units: Vec<u16>,
    set_status: HResult,
}

impl RawStringHost {
    fn new(units: &[u16], set_status: HResult) -> Self {
        Self {
            units: units.to_vec(),
            set_status,
        }
    }
}

impl HostEngine for RawStringHost {
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
        if buffer.len() < self.units.len() {
            *capacity = self.units.len();
            return HResult::E_INSUFFICIENT_BUFFER;
        }
        buffer[..self.units.len()].copy_from_slice(&self.units);
        HResult::S_OK
    }

    fn set_variable_string(&self, _name: &str, _value: &[u16]) -> HResult {
        self.set_status
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

fn engine() -> (Arc<InMemoryHost>, Engine) {
    let host = Arc::new(InMemoryHost::new());
    let engine = Engine::new(host.clone());
    (host, engine)
}

#[test]
fn numeric_values_round_trip_through_the_host() {
    let (host, engine) = engine();
    let numbers = engine.numeric_variables();
    numbers.set("RebootCount", -3).expect("set numeric");
    assert_eq!(numbers.get("RebootCount"), Ok(-3));
    assert_eq!(host.variable("RebootCount"), Some(Variable::Numeric(-3)));
}

#[test]
fn contains_is_false_only_for_not_found() {
    let (host, engine) = engine();
    host.insert("Present", Variable::Numeric(1));
    host.inject_status("Locked", HResult::E_ACCESSDENIED);

    let numbers = engine.numeric_variables();
    assert!(numbers.contains("Present"));
    assert!(!numbers.contains("Absent"));
    assert!(numbers.contains("Locked"));

    let versions = engine.version_variables();
    assert!(versions.contains("Locked"));
    assert!(!versions.contains("Absent"));

    let strings = engine.string_variables();
    assert!(strings.contains("Locked"));
    assert!(!strings.contains("Absent"));
    assert!(engine.secure_string_variables().contains("Locked"));
}

#[test]
fn unrelated_failures_keep_their_status() {
    let (host, engine) = engine();
    host.inject_status("Locked", HResult::E_ACCESSDENIED);

    let err = engine
        .numeric_variables()
        .get("Locked")
        .expect_err("injected failure");
    assert_eq!(
        err,
        EngineError::HostCall {
            call: "get_variable_numeric",
            status: HResult::E_ACCESSDENIED,
        }
    );
    let err = engine
        .string_variables()
        .get("Missing")
        .expect_err("absent string");
    assert_eq!(err, EngineError::VariableNotFound("Missing".to_string()));
}

#[test]
fn strings_with_non_ascii_text_round_trip() {
    let (_host, engine) = engine();
    let strings = engine.string_variables();
    strings.set("Greeting", "h\u{e9}llo \u{1F600}").expect("set");
    assert_eq!(strings.get("Greeting").as_deref(), Ok("h\u{e9}llo \u{1F600}"));
    assert_eq!(buffer_ledger().outstanding(), 0);
}

#[test]
fn secure_password_round_trips_unit_by_unit() {
    let (host, engine) = engine();
    let secure = engine.secure_string_variables();

    let mut password: SecureString = "s3cr3t".chars().collect();
    password.make_read_only();
    secure.set("Password", &password).expect("set secure");
    assert_eq!(
        host.variable("Password"),
        Some(Variable::String("s3cr3t".to_string()))
    );

    let fetched = secure.get("Password").expect("get secure");
    assert_eq!(fetched.len(), 6);
    let decoded: Vec<char> = fetched
        .chars()
        .map(|ch| ch.expect("valid utf-16"))
        .collect();
    assert_eq!(decoded, ['s', '3', 'c', 'r', '3', 't']);
    assert!(!format!("{fetched:?}").contains("s3cr3t"));
    assert_eq!(buffer_ledger().outstanding(), 0);
}

#[test]
fn versions_are_packed_on_the_host_side() {
    let (host, engine) = engine();
    let versions = engine.version_variables();
    let version = BundleVersion::new(1, 2, 3, 4);
    versions.set("InstalledVersion", version).expect("set version");

    assert_eq!(
        host.variable("InstalledVersion"),
        Some(Variable::Version(0x0001_0002_0003_0004))
    );
    assert_eq!(versions.get("InstalledVersion"), Ok(version));
}

#[test]
fn out_of_range_loose_versions_never_reach_the_host() {
    let (host, engine) = engine();
    let versions = engine.version_variables();

    let err = versions
        .set_loose("Bad", &LooseVersion::new(70000, 0, -1, -1))
        .expect_err("major overflow");
    assert!(matches!(
        err,
        EngineError::InvalidVersion(VersionError::ComponentOutOfRange { value: 70000, .. })
    ));
    assert_eq!(host.variable("Bad"), None);

    versions
        .set_loose("Good", &LooseVersion::major_minor(5, 1))
        .expect("undefined parts become zero");
    assert_eq!(versions.get("Good"), Ok(BundleVersion::new(5, 1, 0, 0)));
}

#[test]
fn unpaired_surrogate_fails_plain_read_but_not_secure_read() {
    let engine = Engine::new(Arc::new(RawStringHost::new(&[0xD800, 0x41, 0], HResult::S_OK)));

    let err = engine
        .string_variables()
        .get("Broken")
        .expect_err("lone surrogate");
    assert_eq!(err, EngineError::InvalidString("Broken".to_string()));
    assert_eq!(err.status(), HResult::E_INVALIDDATA);

    let secure = engine
        .secure_string_variables()
        .get("Broken")
        .expect("secure read keeps raw units");
    assert_eq!(secure.len(), 2);
    assert_eq!(secure.unit_at(0), Some(0xD800));
    assert_eq!(secure.unit_at(1), Some(0x41));
    assert_eq!(buffer_ledger().outstanding(), 0);
}

#[test]
fn rejected_string_sets_still_release_their_buffers() {
    let engine = Engine::new(Arc::new(RawStringHost::new(&[0], HResult::E_ACCESSDENIED)));
    let denied = EngineError::HostCall {
        call: "set_variable_string",
        status: HResult::E_ACCESSDENIED,
    };
    let before = buffer_ledger();

    assert_eq!(
        engine.string_variables().set("InstallDir", "C:\\Program Files"),
        Err(denied.clone())
    );
    let password: SecureString = "s3cr3t".chars().collect();
    assert_eq!(
        engine.secure_string_variables().set("Password", &password),
        Err(denied)
    );

    let delta = buffer_ledger().since(before);
    assert_eq!(delta.allocated, 2);
    assert_eq!(delta.released, 2);
}
