//! Runtime configuration read from the process environment.
//!
//! # Invariants
//! - The environment is read once per process; later changes are ignored.
//! - Logging stays off unless a log directory is configured.

use bext_core::host::{HostEngine, LogLevel};
use bext_core::{default_log_level, init_logging, LoggingError};
use std::path::PathBuf;
use std::sync::OnceLock;

pub const LOG_LEVEL_ENV: &str = "BEXT_LOG_LEVEL";
pub const LOG_DIR_ENV: &str = "BEXT_LOG_DIR";

static RUNTIME_CONFIG: OnceLock<RuntimeConfig> = OnceLock::new();

/// Settings the export surface needs before an extension exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
}

impl RuntimeConfig {
    /// Builds a config from a key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        Self {
            log_level: read(LOG_LEVEL_ENV).unwrap_or_else(|| default_log_level().to_string()),
            log_dir: read(LOG_DIR_ENV).map(PathBuf::from),
        }
    }
}

/// Process configuration, read from the environment on first use.
pub fn runtime_config() -> &'static RuntimeConfig {
    RUNTIME_CONFIG.get_or_init(|| RuntimeConfig::from_lookup(|key| std::env::var(key).ok()))
}

/// Starts file logging when a log directory is configured.
///
/// Returns `Ok(false)` when logging is not configured.
pub fn ensure_logging(config: &RuntimeConfig) -> Result<bool, LoggingError> {
    let Some(log_dir) = config.log_dir.as_ref() else {
        return Ok(false);
    };
    init_logging(&config.log_level, &log_dir.to_string_lossy())?;
    Ok(true)
}

/// Sends a logging startup failure to the engine's own log.
///
/// Falls back to stderr when the host rejects the log call.
pub fn report_logging_failure(host: &dyn HostEngine, err: &LoggingError) {
    let message = format!("bext: file logging disabled: {err}");
    let status = host.log(LogLevel::Error, &message);
    if status.is_failure() {
        eprintln!("{message} (host log returned {status})");
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ensure_logging, report_logging_failure, RuntimeConfig, LOG_DIR_ENV, LOG_LEVEL_ENV,
    };
    use bext_core::host::LogLevel;
    use bext_core::{InMemoryHost, LoggingError};
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn config(pairs: &[(&str, &str)]) -> RuntimeConfig {
        let env: BTreeMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        RuntimeConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn unset_directory_disables_logging() {
        let config = config(&[(LOG_LEVEL_ENV, "trace"), (LOG_DIR_ENV, "  ")]);
        assert_eq!(config.log_level, "trace");
        assert_eq!(config.log_dir, None);
        assert_eq!(ensure_logging(&config), Ok(false));
    }

    #[test]
    fn directory_is_taken_verbatim() {
        let config = config(&[(LOG_DIR_ENV, "/var/log/bext")]);
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/bext")));
        assert_eq!(config.log_level, bext_core::default_log_level());
    }

    #[test]
    fn relative_directory_failure_reaches_the_host_log() {
        let config = config(&[(LOG_DIR_ENV, "relative/logs")]);
        let err = ensure_logging(&config).expect_err("relative directory");
        assert!(matches!(err, LoggingError::InvalidDirectory(_)));

        let host = InMemoryHost::new();
        report_logging_failure(&host, &err);
        let lines = host.log_lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].0, LogLevel::Error);
        assert!(lines[0].1.contains("file logging disabled"));
    }
}
