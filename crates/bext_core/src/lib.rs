//! Host/extension boundary layer for bundle bootstrapper engines.
//! Typed variable access, buffer negotiation and the reference-counted
//! extension object model live here; the native export surface lives in
//! `bext_ffi`.

pub mod buffer;
pub mod engine;
pub mod extension;
pub mod host;
pub mod logging;
pub mod status;
pub mod version;

pub use buffer::{SecureString, SecureStringError, WideBuffer};
pub use engine::{Engine, EngineError, EngineResult};
pub use extension::{
    create_extension, BundleExtension, ExtensionContext, ExtensionCreateArgs, ExtensionError,
    ExtensionRef, InterfaceId,
};
pub use host::{HostEngine, HostResult};
#[cfg(feature = "memory-host")]
pub use host::InMemoryHost;
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use status::HResult;
pub use version::{BundleVersion, LooseVersion, VersionError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
