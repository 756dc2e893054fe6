//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `bext_core` linkage without a native bundle engine.
//! - Run one variable and format round trip against the in-memory host.

use bext_core::{BundleVersion, Engine, InMemoryHost};
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    println!("bext_core version={}", bext_core::core_version());
    match probe() {
        Ok(formatted) => {
            println!("bext_core probe=ok formatted={formatted}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("bext_core probe=error status={} error={err}", err.status());
            ExitCode::FAILURE
        }
    }
}

fn probe() -> Result<String, bext_core::EngineError> {
    let engine = Engine::new(Arc::new(InMemoryHost::new()));
    engine.string_variables().set("ProductName", "Probe")?;
    engine
        .version_variables()
        .set("ProductVersion", BundleVersion::new(1, 0, 0, 0))?;
    engine.format_string("[ProductName] [ProductVersion]")
}
