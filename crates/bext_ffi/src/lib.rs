//! Native export surface for the file-search bundle extension.
//!
//! The host loads this library, calls `BundleExtensionCreate` with its
//! engine callback table and receives an extension interface pointer plus
//! the proc callback that routes messages to it.

pub mod api;
pub mod config;
pub mod host;
pub mod search;

pub use api::{
    BundleExtensionCreate, BundleExtensionCreateArgs, BundleExtensionCreateResults,
    BundleExtensionDestroy,
};
pub use host::{BextEngineCallbacks, NativeHost};
pub use search::{FileSearchExtension, SearchDefinition, SearchKind, SEARCH_FILE_NAME};
