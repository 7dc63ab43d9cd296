//! Workspace umbrella crate.
//!
//! Re-exports the service façade and the metadata domain model so host
//! applications can depend on `artist-meta-workspace` alone. The
//! `desktop-shims` feature (default) brings in `core-service` with the
//! `bridge-desktop` fallbacks for HTTP, DNS and settings.

pub use core_metadata as metadata;

#[cfg(feature = "desktop-shims")]
pub use core_service::{CoreError, CoreService, LibraryBindings};
