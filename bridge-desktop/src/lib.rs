//! # Desktop Bridge Implementations
//!
//! Default bridge implementations for desktop hosts (macOS, Windows, Linux):
//! - `HttpClient` using `reqwest`, with the outbound address policy wired into
//!   DNS resolution and redirect handling
//! - `HostResolver` using the system resolver
//! - `SettingsStore` using a SQLite-backed key-value table
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, SqliteSettingsStore, SystemResolver};
//!
//! let http = ReqwestHttpClient::new()?;
//! let settings = SqliteSettingsStore::new("settings.db".into()).await?;
//! ```

mod http;
mod net;
mod settings;

pub use http::ReqwestHttpClient;
pub use net::{BlockedAddress, GuardedDnsResolver, SystemResolver};
pub use settings::SqliteSettingsStore;
