//! # Host Bridge Traits
//!
//! Capability traits the metadata core needs from its host.
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Async HTTP used by provider adapters and image fetches
//! - [`HostResolver`](net::HostResolver) - DNS resolution for the outbound fetch guard
//! - [`SettingsStore`](storage::SettingsStore) - Key-value preferences (provider priorities)
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! Desktop implementations live in `bridge-desktop`.
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with descriptive errors when a required capability is missing:
//!
//! ```ignore
//! let settings = config.settings_store
//!     .ok_or_else(|| Error::CapabilityMissing {
//!         capability: "SettingsStore".to_string(),
//!         message: "No settings store provided".to_string(),
//!     })?;
//! ```
//!
//! ## Address Policy
//!
//! [`is_blocked_address`](net::is_blocked_address) is the single definition of
//! which IP addresses an outbound fetch may reach. Both the transport-level
//! resolver in `bridge-desktop` and the guard in `core-fetch` use it.

pub mod error;
pub mod http;
pub mod net;
pub mod storage;
pub mod time;

pub use error::BridgeError;

pub use http::{BodyLimit, HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use net::{is_blocked_address, HostResolver};
pub use storage::SettingsStore;
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
