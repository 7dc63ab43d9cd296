//! # Outbound Fetch
//!
//! Every fetch of a URL that came from a provider response or from a user
//! goes through this crate:
//!
//! - [`GuardedHttpClient`] resolves the target host and refuses loopback,
//!   private, link-local and unspecified addresses before any connection is
//!   made. Refusals surface as `BridgeError::BlockedTarget` and are never
//!   retried.
//! - [`ImageDownloader`] fetches a remote image through the guard and enforces
//!   the payload size cap and the raster content-type allow-list.

pub mod error;
pub mod guard;
pub mod image;

pub use error::{FetchError, Result};
pub use guard::{GuardedHttpClient, StaticResolver};
pub use image::{detect_mime_type, validate_image, DownloadedImage, ImageDownloader, ALLOWED_IMAGE_TYPES};
