//! Guarded image download for user-submitted "fetch from URL" requests.

use bridge_traits::http::{HttpClient, HttpRequest};
use bridge_traits::BridgeError;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::error::{FetchError, Result};
use crate::guard::GuardedHttpClient;

/// Raster formats accepted from remote URLs.
pub const ALLOWED_IMAGE_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/bmp",
];

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A validated image payload.
#[derive(Debug, Clone)]
pub struct DownloadedImage {
    pub url: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// Downloads remote images through the outbound fetch guard.
///
/// Takes the concrete [`GuardedHttpClient`] rather than `dyn HttpClient` so
/// an unguarded transport cannot be passed in.
pub struct ImageDownloader {
    client: Arc<GuardedHttpClient>,
    max_bytes: u64,
    timeout: Duration,
}

impl ImageDownloader {
    pub fn new(client: Arc<GuardedHttpClient>, max_bytes: u64) -> Self {
        Self {
            client,
            max_bytes,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Fetch `url` and validate size and content type.
    ///
    /// The transport stops reading once the body passes `max_bytes`.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Bridge`] with `BlockedTarget` when the guard refuses the host
    /// - [`FetchError::HttpStatus`] for non-2xx responses
    /// - [`FetchError::TooLarge`], [`FetchError::UnsupportedContentType`] or
    ///   [`FetchError::ContentMismatch`] when the payload fails validation
    #[instrument(skip(self))]
    pub async fn download(&self, url: &str) -> Result<DownloadedImage> {
        let request = HttpRequest::get(url)
            .header("Accept", ALLOWED_IMAGE_TYPES.join(", "))
            .max_body(self.max_bytes)
            .timeout(self.timeout);
        let response = self.client.execute(request).await.map_err(|e| match e {
            BridgeError::BodyTooLarge { size, limit } => FetchError::TooLarge { size, limit },
            other => other.into(),
        })?;

        if !response.is_success() {
            return Err(FetchError::HttpStatus {
                status: response.status,
                url: url.to_string(),
            });
        }
        if let Some(declared) = response.content_length() {
            check_size(declared, self.max_bytes)?;
        }

        let content_type = validate_image(&response.body, response.content_type().as_deref(), self.max_bytes)?;
        info!(content_type = %content_type, size = response.body.len(), "Downloaded image");

        Ok(DownloadedImage {
            url: url.to_string(),
            content_type,
            bytes: response.body,
        })
    }
}

fn check_size(size: u64, limit: u64) -> Result<()> {
    if size > limit {
        return Err(FetchError::TooLarge { size, limit });
    }
    Ok(())
}

/// Validate an image payload and return its canonical content type.
///
/// The payload's magic bytes decide the type; a declared type, when present,
/// must be on the allow-list and agree with them.
pub fn validate_image(body: &[u8], declared: Option<&str>, max_bytes: u64) -> Result<String> {
    check_size(body.len() as u64, max_bytes)?;

    let declared = declared.map(normalize_content_type);
    if let Some(ref declared) = declared {
        if !ALLOWED_IMAGE_TYPES.contains(&declared.as_str()) {
            return Err(FetchError::UnsupportedContentType(declared.clone()));
        }
    }

    let detected = detect_mime_type(body).ok_or_else(|| {
        FetchError::UnsupportedContentType(
            declared
                .clone()
                .unwrap_or_else(|| "unrecognized payload".to_string()),
        )
    })?;

    match declared {
        Some(declared) if declared != detected => {
            debug!(declared = %declared, detected, "Content type mismatch");
            Err(FetchError::ContentMismatch {
                declared,
                detected: detected.to_string(),
            })
        }
        _ => Ok(detected.to_string()),
    }
}

fn normalize_content_type(value: &str) -> String {
    let value = value.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    match value.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        "image/x-ms-bmp" => "image/bmp".to_string(),
        _ => value,
    }
}

/// Identify an allowed raster format from its leading bytes.
pub fn detect_mime_type(data: &[u8]) -> Option<&'static str> {
    match data {
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [0x89, b'P', b'N', b'G', ..] => Some("image/png"),
        [b'G', b'I', b'F', b'8', ..] => Some("image/gif"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("image/webp"),
        [b'B', b'M', ..] if data.len() >= 14 => Some("image/bmp"),
        _ => None,
    }
}
