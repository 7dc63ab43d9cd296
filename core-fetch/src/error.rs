use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("Remote returned HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Image is {size} bytes, limit is {limit}")]
    TooLarge { size: u64, limit: u64 },

    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("Declared content type {declared} does not match payload ({detected})")]
    ContentMismatch { declared: String, detected: String },
}

impl FetchError {
    /// True when the outbound fetch guard refused the target.
    pub fn is_blocked_target(&self) -> bool {
        matches!(self, FetchError::Bridge(e) if e.is_blocked_target())
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;
