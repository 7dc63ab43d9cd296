use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Outbound fetch refused because the target resolves to a non-public address.
    #[error("Blocked outbound target: {0}")]
    BlockedTarget(String),

    /// The response body ran past the request's [`BodyLimit::Reject`] bound.
    ///
    /// [`BodyLimit::Reject`]: crate::http::BodyLimit::Reject
    #[error("Response body of at least {size} bytes exceeds limit of {limit}")]
    BodyTooLarge { size: u64, limit: u64 },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    pub fn is_blocked_target(&self) -> bool {
        matches!(self, BridgeError::BlockedTarget(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
