use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::models::ProviderId;

/// Failure reported by a single provider call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider has no record. Not a failure for reconciliation purposes.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::NotFound(_))
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, ProviderError::Auth(_))
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            ProviderError::NotFound(_) | ProviderError::InvalidResponse(_) => {
                FailureKind::InvalidResponse
            }
            ProviderError::Auth(_) => FailureKind::Auth,
            ProviderError::RateLimited(_) => FailureKind::RateLimited,
            ProviderError::Transport(_) => FailureKind::Transport,
            ProviderError::Timeout(_) => FailureKind::Timeout,
        }
    }

    /// Classify an HTTP status from a provider API.
    pub fn from_status(status: u16, context: &str) -> Self {
        match status {
            401 | 403 => ProviderError::Auth(format!("{} returned {}", context, status)),
            404 => ProviderError::NotFound(context.to_string()),
            429 | 503 => ProviderError::RateLimited(format!("{} returned {}", context, status)),
            _ => ProviderError::Transport(format!("{} returned {}", context, status)),
        }
    }
}

impl From<bridge_traits::BridgeError> for ProviderError {
    fn from(err: bridge_traits::BridgeError) -> Self {
        ProviderError::Transport(err.to_string())
    }
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Why a dimension probe left a candidate unsized.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] bridge_traits::BridgeError),

    #[error("Image host returned HTTP {0}")]
    Status(u16),

    #[error("Undecodable image header: {0}")]
    Decode(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Transport,
    Auth,
    Timeout,
    InvalidResponse,
    RateLimited,
}

/// A provider's failure, kept alongside a partial result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderFailure {
    pub provider: ProviderId,
    pub kind: FailureKind,
    pub message: String,
}

impl ProviderFailure {
    pub fn new(provider: ProviderId, error: &ProviderError) -> Self {
        Self {
            provider,
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.provider, self.message)
    }
}

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Invalid field: {0}")]
    InvalidField(String),

    #[error("Invalid image type: {0}")]
    InvalidImageType(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Invalid priority configuration: {0}")]
    InvalidPriority(String),

    #[error("Provider {provider} does not support {capability}")]
    Unsupported {
        provider: ProviderId,
        capability: &'static str,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::BridgeError),
}

pub type Result<T> = std::result::Result<T, MetadataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(ProviderError::from_status(401, "lastfm").is_auth());
        assert!(ProviderError::from_status(404, "mb").is_not_found());
        assert_eq!(
            ProviderError::from_status(429, "mb").kind(),
            FailureKind::RateLimited
        );
        assert_eq!(
            ProviderError::from_status(500, "mb").kind(),
            FailureKind::Transport
        );
    }

    #[test]
    fn test_failure_carries_provider_and_kind() {
        let failure = ProviderFailure::new(
            ProviderId::LastFm,
            &ProviderError::Auth("invalid API key".to_string()),
        );
        assert_eq!(failure.kind, FailureKind::Auth);
        assert_eq!(failure.to_string(), "lastfm: Authentication failed: invalid API key");
    }
}
