use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] core_fetch::FetchError),

    #[error("Operation error: {0}")]
    Sync(#[from] core_sync::SyncError),

    #[error("Library error: {0}")]
    Library(#[from] core_library::LibraryError),

    #[error("Metadata error: {0}")]
    Metadata(#[from] core_metadata::MetadataError),
}

impl CoreError {
    /// True when a library operation was refused because one is already running.
    pub fn is_conflict(&self) -> bool {
        matches!(self, CoreError::Sync(e) if e.is_conflict())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
