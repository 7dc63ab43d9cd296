use core_library::LibraryError;
use core_metadata::MetadataError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("A {operation} operation is already running for library {library_id}")]
    OperationInProgress {
        library_id: String,
        operation: String,
    },

    #[error("No running operation for library {library_id}")]
    NotRunning { library_id: String },

    #[error("Invalid operation status: {0}")]
    InvalidStatus(String),

    #[error("Invalid operation kind: {0}")]
    InvalidOperation(String),

    #[error("Operation cancelled: shutting down")]
    Cancelled,

    #[error("Library source error: {0}")]
    Source(String),

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),
}

impl SyncError {
    /// True for the single-flight rejection a caller maps to a conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, SyncError::OperationInProgress { .. })
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
