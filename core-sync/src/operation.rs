//! # Library Operation Records
//!
//! One record per library id describes the latest long-running operation.
//!
//! ## State Machine
//!
//! ```text
//! (none) → Running → Completed
//!             ↓
//!           Failed
//! ```
//!
//! A terminal record stays visible until the next operation for the same
//! library replaces it.

use crate::{Result, SyncError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ============================================================================
// Operation Types
// ============================================================================

/// Kind of library-wide operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Create artist records from the connected media source
    Populate,
    /// Refresh metadata of existing artist records
    Scan,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Populate => "populate",
            OperationKind::Scan => "scan",
        }
    }
}

impl FromStr for OperationKind {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "populate" => Ok(OperationKind::Populate),
            "scan" => Ok(OperationKind::Scan),
            _ => Err(SyncError::InvalidOperation(s.to_string())),
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Status Types
// ============================================================================

/// The current status of a library operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Running,
    Completed,
    Failed,
}

impl OperationStatus {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationStatus::Completed | OperationStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Running => "running",
            OperationStatus::Completed => "completed",
            OperationStatus::Failed => "failed",
        }
    }
}

impl FromStr for OperationStatus {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "running" => Ok(OperationStatus::Running),
            "completed" => Ok(OperationStatus::Completed),
            "failed" => Ok(OperationStatus::Failed),
            _ => Err(SyncError::InvalidStatus(s.to_string())),
        }
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Progress and Record
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationProgress {
    pub processed: u64,
    pub total: u64,
}

impl OperationProgress {
    /// Completion percentage, 0 while the total is unknown
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.processed.min(self.total) * 100) / self.total) as u8
    }
}

/// Snapshot of a library operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub library_id: String,
    pub library_name: String,
    pub operation: OperationKind,
    pub status: OperationStatus,
    /// Summary on completion, error text on failure
    pub message: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub progress: OperationProgress,
}

impl OperationRecord {
    pub(crate) fn running(
        library_id: impl Into<String>,
        library_name: impl Into<String>,
        operation: OperationKind,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            library_id: library_id.into(),
            library_name: library_name.into(),
            operation,
            status: OperationStatus::Running,
            message: String::new(),
            started_at: now,
            completed_at: None,
            progress: OperationProgress::default(),
        }
    }

    pub(crate) fn finish(
        &mut self,
        status: OperationStatus,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) {
        self.status = status;
        self.message = message.into();
        self.completed_at = Some(now);
    }

    pub fn is_running(&self) -> bool {
        self.status == OperationStatus::Running
    }

    /// Wall time between start and completion
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.completed_at.map(|done| done - self.started_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            OperationStatus::Running,
            OperationStatus::Completed,
            OperationStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<OperationStatus>().unwrap(), status);
        }
        assert!(matches!(
            "paused".parse::<OperationStatus>(),
            Err(SyncError::InvalidStatus(_))
        ));
    }

    #[test]
    fn test_terminal_states() {
        assert!(!OperationStatus::Running.is_terminal());
        assert!(OperationStatus::Completed.is_terminal());
        assert!(OperationStatus::Failed.is_terminal());
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("scan".parse::<OperationKind>().unwrap(), OperationKind::Scan);
        assert!("rescan".parse::<OperationKind>().is_err());
    }

    #[test]
    fn test_progress_percent() {
        assert_eq!(OperationProgress::default().percent(), 0);
        assert_eq!(OperationProgress { processed: 1, total: 4 }.percent(), 25);
        assert_eq!(OperationProgress { processed: 9, total: 4 }.percent(), 100);
    }

    #[test]
    fn test_finish_stamps_completion() {
        let start = Utc::now();
        let mut record = OperationRecord::running("lib", "Music", OperationKind::Scan, start);
        assert!(record.is_running());
        assert!(record.duration().is_none());

        record.finish(
            OperationStatus::Completed,
            "done",
            start + chrono::Duration::seconds(3),
        );
        assert_eq!(record.message, "done");
        assert_eq!(record.duration(), Some(chrono::Duration::seconds(3)));
    }
}
