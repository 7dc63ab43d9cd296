//! # Background Operation Tracker
//!
//! Keyed registry of long-running library operations with single-flight per
//! library id. Starting while a record is `Running` is rejected with
//! [`SyncError::OperationInProgress`]; a terminal record is replaced.
//!
//! Every read returns a cloned snapshot taken under the lock, so status
//! polling never observes a half-updated record and never waits on the
//! operation itself.

use crate::operation::{OperationKind, OperationRecord, OperationStatus};
use crate::{Result, SyncError};
use bridge_traits::time::Clock;
use core_runtime::events::{CoreEvent, EventBus, OperationEvent};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub struct OperationTracker {
    operations: Mutex<HashMap<String, OperationRecord>>,
    clock: Arc<dyn Clock>,
    event_bus: Option<EventBus>,
}

impl OperationTracker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            operations: Mutex::new(HashMap::new()),
            clock,
            event_bus: None,
        }
    }

    /// Publish lifecycle transitions on `event_bus`.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Register a running operation for `library_id`.
    ///
    /// # Errors
    ///
    /// `OperationInProgress` if the library already has a running operation.
    pub async fn start(
        &self,
        library_id: &str,
        library_name: &str,
        operation: OperationKind,
    ) -> Result<OperationRecord> {
        let record = {
            let mut operations = self.operations.lock().await;
            if let Some(existing) = operations.get(library_id).filter(|r| r.is_running()) {
                warn!(
                    library_id,
                    running = %existing.operation,
                    requested = %operation,
                    "Rejected concurrent library operation"
                );
                return Err(SyncError::OperationInProgress {
                    library_id: library_id.to_string(),
                    operation: existing.operation.to_string(),
                });
            }

            let record =
                OperationRecord::running(library_id, library_name, operation, self.clock.now());
            operations.insert(library_id.to_string(), record.clone());
            record
        };

        info!(library_id, operation = %operation, "Library operation started");
        self.emit(OperationEvent::Started {
            library_id: library_id.to_string(),
            operation: operation.to_string(),
        });
        Ok(record)
    }

    pub async fn update_progress(&self, library_id: &str, processed: u64, total: u64) -> Result<()> {
        {
            let mut operations = self.operations.lock().await;
            let record = running_mut(&mut operations, library_id)?;
            record.progress.processed = processed;
            record.progress.total = total;
        }

        debug!(library_id, processed, total, "Library operation progress");
        self.emit(OperationEvent::Progress {
            library_id: library_id.to_string(),
            processed,
            total,
        });
        Ok(())
    }

    /// Mark the running operation completed with a summary message.
    pub async fn complete(&self, library_id: &str, message: &str) -> Result<OperationRecord> {
        let record = self
            .finish(library_id, OperationStatus::Completed, message)
            .await?;
        info!(library_id, operation = %record.operation, message, "Library operation completed");
        self.emit(OperationEvent::Completed {
            library_id: library_id.to_string(),
            operation: record.operation.to_string(),
            message: record.message.clone(),
        });
        Ok(record)
    }

    /// Mark the running operation failed with the error text.
    pub async fn fail(&self, library_id: &str, message: &str) -> Result<OperationRecord> {
        let record = self
            .finish(library_id, OperationStatus::Failed, message)
            .await?;
        warn!(library_id, operation = %record.operation, message, "Library operation failed");
        self.emit(OperationEvent::Failed {
            library_id: library_id.to_string(),
            operation: record.operation.to_string(),
            message: record.message.clone(),
        });
        Ok(record)
    }

    pub async fn status(&self, library_id: &str) -> Option<OperationRecord> {
        self.operations.lock().await.get(library_id).cloned()
    }

    pub async fn is_running(&self, library_id: &str) -> bool {
        self.operations
            .lock()
            .await
            .get(library_id)
            .is_some_and(OperationRecord::is_running)
    }

    /// Snapshot of every known record, ordered by library id
    pub async fn list(&self) -> Vec<OperationRecord> {
        let mut records: Vec<_> = self.operations.lock().await.values().cloned().collect();
        records.sort_by(|a, b| a.library_id.cmp(&b.library_id));
        records
    }

    async fn finish(
        &self,
        library_id: &str,
        status: OperationStatus,
        message: &str,
    ) -> Result<OperationRecord> {
        let mut operations = self.operations.lock().await;
        let record = running_mut(&mut operations, library_id)?;
        record.finish(status, message, self.clock.now());
        Ok(record.clone())
    }

    fn emit(&self, event: OperationEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Operation(event)).ok();
        }
    }
}

fn running_mut<'a>(
    operations: &'a mut HashMap<String, OperationRecord>,
    library_id: &str,
) -> Result<&'a mut OperationRecord> {
    operations
        .get_mut(library_id)
        .filter(|record| record.is_running())
        .ok_or_else(|| SyncError::NotRunning {
            library_id: library_id.to_string(),
        })
}
