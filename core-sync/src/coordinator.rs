//! # Library Coordinator
//!
//! Runs library-wide populate and scan operations in the background.
//!
//! ## Workflow
//!
//! ### Populate
//! 1. Register the operation with the [`OperationTracker`] (single-flight per library)
//! 2. List artists from the connected [`LibrarySource`]
//! 3. Skip artists already stored, matched by provider id, then by name
//! 4. Create a record for each new artist and fill it from the orchestrator
//! 5. Complete with `created N, skipped M, failed F`
//!
//! ### Scan
//! 1. Register the operation
//! 2. Refresh every stored artist of the library, bounded by `scan_concurrency`
//! 3. Persist only records whose reconciled values changed
//! 4. Complete with `updated N, unchanged M, failed F`
//!
//! Both run on a detached task bound to a child of the shutdown token.
//! Cancellation ends the operation as failed with a cancellation message.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let coordinator = LibraryCoordinator::new(orchestrator, repository, source, tracker)
//!     .with_shutdown_token(shutdown.clone());
//!
//! let record = coordinator.start_populate("lib-1", "Music").await?;
//! assert!(record.is_running());
//!
//! // Later
//! let status = coordinator.status("lib-1").await;
//! ```

use crate::apply::{apply_images, apply_metadata, artist_ref};
use crate::operation::{OperationKind, OperationRecord};
use crate::source::{LibrarySource, SourceArtist};
use crate::tracker::OperationTracker;
use crate::{Result, SyncError};
use bridge_traits::time::{Clock, SystemClock};
use core_library::{ArtistRecord, ArtistRepository};
use core_metadata::Orchestrator;
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent};
use futures::future::join_all;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Default number of artists refreshed at once during a scan.
pub const DEFAULT_SCAN_CONCURRENCY: usize = 4;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct PopulateStats {
    created: u64,
    skipped: u64,
    failed: u64,
}

impl PopulateStats {
    fn summary(&self) -> String {
        format!(
            "created {}, skipped {}, failed {}",
            self.created, self.skipped, self.failed
        )
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct ScanStats {
    updated: u64,
    unchanged: u64,
    failed: u64,
}

impl ScanStats {
    fn summary(&self) -> String {
        format!(
            "updated {}, unchanged {}, failed {}",
            self.updated, self.unchanged, self.failed
        )
    }
}

/// Starts and runs library operations. Cheap to clone.
#[derive(Clone)]
pub struct LibraryCoordinator {
    orchestrator: Arc<Orchestrator>,
    repository: Arc<dyn ArtistRepository>,
    source: Arc<dyn LibrarySource>,
    tracker: Arc<OperationTracker>,
    clock: Arc<dyn Clock>,
    event_bus: Option<EventBus>,
    shutdown: CancellationToken,
    scan_concurrency: usize,
    refresh_images: bool,
}

impl LibraryCoordinator {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        repository: Arc<dyn ArtistRepository>,
        source: Arc<dyn LibrarySource>,
        tracker: Arc<OperationTracker>,
    ) -> Self {
        Self {
            orchestrator,
            repository,
            source,
            tracker,
            clock: Arc::new(SystemClock),
            event_bus: None,
            shutdown: CancellationToken::new(),
            scan_concurrency: DEFAULT_SCAN_CONCURRENCY,
            refresh_images: true,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Background runs are bound to children of `token`.
    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn with_scan_concurrency(mut self, concurrency: usize) -> Self {
        self.scan_concurrency = concurrency.max(1);
        self
    }

    /// Also fill empty image slots from ranked image candidates.
    pub fn with_image_refresh(mut self, enabled: bool) -> Self {
        self.refresh_images = enabled;
        self
    }

    pub fn tracker(&self) -> &Arc<OperationTracker> {
        &self.tracker
    }

    /// Snapshot of the library's latest operation
    pub async fn status(&self, library_id: &str) -> Option<OperationRecord> {
        self.tracker.status(library_id).await
    }

    /// Create records for artists listed by the library's media source.
    ///
    /// Returns the running record once the operation is registered; the work
    /// continues in the background.
    ///
    /// # Errors
    ///
    /// `OperationInProgress` if the library already has a running operation.
    pub async fn start_populate(&self, library_id: &str, library_name: &str) -> Result<OperationRecord> {
        let record = self
            .tracker
            .start(library_id, library_name, OperationKind::Populate)
            .await?;
        self.spawn(library_id.to_string(), OperationKind::Populate);
        Ok(record)
    }

    /// Refresh metadata of every stored artist of the library.
    ///
    /// # Errors
    ///
    /// `OperationInProgress` if the library already has a running operation.
    pub async fn start_scan(&self, library_id: &str, library_name: &str) -> Result<OperationRecord> {
        let record = self
            .tracker
            .start(library_id, library_name, OperationKind::Scan)
            .await?;
        self.spawn(library_id.to_string(), OperationKind::Scan);
        Ok(record)
    }

    fn spawn(&self, library_id: String, operation: OperationKind) {
        let coordinator = self.clone();
        let token = self.shutdown.child_token();
        tokio::spawn(async move { coordinator.run(library_id, operation, token).await });
    }

    #[instrument(skip(self, token), fields(library_id = %library_id, operation = %operation))]
    async fn run(&self, library_id: String, operation: OperationKind, token: CancellationToken) {
        let work = async {
            match operation {
                OperationKind::Populate => self.populate(&library_id, &token).await,
                OperationKind::Scan => self.scan(&library_id, &token).await,
            }
        };

        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => Err(SyncError::Cancelled),
            result = work => result,
        };

        let finished = match outcome {
            Ok(summary) => self.tracker.complete(&library_id, &summary).await,
            Err(e) => {
                error!(error = %e, "Library operation aborted");
                self.tracker.fail(&library_id, &e.to_string()).await
            }
        };
        if let Err(e) = finished {
            warn!(error = %e, "Could not record operation outcome");
        }
    }

    async fn populate(&self, library_id: &str, token: &CancellationToken) -> Result<String> {
        let artists = self.source.list_artists(library_id).await?;
        let total = artists.len() as u64;
        self.tracker.update_progress(library_id, 0, total).await?;
        info!(library_id, artists = total, "Populating library");

        let mut stats = PopulateStats::default();
        for (index, artist) in artists.iter().enumerate() {
            if token.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            match self.populate_artist(library_id, artist).await {
                Ok(true) => stats.created += 1,
                Ok(false) => stats.skipped += 1,
                Err(e) => {
                    warn!(artist = %artist.name, error = %e, "Failed to add artist");
                    stats.failed += 1;
                }
            }
            self.tracker
                .update_progress(library_id, index as u64 + 1, total)
                .await?;
        }

        Ok(stats.summary())
    }

    /// Returns `false` when the artist is already stored.
    async fn populate_artist(&self, library_id: &str, artist: &SourceArtist) -> Result<bool> {
        let name = artist.name.trim();
        if name.is_empty() {
            return Ok(false);
        }
        if let Some(existing) = self.find_existing(library_id, artist).await? {
            debug!(artist = name, artist_id = %existing.id, "Artist already in library");
            return Ok(false);
        }

        let mut record = ArtistRecord::new(library_id, name);
        for (provider, id) in &artist.provider_ids {
            if !id.trim().is_empty() {
                record.provider_ids.insert(provider.clone(), id.trim().to_string());
            }
        }

        let now = self.clock.unix_timestamp();
        match self.orchestrator.fetch_metadata(&artist_ref(&record)).await {
            Ok(result) => {
                apply_metadata(&mut record, &result);
                record.metadata_refreshed_at = Some(now);
            }
            Err(e) => warn!(artist = name, error = %e, "Metadata unavailable, adding bare record"),
        }
        if self.refresh_images {
            let images = self
                .orchestrator
                .fetch_images(&artist_ref(&record), None)
                .await;
            apply_images(&mut record, &images);
        }
        record.created_at = now;
        record.updated_at = now;

        self.repository.insert(&record).await?;
        self.emit(LibraryEvent::ArtistCreated {
            artist_id: record.id.clone(),
            library_id: library_id.to_string(),
            name: record.name.clone(),
        });
        Ok(true)
    }

    /// Match by any known provider id within the library, then by name.
    async fn find_existing(
        &self,
        library_id: &str,
        artist: &SourceArtist,
    ) -> Result<Option<ArtistRecord>> {
        for (provider, id) in &artist.provider_ids {
            if id.trim().is_empty() {
                continue;
            }
            let found = self
                .repository
                .find_by_provider_id(provider, id.trim())
                .await?
                .filter(|record| record.library_id == library_id);
            if found.is_some() {
                return Ok(found);
            }
        }
        Ok(self
            .repository
            .find_by_name_and_library(&artist.name, library_id)
            .await?)
    }

    async fn scan(&self, library_id: &str, token: &CancellationToken) -> Result<String> {
        let artists = self.repository.list_by_library(library_id).await?;
        let total = artists.len() as u64;
        self.tracker.update_progress(library_id, 0, total).await?;
        info!(library_id, artists = total, "Scanning library");

        let semaphore = &Semaphore::new(self.scan_concurrency.max(1));
        let processed = &AtomicU64::new(0);
        let refreshes = artists.into_iter().map(|artist| async move {
            let _permit = semaphore.acquire().await.map_err(|_| SyncError::Cancelled)?;
            if token.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            let name = artist.name.clone();
            let outcome = self.refresh_artist(artist).await;
            if let Err(e) = &outcome {
                warn!(artist = %name, error = %e, "Failed to refresh artist");
            }

            let done = processed.fetch_add(1, Ordering::SeqCst) + 1;
            self.tracker.update_progress(library_id, done, total).await.ok();
            outcome
        });
        let outcomes = join_all(refreshes).await;

        if token.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let mut stats = ScanStats::default();
        for outcome in outcomes {
            match outcome {
                Ok(true) => stats.updated += 1,
                Ok(false) => stats.unchanged += 1,
                Err(_) => stats.failed += 1,
            }
        }
        Ok(stats.summary())
    }

    /// Returns `true` when the record changed and was written back.
    async fn refresh_artist(&self, mut record: ArtistRecord) -> Result<bool> {
        let result = self.orchestrator.fetch_metadata(&artist_ref(&record)).await?;
        let mut updated = apply_metadata(&mut record, &result);
        if self.refresh_images {
            let images = self
                .orchestrator
                .fetch_images(&artist_ref(&record), None)
                .await;
            updated.extend(apply_images(&mut record, &images));
        }
        if updated.is_empty() {
            return Ok(false);
        }

        let now = self.clock.unix_timestamp();
        record.metadata_refreshed_at = Some(now);
        record.updated_at = now;
        self.repository.update(&record).await?;

        debug!(artist_id = %record.id, fields = ?updated, "Artist updated");
        self.emit(LibraryEvent::ArtistUpdated {
            artist_id: record.id.clone(),
            updated_fields: updated,
        });
        Ok(true)
    }

    fn emit(&self, event: LibraryEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Library(event)).ok();
        }
    }
}
