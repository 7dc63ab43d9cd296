//! Background populate/scan runs through the coordinator and tracker.

use async_trait::async_trait;
use core_library::{ArtistRecord, ArtistRepository, InMemoryArtistRepository, LibraryError};
use core_metadata::{
    ArtistMetadata, ArtistRef, Field, FieldPriority, MetadataProvider, Orchestrator, Provider,
    ProviderError, ProviderId, ProviderRegistry, ProviderResult, StaticPriorityStore,
};
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent};
use core_sync::{
    LibraryCoordinator, LibrarySource, OperationKind, OperationRecord, OperationStatus,
    OperationTracker, SourceArtist, StaticLibrarySource, SyncError,
};
use bridge_traits::time::SystemClock;
use mockall::mock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Metadata provider answering from a fixed name -> biography table.
struct Biographies;

impl Provider for Biographies {
    fn id(&self) -> ProviderId {
        ProviderId::MusicBrainz
    }

    fn as_metadata(&self) -> Option<&dyn MetadataProvider> {
        Some(self)
    }
}

#[async_trait]
impl MetadataProvider for Biographies {
    fn supported_fields(&self) -> &[Field] {
        &[Field::Biography]
    }

    async fn fetch_metadata(&self, artist: &ArtistRef) -> ProviderResult<ArtistMetadata> {
        let biography = match artist.name.as_str() {
            "Björk" => "Icelandic singer.",
            "Massive Attack" => "Bristol collective.",
            "Portishead" => "Bristol trio.",
            "Broken" => return Err(ProviderError::Transport("connection reset".to_string())),
            _ => return Err(ProviderError::NotFound(artist.name.clone())),
        };
        let mut metadata = ArtistMetadata {
            biography: biography.to_string(),
            ..ArtistMetadata::default()
        };
        metadata
            .provider_ids
            .insert(ProviderId::MusicBrainz, format!("mbid-{}", artist.name));
        Ok(metadata)
    }
}

/// Listing that waits for the test to open the gate.
struct GatedSource {
    inner: StaticLibrarySource,
    gate: Arc<Notify>,
}

#[async_trait]
impl LibrarySource for GatedSource {
    async fn list_artists(&self, library_id: &str) -> core_sync::Result<Vec<SourceArtist>> {
        self.gate.notified().await;
        if library_id == "offline" {
            return Err(SyncError::Source("media server unreachable".to_string()));
        }
        self.inner.list_artists(library_id).await
    }
}

mock! {
    pub Repository {}

    #[async_trait]
    impl ArtistRepository for Repository {
        async fn find_by_id(&self, id: &str) -> core_library::Result<Option<ArtistRecord>>;
        async fn find_by_provider_id(
            &self,
            provider: &str,
            provider_id: &str,
        ) -> core_library::Result<Option<ArtistRecord>>;
        async fn find_by_name_and_library(
            &self,
            name: &str,
            library_id: &str,
        ) -> core_library::Result<Option<ArtistRecord>>;
        async fn list_by_library(&self, library_id: &str) -> core_library::Result<Vec<ArtistRecord>>;
        async fn insert(&self, artist: &ArtistRecord) -> core_library::Result<()>;
        async fn update(&self, artist: &ArtistRecord) -> core_library::Result<()>;
    }
}

fn orchestrator() -> Arc<Orchestrator> {
    let registry = ProviderRegistry::new().with(Arc::new(Biographies));
    let priorities = StaticPriorityStore::new(vec![FieldPriority::new(
        Field::Biography,
        [ProviderId::MusicBrainz],
    )]);
    Arc::new(Orchestrator::new(registry, Arc::new(priorities)))
}

struct Fixture {
    coordinator: LibraryCoordinator,
    repository: Arc<InMemoryArtistRepository>,
    gate: Arc<Notify>,
    shutdown: CancellationToken,
    events: EventBus,
}

fn fixture(listing: StaticLibrarySource) -> Fixture {
    let orchestrator = orchestrator();
    let repository = Arc::new(InMemoryArtistRepository::new());
    let gate = Arc::new(Notify::new());
    let shutdown = CancellationToken::new();
    let events = EventBus::new(64);
    let tracker = Arc::new(OperationTracker::new(Arc::new(SystemClock)).with_event_bus(events.clone()));

    let coordinator = LibraryCoordinator::new(
        orchestrator,
        repository.clone(),
        Arc::new(GatedSource {
            inner: listing,
            gate: gate.clone(),
        }),
        tracker,
    )
    .with_event_bus(events.clone())
    .with_shutdown_token(shutdown.clone())
    .with_scan_concurrency(2);

    Fixture {
        coordinator,
        repository,
        gate,
        shutdown,
        events,
    }
}

async fn wait_for_terminal(coordinator: &LibraryCoordinator, library_id: &str) -> OperationRecord {
    for _ in 0..500 {
        if let Some(record) = coordinator.status(library_id).await {
            if record.status.is_terminal() {
                return record;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("operation for {} never finished", library_id);
}

#[tokio::test]
async fn test_populate_is_single_flight_and_reports_summary() {
    let f = fixture(StaticLibrarySource::new().with_library(
        "lib-1",
        vec![
            SourceArtist::new("Portishead"),
            SourceArtist::new("Björk"),
            SourceArtist::new("Massive Attack"),
        ],
    ));
    f.repository
        .insert(&ArtistRecord::new("lib-1", "portishead"))
        .await
        .unwrap();
    let mut rx = f.events.subscribe();

    let accepted = f.coordinator.start_populate("lib-1", "Music").await.unwrap();
    assert_eq!(accepted.status, OperationStatus::Running);
    assert_eq!(accepted.operation, OperationKind::Populate);

    let conflict = f.coordinator.start_scan("lib-1", "Music").await.unwrap_err();
    assert!(conflict.is_conflict());

    f.gate.notify_one();
    let done = wait_for_terminal(&f.coordinator, "lib-1").await;

    assert_eq!(done.status, OperationStatus::Completed);
    assert_eq!(done.message, "created 2, skipped 1, failed 0");
    assert_eq!(done.progress.processed, 3);
    assert_eq!(done.progress.total, 3);
    assert!(done.completed_at.is_some());

    let bjork = f
        .repository
        .find_by_name_and_library("björk", "lib-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bjork.biography, "Icelandic singer.");
    assert_eq!(bjork.field_sources["biography"], "musicbrainz");
    assert_eq!(bjork.provider_id("musicbrainz"), Some("mbid-Björk"));
    assert!(bjork.metadata_refreshed_at.is_some());

    let mut created = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let CoreEvent::Library(LibraryEvent::ArtistCreated { name, .. }) = event {
            created.push(name);
        }
    }
    assert_eq!(created, vec!["Björk", "Massive Attack"]);
}

#[tokio::test]
async fn test_populate_matches_provider_ids_within_the_library() {
    let f = fixture(
        StaticLibrarySource::new()
            .with_library(
                "lib-1",
                vec![SourceArtist::new("Bjork").with_provider_id("musicbrainz", "87c5dedd")],
            )
            .with_library(
                "lib-2",
                vec![SourceArtist::new("Bjork").with_provider_id("musicbrainz", "87c5dedd")],
            ),
    );
    f.repository
        .insert(&ArtistRecord::new("lib-1", "Björk").with_provider_id("musicbrainz", "87c5dedd"))
        .await
        .unwrap();

    f.gate.notify_one();
    f.coordinator.start_populate("lib-1", "A").await.unwrap();
    let first = wait_for_terminal(&f.coordinator, "lib-1").await;
    assert_eq!(first.message, "created 0, skipped 1, failed 0");

    f.gate.notify_one();
    f.coordinator.start_populate("lib-2", "B").await.unwrap();
    let second = wait_for_terminal(&f.coordinator, "lib-2").await;
    assert_eq!(second.message, "created 1, skipped 0, failed 0");
    assert_eq!(f.repository.list_by_library("lib-2").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_scan_writes_only_changed_records() {
    let f = fixture(StaticLibrarySource::new());
    let mut stale = ArtistRecord::new("lib-1", "Massive Attack");
    stale.biography = "Old text.".to_string();
    let mut current = ArtistRecord::new("lib-1", "Portishead");
    current.biography = "Bristol trio.".to_string();
    current
        .provider_ids
        .insert("musicbrainz".to_string(), "mbid-Portishead".to_string());
    let mut broken = ArtistRecord::new("lib-1", "Broken");
    broken.biography = "Kept.".to_string();
    for record in [&stale, &current, &broken] {
        f.repository.insert(record).await.unwrap();
    }
    let mut rx = f.events.subscribe();

    f.coordinator.start_scan("lib-1", "Music").await.unwrap();
    let done = wait_for_terminal(&f.coordinator, "lib-1").await;

    assert_eq!(done.status, OperationStatus::Completed);
    assert_eq!(done.operation, OperationKind::Scan);
    assert_eq!(done.message, "updated 1, unchanged 2, failed 0");

    let refreshed = f.repository.find_by_id(&stale.id).await.unwrap().unwrap();
    assert_eq!(refreshed.biography, "Bristol collective.");
    assert_eq!(refreshed.field_sources["biography"], "musicbrainz");
    let untouched = f.repository.find_by_id(&broken.id).await.unwrap().unwrap();
    assert_eq!(untouched.biography, "Kept.");

    let mut updates = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let CoreEvent::Library(LibraryEvent::ArtistUpdated {
            artist_id,
            updated_fields,
        }) = event
        {
            updates.push((artist_id, updated_fields));
        }
    }
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].0, stale.id);
    assert!(updates[0].1.contains(&"biography".to_string()));
}

#[tokio::test]
async fn test_shutdown_fails_running_operation() {
    let f = fixture(StaticLibrarySource::new().with_library("lib-1", vec![SourceArtist::new("Björk")]));

    f.coordinator.start_populate("lib-1", "Music").await.unwrap();
    f.shutdown.cancel();
    let done = wait_for_terminal(&f.coordinator, "lib-1").await;

    assert_eq!(done.status, OperationStatus::Failed);
    assert!(done.message.contains("cancelled"));
    assert!(f.repository.is_empty().await);

    // A finished record does not block the next start.
    assert!(f.coordinator.start_scan("lib-1", "Music").await.is_ok());
}

#[tokio::test]
async fn test_source_failure_fails_operation() {
    let f = fixture(StaticLibrarySource::new());

    f.gate.notify_one();
    f.coordinator.start_populate("offline", "NAS").await.unwrap();
    let done = wait_for_terminal(&f.coordinator, "offline").await;

    assert_eq!(done.status, OperationStatus::Failed);
    assert!(done.message.contains("media server unreachable"));
}

#[tokio::test]
async fn test_store_failures_are_counted_not_fatal() {
    let mut repository = MockRepository::new();
    repository
        .expect_find_by_name_and_library()
        .returning(|_, _| Ok(None));
    repository
        .expect_insert()
        .withf(|artist| artist.name == "Björk")
        .times(1)
        .returning(|_| Err(LibraryError::Store("disk full".to_string())));
    repository
        .expect_insert()
        .withf(|artist| artist.name == "Massive Attack")
        .times(1)
        .returning(|_| Ok(()));

    let gate = Arc::new(Notify::new());
    gate.notify_one();
    let coordinator = LibraryCoordinator::new(
        orchestrator(),
        Arc::new(repository),
        Arc::new(GatedSource {
            inner: StaticLibrarySource::new().with_library(
                "lib-1",
                vec![SourceArtist::new("Björk"), SourceArtist::new("Massive Attack")],
            ),
            gate,
        }),
        Arc::new(OperationTracker::new(Arc::new(SystemClock))),
    )
    .with_image_refresh(false);

    coordinator.start_populate("lib-1", "Music").await.unwrap();
    let done = wait_for_terminal(&coordinator, "lib-1").await;

    assert_eq!(done.status, OperationStatus::Completed);
    assert_eq!(done.message, "created 1, skipped 0, failed 1");
}
