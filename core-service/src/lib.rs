//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP, DNS,
//! settings) and the host's artist record store into the metadata core.
//! Desktop hosts typically keep the default `desktop-shims` feature, which
//! fills any bridge missing from [`CoreConfig`] with the `bridge-desktop`
//! implementation.
//!
//! Every outbound request, whether to a provider API, an image probe or a
//! user-supplied URL, goes through one [`GuardedHttpClient`].
//!
//! ```ignore
//! let config = CoreConfig::builder()
//!     .settings_path("/var/lib/artist-meta/settings.db")
//!     .metadata_api_config(MetadataApiConfig::new().with_musicbrainz_user_agent("App/1.0 (ops@example.com)"))
//!     .build()?;
//! let core = CoreService::bootstrap(config, LibraryBindings::new(repository, source)).await?;
//!
//! let result = core.fetch_metadata(&ArtistRef::new("Björk")).await?;
//! core.start_scan("lib-1", "Music").await?;
//! core.shutdown();
//! ```

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::{HostResolver, HttpClient, SettingsStore};
use core_fetch::{DownloadedImage, GuardedHttpClient, ImageDownloader};
use core_library::ArtistRepository;
use core_metadata::providers::{FanartProvider, LastFmProvider, MusicBrainzProvider};
use core_metadata::{
    ArtistRef, AuthFailureHook, ConnectionStatus, DimensionProber, FetchResult, FieldPriority,
    FieldProviderResult, ImageFetchResult, ImageType, Orchestrator, ProviderId, ProviderRegistry,
    SearchOutcome, SettingsPriorityStore,
};
use core_runtime::config::{CoreConfig, MetadataApiConfig};
use core_runtime::events::{
    CoreEvent, EventBus, EventStream, ProviderEvent, DEFAULT_EVENT_BUFFER_SIZE,
};
use core_sync::{LibraryCoordinator, LibrarySource, OperationRecord, OperationTracker};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Host-owned library collaborators the core reads and writes through.
pub struct LibraryBindings {
    pub repository: Arc<dyn ArtistRepository>,
    pub source: Arc<dyn LibrarySource>,
}

impl LibraryBindings {
    pub fn new(repository: Arc<dyn ArtistRepository>, source: Arc<dyn LibrarySource>) -> Self {
        Self { repository, source }
    }
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    orchestrator: Arc<Orchestrator>,
    priorities: Arc<SettingsPriorityStore>,
    tracker: Arc<OperationTracker>,
    coordinator: LibraryCoordinator,
    downloader: Arc<ImageDownloader>,
    event_bus: EventBus,
    shutdown: CancellationToken,
}

impl CoreService {
    /// Build the service from configuration, filling missing bridges with
    /// desktop defaults when available.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid or a required bridge is neither
    /// configured nor available as a default.
    pub async fn bootstrap(config: CoreConfig, library: LibraryBindings) -> Result<Self> {
        config.validate()?;

        let transport = match &config.http_client {
            Some(client) => Arc::clone(client),
            None => default_http_client()?,
        };
        let resolver = match &config.host_resolver {
            Some(resolver) => Arc::clone(resolver),
            None => default_resolver()?,
        };
        let settings = match &config.settings_store {
            Some(store) => Arc::clone(store),
            None => default_settings_store(&config).await?,
        };

        let limits = &config.orchestration;
        let guarded = Arc::new(
            GuardedHttpClient::new(transport, resolver).with_timeout(limits.fetch_timeout),
        );
        let event_bus = EventBus::new(DEFAULT_EVENT_BUFFER_SIZE);
        let shutdown = CancellationToken::new();

        let registry = build_registry(&config.metadata_api_config, guarded.clone());
        info!(providers = ?registry.ids(), "Metadata providers registered");

        let priorities = Arc::new(SettingsPriorityStore::new(settings));
        let orchestrator = Arc::new(
            Orchestrator::new(registry, priorities.clone())
                .with_prober(
                    DimensionProber::new(guarded.clone())
                        .with_concurrency(limits.probe_concurrency)
                        .with_timeout(limits.fetch_timeout),
                )
                .with_provider_timeout(limits.provider_timeout)
                .with_link_enrichment_limit(limits.link_enrichment_limit)
                .with_auth_failure_hook(auth_failure_hook(event_bus.clone())),
        );

        let tracker = Arc::new(
            OperationTracker::new(Arc::new(bridge_traits::SystemClock))
                .with_event_bus(event_bus.clone()),
        );
        let coordinator = LibraryCoordinator::new(
            orchestrator.clone(),
            library.repository,
            library.source,
            tracker.clone(),
        )
        .with_event_bus(event_bus.clone())
        .with_shutdown_token(shutdown.clone())
        .with_scan_concurrency(limits.scan_concurrency);

        let downloader = Arc::new(
            ImageDownloader::new(guarded, limits.max_image_bytes).with_timeout(limits.fetch_timeout),
        );

        Ok(Self {
            orchestrator,
            priorities,
            tracker,
            coordinator,
            downloader,
            event_bus,
            shutdown,
        })
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    pub fn registered_providers(&self) -> Vec<ProviderId> {
        self.orchestrator.registry().ids()
    }

    pub fn subscribe_events(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    // ------------------------------------------------------------------
    // Reconciliation
    // ------------------------------------------------------------------

    pub async fn fetch_metadata(&self, artist: &ArtistRef) -> Result<FetchResult> {
        Ok(self.orchestrator.fetch_metadata(artist).await?)
    }

    pub async fn fetch_field_from_providers(
        &self,
        artist: &ArtistRef,
        field: &str,
    ) -> Result<Vec<FieldProviderResult>> {
        Ok(self.orchestrator.fetch_field_from_providers(artist, field).await?)
    }

    pub async fn fetch_images(&self, artist: &ArtistRef, filter: Option<ImageType>) -> ImageFetchResult {
        self.orchestrator.fetch_images(artist, filter).await
    }

    pub async fn search(&self, query: &str, subset: &[ProviderId]) -> SearchOutcome {
        self.orchestrator.search(query, subset).await
    }

    pub async fn search_for_linking(
        &self,
        query: &str,
        subset: &[ProviderId],
        local_albums: &[String],
    ) -> SearchOutcome {
        self.orchestrator
            .search_for_linking(query, subset, local_albums)
            .await
    }

    pub async fn test_connections(&self) -> Vec<ConnectionStatus> {
        self.orchestrator.test_connections().await
    }

    // ------------------------------------------------------------------
    // Priorities
    // ------------------------------------------------------------------

    pub async fn priorities(&self) -> Result<Vec<FieldPriority>> {
        Ok(self.orchestrator.priorities().await?)
    }

    pub async fn save_priorities(&self, priorities: &[FieldPriority]) -> Result<()> {
        Ok(self.priorities.save_priorities(priorities).await?)
    }

    pub async fn reset_priorities(&self) -> Result<()> {
        Ok(self.priorities.reset().await?)
    }

    // ------------------------------------------------------------------
    // Library operations
    // ------------------------------------------------------------------

    pub async fn start_populate(&self, library_id: &str, library_name: &str) -> Result<OperationRecord> {
        Ok(self.coordinator.start_populate(library_id, library_name).await?)
    }

    pub async fn start_scan(&self, library_id: &str, library_name: &str) -> Result<OperationRecord> {
        Ok(self.coordinator.start_scan(library_id, library_name).await?)
    }

    pub async fn operation_status(&self, library_id: &str) -> Option<OperationRecord> {
        self.tracker.status(library_id).await
    }

    pub async fn operations(&self) -> Vec<OperationRecord> {
        self.tracker.list().await
    }

    // ------------------------------------------------------------------
    // Images
    // ------------------------------------------------------------------

    /// Download a user-supplied image URL through the outbound fetch guard.
    pub async fn fetch_image_from_url(&self, url: &str) -> Result<DownloadedImage> {
        Ok(self.downloader.download(url).await?)
    }

    /// Cancel all background operations; they finish as failed.
    pub fn shutdown(&self) {
        info!("Core shutting down");
        self.shutdown.cancel();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

fn build_registry(api: &MetadataApiConfig, http: Arc<GuardedHttpClient>) -> ProviderRegistry {
    let http: Arc<dyn HttpClient> = http;
    let delay = api.rate_limit_delay();
    let mut registry = ProviderRegistry::new();

    if let Some(user_agent) = &api.musicbrainz_user_agent {
        registry.register(Arc::new(MusicBrainzProvider::new(
            http.clone(),
            user_agent.clone(),
            delay,
        )));
    }
    if let Some(key) = &api.lastfm_api_key {
        registry.register(Arc::new(LastFmProvider::new(http.clone(), key.clone(), delay)));
    }
    if let Some(key) = &api.fanart_api_key {
        registry.register(Arc::new(FanartProvider::new(http, key.clone(), delay)));
    }
    registry
}

fn auth_failure_hook(event_bus: EventBus) -> AuthFailureHook {
    Arc::new(move |provider: ProviderId, message: &str| {
        event_bus
            .emit(CoreEvent::Provider(ProviderEvent::AuthFailed {
                provider: provider.as_str().to_string(),
                message: message.to_string(),
            }))
            .ok();
    })
}

#[cfg_attr(feature = "desktop-shims", allow(dead_code))]
fn missing(capability: &str, message: &str) -> CoreError {
    CoreError::CapabilityMissing {
        capability: capability.to_string(),
        message: message.to_string(),
    }
}

#[cfg(all(feature = "desktop-shims", not(target_arch = "wasm32")))]
fn default_http_client() -> Result<Arc<dyn HttpClient>> {
    Ok(Arc::new(bridge_desktop::ReqwestHttpClient::new()?))
}

#[cfg(not(all(feature = "desktop-shims", not(target_arch = "wasm32"))))]
fn default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(missing("HttpClient", "No HTTP client configured"))
}

#[cfg(all(feature = "desktop-shims", not(target_arch = "wasm32")))]
fn default_resolver() -> Result<Arc<dyn HostResolver>> {
    Ok(Arc::new(bridge_desktop::SystemResolver))
}

#[cfg(not(all(feature = "desktop-shims", not(target_arch = "wasm32"))))]
fn default_resolver() -> Result<Arc<dyn HostResolver>> {
    Err(missing("HostResolver", "No host resolver configured"))
}

#[cfg(all(feature = "desktop-shims", not(target_arch = "wasm32")))]
async fn default_settings_store(config: &CoreConfig) -> Result<Arc<dyn SettingsStore>> {
    info!(path = %config.settings_path.display(), "Opening settings store");
    let store = bridge_desktop::SqliteSettingsStore::new(config.settings_path.clone()).await?;
    Ok(Arc::new(store))
}

#[cfg(not(all(feature = "desktop-shims", not(target_arch = "wasm32"))))]
async fn default_settings_store(_config: &CoreConfig) -> Result<Arc<dyn SettingsStore>> {
    Err(missing("SettingsStore", "No settings store configured"))
}
