//! # Provider Capabilities
//!
//! A provider implements [`Provider`] plus whichever capability traits it
//! supports, and exposes them through the `as_*` accessors. The orchestrator
//! only ever calls a capability the provider hands back.
//!
//! ```ignore
//! impl Provider for MusicBrainzProvider {
//!     fn id(&self) -> ProviderId { ProviderId::MusicBrainz }
//!     fn as_searcher(&self) -> Option<&dyn ArtistSearcher> { Some(self) }
//!     fn as_metadata(&self) -> Option<&dyn MetadataProvider> { Some(self) }
//! }
//! ```

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::error::ProviderResult;
use crate::images::{ImageCandidate, ImageType};
use crate::models::{ArtistMetadata, ArtistRef, ArtistSearchResult, Field, ProviderId};

#[async_trait]
pub trait ArtistSearcher: Send + Sync {
    async fn search_artist(&self, name: &str) -> ProviderResult<Vec<ArtistSearchResult>>;
}

#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Fields this provider can fill. Values for other fields are ignored.
    fn supported_fields(&self) -> &[Field];

    /// Fails with `NotFound` when the provider has no record for the artist.
    async fn fetch_metadata(&self, artist: &ArtistRef) -> ProviderResult<ArtistMetadata>;
}

#[async_trait]
pub trait ImageProvider: Send + Sync {
    fn supported_image_types(&self) -> &[ImageType];

    async fn fetch_images(&self, artist: &ArtistRef) -> ProviderResult<Vec<ImageCandidate>>;
}

#[async_trait]
pub trait DiscographyProvider: Send + Sync {
    /// Album titles for a provider-native artist id.
    async fn fetch_albums(&self, artist_id: &str) -> ProviderResult<Vec<String>>;
}

#[async_trait]
pub trait ConnectionTester: Send + Sync {
    async fn test_connection(&self) -> ProviderResult<()>;
}

/// Base trait for every metadata source.
pub trait Provider: Send + Sync {
    fn id(&self) -> ProviderId;

    fn display_name(&self) -> &str {
        self.id().as_str()
    }

    fn as_searcher(&self) -> Option<&dyn ArtistSearcher> {
        None
    }

    fn as_metadata(&self) -> Option<&dyn MetadataProvider> {
        None
    }

    fn as_images(&self) -> Option<&dyn ImageProvider> {
        None
    }

    fn as_discography(&self) -> Option<&dyn DiscographyProvider> {
        None
    }

    fn as_connection_tester(&self) -> Option<&dyn ConnectionTester> {
        None
    }
}

/// Registered providers keyed by id, in registration order.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider. Re-registering an id replaces it in place.
    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        let id = provider.id();
        match self.providers.iter().position(|p| p.id() == id) {
            Some(index) => {
                debug!(provider = %id, "Replacing registered provider");
                self.providers[index] = provider;
            }
            None => {
                debug!(provider = %id, "Registered provider");
                self.providers.push(provider);
            }
        }
    }

    pub fn with(mut self, provider: Arc<dyn Provider>) -> Self {
        self.register(provider);
        self
    }

    pub fn get(&self, id: ProviderId) -> Option<&Arc<dyn Provider>> {
        self.providers.iter().find(|p| p.id() == id)
    }

    pub fn contains(&self, id: ProviderId) -> bool {
        self.get(id).is_some()
    }

    pub fn ids(&self) -> Vec<ProviderId> {
        self.providers.iter().map(|p| p.id()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Provider>> {
        self.providers.iter()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.ids())
            .finish()
    }
}
