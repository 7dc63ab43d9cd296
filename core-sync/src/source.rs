//! Artist listing of a connected media source (Emby, Jellyfin, Lidarr, ...).

use crate::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};

/// Artist as listed by a media source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceArtist {
    pub name: String,
    /// Ids the source already knows, keyed by provider name ("musicbrainz", ...)
    pub provider_ids: BTreeMap<String, String>,
}

impl SourceArtist {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider_ids: BTreeMap::new(),
        }
    }

    pub fn with_provider_id(mut self, provider: impl Into<String>, id: impl Into<String>) -> Self {
        self.provider_ids.insert(provider.into(), id.into());
        self
    }
}

/// Lists the artists of a library on its connected media source.
#[async_trait]
pub trait LibrarySource: Send + Sync {
    async fn list_artists(&self, library_id: &str) -> Result<Vec<SourceArtist>>;
}

/// Fixed listing per library; unknown libraries list nothing.
#[derive(Debug, Clone, Default)]
pub struct StaticLibrarySource {
    libraries: HashMap<String, Vec<SourceArtist>>,
}

impl StaticLibrarySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_library(mut self, library_id: impl Into<String>, artists: Vec<SourceArtist>) -> Self {
        self.libraries.insert(library_id.into(), artists);
        self
    }
}

#[async_trait]
impl LibrarySource for StaticLibrarySource {
    async fn list_artists(&self, library_id: &str) -> Result<Vec<SourceArtist>> {
        Ok(self.libraries.get(library_id).cloned().unwrap_or_default())
    }
}
