//! In-memory [`ArtistRepository`].

use crate::error::{LibraryError, Result};
use crate::models::ArtistRecord;
use crate::repository::ArtistRepository;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-local artist store keyed by record id.
#[derive(Debug, Default)]
pub struct InMemoryArtistRepository {
    artists: RwLock<HashMap<String, ArtistRecord>>,
}

impl InMemoryArtistRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.artists.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.artists.read().await.is_empty()
    }
}

fn invalid(message: String) -> LibraryError {
    LibraryError::InvalidInput {
        field: "ArtistRecord".to_string(),
        message,
    }
}

#[async_trait]
impl ArtistRepository for InMemoryArtistRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<ArtistRecord>> {
        Ok(self.artists.read().await.get(id).cloned())
    }

    async fn find_by_provider_id(
        &self,
        provider: &str,
        provider_id: &str,
    ) -> Result<Option<ArtistRecord>> {
        if provider_id.is_empty() {
            return Ok(None);
        }
        let artists = self.artists.read().await;
        Ok(artists
            .values()
            .find(|artist| artist.provider_id(provider) == Some(provider_id))
            .cloned())
    }

    async fn find_by_name_and_library(
        &self,
        name: &str,
        library_id: &str,
    ) -> Result<Option<ArtistRecord>> {
        let wanted = ArtistRecord::normalize(name);
        let artists = self.artists.read().await;
        Ok(artists
            .values()
            .find(|artist| {
                artist.library_id == library_id && ArtistRecord::normalize(&artist.name) == wanted
            })
            .cloned())
    }

    async fn list_by_library(&self, library_id: &str) -> Result<Vec<ArtistRecord>> {
        let artists = self.artists.read().await;
        let mut matching: Vec<ArtistRecord> = artists
            .values()
            .filter(|artist| artist.library_id == library_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(matching)
    }

    async fn insert(&self, artist: &ArtistRecord) -> Result<()> {
        artist.validate().map_err(invalid)?;

        let mut artists = self.artists.write().await;
        if artists.contains_key(&artist.id) {
            return Err(LibraryError::AlreadyExists {
                entity_type: "Artist".to_string(),
                id: artist.id.clone(),
            });
        }
        artists.insert(artist.id.clone(), artist.clone());
        Ok(())
    }

    async fn update(&self, artist: &ArtistRecord) -> Result<()> {
        artist.validate().map_err(invalid)?;

        let mut artists = self.artists.write().await;
        match artists.get_mut(&artist.id) {
            Some(existing) => {
                *existing = artist.clone();
                Ok(())
            }
            None => Err(LibraryError::NotFound {
                entity_type: "Artist".to_string(),
                id: artist.id.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let repo = InMemoryArtistRepository::new();
        let artist = ArtistRecord::new("lib-1", "Radiohead").with_provider_id("musicbrainz", "a74b1b7f");
        repo.insert(&artist).await.unwrap();

        assert_eq!(repo.find_by_id(&artist.id).await.unwrap(), Some(artist.clone()));
        assert_eq!(
            repo.find_by_provider_id("musicbrainz", "a74b1b7f").await.unwrap(),
            Some(artist.clone())
        );
        assert_eq!(repo.find_by_provider_id("discogs", "a74b1b7f").await.unwrap(), None);
        assert!(repo.insert(&artist).await.is_err());
    }

    #[tokio::test]
    async fn test_name_lookup_is_case_insensitive_and_library_scoped() {
        let repo = InMemoryArtistRepository::new();
        repo.insert(&ArtistRecord::new("lib-1", "Boards of Canada")).await.unwrap();

        assert!(repo
            .find_by_name_and_library("  boards OF canada", "lib-1")
            .await
            .unwrap()
            .is_some());
        assert!(repo
            .find_by_name_and_library("Boards of Canada", "lib-2")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_update_requires_existing_record() {
        let repo = InMemoryArtistRepository::new();
        let mut artist = ArtistRecord::new("lib-1", "Autechre");
        assert!(matches!(
            repo.update(&artist).await,
            Err(LibraryError::NotFound { .. })
        ));

        repo.insert(&artist).await.unwrap();
        artist.biography = "Electronic duo from Rochdale.".to_string();
        repo.update(&artist).await.unwrap();
        assert_eq!(
            repo.find_by_id(&artist.id).await.unwrap().unwrap().biography,
            "Electronic duo from Rochdale."
        );
    }

    #[tokio::test]
    async fn test_list_by_library_is_sorted() {
        let repo = InMemoryArtistRepository::new();
        for name in ["Mogwai", "Low", "Slint"] {
            repo.insert(&ArtistRecord::new("lib-1", name)).await.unwrap();
        }
        repo.insert(&ArtistRecord::new("lib-2", "Can")).await.unwrap();

        let names: Vec<String> = repo
            .list_by_library("lib-1")
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, vec!["Low", "Mogwai", "Slint"]);
    }
}
