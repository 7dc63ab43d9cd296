//! Record store contract for artists.

use crate::error::Result;
use crate::models::ArtistRecord;
use async_trait::async_trait;

/// Artist record store.
///
/// The metadata core only reads and writes artists through this trait; a host
/// backs it with its own database.
#[async_trait]
pub trait ArtistRepository: Send + Sync {
    /// Find an artist by its record id
    async fn find_by_id(&self, id: &str) -> Result<Option<ArtistRecord>>;

    /// Find an artist carrying `provider_id` for `provider` (e.g. a MusicBrainz id)
    async fn find_by_provider_id(
        &self,
        provider: &str,
        provider_id: &str,
    ) -> Result<Option<ArtistRecord>>;

    /// Find an artist in a library by name, ignoring case and surrounding whitespace
    async fn find_by_name_and_library(
        &self,
        name: &str,
        library_id: &str,
    ) -> Result<Option<ArtistRecord>>;

    /// All artists of a library, ordered by name
    async fn list_by_library(&self, library_id: &str) -> Result<Vec<ArtistRecord>>;

    /// Insert a new artist
    ///
    /// # Errors
    /// Fails if the record is invalid or its id already exists.
    async fn insert(&self, artist: &ArtistRecord) -> Result<()>;

    /// Replace an existing artist
    ///
    /// # Errors
    /// Fails with `NotFound` if no record has the same id.
    async fn update(&self, artist: &ArtistRecord) -> Result<()>;
}
