//! Domain models for the artist library
//!
//! Artist records as the record store keeps them. Text fields use the empty
//! string for "unknown" and list fields the empty vector.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Unique identifier for an artist record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtistId(pub Uuid);

impl ArtistId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for ArtistId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ArtistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A member of a group, with the years they were active in it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandMember {
    pub name: String,
    /// MusicBrainz id of the member, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mbid: Option<String>,
    #[serde(default)]
    pub instruments: Vec<String>,
    #[serde(default)]
    pub begin: String,
    #[serde(default)]
    pub end: String,
    #[serde(default)]
    pub ended: bool,
}

impl BandMember {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Persisted artist with reconciled metadata and provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistRecord {
    pub id: String,
    pub library_id: String,
    pub name: String,
    pub sort_name: String,
    pub disambiguation: String,
    pub biography: String,
    pub genres: Vec<String>,
    pub styles: Vec<String>,
    pub moods: Vec<String>,
    pub born: String,
    pub formed: String,
    pub died: String,
    pub disbanded: String,
    pub years_active: String,
    pub artist_type: String,
    pub gender: String,
    pub members: Vec<BandMember>,
    /// External ids keyed by provider name ("musicbrainz", "discogs", ...)
    pub provider_ids: BTreeMap<String, String>,
    pub thumb_url: String,
    pub fanart_url: String,
    pub logo_url: String,
    pub banner_url: String,
    /// Field name -> provider that supplied the stored value
    pub field_sources: BTreeMap<String, String>,
    /// Unix seconds of the last provider refresh
    pub metadata_refreshed_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl ArtistRecord {
    /// New record with only a name, stamped with the current time.
    pub fn new(library_id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: ArtistId::new().to_string(),
            library_id: library_id.into(),
            name: name.into(),
            sort_name: String::new(),
            disambiguation: String::new(),
            biography: String::new(),
            genres: Vec::new(),
            styles: Vec::new(),
            moods: Vec::new(),
            born: String::new(),
            formed: String::new(),
            died: String::new(),
            disbanded: String::new(),
            years_active: String::new(),
            artist_type: String::new(),
            gender: String::new(),
            members: Vec::new(),
            provider_ids: BTreeMap::new(),
            thumb_url: String::new(),
            fanart_url: String::new(),
            logo_url: String::new(),
            banner_url: String::new(),
            field_sources: BTreeMap::new(),
            metadata_refreshed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_provider_id(mut self, provider: impl Into<String>, id: impl Into<String>) -> Self {
        self.provider_ids.insert(provider.into(), id.into());
        self
    }

    pub fn provider_id(&self, provider: &str) -> Option<&str> {
        self.provider_ids
            .get(provider)
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Artist name cannot be empty".to_string());
        }
        if self.library_id.trim().is_empty() {
            return Err("Artist must belong to a library".to_string());
        }
        Ok(())
    }

    /// Normalize a name for case-insensitive matching
    pub fn normalize(s: &str) -> String {
        s.trim().to_lowercase()
    }
}
