//! Provider-facing domain model.
//!
//! [`ArtistMetadata`] is what a single provider returns and what the
//! orchestrator merges into. Text fields use the empty string for "absent",
//! list fields the empty vector.

use core_library::BandMember;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::MetadataError;
use crate::images::{ImageCandidate, ImageType};

/// Identity of an external metadata source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    MusicBrainz,
    Discogs,
    Fanart,
    Deezer,
    AudioDb,
    Wikidata,
    LastFm,
    Spotify,
    Lidarr,
    Emby,
    Jellyfin,
    /// Ad hoc web search
    DuckDuckGo,
}

impl ProviderId {
    pub const ALL: [ProviderId; 12] = [
        ProviderId::MusicBrainz,
        ProviderId::Discogs,
        ProviderId::Fanart,
        ProviderId::Deezer,
        ProviderId::AudioDb,
        ProviderId::Wikidata,
        ProviderId::LastFm,
        ProviderId::Spotify,
        ProviderId::Lidarr,
        ProviderId::Emby,
        ProviderId::Jellyfin,
        ProviderId::DuckDuckGo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::MusicBrainz => "musicbrainz",
            ProviderId::Discogs => "discogs",
            ProviderId::Fanart => "fanart",
            ProviderId::Deezer => "deezer",
            ProviderId::AudioDb => "audiodb",
            ProviderId::Wikidata => "wikidata",
            ProviderId::LastFm => "lastfm",
            ProviderId::Spotify => "spotify",
            ProviderId::Lidarr => "lidarr",
            ProviderId::Emby => "emby",
            ProviderId::Jellyfin => "jellyfin",
            ProviderId::DuckDuckGo => "duckduckgo",
        }
    }

    /// Whether this source may appear in a priority list of `kind`.
    pub fn supports_kind(&self, kind: FieldKind) -> bool {
        match kind {
            FieldKind::Metadata => !matches!(self, ProviderId::Fanart),
            FieldKind::Image => matches!(
                self,
                ProviderId::Fanart
                    | ProviderId::AudioDb
                    | ProviderId::Deezer
                    | ProviderId::Spotify
                    | ProviderId::Discogs
                    | ProviderId::Lidarr
                    | ProviderId::Emby
                    | ProviderId::Jellyfin
                    | ProviderId::DuckDuckGo
            ),
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = MetadataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        ProviderId::ALL
            .into_iter()
            .find(|id| id.as_str() == lowered)
            .ok_or_else(|| MetadataError::UnknownProvider(s.to_string()))
    }
}

/// Whether a field is reconciled from metadata or picked from image candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Metadata,
    Image,
}

/// A reconcilable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Biography,
    Genres,
    Styles,
    Moods,
    Born,
    Formed,
    Died,
    Disbanded,
    YearsActive,
    #[serde(rename = "type")]
    Type,
    Gender,
    Members,
    Thumb,
    Fanart,
    Logo,
    Banner,
}

impl Field {
    pub const ALL: [Field; 16] = [
        Field::Biography,
        Field::Genres,
        Field::Styles,
        Field::Moods,
        Field::Born,
        Field::Formed,
        Field::Died,
        Field::Disbanded,
        Field::YearsActive,
        Field::Type,
        Field::Gender,
        Field::Members,
        Field::Thumb,
        Field::Fanart,
        Field::Logo,
        Field::Banner,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Biography => "biography",
            Field::Genres => "genres",
            Field::Styles => "styles",
            Field::Moods => "moods",
            Field::Born => "born",
            Field::Formed => "formed",
            Field::Died => "died",
            Field::Disbanded => "disbanded",
            Field::YearsActive => "years_active",
            Field::Type => "type",
            Field::Gender => "gender",
            Field::Members => "members",
            Field::Thumb => "thumb",
            Field::Fanart => "fanart",
            Field::Logo => "logo",
            Field::Banner => "banner",
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self.image_type() {
            Some(_) => FieldKind::Image,
            None => FieldKind::Metadata,
        }
    }

    pub fn image_type(&self) -> Option<ImageType> {
        match self {
            Field::Thumb => Some(ImageType::Thumb),
            Field::Fanart => Some(ImageType::Fanart),
            Field::Logo => Some(ImageType::Logo),
            Field::Banner => Some(ImageType::Banner),
            _ => None,
        }
    }

    pub fn metadata_fields() -> impl Iterator<Item = Field> {
        Field::ALL
            .into_iter()
            .filter(|f| f.kind() == FieldKind::Metadata)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = MetadataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Field::ALL
            .into_iter()
            .find(|f| f.as_str() == lowered)
            .ok_or_else(|| MetadataError::InvalidField(s.to_string()))
    }
}

/// A single field's value, as one provider reported it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
    Members(Vec<BandMember>),
    Images(Vec<ImageCandidate>),
}

impl FieldValue {
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.trim().is_empty(),
            FieldValue::List(items) => items.iter().all(|s| s.trim().is_empty()),
            FieldValue::Members(members) => members.is_empty(),
            FieldValue::Images(images) => images.is_empty(),
        }
    }
}

/// Identity handed to providers: a display name plus known external ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistRef {
    pub name: String,
    #[serde(default)]
    pub provider_ids: BTreeMap<ProviderId, String>,
}

impl ArtistRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider_ids: BTreeMap::new(),
        }
    }

    pub fn with_id(mut self, provider: ProviderId, id: impl Into<String>) -> Self {
        let id = id.into();
        if !id.trim().is_empty() {
            self.provider_ids.insert(provider, id);
        }
        self
    }

    pub fn id_for(&self, provider: ProviderId) -> Option<&str> {
        self.provider_ids
            .get(&provider)
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }

    /// MusicBrainz artist id, when known.
    pub fn mbid(&self) -> Option<&str> {
        self.id_for(ProviderId::MusicBrainz)
    }
}

/// Artist metadata from one provider, or the merged result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtistMetadata {
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
    pub provider_ids: BTreeMap<ProviderId, String>,
    /// Link label ("official", "wikipedia", ...) to URL
    pub urls: BTreeMap<String, String>,
}

impl ArtistMetadata {
    /// Value of a metadata-kind field. `None` for image fields or when empty.
    pub fn value(&self, field: Field) -> Option<FieldValue> {
        let value = match field {
            Field::Biography => FieldValue::Text(self.biography.clone()),
            Field::Genres => FieldValue::List(self.genres.clone()),
            Field::Styles => FieldValue::List(self.styles.clone()),
            Field::Moods => FieldValue::List(self.moods.clone()),
            Field::Born => FieldValue::Text(self.born.clone()),
            Field::Formed => FieldValue::Text(self.formed.clone()),
            Field::Died => FieldValue::Text(self.died.clone()),
            Field::Disbanded => FieldValue::Text(self.disbanded.clone()),
            Field::YearsActive => FieldValue::Text(self.years_active.clone()),
            Field::Type => FieldValue::Text(self.artist_type.clone()),
            Field::Gender => FieldValue::Text(self.gender.clone()),
            Field::Members => FieldValue::Members(self.members.clone()),
            Field::Thumb | Field::Fanart | Field::Logo | Field::Banner => return None,
        };
        (!value.is_empty()).then_some(value)
    }

    pub fn has_value(&self, field: Field) -> bool {
        self.value(field).is_some()
    }

    /// Copy `field` from `other`.
    pub fn copy_field(&mut self, other: &ArtistMetadata, field: Field) {
        match field {
            Field::Biography => self.biography = other.biography.clone(),
            Field::Genres => self.genres = other.genres.clone(),
            Field::Styles => self.styles = other.styles.clone(),
            Field::Moods => self.moods = other.moods.clone(),
            Field::Born => self.born = other.born.clone(),
            Field::Formed => self.formed = other.formed.clone(),
            Field::Died => self.died = other.died.clone(),
            Field::Disbanded => self.disbanded = other.disbanded.clone(),
            Field::YearsActive => self.years_active = other.years_active.clone(),
            Field::Type => self.artist_type = other.artist_type.clone(),
            Field::Gender => self.gender = other.gender.clone(),
            Field::Members => self.members = other.members.clone(),
            Field::Thumb | Field::Fanart | Field::Logo | Field::Banner => {}
        }
    }

    /// True when no field, identity or id carries a value.
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
            && self.sort_name.is_empty()
            && self.disambiguation.is_empty()
            && self.provider_ids.is_empty()
            && self.urls.is_empty()
            && Field::metadata_fields().all(|f| !self.has_value(f))
    }
}

/// Which provider supplied a merged field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSource {
    pub field: Field,
    pub provider: ProviderId,
}

/// One search hit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtistSearchResult {
    pub provider: Option<ProviderId>,
    /// Provider-native artist id
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub sort_name: String,
    #[serde(default)]
    pub disambiguation: String,
    #[serde(default)]
    pub artist_type: String,
    #[serde(default)]
    pub country: String,
    /// Provider relevance score, 0-100
    #[serde(default)]
    pub score: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album_comparison: Option<AlbumComparison>,
}

impl ArtistSearchResult {
    pub fn new(provider: ProviderId, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            provider: Some(provider),
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Overlap between a local album list and a candidate's discography.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlbumComparison {
    pub local_count: usize,
    pub remote_count: usize,
    /// Local titles (as given) that appear remotely
    pub matched: Vec<String>,
    /// `matched / local_count`, 0.0 when nothing is local
    pub match_ratio: f64,
}
