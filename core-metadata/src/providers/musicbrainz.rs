//! MusicBrainz API Client
//!
//! ## API Endpoints
//!
//! - **Search**: `https://musicbrainz.org/ws/2/artist/?query=artist:{query}&fmt=json`
//! - **Lookup**: `https://musicbrainz.org/ws/2/artist/{mbid}?inc=annotation+genres+artist-rels+url-rels&fmt=json`
//! - **Discography**: `https://musicbrainz.org/ws/2/release-group?artist={mbid}&type=album&fmt=json`
//!
//! ## Rate Limiting
//!
//! MusicBrainz allows one request per second for identified clients. The
//! client spaces its own requests accordingly.
//!
//! ## User Agent Requirement
//!
//! MusicBrainz requires every client to identify itself:
//! `"ApplicationName/Version (ContactEmail)"`.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

use core_library::BandMember;

use super::{parse_json, send, RateLimiter, REQUEST_TIMEOUT};
use crate::error::{ProviderError, ProviderResult};
use crate::models::{ArtistMetadata, ArtistRef, ArtistSearchResult, Field, ProviderId};
use crate::provider::{
    ArtistSearcher, ConnectionTester, DiscographyProvider, MetadataProvider, Provider,
};

/// MusicBrainz API base URL
const MUSICBRAINZ_API_BASE: &str = "https://musicbrainz.org/ws/2";

const MAX_SEARCH_RESULTS: u32 = 10;

/// Annotations shorter than this are usually editorial notes, not biographies.
const MIN_BIO_LENGTH: usize = 50;

/// Nirvana, used as a known-good lookup for connection tests.
const PROBE_MBID: &str = "5b11f4ce-a62d-471e-81fc-a69a8278c7da";

const SUPPORTED_FIELDS: &[Field] = &[
    Field::Biography,
    Field::Genres,
    Field::Born,
    Field::Formed,
    Field::Died,
    Field::Disbanded,
    Field::YearsActive,
    Field::Type,
    Field::Gender,
    Field::Members,
];

pub struct MusicBrainzProvider {
    http_client: Arc<dyn HttpClient>,
    user_agent: String,
    rate_limiter: Arc<Mutex<RateLimiter>>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    artists: Vec<SearchArtist>,
}

#[derive(Debug, Deserialize)]
struct SearchArtist {
    id: String,
    name: String,
    #[serde(rename = "sort-name", default)]
    sort_name: String,
    #[serde(default)]
    disambiguation: String,
    #[serde(rename = "type", default)]
    artist_type: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    score: u8,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    id: String,
    name: String,
    #[serde(rename = "sort-name", default)]
    sort_name: String,
    #[serde(default)]
    disambiguation: String,
    #[serde(rename = "type", default)]
    artist_type: Option<String>,
    #[serde(default)]
    gender: Option<String>,
    #[serde(rename = "life-span", default)]
    life_span: LifeSpan,
    #[serde(default)]
    annotation: Option<String>,
    #[serde(default)]
    genres: Vec<Genre>,
    #[serde(default)]
    relations: Vec<Relation>,
}

#[derive(Debug, Default, Deserialize)]
struct LifeSpan {
    #[serde(default)]
    begin: Option<String>,
    #[serde(default)]
    end: Option<String>,
    #[serde(default)]
    ended: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct Genre {
    name: String,
    #[serde(default)]
    count: u32,
}

#[derive(Debug, Deserialize)]
struct Relation {
    #[serde(rename = "type")]
    relation_type: String,
    #[serde(default)]
    direction: String,
    #[serde(default)]
    begin: Option<String>,
    #[serde(default)]
    end: Option<String>,
    #[serde(default)]
    ended: bool,
    #[serde(default)]
    attributes: Vec<String>,
    #[serde(default)]
    artist: Option<RelatedArtist>,
    #[serde(default)]
    url: Option<RelatedUrl>,
}

#[derive(Debug, Deserialize)]
struct RelatedArtist {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct RelatedUrl {
    resource: String,
}

#[derive(Debug, Deserialize)]
struct ReleaseGroupResponse {
    #[serde(rename = "release-groups", default)]
    release_groups: Vec<ReleaseGroup>,
}

#[derive(Debug, Deserialize)]
struct ReleaseGroup {
    title: String,
}

impl MusicBrainzProvider {
    /// Create a new MusicBrainz provider
    ///
    /// # Arguments
    ///
    /// * `http_client` - HTTP client implementation
    /// * `user_agent` - User-Agent header for MusicBrainz API (required by API terms)
    /// * `rate_limit_delay` - Minimum delay between requests
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        user_agent: impl Into<String>,
        rate_limit_delay: Duration,
    ) -> Self {
        Self {
            http_client,
            user_agent: user_agent.into(),
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(rate_limit_delay))),
        }
    }

    fn request(&self, url: String) -> HttpRequest {
        HttpRequest::get(url)
            .header("User-Agent", self.user_agent.clone())
            .header("Accept", "application/json")
            .timeout(REQUEST_TIMEOUT)
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, url: String, context: &str) -> ProviderResult<T> {
        self.rate_limiter.lock().await.wait_if_needed().await;
        debug!(url = %url, "MusicBrainz request");
        let response = send(self.http_client.as_ref(), self.request(url), context).await?;
        parse_json(&response, context)
    }

    async fn search(&self, name: &str) -> ProviderResult<Vec<SearchArtist>> {
        let query = urlencoding::encode(&escape_lucene_query(name)).into_owned();
        let url = format!(
            "{}/artist/?query=artist:{}&fmt=json&limit={}",
            MUSICBRAINZ_API_BASE, query, MAX_SEARCH_RESULTS
        );
        let response: SearchResponse = self.get(url, "MusicBrainz artist search").await?;
        Ok(response.artists)
    }

    /// Best match for `name`: exact (case-insensitive) name first, then score.
    async fn resolve_mbid(&self, name: &str) -> ProviderResult<String> {
        let best = self
            .search(name)
            .await?
            .into_iter()
            .max_by_key(|artist| (artist.name.eq_ignore_ascii_case(name), artist.score))
            .ok_or_else(|| ProviderError::NotFound(format!("no MusicBrainz artist named '{}'", name)))?;

        debug!(mbid = %best.id, score = best.score, "Resolved MusicBrainz artist");
        Ok(best.id)
    }

    async fn lookup(&self, mbid: &str) -> ProviderResult<LookupResponse> {
        let url = format!(
            "{}/artist/{}?inc=annotation+genres+artist-rels+url-rels&fmt=json",
            MUSICBRAINZ_API_BASE,
            urlencoding::encode(mbid)
        );
        self.get(url, "MusicBrainz artist lookup").await
    }
}

impl Provider for MusicBrainzProvider {
    fn id(&self) -> ProviderId {
        ProviderId::MusicBrainz
    }

    fn display_name(&self) -> &str {
        "MusicBrainz"
    }

    fn as_searcher(&self) -> Option<&dyn ArtistSearcher> {
        Some(self)
    }

    fn as_metadata(&self) -> Option<&dyn MetadataProvider> {
        Some(self)
    }

    fn as_discography(&self) -> Option<&dyn DiscographyProvider> {
        Some(self)
    }

    fn as_connection_tester(&self) -> Option<&dyn ConnectionTester> {
        Some(self)
    }
}

#[async_trait]
impl ArtistSearcher for MusicBrainzProvider {
    async fn search_artist(&self, name: &str) -> ProviderResult<Vec<ArtistSearchResult>> {
        let artists = self.search(name).await?;
        Ok(artists
            .into_iter()
            .map(|artist| ArtistSearchResult {
                sort_name: artist.sort_name,
                disambiguation: artist.disambiguation,
                artist_type: artist.artist_type.unwrap_or_default(),
                country: artist.country.unwrap_or_default(),
                score: artist.score,
                ..ArtistSearchResult::new(ProviderId::MusicBrainz, artist.id, artist.name)
            })
            .collect())
    }
}

#[async_trait]
impl MetadataProvider for MusicBrainzProvider {
    fn supported_fields(&self) -> &[Field] {
        SUPPORTED_FIELDS
    }

    async fn fetch_metadata(&self, artist: &ArtistRef) -> ProviderResult<ArtistMetadata> {
        let mbid = match artist.mbid() {
            Some(mbid) => mbid.to_string(),
            None => self.resolve_mbid(&artist.name).await?,
        };
        let lookup = self.lookup(&mbid).await?;
        let metadata = to_metadata(lookup);

        info!(
            mbid = %mbid,
            genres = metadata.genres.len(),
            members = metadata.members.len(),
            "MusicBrainz metadata retrieved"
        );
        Ok(metadata)
    }
}

#[async_trait]
impl DiscographyProvider for MusicBrainzProvider {
    async fn fetch_albums(&self, artist_id: &str) -> ProviderResult<Vec<String>> {
        let url = format!(
            "{}/release-group?artist={}&type=album&fmt=json&limit=100",
            MUSICBRAINZ_API_BASE,
            urlencoding::encode(artist_id)
        );
        let response: ReleaseGroupResponse = self.get(url, "MusicBrainz release groups").await?;
        Ok(response.release_groups.into_iter().map(|g| g.title).collect())
    }
}

#[async_trait]
impl ConnectionTester for MusicBrainzProvider {
    async fn test_connection(&self) -> ProviderResult<()> {
        self.lookup(PROBE_MBID).await.map(|_| ())
    }
}

fn to_metadata(lookup: LookupResponse) -> ArtistMetadata {
    let artist_type = lookup.artist_type.unwrap_or_default();
    let is_person = artist_type.eq_ignore_ascii_case("person") || artist_type.eq_ignore_ascii_case("character");
    let begin = lookup.life_span.begin.unwrap_or_default();
    let end = lookup.life_span.end.unwrap_or_default();
    let ended = lookup.life_span.ended.unwrap_or(!end.is_empty());

    let mut metadata = ArtistMetadata {
        name: lookup.name,
        sort_name: lookup.sort_name,
        disambiguation: lookup.disambiguation,
        biography: lookup.annotation.and_then(clean_biography).unwrap_or_default(),
        years_active: years_active(&begin, &end, ended),
        gender: lookup.gender.unwrap_or_default(),
        ..ArtistMetadata::default()
    };
    if is_person {
        metadata.born = begin;
        metadata.died = end;
    } else {
        metadata.formed = begin;
        metadata.disbanded = end;
    }
    metadata.artist_type = artist_type;

    let mut genres = lookup.genres;
    genres.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    metadata.genres = genres.into_iter().map(|g| g.name).collect();

    metadata
        .provider_ids
        .insert(ProviderId::MusicBrainz, lookup.id);

    for relation in lookup.relations {
        match (relation.artist, relation.url) {
            (Some(member), _)
                if relation.relation_type == "member of band" && relation.direction == "backward" =>
            {
                metadata.members.push(BandMember {
                    name: member.name,
                    mbid: Some(member.id),
                    instruments: relation.attributes,
                    begin: relation.begin.unwrap_or_default(),
                    end: relation.end.unwrap_or_default(),
                    ended: relation.ended,
                });
            }
            (_, Some(url)) => {
                if let Some(id) = discogs_id(&url.resource) {
                    metadata.provider_ids.entry(ProviderId::Discogs).or_insert(id);
                }
                if let Some(id) = wikidata_id(&url.resource) {
                    metadata.provider_ids.entry(ProviderId::Wikidata).or_insert(id);
                }
                metadata
                    .urls
                    .entry(url_label(&relation.relation_type))
                    .or_insert(url.resource);
            }
            _ => {}
        }
    }

    metadata
}

fn url_label(relation_type: &str) -> String {
    match relation_type {
        "official homepage" => "official".to_string(),
        other => other.replace(' ', "_"),
    }
}

fn discogs_id(url: &str) -> Option<String> {
    let rest = url.split("discogs.com/artist/").nth(1)?;
    let id: String = rest.chars().take_while(char::is_ascii_digit).collect();
    (!id.is_empty()).then_some(id)
}

fn wikidata_id(url: &str) -> Option<String> {
    let rest = url.split("wikidata.org/wiki/").nth(1)?;
    let id = rest.trim_end_matches('/');
    id.starts_with('Q').then(|| id.to_string())
}

/// `"1986-present"`, `"1986-2013"` or `""`.
fn years_active(begin: &str, end: &str, ended: bool) -> String {
    let year = |date: &str| date.get(..4).unwrap_or(date).to_string();
    match (begin.is_empty(), end.is_empty()) {
        (true, _) => String::new(),
        (false, false) => format!("{}-{}", year(begin), year(end)),
        (false, true) if ended => year(begin),
        (false, true) => format!("{}-present", year(begin)),
    }
}

/// Escape special Lucene query characters
///
/// MusicBrainz uses Lucene for search, so we need to escape special characters.
fn escape_lucene_query(query: &str) -> String {
    const SPECIAL_CHARS: &[char] = &[
        '+', '-', '&', '|', '!', '(', ')', '{', '}', '[', ']', '^', '"', '~', '*', '?', ':', '\\',
        '/',
    ];

    query
        .chars()
        .map(|c| {
            if SPECIAL_CHARS.contains(&c) {
                format!("\\{}", c)
            } else {
                c.to_string()
            }
        })
        .collect()
}

/// Clean and validate biography text
///
/// - Trims whitespace
/// - Removes blank lines
/// - Rejects very short annotations
fn clean_biography(text: String) -> Option<String> {
    let cleaned = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    if cleaned.len() < MIN_BIO_LENGTH {
        debug!("Biography too short ({} chars), rejecting", cleaned.len());
        return None;
    }
    Some(cleaned)
}
