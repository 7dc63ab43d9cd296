//! Last.fm API Client
//!
//! ## API Endpoints
//!
//! - **Search**: `https://ws.audioscrobbler.com/2.0/?method=artist.search&artist={name}&api_key={key}&format=json`
//! - **Artist Info**: `https://ws.audioscrobbler.com/2.0/?method=artist.getinfo&artist={name}&api_key={key}&format=json`
//!
//! ## API Key Requirement
//!
//! Last.fm requires an API key for all requests.
//! Obtain one at: https://www.last.fm/api/account/create
//!
//! Errors come back as `{"error": <code>, "message": "..."}`, sometimes with
//! HTTP 200. Request URLs carry the key and are never logged.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{RateLimiter, REQUEST_TIMEOUT};
use crate::error::{ProviderError, ProviderResult};
use crate::models::{ArtistMetadata, ArtistRef, ArtistSearchResult, Field, ProviderId};
use crate::provider::{ArtistSearcher, ConnectionTester, MetadataProvider, Provider};

/// Last.fm API base URL
const LASTFM_API_BASE: &str = "https://ws.audioscrobbler.com/2.0/";

const MAX_SEARCH_RESULTS: u32 = 10;

/// Tags Last.fm users attach that are not genres.
const IGNORED_TAGS: &[&str] = &["seen live", "favorites", "favourite", "albums i own"];

const SUPPORTED_FIELDS: &[Field] = &[Field::Biography, Field::Genres];

pub struct LastFmProvider {
    http_client: Arc<dyn HttpClient>,
    api_key: String,
    rate_limiter: Arc<Mutex<RateLimiter>>,
}

/// Last.fm error response
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: i32,
    message: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: SearchResults,
}

#[derive(Debug, Deserialize)]
struct SearchResults {
    #[serde(rename = "artistmatches")]
    artist_matches: ArtistMatches,
}

#[derive(Debug, Deserialize)]
struct ArtistMatches {
    #[serde(default)]
    artist: Vec<SearchArtist>,
}

#[derive(Debug, Deserialize)]
struct SearchArtist {
    name: String,
    #[serde(default)]
    mbid: String,
}

#[derive(Debug, Deserialize)]
struct InfoResponse {
    artist: ArtistInfo,
}

#[derive(Debug, Deserialize)]
struct ArtistInfo {
    name: String,
    #[serde(default)]
    mbid: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    bio: Option<Bio>,
    #[serde(default)]
    tags: Option<Tags>,
}

#[derive(Debug, Deserialize)]
struct Bio {
    #[serde(default)]
    content: String,
    #[serde(default)]
    summary: String,
}

#[derive(Debug, Deserialize)]
struct Tags {
    #[serde(default)]
    tag: Vec<Tag>,
}

#[derive(Debug, Deserialize)]
struct Tag {
    name: String,
}

impl LastFmProvider {
    /// Creates a new Last.fm provider
    ///
    /// # Arguments
    ///
    /// * `http_client` - HTTP client for making requests
    /// * `api_key` - Last.fm API key
    /// * `rate_limit_delay` - Minimum delay between requests
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        api_key: impl Into<String>,
        rate_limit_delay: Duration,
    ) -> Self {
        Self {
            http_client,
            api_key: api_key.into(),
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(rate_limit_delay))),
        }
    }

    /// Call `method` with extra query parameters and decode the body.
    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, &str)],
    ) -> ProviderResult<T> {
        if self.api_key.trim().is_empty() {
            return Err(ProviderError::Auth("Last.fm API key is not configured".to_string()));
        }

        let mut url = format!(
            "{}?method={}&api_key={}&format=json",
            LASTFM_API_BASE,
            method,
            urlencoding::encode(&self.api_key)
        );
        for (key, value) in params {
            url.push_str(&format!("&{}={}", key, urlencoding::encode(value)));
        }

        self.rate_limiter.lock().await.wait_if_needed().await;
        debug!(method, "Last.fm request");

        let request = HttpRequest::get(url)
            .header("Accept", "application/json")
            .timeout(REQUEST_TIMEOUT);
        let response = self.http_client.execute(request).await?;

        if let Ok(error) = serde_json::from_slice::<ErrorResponse>(&response.body) {
            return Err(map_api_error(error));
        }
        if !response.is_success() {
            return Err(ProviderError::from_status(response.status, "Last.fm"));
        }

        serde_json::from_slice(&response.body)
            .map_err(|e| ProviderError::InvalidResponse(format!("Last.fm {}: {}", method, e)))
    }
}

fn map_api_error(error: ErrorResponse) -> ProviderError {
    match error.error {
        6 => ProviderError::NotFound(error.message),
        4 | 9 | 10 | 14 | 26 => ProviderError::Auth(error.message),
        29 => ProviderError::RateLimited(error.message),
        _ => ProviderError::InvalidResponse(format!("Last.fm error {}: {}", error.error, error.message)),
    }
}

impl Provider for LastFmProvider {
    fn id(&self) -> ProviderId {
        ProviderId::LastFm
    }

    fn display_name(&self) -> &str {
        "Last.fm"
    }

    fn as_searcher(&self) -> Option<&dyn ArtistSearcher> {
        Some(self)
    }

    fn as_metadata(&self) -> Option<&dyn MetadataProvider> {
        Some(self)
    }

    fn as_connection_tester(&self) -> Option<&dyn ConnectionTester> {
        Some(self)
    }
}

#[async_trait]
impl ArtistSearcher for LastFmProvider {
    async fn search_artist(&self, name: &str) -> ProviderResult<Vec<ArtistSearchResult>> {
        let limit = MAX_SEARCH_RESULTS.to_string();
        let response: SearchResponse = self
            .call("artist.search", &[("artist", name), ("limit", limit.as_str())])
            .await?;

        Ok(response
            .results
            .artist_matches
            .artist
            .into_iter()
            .map(|artist| {
                // Last.fm has no native artist id; fall back to the name.
                let id = if artist.mbid.is_empty() {
                    artist.name.clone()
                } else {
                    artist.mbid
                };
                ArtistSearchResult::new(ProviderId::LastFm, id, artist.name)
            })
            .collect())
    }
}

#[async_trait]
impl MetadataProvider for LastFmProvider {
    fn supported_fields(&self) -> &[Field] {
        SUPPORTED_FIELDS
    }

    async fn fetch_metadata(&self, artist: &ArtistRef) -> ProviderResult<ArtistMetadata> {
        let response: InfoResponse = match artist.mbid() {
            Some(mbid) => self.call("artist.getinfo", &[("mbid", mbid)]).await,
            None => {
                self.call("artist.getinfo", &[("artist", artist.name.as_str()), ("autocorrect", "1")])
                    .await
            }
        }?;
        let info = response.artist;

        let mut metadata = ArtistMetadata {
            name: info.name,
            biography: info
                .bio
                .map(|bio| if bio.content.trim().is_empty() { bio.summary } else { bio.content })
                .map(|text| clean_biography(&text))
                .unwrap_or_default(),
            genres: info
                .tags
                .map(|tags| {
                    tags.tag
                        .into_iter()
                        .map(|t| t.name.trim().to_string())
                        .filter(|t| !t.is_empty() && !IGNORED_TAGS.contains(&t.to_lowercase().as_str()))
                        .collect()
                })
                .unwrap_or_default(),
            ..ArtistMetadata::default()
        };
        if let Some(mbid) = info.mbid.filter(|m| !m.is_empty()) {
            metadata.provider_ids.insert(ProviderId::MusicBrainz, mbid);
        }
        if let Some(url) = info.url.filter(|u| !u.is_empty()) {
            metadata.urls.insert("lastfm".to_string(), url);
        }

        info!(
            bio_length = metadata.biography.len(),
            tags = metadata.genres.len(),
            "Last.fm metadata retrieved"
        );
        Ok(metadata)
    }
}

#[async_trait]
impl ConnectionTester for LastFmProvider {
    async fn test_connection(&self) -> ProviderResult<()> {
        self.call::<InfoResponse>("artist.getinfo", &[("artist", "Cher")])
            .await
            .map(|_| ())
    }
}

/// Strip the trailing "Read more on Last.fm" link and the license notice.
fn clean_biography(text: &str) -> String {
    let cut = text.find("<a href=\"https://www.last.fm").unwrap_or(text.len());
    let text = &text[..cut];
    let cut = text
        .find("User-contributed text is available")
        .unwrap_or(text.len());
    text[..cut].trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::HttpResponse;
    use mockall::mock;

    mock! {
        pub Http {}

        #[async_trait]
        impl HttpClient for Http {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    fn provider(http: MockHttp, key: &str) -> LastFmProvider {
        LastFmProvider::new(Arc::new(http), key, Duration::ZERO)
    }

    #[test]
    fn test_clean_biography_strips_link() {
        let raw = "Björk is an Icelandic singer. <a href=\"https://www.last.fm/music/Bj%C3%B6rk\">Read more on Last.fm</a>";
        assert_eq!(clean_biography(raw), "Björk is an Icelandic singer.");
    }

    #[tokio::test]
    async fn test_fetch_metadata_maps_bio_and_tags() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .withf(|req| {
                req.url.contains("method=artist.getinfo")
                    && req.url.contains("artist=Bj%C3%B6rk")
                    && req.url.contains("api_key=secret")
            })
            .times(1)
            .returning(|_| {
                Ok(HttpResponse::new(
                    200,
                    r#"{"artist": {"name": "Björk", "mbid": "87c5dedd",
                        "url": "https://www.last.fm/music/Bj%C3%B6rk",
                        "bio": {"summary": "short", "content": "Icelandic singer and composer."},
                        "tags": {"tag": [{"name": "electronic"}, {"name": "seen live"}, {"name": "art pop"}]}}}"#,
                ))
            });

        let metadata = provider(http, "secret")
            .fetch_metadata(&ArtistRef::new("Björk"))
            .await
            .unwrap();
        assert_eq!(metadata.biography, "Icelandic singer and composer.");
        assert_eq!(metadata.genres, vec!["electronic", "art pop"]);
        assert_eq!(metadata.provider_ids[&ProviderId::MusicBrainz], "87c5dedd");
    }

    #[tokio::test]
    async fn test_api_errors_are_classified() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .withf(|req| req.url.contains("artist=Missing"))
            .returning(|_| {
                Ok(HttpResponse::new(
                    200,
                    r#"{"error": 6, "message": "The artist you supplied could not be found"}"#,
                ))
            });
        http.expect_execute()
            .withf(|req| req.url.contains("artist=Cher"))
            .returning(|_| {
                Ok(HttpResponse::new(
                    403,
                    r#"{"error": 10, "message": "Invalid API key - You must be granted a valid key by last.fm"}"#,
                ))
            });

        let provider = provider(http, "bad");
        assert!(provider
            .fetch_metadata(&ArtistRef::new("Missing"))
            .await
            .unwrap_err()
            .is_not_found());
        assert!(provider.test_connection().await.unwrap_err().is_auth());
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_request() {
        let mut http = MockHttp::new();
        http.expect_execute().never();
        let err = provider(http, "").search_artist("Cher").await.unwrap_err();
        assert!(err.is_auth());
    }
}
