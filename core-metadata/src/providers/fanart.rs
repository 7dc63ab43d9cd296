//! Fanart.tv API Client
//!
//! - **Artist images**: `https://webservice.fanart.tv/v3/music/{mbid}?api_key={key}`
//!
//! Lookups are keyed by MusicBrainz id; artists without one are a miss.
//! Fanart.tv does not report image dimensions, so candidates come back 0x0
//! for the dimension prober.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{parse_json, send, RateLimiter, REQUEST_TIMEOUT};
use crate::error::{ProviderError, ProviderResult};
use crate::images::{ImageCandidate, ImageType};
use crate::models::{ArtistRef, ProviderId};
use crate::provider::{ConnectionTester, ImageProvider, Provider};

const FANART_API_BASE: &str = "https://webservice.fanart.tv/v3/music";

/// Radiohead, used as a known-good lookup for connection tests.
const PROBE_MBID: &str = "a74b1b7f-71a5-4011-9441-d0b5e4122711";

const SUPPORTED_TYPES: &[ImageType] = &[
    ImageType::Thumb,
    ImageType::Fanart,
    ImageType::Logo,
    ImageType::Banner,
];

pub struct FanartProvider {
    http_client: Arc<dyn HttpClient>,
    api_key: String,
    rate_limiter: Arc<Mutex<RateLimiter>>,
}

#[derive(Debug, Default, Deserialize)]
struct ArtistImages {
    #[serde(rename = "artistthumb", default)]
    thumbs: Vec<FanartImage>,
    #[serde(rename = "artistbackground", default)]
    backgrounds: Vec<FanartImage>,
    #[serde(rename = "hdmusiclogo", default)]
    hd_logos: Vec<FanartImage>,
    #[serde(rename = "musiclogo", default)]
    logos: Vec<FanartImage>,
    #[serde(rename = "musicbanner", default)]
    banners: Vec<FanartImage>,
}

#[derive(Debug, Deserialize)]
struct FanartImage {
    url: String,
    /// Sent as a decimal string
    #[serde(default)]
    likes: String,
    #[serde(default)]
    lang: Option<String>,
}

impl FanartProvider {
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

    async fn lookup(&self, mbid: &str) -> ProviderResult<ArtistImages> {
        if self.api_key.trim().is_empty() {
            return Err(ProviderError::Auth("Fanart.tv API key is not configured".to_string()));
        }

        let url = format!(
            "{}/{}?api_key={}",
            FANART_API_BASE,
            urlencoding::encode(mbid),
            urlencoding::encode(&self.api_key)
        );
        self.rate_limiter.lock().await.wait_if_needed().await;
        debug!(mbid, "Fanart.tv request");

        let request = HttpRequest::get(url)
            .header("Accept", "application/json")
            .timeout(REQUEST_TIMEOUT);
        let response = send(self.http_client.as_ref(), request, "Fanart.tv").await?;
        parse_json(&response, "Fanart.tv artist images")
    }
}

impl Provider for FanartProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Fanart
    }

    fn display_name(&self) -> &str {
        "Fanart.tv"
    }

    fn as_images(&self) -> Option<&dyn ImageProvider> {
        Some(self)
    }

    fn as_connection_tester(&self) -> Option<&dyn ConnectionTester> {
        Some(self)
    }
}

#[async_trait]
impl ImageProvider for FanartProvider {
    fn supported_image_types(&self) -> &[ImageType] {
        SUPPORTED_TYPES
    }

    async fn fetch_images(&self, artist: &ArtistRef) -> ProviderResult<Vec<ImageCandidate>> {
        let Some(mbid) = artist.mbid() else {
            return Err(ProviderError::NotFound(format!(
                "'{}' has no MusicBrainz id",
                artist.name
            )));
        };

        let images = self.lookup(mbid).await?;
        let candidates: Vec<ImageCandidate> = [
            (ImageType::Thumb, images.thumbs),
            (ImageType::Fanart, images.backgrounds),
            (ImageType::Logo, images.hd_logos),
            (ImageType::Logo, images.logos),
            (ImageType::Banner, images.banners),
        ]
        .into_iter()
        .flat_map(|(image_type, list)| {
            list.into_iter().map(move |image| {
                let mut candidate = ImageCandidate::new(ProviderId::Fanart, image_type, image.url)
                    .with_likes(image.likes.trim().parse().unwrap_or(0));
                if let Some(lang) = image.lang.filter(|l| !l.is_empty() && l != "00") {
                    candidate = candidate.with_language(lang);
                }
                candidate
            })
        })
        .collect();

        info!(mbid, images = candidates.len(), "Fanart.tv images retrieved");
        Ok(candidates)
    }
}

#[async_trait]
impl ConnectionTester for FanartProvider {
    async fn test_connection(&self) -> ProviderResult<()> {
        self.lookup(PROBE_MBID).await.map(|_| ())
    }
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

    #[tokio::test]
    async fn test_images_are_typed_and_liked() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .withf(|req| req.url.starts_with("https://webservice.fanart.tv/v3/music/abc?api_key=k"))
            .times(1)
            .returning(|_| {
                Ok(HttpResponse::new(
                    200,
                    r#"{"name": "Radiohead",
                        "artistthumb": [{"id": "1", "url": "https://assets.fanart.tv/t.jpg", "likes": "4"}],
                        "artistbackground": [{"id": "2", "url": "https://assets.fanart.tv/b.jpg", "likes": "x"}],
                        "hdmusiclogo": [{"id": "3", "url": "https://assets.fanart.tv/l.png", "likes": "1", "lang": "en"}]}"#,
                ))
            });

        let provider = FanartProvider::new(Arc::new(http), "k", Duration::ZERO);
        let images = provider
            .fetch_images(&ArtistRef::new("Radiohead").with_id(ProviderId::MusicBrainz, "abc"))
            .await
            .unwrap();

        assert_eq!(images.len(), 3);
        assert_eq!(images[0].image_type, ImageType::Thumb);
        assert_eq!(images[0].likes, 4);
        assert_eq!(images[1].likes, 0);
        assert_eq!(images[2].image_type, ImageType::Logo);
        assert_eq!(images[2].language.as_deref(), Some("en"));
        assert!(images.iter().all(ImageCandidate::needs_probe));
    }

    #[tokio::test]
    async fn test_without_mbid_is_not_found() {
        let mut http = MockHttp::new();
        http.expect_execute().never();
        let provider = FanartProvider::new(Arc::new(http), "k", Duration::ZERO);
        let err = provider
            .fetch_images(&ArtistRef::new("Unknown"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_rejected_key_is_auth_failure() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .returning(|_| Ok(HttpResponse::new(401, r#"{"status":"error"}"#)));
        let provider = FanartProvider::new(Arc::new(http), "bad", Duration::ZERO);
        assert!(provider.test_connection().await.unwrap_err().is_auth());
    }
}
