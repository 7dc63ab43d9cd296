//! External Metadata Providers
//!
//! Reference adapters implementing the provider capability traits:
//! - MusicBrainz - search, metadata, discography
//! - Last.fm - search, biography and tags (API key)
//! - Fanart.tv - artist thumbs, backgrounds, logos and banners (API key)
//!
//! Each provider enforces its own request spacing to comply with API terms.

pub mod fanart;
pub mod lastfm;
pub mod musicbrainz;

pub use fanart::FanartProvider;
pub use lastfm::LastFmProvider;
pub use musicbrainz::MusicBrainzProvider;

use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};

/// Timeout for API requests
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Enforces a minimum delay between requests.
pub(crate) struct RateLimiter {
    last_request: Option<Instant>,
    min_delay: Duration,
}

impl RateLimiter {
    pub(crate) fn new(min_delay: Duration) -> Self {
        Self {
            last_request: None,
            min_delay,
        }
    }

    pub(crate) async fn wait_if_needed(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_delay {
                let wait_time = self.min_delay - elapsed;
                debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }
        self.last_request = Some(Instant::now());
    }
}

/// Send `request`, mapping transport failures and HTTP status codes.
pub(crate) async fn send(
    client: &dyn HttpClient,
    request: HttpRequest,
    context: &str,
) -> ProviderResult<HttpResponse> {
    let response = client.execute(request).await?;
    if !response.is_success() {
        return Err(ProviderError::from_status(response.status, context));
    }
    Ok(response)
}

pub(crate) fn parse_json<T: DeserializeOwned>(response: &HttpResponse, context: &str) -> ProviderResult<T> {
    serde_json::from_slice(&response.body)
        .map_err(|e| ProviderError::InvalidResponse(format!("{}: {}", context, e)))
}
