//! # Dimension Prober
//!
//! Fills in width/height for image candidates whose provider did not report
//! them. Each probe fetches only the first [`PROBE_BYTES`] of the image
//! through the outbound fetch guard and decodes the header.
//!
//! The concurrency cap belongs to the prober, not to a call: clones share one
//! semaphore, so parallel `probe_missing` calls never exceed it together.

use bridge_traits::http::{HttpClient, HttpRequest};
use futures::future::join_all;
use image::ImageReader;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, instrument};

use core_fetch::GuardedHttpClient;

use crate::error::ProbeError;
use crate::images::ImageCandidate;

/// Bytes fetched per probe. Enough for the header of every allowed format.
pub const PROBE_BYTES: usize = 64 * 1024;

pub const DEFAULT_PROBE_CONCURRENCY: usize = 5;

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Bounded-concurrency dimension lookup.
#[derive(Clone)]
pub struct DimensionProber {
    client: Arc<GuardedHttpClient>,
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl DimensionProber {
    pub fn new(client: Arc<GuardedHttpClient>) -> Self {
        Self {
            client,
            permits: Arc::new(Semaphore::new(DEFAULT_PROBE_CONCURRENCY)),
            timeout: PROBE_TIMEOUT,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.permits = Arc::new(Semaphore::new(concurrency.max(1)));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Probe every candidate with zero width and height, in place.
    ///
    /// Returns once all probes have finished. A failed probe leaves the
    /// candidate at 0x0.
    #[instrument(skip(self, candidates), fields(total = candidates.len()))]
    pub async fn probe_missing(&self, candidates: &mut [ImageCandidate]) {
        let probes = candidates
            .iter_mut()
            .filter(|c| c.needs_probe())
            .map(|candidate| async move {
                let Ok(_permit) = self.permits.acquire().await else {
                    return;
                };
                match self.probe(&candidate.url).await {
                    Ok((width, height)) => {
                        candidate.width = width;
                        candidate.height = height;
                    }
                    Err(error) => {
                        debug!(url = %candidate.url, error = %error, "Dimension probe failed");
                    }
                }
            });

        let probed = join_all(probes).await.len();
        debug!(probed, "Dimension probing finished");
    }

    /// Width and height of the image at `url`, read from its header.
    ///
    /// Does not take a permit; callers outside [`probe_missing`] are not
    /// bounded.
    ///
    /// [`probe_missing`]: Self::probe_missing
    pub async fn probe(&self, url: &str) -> Result<(u32, u32), ProbeError> {
        let request = HttpRequest::get(url)
            .range_prefix(PROBE_BYTES)
            .timeout(self.timeout);
        let response = self.client.execute(request).await?;

        if !response.is_success() {
            return Err(ProbeError::Status(response.status));
        }
        decode_dimensions(&response.body)
    }
}

/// Decode only the header of an encoded image.
pub fn decode_dimensions(bytes: &[u8]) -> Result<(u32, u32), ProbeError> {
    Ok(ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_dimensions()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded_png(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Cursor::new(Vec::new());
        image::RgbImage::new(width, height)
            .write_to(&mut bytes, image::ImageFormat::Png)
            .unwrap();
        bytes.into_inner()
    }

    #[test]
    fn test_decode_png_header() {
        assert_eq!(decode_dimensions(&encoded_png(640, 480)).unwrap(), (640, 480));
    }

    #[test]
    fn test_decode_rejects_non_image() {
        assert!(matches!(
            decode_dimensions(b"<html>nope</html>"),
            Err(ProbeError::Decode(_))
        ));
        assert!(decode_dimensions(b"").is_err());
    }
}
