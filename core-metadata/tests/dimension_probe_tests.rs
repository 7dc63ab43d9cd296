//! Integration tests for the dimension prober behind the outbound fetch guard.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use core_fetch::{GuardedHttpClient, StaticResolver};
use core_metadata::dimensions::{DEFAULT_PROBE_CONCURRENCY, PROBE_BYTES};
use core_metadata::{
    ArtistRef, DimensionProber, Field, FieldPriority, ImageCandidate, ImageProvider, ImageType,
    Orchestrator, Provider, ProviderId, ProviderRegistry, ProviderResult, StaticPriorityStore,
};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn encoded_png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Cursor::new(Vec::new());
    image::RgbImage::new(width, height)
        .write_to(&mut bytes, image::ImageFormat::Png)
        .unwrap();
    bytes.into_inner()
}

/// Serves PNGs sized from the URL path (`/WxH.png`), 404 otherwise.
/// Records request URLs and the peak number of in-flight requests.
#[derive(Default)]
struct ImageHost {
    urls: Mutex<Vec<String>>,
    ranges: Mutex<Vec<Option<String>>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl HttpClient for ImageHost {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.urls.lock().unwrap().push(request.url.clone());
        self.ranges
            .lock()
            .unwrap()
            .push(request.headers.get("Range").cloned());

        tokio::time::sleep(Duration::from_millis(10)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let name = request.url.rsplit('/').next().unwrap_or_default();
        let size = name
            .strip_suffix(".png")
            .and_then(|dims| dims.split_once('x'))
            .and_then(|(w, h)| Some((w.parse().ok()?, h.parse().ok()?)));
        match size {
            Some((w, h)) => Ok(HttpResponse::new(206, encoded_png(w, h))),
            None if name == "reset" => Err(BridgeError::OperationFailed("connection reset".into())),
            None => Ok(HttpResponse::new(404, "missing")),
        }
    }
}

fn prober(host: Arc<ImageHost>) -> DimensionProber {
    let resolver = StaticResolver::new()
        .with_host("assets.fanart.tv", &["93.184.216.34".parse().unwrap()])
        .with_host("intranet.local", &["10.0.0.5".parse().unwrap()]);
    DimensionProber::new(Arc::new(GuardedHttpClient::new(host, Arc::new(resolver))))
}

fn candidate(url: &str) -> ImageCandidate {
    ImageCandidate::new(ProviderId::Fanart, ImageType::Thumb, url)
}

#[tokio::test]
async fn test_probes_fill_missing_dimensions_with_ranged_requests() {
    let host = Arc::new(ImageHost::default());
    let mut candidates = vec![
        candidate("https://assets.fanart.tv/1000x1000.png"),
        candidate("https://assets.fanart.tv/640x480.png"),
    ];

    prober(host.clone()).probe_missing(&mut candidates).await;

    assert_eq!((candidates[0].width, candidates[0].height), (1000, 1000));
    assert_eq!((candidates[1].width, candidates[1].height), (640, 480));
    let expected = format!("bytes=0-{}", PROBE_BYTES - 1);
    assert!(host
        .ranges
        .lock()
        .unwrap()
        .iter()
        .all(|r| r.as_deref() == Some(expected.as_str())));
}

#[tokio::test]
async fn test_sized_candidates_are_never_probed() {
    let host = Arc::new(ImageHost::default());
    let mut candidates = vec![
        candidate("https://assets.fanart.tv/300x300.png").with_dimensions(1, 1),
        candidate("https://assets.fanart.tv/300x200.png"),
    ];

    prober(host.clone()).probe_missing(&mut candidates).await;

    assert_eq!((candidates[0].width, candidates[0].height), (1, 1));
    assert_eq!((candidates[1].width, candidates[1].height), (300, 200));
    assert_eq!(
        *host.urls.lock().unwrap(),
        vec!["https://assets.fanart.tv/300x200.png".to_string()]
    );
}

#[tokio::test]
async fn test_failed_probes_leave_zero_dimensions() {
    let host = Arc::new(ImageHost::default());
    let mut candidates = vec![
        candidate("https://assets.fanart.tv/gone.jpg"),
        candidate("https://assets.fanart.tv/reset"),
        candidate("http://intranet.local/500x500.png"),
        candidate("http://127.0.0.1/500x500.png"),
    ];

    prober(host.clone()).probe_missing(&mut candidates).await;

    assert!(candidates.iter().all(ImageCandidate::needs_probe));
    // Blocked targets never reach the transport.
    assert_eq!(host.urls.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_probe_concurrency_is_capped() {
    let host = Arc::new(ImageHost::default());
    let mut candidates: Vec<_> = (1..=12)
        .map(|i| candidate(&format!("https://assets.fanart.tv/{}x{}.png", i * 10, i * 10)))
        .collect();

    prober(host.clone()).probe_missing(&mut candidates).await;

    assert!(host.peak.load(Ordering::SeqCst) <= 5);
    assert_eq!(host.urls.lock().unwrap().len(), 12);
    assert!(candidates.iter().all(|c| c.width > 0));
}

struct UnsizedImages;

impl Provider for UnsizedImages {
    fn id(&self) -> ProviderId {
        ProviderId::Fanart
    }

    fn as_images(&self) -> Option<&dyn ImageProvider> {
        Some(self)
    }
}

#[async_trait]
impl ImageProvider for UnsizedImages {
    fn supported_image_types(&self) -> &[ImageType] {
        &[ImageType::Thumb]
    }

    async fn fetch_images(&self, _artist: &ArtistRef) -> ProviderResult<Vec<ImageCandidate>> {
        Ok(vec![
            candidate("https://assets.fanart.tv/200x200.png"),
            candidate("https://assets.fanart.tv/900x900.png"),
        ])
    }
}

#[tokio::test]
async fn test_orchestrator_probes_before_sorting() {
    let host = Arc::new(ImageHost::default());
    let registry = ProviderRegistry::new().with(Arc::new(UnsizedImages));
    let orchestrator = Orchestrator::new(registry, Arc::new(StaticPriorityStore::default()))
        .with_prober(prober(host));

    let result = orchestrator.fetch_images(&ArtistRef::new("Artist"), None).await;

    assert_eq!(result.images[0].url, "https://assets.fanart.tv/900x900.png");
    assert_eq!(result.images[0].width, 900);
    assert_eq!(result.images[1].width, 200);
}

#[tokio::test]
async fn test_clones_share_one_lookup_budget() {
    let host = Arc::new(ImageHost::default());
    let first = prober(host.clone()).with_concurrency(2);
    let second = first.clone();
    let mut left: Vec<_> = (1..=4)
        .map(|i| candidate(&format!("https://assets.fanart.tv/{}x{}.png", i * 20, i * 20)))
        .collect();
    let mut right = left.clone();

    tokio::join!(first.probe_missing(&mut left), second.probe_missing(&mut right));

    assert!(host.peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(host.urls.lock().unwrap().len(), 8);
    assert!(left.iter().chain(&right).all(|c| c.width > 0));
}

/// Image source answering with `count` unsized thumbs under its own id.
struct ManyThumbs {
    id: ProviderId,
    count: u32,
}

impl Provider for ManyThumbs {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn as_images(&self) -> Option<&dyn ImageProvider> {
        Some(self)
    }
}

#[async_trait]
impl ImageProvider for ManyThumbs {
    fn supported_image_types(&self) -> &[ImageType] {
        &[ImageType::Thumb]
    }

    async fn fetch_images(&self, _artist: &ArtistRef) -> ProviderResult<Vec<ImageCandidate>> {
        Ok((1..=self.count)
            .map(|i| {
                let url = format!("https://assets.fanart.tv/{}x{}.png", i * 50, i * 50);
                ImageCandidate::new(self.id, ImageType::Thumb, url)
            })
            .collect())
    }
}

#[tokio::test]
async fn test_lookup_cap_holds_across_providers_of_one_field() {
    let host = Arc::new(ImageHost::default());
    let ids = [ProviderId::Fanart, ProviderId::AudioDb, ProviderId::Deezer];
    let mut registry = ProviderRegistry::new();
    for id in ids {
        registry.register(Arc::new(ManyThumbs { id, count: 6 }));
    }
    let priorities = StaticPriorityStore::new(vec![FieldPriority::new(Field::Thumb, ids)]);
    let orchestrator =
        Orchestrator::new(registry, Arc::new(priorities)).with_prober(prober(host.clone()));

    let results = orchestrator
        .fetch_field_from_providers(&ArtistRef::new("Artist"), "thumb")
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.has_data));
    assert_eq!(host.urls.lock().unwrap().len(), 18);
    let peak = host.peak.load(Ordering::SeqCst);
    assert!(peak <= DEFAULT_PROBE_CONCURRENCY, "peak {peak} over cap");
}
