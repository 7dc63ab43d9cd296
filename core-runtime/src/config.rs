//! # Core Configuration Module
//!
//! Builder-based configuration for the artist metadata core.
//!
//! ## Dependencies
//!
//! All bridges are optional at this layer. When one is missing, `core-service`
//! falls back to the desktop default (with the `desktop-shims` feature) or
//! fails fast with [`Error::CapabilityMissing`]:
//!
//! - `HttpClient` - transport for provider APIs and image fetches (desktop: guarded reqwest)
//! - `HostResolver` - DNS for the outbound fetch guard (desktop: system resolver)
//! - `SettingsStore` - provider priority persistence (desktop: SQLite at `settings_path`)
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::{CoreConfig, MetadataApiConfig};
//! use std::time::Duration;
//!
//! let config = CoreConfig::builder()
//!     .settings_path("/tmp/artist-meta/settings.db")
//!     .metadata_api_config(
//!         MetadataApiConfig::new()
//!             .with_musicbrainz_user_agent("ArtistMeta/0.1 (ops@example.com)")
//!             .with_fanart_api_key("key"),
//!     )
//!     .provider_timeout(Duration::from_secs(15))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.orchestration.probe_concurrency, 5);
//! ```

use crate::error::{Error, Result};
use bridge_traits::{HostResolver, HttpClient, SettingsStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Image payloads above this size are refused.
pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 25 * 1024 * 1024;

/// Core configuration. Construct with [`CoreConfig::builder`].
#[derive(Clone)]
pub struct CoreConfig {
    /// SQLite file for the default settings store
    pub settings_path: PathBuf,

    pub http_client: Option<Arc<dyn HttpClient>>,

    pub host_resolver: Option<Arc<dyn HostResolver>>,

    pub settings_store: Option<Arc<dyn SettingsStore>>,

    /// External metadata API credentials
    pub metadata_api_config: MetadataApiConfig,

    /// Timeouts and concurrency limits for provider fan-out
    pub orchestration: OrchestrationConfig,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("settings_path", &self.settings_path)
            .field(
                "http_client",
                &self.http_client.as_ref().map(|_| "HttpClient { ... }"),
            )
            .field(
                "host_resolver",
                &self.host_resolver.as_ref().map(|_| "HostResolver { ... }"),
            )
            .field(
                "settings_store",
                &self.settings_store.as_ref().map(|_| "SettingsStore { ... }"),
            )
            .field("metadata_api_config", &self.metadata_api_config)
            .field("orchestration", &self.orchestration)
            .finish()
    }
}

/// Credentials and etiquette for external metadata APIs.
///
/// API keys are never logged; `Debug` masks them.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct MetadataApiConfig {
    /// MusicBrainz user agent ("AppName/Version (Contact)"); MusicBrainz
    /// rejects anonymous clients.
    pub musicbrainz_user_agent: Option<String>,

    /// Last.fm API key; the Last.fm provider is not registered without it.
    pub lastfm_api_key: Option<String>,

    /// Fanart.tv project key; the Fanart.tv provider is not registered without it.
    pub fanart_api_key: Option<String>,

    /// Minimum delay between requests to the same provider.
    pub rate_limit_delay_ms: u64,
}

impl std::fmt::Debug for MetadataApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |key: &Option<String>| key.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("MetadataApiConfig")
            .field("musicbrainz_user_agent", &self.musicbrainz_user_agent)
            .field("lastfm_api_key", &mask(&self.lastfm_api_key))
            .field("fanart_api_key", &mask(&self.fanart_api_key))
            .field("rate_limit_delay_ms", &self.rate_limit_delay_ms)
            .finish()
    }
}

impl MetadataApiConfig {
    pub fn new() -> Self {
        Self {
            rate_limit_delay_ms: 1000,
            ..Self::default()
        }
    }

    pub fn with_musicbrainz_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.musicbrainz_user_agent = Some(user_agent.into());
        self
    }

    pub fn with_lastfm_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.lastfm_api_key = Some(api_key.into());
        self
    }

    pub fn with_fanart_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.fanart_api_key = Some(api_key.into());
        self
    }

    pub fn with_rate_limit_delay_ms(mut self, delay_ms: u64) -> Self {
        self.rate_limit_delay_ms = delay_ms;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(ref ua) = self.musicbrainz_user_agent {
            if ua.trim().is_empty() {
                return Err(Error::Config(
                    "MusicBrainz user agent cannot be empty".to_string(),
                ));
            }
            if !ua.contains('/') || !ua.contains('(') || !ua.contains(')') {
                return Err(Error::Config(
                    "MusicBrainz user agent must follow format: 'AppName/Version (Contact)'"
                        .to_string(),
                ));
            }
        }

        for (name, key) in [
            ("Last.fm", &self.lastfm_api_key),
            ("Fanart.tv", &self.fanart_api_key),
        ] {
            if key.as_ref().is_some_and(|k| k.trim().is_empty()) {
                return Err(Error::Config(format!("{} API key cannot be empty", name)));
            }
        }

        if self.rate_limit_delay_ms > 60_000 {
            return Err(Error::Config(
                "Rate limit delay exceeds maximum of 60 seconds (60,000ms)".to_string(),
            ));
        }

        Ok(())
    }

    pub fn has_musicbrainz(&self) -> bool {
        self.musicbrainz_user_agent.is_some()
    }

    pub fn has_lastfm(&self) -> bool {
        self.lastfm_api_key.is_some()
    }

    pub fn has_fanart(&self) -> bool {
        self.fanart_api_key.is_some()
    }

    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_millis(self.rate_limit_delay_ms)
    }
}

/// Limits applied by the orchestrator, prober and library operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestrationConfig {
    /// Upper bound for one provider call
    pub provider_timeout: Duration,
    /// Upper bound for one outbound image fetch or probe
    pub fetch_timeout: Duration,
    /// Concurrent dimension probes per `fetch_images` call
    pub probe_concurrency: usize,
    /// Search candidates enriched with an album comparison
    pub link_enrichment_limit: usize,
    /// Largest accepted image payload
    pub max_image_bytes: u64,
    /// Artists refreshed concurrently during a scan
    pub scan_concurrency: usize,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_secs(20),
            fetch_timeout: Duration::from_secs(15),
            probe_concurrency: 5,
            link_enrichment_limit: 3,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            scan_concurrency: 4,
        }
    }
}

impl OrchestrationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.provider_timeout.is_zero() || self.fetch_timeout.is_zero() {
            return Err(Error::Config("Timeouts must be greater than zero".to_string()));
        }
        if self.probe_concurrency == 0 || self.scan_concurrency == 0 {
            return Err(Error::Config(
                "Concurrency limits must be at least 1".to_string(),
            ));
        }
        if self.max_image_bytes == 0 {
            return Err(Error::Config(
                "Maximum image size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.settings_store.is_none() && self.settings_path.as_os_str().is_empty() {
            return Err(Error::Config(
                "Either a SettingsStore or a settings path is required".to_string(),
            ));
        }
        self.metadata_api_config.validate()?;
        self.orchestration.validate()
    }
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    settings_path: Option<PathBuf>,
    http_client: Option<Arc<dyn HttpClient>>,
    host_resolver: Option<Arc<dyn HostResolver>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    metadata_api_config: Option<MetadataApiConfig>,
    orchestration: OrchestrationConfig,
}

impl CoreConfigBuilder {
    pub fn settings_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.settings_path = Some(path.into());
        self
    }

    /// Transport for all outbound requests. It is always wrapped by the
    /// outbound fetch guard before use.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn host_resolver(mut self, resolver: Arc<dyn HostResolver>) -> Self {
        self.host_resolver = Some(resolver);
        self
    }

    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    pub fn metadata_api_config(mut self, config: MetadataApiConfig) -> Self {
        self.metadata_api_config = Some(config);
        self
    }

    pub fn orchestration(mut self, config: OrchestrationConfig) -> Self {
        self.orchestration = config;
        self
    }

    pub fn provider_timeout(mut self, timeout: Duration) -> Self {
        self.orchestration.provider_timeout = timeout;
        self
    }

    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.orchestration.fetch_timeout = timeout;
        self
    }

    pub fn scan_concurrency(mut self, concurrency: usize) -> Self {
        self.orchestration.scan_concurrency = concurrency;
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<CoreConfig> {
        let config = CoreConfig {
            settings_path: self.settings_path.unwrap_or_default(),
            http_client: self.http_client,
            host_resolver: self.host_resolver,
            settings_store: self.settings_store,
            metadata_api_config: self.metadata_api_config.unwrap_or_else(MetadataApiConfig::new),
            orchestration: self.orchestration,
        };
        config.validate()?;
        Ok(config)
    }
}
