//! # Artist Metadata Reconciliation
//!
//! Aggregates artist metadata from independent, unreliable providers and
//! merges it into one record with per-field provenance.
//!
//! ## Overview
//!
//! This module handles:
//! - Provider capability traits and the [`ProviderRegistry`]
//! - Per-field provider priorities ([`PriorityStore`])
//! - Concurrent fan-out with per-provider timeouts and partial-failure results
//!   ([`Orchestrator`])
//! - Image candidate aggregation with dimension probing ([`DimensionProber`])
//! - Reference providers: MusicBrainz, Last.fm, Fanart.tv
//!
//! ## Example
//!
//! ```ignore
//! let orchestrator = Orchestrator::new(registry, Arc::new(StaticPriorityStore::default()));
//! let result = orchestrator.fetch_metadata(&ArtistRef::new("Björk")).await?;
//! for source in &result.sources {
//!     println!("{} from {}", source.field, source.provider);
//! }
//! ```

pub mod compare;
pub mod dimensions;
pub mod error;
pub mod images;
pub mod models;
pub mod orchestrator;
pub mod priority;
pub mod provider;
pub mod providers;

pub use dimensions::DimensionProber;
pub use error::{
    FailureKind, MetadataError, ProbeError, ProviderError, ProviderFailure, ProviderResult, Result,
};
pub use images::{sort_candidates, ImageCandidate, ImageType};
pub use models::{
    AlbumComparison, ArtistMetadata, ArtistRef, ArtistSearchResult, Field, FieldKind, FieldSource,
    FieldValue, ProviderId,
};
pub use orchestrator::{
    AuthFailureHook, ConnectionStatus, FetchResult, FieldProviderResult, ImageFetchResult,
    Orchestrator, SearchOutcome,
};
pub use priority::{
    default_priorities, FieldPriority, PriorityStore, SettingsPriorityStore, StaticPriorityStore,
};
pub use provider::{
    ArtistSearcher, ConnectionTester, DiscographyProvider, ImageProvider, MetadataProvider,
    Provider, ProviderRegistry,
};
