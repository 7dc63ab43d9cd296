//! # Provider Orchestrator
//!
//! Fans requests out to every relevant provider at once and reconciles the
//! answers field by field.
//!
//! ## Reconciliation
//!
//! For each metadata field the configured [`FieldPriority`] list is walked in
//! order; the first provider that both advertises the field and returned a
//! non-empty value wins, and a [`FieldSource`] records which one. Arrival
//! order never matters, so identical inputs give identical output.
//!
//! ## Partial failure
//!
//! Every provider call runs under its own timeout. One provider failing or
//! stalling never cancels its siblings; failures come back in `errors`
//! alongside whatever the others produced. `NotFound` is an empty
//! contribution, not a failure.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::compare::compare_albums;
use crate::dimensions::DimensionProber;
use crate::error::{ProviderError, ProviderFailure, ProviderResult, Result};
use crate::images::{sort_candidates, ImageCandidate, ImageType};
use crate::models::{
    ArtistMetadata, ArtistRef, ArtistSearchResult, Field, FieldKind, FieldSource, FieldValue,
    ProviderId,
};
use crate::priority::{dedup_providers, FieldPriority, PriorityStore};
use crate::provider::{ImageProvider, MetadataProvider, ProviderRegistry};

pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(20);

/// Candidates enriched with a discography comparison per linking search.
pub const DEFAULT_LINK_ENRICHMENT_LIMIT: usize = 3;

/// Merged metadata with provenance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchResult {
    pub metadata: ArtistMetadata,
    /// One entry per field with a non-empty merged value
    pub sources: Vec<FieldSource>,
    /// Every provider queried, whatever the outcome
    pub attempted_providers: BTreeSet<ProviderId>,
    pub errors: Vec<ProviderFailure>,
}

impl FetchResult {
    pub fn source_of(&self, field: Field) -> Option<ProviderId> {
        self.sources
            .iter()
            .find(|s| s.field == field)
            .map(|s| s.provider)
    }
}

/// One provider's answer for a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldProviderResult {
    pub provider: ProviderId,
    pub has_data: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FieldProviderResult {
    fn from_value(provider: ProviderId, value: Option<FieldValue>) -> Self {
        let value = value.filter(|v| !v.is_empty());
        Self {
            provider,
            has_data: value.is_some(),
            value,
            error: None,
        }
    }

    fn from_error(provider: ProviderId, error: &ProviderError) -> Self {
        Self {
            provider,
            has_data: false,
            value: None,
            error: (!error.is_not_found()).then(|| error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageFetchResult {
    pub images: Vec<ImageCandidate>,
    pub errors: Vec<ProviderFailure>,
    pub attempted_providers: BTreeSet<ProviderId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub results: Vec<ArtistSearchResult>,
    pub errors: Vec<ProviderFailure>,
    pub attempted_providers: BTreeSet<ProviderId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub provider: ProviderId,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Called when a provider rejects its credentials.
pub type AuthFailureHook = Arc<dyn Fn(ProviderId, &str) + Send + Sync>;

/// Reconciliation engine over a [`ProviderRegistry`].
pub struct Orchestrator {
    registry: ProviderRegistry,
    priorities: Arc<dyn PriorityStore>,
    prober: Option<DimensionProber>,
    provider_timeout: Duration,
    link_enrichment_limit: usize,
    on_auth_failure: Option<AuthFailureHook>,
}

impl Orchestrator {
    pub fn new(registry: ProviderRegistry, priorities: Arc<dyn PriorityStore>) -> Self {
        Self {
            registry,
            priorities,
            prober: None,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
            link_enrichment_limit: DEFAULT_LINK_ENRICHMENT_LIMIT,
            on_auth_failure: None,
        }
    }

    /// Probe image candidates that arrive without dimensions.
    pub fn with_prober(mut self, prober: DimensionProber) -> Self {
        self.prober = Some(prober);
        self
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    pub fn with_link_enrichment_limit(mut self, limit: usize) -> Self {
        self.link_enrichment_limit = limit;
        self
    }

    pub fn with_auth_failure_hook(mut self, hook: AuthFailureHook) -> Self {
        self.on_auth_failure = Some(hook);
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub async fn priorities(&self) -> Result<Vec<FieldPriority>> {
        self.priorities.get_priorities().await
    }

    /// Fetch from every metadata provider named in a priority list and merge.
    ///
    /// Only fails when the priority store cannot be read; provider failures
    /// are reported in [`FetchResult::errors`].
    #[instrument(skip(self, artist), fields(artist = %artist.name))]
    pub async fn fetch_metadata(&self, artist: &ArtistRef) -> Result<FetchResult> {
        let priorities: Vec<FieldPriority> = self
            .priorities
            .get_priorities()
            .await?
            .into_iter()
            .filter(|p| p.field.kind() == FieldKind::Metadata)
            .collect();

        let wanted: Vec<ProviderId> = dedup_providers(
            &priorities
                .iter()
                .flat_map(|p| p.providers.iter().copied())
                .collect::<Vec<_>>(),
        );
        let sources = self.metadata_sources(&wanted);

        let outcomes = join_all(sources.iter().map(|(id, source)| async move {
            let outcome = self
                .call(*id, "fetch_metadata", source.fetch_metadata(artist))
                .await;
            (*id, *source, outcome)
        }))
        .await;

        let mut result = FetchResult {
            attempted_providers: outcomes.iter().map(|(id, _, _)| *id).collect(),
            ..FetchResult::default()
        };
        result.metadata.provider_ids = artist.provider_ids.clone();

        for (id, _, outcome) in &outcomes {
            match outcome {
                Ok(metadata) => merge_identity(&mut result.metadata, metadata),
                Err(e) => {
                    if let Some(failure) = self.record_failure(*id, e) {
                        result.errors.push(failure);
                    }
                }
            }
        }
        if result.metadata.name.is_empty() {
            result.metadata.name = artist.name.clone();
        }

        for priority in &priorities {
            let field = priority.field;
            let winner = priority.unique_providers().into_iter().find_map(|id| {
                outcomes.iter().find_map(|(candidate, source, outcome)| match outcome {
                    Ok(metadata)
                        if *candidate == id
                            && source.supported_fields().contains(&field)
                            && metadata.has_value(field) =>
                    {
                        Some((id, metadata))
                    }
                    _ => None,
                })
            });

            if let Some((provider, metadata)) = winner {
                result.metadata.copy_field(metadata, field);
                result.sources.push(FieldSource { field, provider });
            }
        }

        info!(
            attempted = result.attempted_providers.len(),
            fields = result.sources.len(),
            errors = result.errors.len(),
            "Metadata reconciled"
        );
        Ok(result)
    }

    /// Every provider's answer for one field, unmerged, in priority order.
    ///
    /// `field` is the field's wire name ("biography", "type", "thumb", ...).
    #[instrument(skip(self, artist), fields(artist = %artist.name))]
    pub async fn fetch_field_from_providers(
        &self,
        artist: &ArtistRef,
        field: &str,
    ) -> Result<Vec<FieldProviderResult>> {
        let field: Field = field.parse()?;
        let priorities = self.priorities.get_priorities().await?;
        let wanted = priorities
            .iter()
            .find(|p| p.field == field)
            .map(FieldPriority::unique_providers)
            .unwrap_or_default();

        let results = match field.image_type() {
            None => {
                let sources: Vec<_> = self
                    .metadata_sources(&wanted)
                    .into_iter()
                    .filter(|(_, source)| source.supported_fields().contains(&field))
                    .collect();

                join_all(sources.iter().map(|(id, source)| async move {
                    match self
                        .call(*id, "fetch_metadata", source.fetch_metadata(artist))
                        .await
                    {
                        Ok(metadata) => FieldProviderResult::from_value(*id, metadata.value(field)),
                        Err(e) => {
                            self.record_failure(*id, &e);
                            FieldProviderResult::from_error(*id, &e)
                        }
                    }
                }))
                .await
            }
            Some(image_type) => {
                let sources = self.image_sources(&wanted, Some(image_type));

                join_all(sources.iter().map(|(id, source)| async move {
                    match self
                        .call(*id, "fetch_images", source.fetch_images(artist))
                        .await
                    {
                        Ok(images) => {
                            let mut images: Vec<_> = images
                                .into_iter()
                                .filter(|c| c.image_type == image_type)
                                .collect();
                            self.finish_images(&mut images).await;
                            FieldProviderResult::from_value(*id, Some(FieldValue::Images(images)))
                        }
                        Err(e) => {
                            self.record_failure(*id, &e);
                            FieldProviderResult::from_error(*id, &e)
                        }
                    }
                }))
                .await
            }
        };

        debug!(
            field = %field,
            providers = results.len(),
            with_data = results.iter().filter(|r| r.has_data).count(),
            "Field fetched from providers"
        );
        Ok(results)
    }

    /// All image candidates from every image provider, optionally one type.
    #[instrument(skip(self, artist), fields(artist = %artist.name))]
    pub async fn fetch_images(
        &self,
        artist: &ArtistRef,
        filter: Option<ImageType>,
    ) -> ImageFetchResult {
        let all: Vec<ProviderId> = self.registry.ids();
        let sources = self.image_sources(&all, filter);

        let outcomes = join_all(sources.iter().map(|(id, source)| async move {
            let outcome = self
                .call(*id, "fetch_images", source.fetch_images(artist))
                .await;
            (*id, outcome)
        }))
        .await;

        let mut result = ImageFetchResult {
            attempted_providers: outcomes.iter().map(|(id, _)| *id).collect(),
            ..ImageFetchResult::default()
        };
        for (id, outcome) in outcomes {
            match outcome {
                Ok(images) => result.images.extend(
                    images
                        .into_iter()
                        .filter(|c| filter.map_or(true, |t| c.image_type == t)),
                ),
                Err(e) => {
                    if let Some(failure) = self.record_failure(id, &e) {
                        result.errors.push(failure);
                    }
                }
            }
        }

        self.finish_images(&mut result.images).await;
        info!(
            images = result.images.len(),
            errors = result.errors.len(),
            "Image candidates collected"
        );
        result
    }

    /// Search `subset` (all searchers when empty) and concatenate the hits.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str, subset: &[ProviderId]) -> SearchOutcome {
        let ids = if subset.is_empty() {
            self.registry.ids()
        } else {
            dedup_providers(subset)
        };

        let searchers: Vec<_> = ids
            .into_iter()
            .filter_map(|id| {
                let searcher = self.registry.get(id)?.as_searcher()?;
                Some((id, searcher))
            })
            .collect();

        let outcomes = join_all(searchers.iter().map(|(id, searcher)| async move {
            let outcome = self
                .call(*id, "search_artist", searcher.search_artist(query))
                .await;
            (*id, outcome)
        }))
        .await;

        let mut result = SearchOutcome {
            attempted_providers: outcomes.iter().map(|(id, _)| *id).collect(),
            ..SearchOutcome::default()
        };
        for (id, outcome) in outcomes {
            match outcome {
                Ok(hits) => result.results.extend(hits.into_iter().map(|mut hit| {
                    hit.provider.get_or_insert(id);
                    hit
                })),
                Err(e) => {
                    if let Some(failure) = self.record_failure(id, &e) {
                        result.errors.push(failure);
                    }
                }
            }
        }
        result
    }

    /// [`search`](Self::search), then compare the leading candidates'
    /// discographies against `local_albums`.
    ///
    /// Up to the enrichment limit of candidates are tried; a candidate counts
    /// toward the limit whether or not its album fetch succeeds.
    #[instrument(skip(self, local_albums), fields(local_albums = local_albums.len()))]
    pub async fn search_for_linking(
        &self,
        query: &str,
        subset: &[ProviderId],
        local_albums: &[String],
    ) -> SearchOutcome {
        let mut outcome = self.search(query, subset).await;
        if local_albums.is_empty() || self.link_enrichment_limit == 0 {
            return outcome;
        }

        let picks: Vec<(usize, ProviderId, String)> = outcome
            .results
            .iter()
            .enumerate()
            .filter_map(|(index, hit)| {
                let provider = hit.provider?;
                if hit.id.trim().is_empty() {
                    return None;
                }
                self.registry.get(provider)?.as_discography()?;
                Some((index, provider, hit.id.clone()))
            })
            .take(self.link_enrichment_limit)
            .collect();

        let albums = join_all(picks.iter().map(|(index, provider, artist_id)| async move {
            let fetched = match self.registry.get(*provider).and_then(|p| p.as_discography()) {
                Some(discography) => {
                    self.call(*provider, "fetch_albums", discography.fetch_albums(artist_id))
                        .await
                }
                None => Err(ProviderError::InvalidResponse("discography unavailable".to_string())),
            };
            (*index, *provider, fetched)
        }))
        .await;

        for (index, provider, fetched) in albums {
            match fetched {
                Ok(remote) => {
                    outcome.results[index].album_comparison = Some(compare_albums(local_albums, remote.as_slice()));
                }
                Err(e) => {
                    debug!(provider = %provider, error = %e, "Album comparison skipped");
                }
            }
        }
        outcome
    }

    /// Check every registered provider. Providers without a connection test
    /// report OK.
    #[instrument(skip(self))]
    pub async fn test_connections(&self) -> Vec<ConnectionStatus> {
        join_all(self.registry.iter().map(|provider| async move {
            let id = provider.id();
            let Some(tester) = provider.as_connection_tester() else {
                return ConnectionStatus {
                    provider: id,
                    ok: true,
                    message: None,
                };
            };
            match self.call(id, "test_connection", tester.test_connection()).await {
                Ok(()) => ConnectionStatus {
                    provider: id,
                    ok: true,
                    message: None,
                },
                Err(e) => {
                    self.record_failure(id, &e);
                    ConnectionStatus {
                        provider: id,
                        ok: false,
                        message: Some(e.to_string()),
                    }
                }
            }
        }))
        .await
    }

    fn metadata_sources(&self, ids: &[ProviderId]) -> Vec<(ProviderId, &dyn MetadataProvider)> {
        ids.iter()
            .filter_map(|id| {
                let source = self.registry.get(*id)?.as_metadata()?;
                Some((*id, source))
            })
            .collect()
    }

    fn image_sources(
        &self,
        ids: &[ProviderId],
        image_type: Option<ImageType>,
    ) -> Vec<(ProviderId, &dyn ImageProvider)> {
        ids.iter()
            .filter_map(|id| {
                let source = self.registry.get(*id)?.as_images()?;
                let supported = image_type
                    .map_or(true, |t| source.supported_image_types().contains(&t));
                supported.then_some((*id, source))
            })
            .collect()
    }

    async fn finish_images(&self, images: &mut [ImageCandidate]) {
        if let Some(prober) = &self.prober {
            prober.probe_missing(images).await;
        }
        sort_candidates(images);
    }

    async fn call<T, F>(&self, provider: ProviderId, operation: &'static str, call: F) -> ProviderResult<T>
    where
        F: Future<Output = ProviderResult<T>>,
    {
        match tokio::time::timeout(self.provider_timeout, call).await {
            Ok(outcome) => outcome,
            Err(_) => {
                debug!(provider = %provider, operation, "Provider call timed out");
                Err(ProviderError::Timeout(self.provider_timeout))
            }
        }
    }

    /// Log a provider error; `None` for `NotFound`, which is not a failure.
    fn record_failure(&self, provider: ProviderId, error: &ProviderError) -> Option<ProviderFailure> {
        match error {
            ProviderError::NotFound(_) => {
                debug!(provider = %provider, "Provider has no record");
                None
            }
            ProviderError::Auth(message) => {
                warn!(provider = %provider, auth_failure = true, error = %error, "Provider rejected credentials");
                if let Some(hook) = &self.on_auth_failure {
                    hook(provider, message);
                }
                Some(ProviderFailure::new(provider, error))
            }
            _ => {
                warn!(provider = %provider, error = %error, "Provider call failed");
                Some(ProviderFailure::new(provider, error))
            }
        }
    }
}

/// Identity fields, ids and links. The first provider to supply one keeps it.
fn merge_identity(merged: &mut ArtistMetadata, from: &ArtistMetadata) {
    for (target, value) in [
        (&mut merged.name, &from.name),
        (&mut merged.sort_name, &from.sort_name),
        (&mut merged.disambiguation, &from.disambiguation),
    ] {
        if target.trim().is_empty() && !value.trim().is_empty() {
            *target = value.clone();
        }
    }
    for (provider, id) in &from.provider_ids {
        if !id.trim().is_empty() {
            merged.provider_ids.entry(*provider).or_insert_with(|| id.clone());
        }
    }
    for (label, url) in &from.urls {
        if !url.trim().is_empty() {
            merged.urls.entry(label.clone()).or_insert_with(|| url.clone());
        }
    }
}
