//! Per-field provider priority lists.
//!
//! Stored as JSON under [`PRIORITY_SETTINGS_KEY`]. Writes are validated and
//! deduplicated; reads deduplicate again and fall back to
//! [`default_priorities`] for any field the stored value does not mention.

use async_trait::async_trait;
use bridge_traits::storage::SettingsStore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{MetadataError, Result};
use crate::models::{Field, ProviderId};

pub const PRIORITY_SETTINGS_KEY: &str = "provider_priorities";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPriority {
    pub field: Field,
    pub providers: Vec<ProviderId>,
}

impl FieldPriority {
    pub fn new(field: Field, providers: impl IntoIterator<Item = ProviderId>) -> Self {
        Self {
            field,
            providers: providers.into_iter().collect(),
        }
    }

    /// Providers with duplicates removed, first occurrence kept.
    pub fn unique_providers(&self) -> Vec<ProviderId> {
        dedup_providers(&self.providers)
    }
}

pub fn dedup_providers(providers: &[ProviderId]) -> Vec<ProviderId> {
    let mut seen = HashSet::new();
    providers
        .iter()
        .copied()
        .filter(|id| seen.insert(*id))
        .collect()
}

#[async_trait]
pub trait PriorityStore: Send + Sync {
    async fn get_priorities(&self) -> Result<Vec<FieldPriority>>;
}

/// Fixed priorities, for tests and embedders without settings.
#[derive(Debug, Clone)]
pub struct StaticPriorityStore {
    priorities: Vec<FieldPriority>,
}

impl StaticPriorityStore {
    pub fn new(priorities: Vec<FieldPriority>) -> Self {
        Self { priorities }
    }
}

impl Default for StaticPriorityStore {
    fn default() -> Self {
        Self::new(default_priorities())
    }
}

#[async_trait]
impl PriorityStore for StaticPriorityStore {
    async fn get_priorities(&self) -> Result<Vec<FieldPriority>> {
        Ok(self.priorities.clone())
    }
}

/// Priorities persisted through the host [`SettingsStore`].
pub struct SettingsPriorityStore {
    store: Arc<dyn SettingsStore>,
}

impl SettingsPriorityStore {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }

    /// Validate and persist priorities.
    ///
    /// Rejects a field listed twice and providers incompatible with a
    /// field's kind. Duplicate providers within a list are dropped.
    pub async fn save_priorities(&self, priorities: &[FieldPriority]) -> Result<()> {
        let normalized = validate_priorities(priorities)?;
        let json = serde_json::to_string(&normalized)?;
        self.store.set_string(PRIORITY_SETTINGS_KEY, &json).await?;
        debug!(fields = normalized.len(), "Saved provider priorities");
        Ok(())
    }

    pub async fn reset(&self) -> Result<()> {
        self.store.delete(PRIORITY_SETTINGS_KEY).await?;
        Ok(())
    }
}

#[async_trait]
impl PriorityStore for SettingsPriorityStore {
    async fn get_priorities(&self) -> Result<Vec<FieldPriority>> {
        let Some(raw) = self.store.get_string(PRIORITY_SETTINGS_KEY).await? else {
            return Ok(default_priorities());
        };

        let stored: Vec<FieldPriority> = match serde_json::from_str(&raw) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Stored provider priorities are unreadable, using defaults");
                return Ok(default_priorities());
            }
        };

        Ok(default_priorities()
            .into_iter()
            .map(|default| {
                match stored.iter().find(|p| p.field == default.field) {
                    Some(saved) => FieldPriority::new(
                        saved.field,
                        saved
                            .unique_providers()
                            .into_iter()
                            .filter(|id| id.supports_kind(saved.field.kind())),
                    ),
                    None => default,
                }
            })
            .collect())
    }
}

fn validate_priorities(priorities: &[FieldPriority]) -> Result<Vec<FieldPriority>> {
    let mut seen_fields = HashSet::new();
    let mut normalized = Vec::with_capacity(priorities.len());

    for priority in priorities {
        if !seen_fields.insert(priority.field) {
            return Err(MetadataError::InvalidPriority(format!(
                "field '{}' listed more than once",
                priority.field
            )));
        }
        let kind = priority.field.kind();
        if let Some(bad) = priority.providers.iter().find(|id| !id.supports_kind(kind)) {
            return Err(MetadataError::InvalidPriority(format!(
                "provider '{}' cannot supply field '{}'",
                bad, priority.field
            )));
        }
        normalized.push(FieldPriority::new(priority.field, priority.unique_providers()));
    }

    Ok(normalized)
}

/// Priorities used until the user saves their own.
pub fn default_priorities() -> Vec<FieldPriority> {
    use ProviderId::*;

    let text = [MusicBrainz, Discogs, AudioDb, Wikidata, LastFm];
    let dates = [MusicBrainz, Wikidata, Discogs, AudioDb];
    let images = [Fanart, AudioDb, Deezer, Spotify, Discogs];

    Field::ALL
        .into_iter()
        .map(|field| match field {
            Field::Biography => FieldPriority::new(field, [LastFm, AudioDb, Discogs, Wikidata]),
            Field::Genres | Field::Styles => FieldPriority::new(field, [MusicBrainz, LastFm, Discogs, AudioDb]),
            Field::Moods => FieldPriority::new(field, [AudioDb, LastFm]),
            Field::Born | Field::Formed | Field::Died | Field::Disbanded | Field::YearsActive => {
                FieldPriority::new(field, dates)
            }
            Field::Type | Field::Gender | Field::Members => FieldPriority::new(field, text),
            Field::Thumb | Field::Fanart | Field::Logo | Field::Banner => {
                FieldPriority::new(field, images)
            }
        })
        .collect()
}
