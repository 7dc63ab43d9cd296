//! Applying reconciled results to stored artist records.
//!
//! An empty merged value never overwrites a stored one: only fields with a
//! [`FieldSource`](core_metadata::FieldSource) are touched. A value equal to
//! the stored one under [`core_metadata::compare`] is not a change.

use core_library::ArtistRecord;
use core_metadata::compare::{slices_equal, text_equal};
use core_metadata::{ArtistRef, FetchResult, Field, FieldValue, ImageFetchResult, ImageType, ProviderId};

/// Identity handed to providers for a stored record.
///
/// Provider id keys that are not known providers are dropped.
pub fn artist_ref(record: &ArtistRecord) -> ArtistRef {
    record
        .provider_ids
        .iter()
        .filter_map(|(key, id)| key.parse::<ProviderId>().ok().map(|p| (p, id)))
        .fold(ArtistRef::new(record.name.clone()), |artist, (provider, id)| {
            artist.with_id(provider, id.clone())
        })
}

/// Copy sourced fields of `result` into `record`.
///
/// Returns the names of the fields that changed. Timestamps are left to the
/// caller.
pub fn apply_metadata(record: &mut ArtistRecord, result: &FetchResult) -> Vec<String> {
    let mut updated = Vec::new();

    for source in &result.sources {
        let Some(value) = result.metadata.value(source.field) else {
            continue;
        };
        if set_field(record, source.field, value) {
            record
                .field_sources
                .insert(source.field.as_str().to_string(), source.provider.as_str().to_string());
            updated.push(source.field.as_str().to_string());
        }
    }

    let merged = &result.metadata;
    if record.sort_name.trim().is_empty() && !merged.sort_name.trim().is_empty() {
        record.sort_name = merged.sort_name.trim().to_string();
        updated.push("sort_name".to_string());
    }
    if record.disambiguation.trim().is_empty() && !merged.disambiguation.trim().is_empty() {
        record.disambiguation = merged.disambiguation.trim().to_string();
        updated.push("disambiguation".to_string());
    }

    // Known ids are kept; new ones are added.
    let mut ids_added = false;
    for (provider, id) in &merged.provider_ids {
        if record.provider_id(provider.as_str()).is_none() && !id.trim().is_empty() {
            record
                .provider_ids
                .insert(provider.as_str().to_string(), id.trim().to_string());
            ids_added = true;
        }
    }
    if ids_added {
        updated.push("provider_ids".to_string());
    }

    updated
}

/// Fill empty image slots with the best candidate of each type.
///
/// `images` must already be ranked (the orchestrator sorts them).
pub fn apply_images(record: &mut ArtistRecord, images: &ImageFetchResult) -> Vec<String> {
    let mut updated = Vec::new();
    for image_type in ImageType::ALL {
        let Some(best) = images.images.iter().find(|c| c.image_type == image_type) else {
            continue;
        };
        let slot = image_slot(record, image_type);
        if !slot.trim().is_empty() {
            continue;
        }
        *slot = best.url.clone();
        record
            .field_sources
            .insert(image_type.as_str().to_string(), best.provider.as_str().to_string());
        updated.push(image_type.as_str().to_string());
    }
    updated
}

fn set_field(record: &mut ArtistRecord, field: Field, value: FieldValue) -> bool {
    match value {
        FieldValue::Text(new) => {
            let Some(slot) = text_slot(record, field) else {
                return false;
            };
            if text_equal(slot, &new) {
                return false;
            }
            *slot = new.trim().to_string();
            true
        }
        FieldValue::List(new) => {
            let Some(slot) = list_slot(record, field) else {
                return false;
            };
            if slices_equal(slot.as_slice(), new.as_slice()) {
                return false;
            }
            *slot = new
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            true
        }
        FieldValue::Members(new) => {
            if record.members == new {
                return false;
            }
            record.members = new;
            true
        }
        FieldValue::Images(_) => false,
    }
}

fn text_slot(record: &mut ArtistRecord, field: Field) -> Option<&mut String> {
    match field {
        Field::Biography => Some(&mut record.biography),
        Field::Born => Some(&mut record.born),
        Field::Formed => Some(&mut record.formed),
        Field::Died => Some(&mut record.died),
        Field::Disbanded => Some(&mut record.disbanded),
        Field::YearsActive => Some(&mut record.years_active),
        Field::Type => Some(&mut record.artist_type),
        Field::Gender => Some(&mut record.gender),
        _ => None,
    }
}

fn list_slot(record: &mut ArtistRecord, field: Field) -> Option<&mut Vec<String>> {
    match field {
        Field::Genres => Some(&mut record.genres),
        Field::Styles => Some(&mut record.styles),
        Field::Moods => Some(&mut record.moods),
        _ => None,
    }
}

fn image_slot(record: &mut ArtistRecord, image_type: ImageType) -> &mut String {
    match image_type {
        ImageType::Thumb => &mut record.thumb_url,
        ImageType::Fanart => &mut record.fanart_url,
        ImageType::Logo => &mut record.logo_url,
        ImageType::Banner => &mut record.banner_url,
    }
}
