//! Value comparison used for change detection and album overlap.
//!
//! List values compare as multisets of trimmed, lowercased, non-empty
//! entries, so `["Rock", " pop"]` equals `["POP", "rock", ""]`.

use std::collections::{BTreeMap, HashSet};

use crate::models::AlbumComparison;

/// Trim and lowercase.
pub fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

pub fn text_equal(a: &str, b: &str) -> bool {
    a.trim() == b.trim()
}

/// Order-independent, case-insensitive multiset comparison.
pub fn slices_equal<S: AsRef<str>>(a: &[S], b: &[S]) -> bool {
    counts(a) == counts(b)
}

fn counts<S: AsRef<str>>(items: &[S]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for item in items {
        let key = normalize(item.as_ref());
        if !key.is_empty() {
            *counts.entry(key).or_insert(0) += 1;
        }
    }
    counts
}

/// Overlap of `local` album titles with a provider's `remote` discography.
pub fn compare_albums<L: AsRef<str>, R: AsRef<str>>(local: &[L], remote: &[R]) -> AlbumComparison {
    let remote_set: HashSet<String> = remote
        .iter()
        .map(|t| normalize(t.as_ref()))
        .filter(|t| !t.is_empty())
        .collect();

    let mut seen = HashSet::new();
    let local: Vec<&str> = local
        .iter()
        .map(AsRef::as_ref)
        .filter(|t| {
            let key = normalize(t);
            !key.is_empty() && seen.insert(key)
        })
        .collect();

    let matched: Vec<String> = local
        .iter()
        .filter(|t| remote_set.contains(&normalize(t)))
        .map(|t| t.trim().to_string())
        .collect();

    let match_ratio = if local.is_empty() {
        0.0
    } else {
        matched.len() as f64 / local.len() as f64
    };

    AlbumComparison {
        local_count: local.len(),
        remote_count: remote_set.len(),
        matched,
        match_ratio,
    }
}
