//! Ordered aggregation of candidates and user-visible errors, with
//! deduplication and the proximity filter.

use super::types::ResolverError;
use crate::candidate::LocationCandidate;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Description key for the distance-to-primary note.
const DISTANCE_KEY: &str = "distance-from-primary";

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResultItem {
    Location(LocationCandidate),
    Error(ResolverError),
}

impl ResultItem {
    pub fn as_location(&self) -> Option<&LocationCandidate> {
        match self {
            Self::Location(c) => Some(c),
            Self::Error(_) => None,
        }
    }
}

impl From<LocationCandidate> for ResultItem {
    fn from(c: LocationCandidate) -> Self {
        Self::Location(c)
    }
}

impl From<ResolverError> for ResultItem {
    fn from(e: ResolverError) -> Self {
        Self::Error(e)
    }
}

/// Insertion-ordered results. The primary is the first location.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResultCollection {
    items: Vec<ResultItem>,
}

impl ResultCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, item: impl Into<ResultItem>) {
        self.items.push(item.into());
    }

    pub fn extend_locations(&mut self, candidates: impl IntoIterator<Item = LocationCandidate>) {
        self.items.extend(candidates.into_iter().map(ResultItem::Location));
    }

    /// Append everything from `other`, keeping its order after ours.
    pub fn merge(&mut self, other: ResultCollection) {
        self.items.extend(other.items);
    }

    pub fn items(&self) -> &[ResultItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn locations(&self) -> impl Iterator<Item = &LocationCandidate> {
        self.items.iter().filter_map(ResultItem::as_location)
    }

    pub fn location_count(&self) -> usize {
        self.locations().count()
    }

    pub fn errors(&self) -> impl Iterator<Item = &ResolverError> {
        self.items.iter().filter_map(|i| match i {
            ResultItem::Error(e) => Some(e),
            ResultItem::Location(_) => None,
        })
    }

    pub fn primary(&self) -> Option<&LocationCandidate> {
        self.locations().next()
    }

    /// Collapse candidates sharing a canonical key onto the first one.
    ///
    /// The first pass counts each key; the second keeps the first occurrence,
    /// drops the rest, and marks a kept candidate of a group of N > 1 with
    /// `"(Nx)"`. Singletons are left alone, which makes a second call a no-op.
    pub fn deduplicate(&mut self) {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for c in self.locations() {
            *counts.entry(c.canonical_key()).or_insert(0) += 1;
        }
        if counts.values().all(|&n| n == 1) {
            return;
        }

        let before = self.items.len();
        let mut seen: HashSet<String> = HashSet::with_capacity(counts.len());
        self.items.retain_mut(|item| {
            let ResultItem::Location(c) = item else {
                return true;
            };
            let key = c.canonical_key();
            if !seen.insert(key.clone()) {
                return false;
            }
            let n = counts.get(&key).copied().unwrap_or(1);
            if n > 1 {
                c.set_coord_suffix(format!("({}x)", n));
            }
            true
        });
        tracing::debug!(dropped = before - self.items.len(), "deduplicated");
    }

    /// Drop candidates closer than `threshold_m` to the primary and annotate
    /// the survivors with their distance from it.
    pub fn filter_too_close(&mut self, threshold_m: f64) {
        let Some(primary) = self.primary() else {
            return;
        };
        let origin = *primary.coordinate();
        let origin_resolver = primary.resolver();

        let mut seen_primary = false;
        self.items.retain_mut(|item| {
            let ResultItem::Location(c) = item else {
                return true;
            };
            if !seen_primary {
                seen_primary = true;
                return true;
            }
            let distance = origin.distance_to(c.coordinate());
            if distance < threshold_m {
                tracing::debug!(key = %c.canonical_key(), distance, "too close to primary");
                return false;
            }
            c.add_description(
                format!(
                    "Location is {} meters away from {}.",
                    format_meters(distance),
                    origin_resolver
                ),
                Some(DISTANCE_KEY),
            );
            true
        });
    }
}

/// Whole meters with thousands separators: `12,345`.
fn format_meters(distance: f64) -> String {
    let digits = format!("{:.0}", distance.max(0.0));
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
