//! The canonical output entity.
//!
//! A [`LocationCandidate`] is created by exactly one resolver, annotated by it,
//! and later annotated again by aggregation (dedup suffix, distance notes).
//! Address, timezone and elevation are fetched lazily by presentation code and
//! memoized on the candidate.

use crate::geo::{format_coords, Coordinate};
use crate::providers::{ElevationProvider, Enrichers, ProviderError, ReverseGeocoder, TimezoneInfo, TimezoneLookup};
use serde::{Serialize, Serializer};
use std::sync::Mutex;
use url::Url;

/// A sub-type a resolver can attach to its candidates ("place", "map
/// center", ...). Each resolver declares an enum implementing this; `TAGS`
/// lists every tag the enum can produce.
pub trait SourceVariant: Copy {
    const TAGS: &'static [&'static str];

    fn tag(self) -> &'static str;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Description {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub text: String,
}

/// Fetch-once slot. The lock is held across the fetch so two concurrent
/// callers never hit the collaborator twice; failures are not cached.
pub struct Memo<T>(Mutex<Option<T>>);

impl<T> Default for Memo<T> {
    fn default() -> Self {
        Self(Mutex::new(None))
    }
}

impl<T: Clone> Memo<T> {
    fn get_or_try_fill<F>(&self, fetch: F) -> Result<T, ProviderError>
    where
        F: FnOnce() -> Result<T, ProviderError>,
    {
        let mut slot = self.0.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(v) = slot.as_ref() {
            return Ok(v.clone());
        }
        let v = fetch()?;
        *slot = Some(v.clone());
        Ok(v)
    }

    pub fn cached(&self) -> Option<T> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl<T: Clone> Clone for Memo<T> {
    fn clone(&self) -> Self {
        Self(Mutex::new(self.cached()))
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Memo<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = self.0.lock().unwrap_or_else(|e| e.into_inner());
        f.debug_tuple("Memo").field(&*slot).finish()
    }
}

impl<T: Serialize> Serialize for Memo<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let slot = self.0.lock().unwrap_or_else(|e| e.into_inner());
        slot.serialize(serializer)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationCandidate {
    coordinate: Coordinate,
    resolver: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    variant: Option<&'static str>,
    raw_input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_url: Option<String>,
    prefix: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    coord_suffix: Option<String>,
    descriptions: Vec<Description>,
    address: Memo<String>,
    timezone: Memo<TimezoneInfo>,
    elevation: Memo<f64>,
}

impl LocationCandidate {
    /// A bare candidate; the prefix defaults to the resolver id.
    pub fn new(resolver: &'static str, coordinate: Coordinate, raw_input: impl Into<String>) -> Self {
        Self {
            coordinate,
            resolver,
            variant: None,
            raw_input: raw_input.into(),
            source_url: None,
            prefix: resolver.to_string(),
            inline_label: None,
            coord_suffix: None,
            descriptions: Vec::new(),
            address: Memo::default(),
            timezone: Memo::default(),
            elevation: Memo::default(),
        }
    }

    pub fn with_variant<V: SourceVariant>(mut self, variant: V) -> Self {
        self.variant = Some(variant.tag());
        self
    }

    /// Store the source link. Parsing through `Url` lowercases scheme and host.
    pub fn with_source_url(mut self, url: &Url) -> Self {
        self.source_url = Some(url.to_string());
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_inline_label(mut self, label: impl Into<String>) -> Self {
        self.inline_label = Some(label.into());
        self
    }

    pub fn coordinate(&self) -> &Coordinate {
        &self.coordinate
    }

    pub fn canonical_key(&self) -> String {
        self.coordinate.canonical_key()
    }

    pub fn resolver(&self) -> &'static str {
        self.resolver
    }

    pub fn variant(&self) -> Option<&'static str> {
        self.variant
    }

    pub fn raw_input(&self) -> &str {
        &self.raw_input
    }

    pub fn source_url(&self) -> Option<&str> {
        self.source_url.as_deref()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn inline_label(&self) -> Option<&str> {
        self.inline_label.as_deref()
    }

    pub fn coord_suffix(&self) -> Option<&str> {
        self.coord_suffix.as_deref()
    }

    pub(crate) fn set_coord_suffix(&mut self, suffix: impl Into<String>) {
        self.coord_suffix = Some(suffix.into());
    }

    pub fn descriptions(&self) -> &[Description] {
        &self.descriptions
    }

    /// Append a description. When `key` is already present the call is a
    /// no-op and returns false.
    pub fn add_description(&mut self, text: impl Into<String>, key: Option<&str>) -> bool {
        if let Some(k) = key {
            if self.descriptions.iter().any(|d| d.key.as_deref() == Some(k)) {
                return false;
            }
        }
        self.descriptions.push(Description {
            key: key.map(str::to_string),
            text: text.into(),
        });
        true
    }

    pub fn address(&self, geocoder: &dyn ReverseGeocoder) -> Result<String, ProviderError> {
        let c = self.coordinate;
        self.address.get_or_try_fill(|| geocoder.reverse(c.lat(), c.lon()))
    }

    pub fn timezone(&self, lookup: &dyn TimezoneLookup) -> Result<TimezoneInfo, ProviderError> {
        let c = self.coordinate;
        self.timezone.get_or_try_fill(|| lookup.lookup(c.lat(), c.lon()))
    }

    pub fn elevation(&self, provider: &dyn ElevationProvider) -> Result<f64, ProviderError> {
        let c = self.coordinate;
        self.elevation.get_or_try_fill(|| provider.fill(&c))
    }

    /// Fetch all three lazy fields. Failures are logged and leave the field empty.
    pub fn enrich(&self, enrichers: &Enrichers) {
        if let Err(e) = self.address(enrichers.geocoder.as_ref()) {
            tracing::debug!(key = %self.canonical_key(), error = %e, "address lookup failed");
        }
        if let Err(e) = self.timezone(enrichers.timezone.as_ref()) {
            tracing::debug!(key = %self.canonical_key(), error = %e, "timezone lookup failed");
        }
        if let Err(e) = self.elevation(enrichers.elevation.as_ref()) {
            tracing::debug!(key = %self.canonical_key(), error = %e, "elevation lookup failed");
        }
    }

    /// Prefix with a back-link to the source when there is one.
    pub fn prefix_link(&self) -> String {
        match &self.source_url {
            Some(url) => format!("[{}]({})", self.prefix, url),
            None => self.prefix.clone(),
        }
    }

    /// Multi-line presentation block.
    pub fn render(&self) -> String {
        let mut out = self.prefix_link();
        if let Some(label) = &self.inline_label {
            out.push_str(&format!(" ({})", label));
        }
        out.push_str(&format!(": `{}`", self.coordinate));
        if let Some(suffix) = &self.coord_suffix {
            out.push(' ');
            out.push_str(suffix);
        }
        out.push_str(&format!(
            "\n  \u{1F4D0} {}",
            format_coords(self.coordinate.lat(), self.coordinate.lon())
        ));
        if let Some(address) = self.address.cached() {
            out.push_str(&format!("\n  \u{1F4CD} {}", address));
        }
        if let Some(tz) = self.timezone.cached() {
            out.push_str(&format!("\n  \u{1F552} {} ({})", tz.name, tz.offset_label()));
        }
        if let Some(elevation) = self.elevation.cached() {
            out.push_str(&format!("\n  \u{26F0} {:.0} m", elevation));
        }
        for d in &self.descriptions {
            out.push_str(&format!("\n  {}", d.text));
        }
        out
    }
}
