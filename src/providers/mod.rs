//! External collaborators consumed by the pipeline.
//!
//! The core only talks to these traits. `http` holds the network-backed
//! implementations, `offline` the ones that never touch the network, and
//! `static_map` the thumbnail URL builder.

pub mod http;
pub mod offline;
pub mod static_map;

use crate::geo::Coordinate;
use serde::Serialize;

pub use http::{HttpShortLinkResolver, NominatimGeocoder, OpenMeteoElevation, TimeApiLookup};
pub use offline::{NoRedirects, OffsetTimezoneLookup, Unavailable};
pub use static_map::OsmStaticMap;

/// Collaborator failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),
    #[error("Not available offline")]
    Unsupported,
}

/// Follows a shortened link to its final target.
pub trait ShortLinkResolver: Send + Sync {
    fn follow(&self, url: &str) -> Result<String, ProviderError>;
}

pub trait ReverseGeocoder: Send + Sync {
    fn reverse(&self, lat: f64, lon: f64) -> Result<String, ProviderError>;
}

pub trait TimezoneLookup: Send + Sync {
    fn lookup(&self, lat: f64, lon: f64) -> Result<TimezoneInfo, ProviderError>;
}

pub trait ElevationProvider: Send + Sync {
    /// Elevation above sea level in meters.
    fn fill(&self, coord: &Coordinate) -> Result<f64, ProviderError>;
}

/// Builds a thumbnail for one or more points. Storage of the image is
/// somebody else's job; only the key and URL come back.
pub trait StaticMapRenderer: Send + Sync {
    fn render(&self, points: &[Coordinate]) -> Result<MapImage, ProviderError>;
}

/// IANA zone plus its current offset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimezoneInfo {
    pub name: String,
    pub utc_offset_seconds: i32,
}

impl TimezoneInfo {
    /// Build from a zone name, computing today's offset with chrono-tz.
    /// Unknown names fall back to a zero offset.
    pub fn from_name(name: &str) -> Self {
        use chrono::{Offset, TimeZone, Utc};

        let offset = name
            .parse::<chrono_tz::Tz>()
            .map(|tz| {
                tz.offset_from_utc_datetime(&Utc::now().naive_utc())
                    .fix()
                    .local_minus_utc()
            })
            .unwrap_or(0);
        Self { name: name.to_string(), utc_offset_seconds: offset }
    }

    /// `UTC+05:30` style label.
    pub fn offset_label(&self) -> String {
        let sign = if self.utc_offset_seconds < 0 { '-' } else { '+' };
        let abs = self.utc_offset_seconds.abs();
        format!("UTC{}{:02}:{:02}", sign, abs / 3600, (abs % 3600) / 60)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapImage {
    pub key: String,
    pub url: String,
}

/// Bundle of the lazy enrichment collaborators handed to presentation code.
#[derive(Clone)]
pub struct Enrichers {
    pub geocoder: std::sync::Arc<dyn ReverseGeocoder>,
    pub timezone: std::sync::Arc<dyn TimezoneLookup>,
    pub elevation: std::sync::Arc<dyn ElevationProvider>,
}

impl Enrichers {
    /// Enrichment that never touches the network.
    pub fn offline() -> Self {
        use std::sync::Arc;
        Self {
            geocoder: Arc::new(Unavailable),
            timezone: Arc::new(OffsetTimezoneLookup),
            elevation: Arc::new(Unavailable),
        }
    }

    pub fn from_settings(settings: &crate::config::Settings) -> Self {
        use std::sync::Arc;
        if settings.offline {
            return Self::offline();
        }
        Self {
            geocoder: Arc::new(NominatimGeocoder::new(settings)),
            timezone: Arc::new(TimeApiLookup::new(settings)),
            elevation: Arc::new(OpenMeteoElevation::new(settings)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timezone_from_name() {
        let tz = TimezoneInfo::from_name("UTC");
        assert_eq!(tz.utc_offset_seconds, 0);
        assert_eq!(tz.offset_label(), "UTC+00:00");

        let kolkata = TimezoneInfo::from_name("Asia/Kolkata");
        assert_eq!(kolkata.utc_offset_seconds, 5 * 3600 + 1800);
        assert_eq!(kolkata.offset_label(), "UTC+05:30");
    }

    #[test]
    fn test_timezone_unknown_name() {
        let tz = TimezoneInfo::from_name("Mars/Olympus");
        assert_eq!(tz.utc_offset_seconds, 0);
        assert_eq!(tz.name, "Mars/Olympus");
    }

    #[test]
    fn test_negative_offset_label() {
        let tz = TimezoneInfo { name: "America/St_Johns".into(), utc_offset_seconds: -(3 * 3600 + 1800) };
        assert_eq!(tz.offset_label(), "UTC-03:30");
    }
}
