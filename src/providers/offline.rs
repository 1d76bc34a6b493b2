//! Collaborators that never touch the network.

use super::{ElevationProvider, ProviderError, ReverseGeocoder, ShortLinkResolver, TimezoneInfo, TimezoneLookup};
use crate::geo::Coordinate;

/// Short links cannot be followed offline.
pub struct NoRedirects;

impl ShortLinkResolver for NoRedirects {
    fn follow(&self, _url: &str) -> Result<String, ProviderError> {
        Err(ProviderError::Unsupported)
    }
}

/// Stand-in for geocoding and elevation when offline.
pub struct Unavailable;

impl ReverseGeocoder for Unavailable {
    fn reverse(&self, _lat: f64, _lon: f64) -> Result<String, ProviderError> {
        Err(ProviderError::Unsupported)
    }
}

impl ElevationProvider for Unavailable {
    fn fill(&self, _coord: &Coordinate) -> Result<f64, ProviderError> {
        Err(ProviderError::Unsupported)
    }
}

/// Rough zone from the longitude band. Good enough for a label when
/// timeapi.io is unreachable; wrong near most political borders.
pub struct OffsetTimezoneLookup;

impl TimezoneLookup for OffsetTimezoneLookup {
    fn lookup(&self, _lat: f64, lon: f64) -> Result<TimezoneInfo, ProviderError> {
        Ok(TimezoneInfo::from_name(zone_for_longitude(lon)))
    }
}

fn zone_for_longitude(lon: f64) -> &'static str {
    let offset_hours = (lon / 15.0).round() as i32;
    match offset_hours {
        -12..=-10 => "Pacific/Honolulu",
        -9 => "America/Anchorage",
        -8 => "America/Los_Angeles",
        -7 => "America/Denver",
        -6 => "America/Chicago",
        -5 => "America/New_York",
        -4 => "America/Halifax",
        -3 => "America/Sao_Paulo",
        -2..=-1 => "Atlantic/Azores",
        0 => "Europe/London",
        1 => "Europe/Paris",
        2 => "Europe/Helsinki",
        3 => "Europe/Moscow",
        4 => "Asia/Dubai",
        5 => "Asia/Karachi",
        6 => "Asia/Dhaka",
        7 => "Asia/Bangkok",
        8 => "Asia/Shanghai",
        9 => "Asia/Tokyo",
        10 => "Australia/Sydney",
        11 => "Pacific/Noumea",
        12 => "Pacific/Auckland",
        _ => "UTC",
    }
}
