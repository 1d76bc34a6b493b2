//! Static thumbnail URLs for the OpenStreetMap static map service.

use super::{MapImage, ProviderError, StaticMapRenderer};
use crate::config::Settings;
use crate::geo::Coordinate;
use url::Url;

const SINGLE_POINT_ZOOM: u32 = 15;
const SIZE: &str = "600x400";

pub struct OsmStaticMap {
    base: String,
}

impl OsmStaticMap {
    pub fn new(settings: &Settings) -> Self {
        Self { base: settings.static_map_url.clone() }
    }

    pub fn with_base(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }
}

/// Order-independent key: the sorted, unique canonical keys.
fn cache_key(points: &[Coordinate]) -> String {
    let mut keys: Vec<String> = points.iter().map(Coordinate::canonical_key).collect();
    keys.sort();
    keys.dedup();
    keys.join(";")
}

/// Zoom that fits the bounding box of `points` into the thumbnail.
fn fit_zoom(points: &[Coordinate]) -> u32 {
    let (mut min_lat, mut max_lat) = (f64::MAX, f64::MIN);
    let (mut min_lon, mut max_lon) = (f64::MAX, f64::MIN);
    for p in points {
        min_lat = min_lat.min(p.lat());
        max_lat = max_lat.max(p.lat());
        min_lon = min_lon.min(p.lon());
        max_lon = max_lon.max(p.lon());
    }
    let span = (max_lat - min_lat).max(max_lon - min_lon);
    if span <= f64::EPSILON {
        return SINGLE_POINT_ZOOM;
    }
    let zoom = (360.0 / span).log2().floor() as i64;
    zoom.clamp(1, SINGLE_POINT_ZOOM as i64) as u32
}

impl StaticMapRenderer for OsmStaticMap {
    fn render(&self, points: &[Coordinate]) -> Result<MapImage, ProviderError> {
        if points.is_empty() {
            return Err(ProviderError::NotFound("no points to render".into()));
        }

        let n = points.len() as f64;
        let center_lat = points.iter().map(|p| p.lat()).sum::<f64>() / n;
        let center_lon = points.iter().map(|p| p.lon()).sum::<f64>() / n;
        let markers = points
            .iter()
            .map(|p| format!("{:.6},{:.6},red-pushpin", p.lat(), p.lon()))
            .collect::<Vec<_>>()
            .join("|");

        let url = Url::parse_with_params(
            &self.base,
            &[
                ("center", format!("{:.6},{:.6}", center_lat, center_lon)),
                ("zoom", fit_zoom(points).to_string()),
                ("size", SIZE.to_string()),
                ("markers", markers),
            ],
        )
        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        Ok(MapImage { key: cache_key(points), url: url.to_string() })
    }
}
