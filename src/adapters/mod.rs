//! Reference resolvers and the default registry.
//!
//! Each adapter is one [`Resolver`]; none of them know about the others
//! except [`UnwrapResolver`], which holds its inner resolvers explicitly.

pub mod coords;
pub mod geo_uri;
pub mod google;
pub mod osm;
pub mod query;
pub mod unwrap;

pub use coords::CoordinatePairResolver;
pub use geo_uri::GeoUriResolver;
pub use google::GoogleMapsResolver;
pub use osm::OsmResolver;
pub use query::QueryResolver;
pub use unwrap::UnwrapResolver;

use crate::geo::Coordinate;
use crate::providers::ShortLinkResolver;
use crate::resolve::{ResolveFailure, Resolver, ResolverRegistry};
use std::sync::Arc;

/// Build the registry used by the CLI and the server.
///
/// URL order: the unwrapping wrapper, then site-specific formats, then the
/// generic `ll=`/`q=` fallback. Text order: decimal/hemisphere pairs, then
/// `geo:` URIs.
pub fn default_registry(follower: Arc<dyn ShortLinkResolver>) -> ResolverRegistry {
    let google: Arc<dyn Resolver> = Arc::new(GoogleMapsResolver::new(follower));
    let osm: Arc<dyn Resolver> = Arc::new(OsmResolver::new());
    let geo: Arc<dyn Resolver> = Arc::new(GeoUriResolver::new());
    let query: Arc<dyn Resolver> = Arc::new(QueryResolver::new());
    let unwrap = UnwrapResolver::new(vec![google.clone(), osm.clone(), geo.clone(), query.clone()]);

    ResolverRegistry::new()
        .with_url(Arc::new(unwrap))
        .with_url(google)
        .with_url(osm)
        .with_url(geo.clone())
        .with_url(query)
        .with_text(Arc::new(CoordinatePairResolver::new()))
        .with_text(geo)
}

/// Parse `"lat,lon"` as found in query strings and paths. Only digits, sign,
/// dot and surrounding whitespace are accepted, so `q=pizza,rome` or
/// `q=nan,inf` are not mistaken for coordinates.
pub(crate) fn parse_pair(s: &str) -> Option<(f64, f64)> {
    let (lat, lon) = s.split_once(',')?;
    Some((parse_number(lat)?, parse_number(lon)?))
}

pub(crate) fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    let numeric = !s.is_empty()
        && s.chars().any(|c| c.is_ascii_digit())
        && s.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+'));
    if !numeric {
        return None;
    }
    s.parse().ok()
}

/// Validated coordinate, or a recognized-invalid failure naming the resolver.
pub(crate) fn coordinate(resolver: &'static str, lat: f64, lon: f64) -> Result<Coordinate, ResolveFailure> {
    Coordinate::new(lat, lon).map_err(|e| ResolveFailure::invalid_coordinate(resolver, e))
}
