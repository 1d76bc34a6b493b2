//! Generic fallback for map links that carry the point in their query
//! string: `?ll=lat,lon`, `?q=lat,lon`, `?lat=..&lon=..` and friends.
//! Registered last among URL resolvers.

use super::{coordinate, parse_number, parse_pair};
use crate::candidate::LocationCandidate;
use crate::resolve::{MatchContext, ResolveFailure, Resolver};
use url::Url;

/// Parameters holding a `lat,lon` pair, in priority order.
const PAIR_PARAMS: &[&str] = &["ll", "q", "query", "center", "sll", "destination", "daddr", "coords"];

/// Split parameters, latitude name first.
const SPLIT_PARAMS: &[(&str, &str)] = &[("lat", "lon"), ("lat", "lng"), ("latitude", "longitude"), ("y", "x")];

#[derive(Debug, Default)]
pub struct QueryResolver;

impl QueryResolver {
    pub fn new() -> Self {
        Self
    }
}

fn param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.into_owned())
}

/// First parameter (or parameter pair) that looks like a coordinate.
fn find_point(url: &Url) -> Option<(&'static str, f64, f64)> {
    for name in PAIR_PARAMS {
        if let Some((lat, lon)) = param(url, name).as_deref().and_then(parse_pair) {
            return Some((*name, lat, lon));
        }
    }
    for (lat_name, lon_name) in SPLIT_PARAMS {
        let lat = param(url, lat_name).as_deref().and_then(parse_number);
        let lon = param(url, lon_name).as_deref().and_then(parse_number);
        if let (Some(lat), Some(lon)) = (lat, lon) {
            return Some((*lat_name, lat, lon));
        }
    }
    None
}

impl Resolver for QueryResolver {
    fn id(&self) -> &'static str {
        "query"
    }

    fn label(&self) -> &str {
        "Map link"
    }

    fn can_handle(&self, input: &str) -> Option<MatchContext> {
        let url = Url::parse(input.trim()).ok()?;
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        let (name, lat, lon) = find_point(&url)?;
        Some(
            MatchContext::for_url(input, url)
                .with_field("param", name)
                .with_field("lat", lat.to_string())
                .with_field("lon", lon.to_string()),
        )
    }

    fn resolve(&self, ctx: MatchContext) -> Result<Vec<LocationCandidate>, ResolveFailure> {
        let (Some(lat), Some(lon)) = (ctx.number("lat"), ctx.number("lon")) else {
            return Ok(Vec::new());
        };
        let c = coordinate(self.id(), lat, lon)?;
        let mut candidate = LocationCandidate::new(self.id(), c, ctx.input.as_str());
        if let Some(url) = &ctx.url {
            let label = url.host_str().unwrap_or(self.label()).trim_start_matches("www.").to_string();
            candidate = candidate.with_source_url(url).with_prefix(label);
        }
        Ok(vec![candidate])
    }
}
