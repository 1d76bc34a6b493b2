//! Google Maps links. Long forms carry the point as a place pin
//! (`!3d<lat>!4d<lon>`), a query parameter, a `/search/` or `/place/` path
//! segment, or the viewport center (`@lat,lon,zoom`). A pinned link whose
//! viewport sits elsewhere yields the center as a second candidate. Short forms
//! (`maps.app.goo.gl`, `goo.gl/maps`) are followed one hop.

use super::{coordinate, parse_pair};
use crate::candidate::{LocationCandidate, SourceVariant};
use crate::geo::Coordinate;
use crate::providers::ShortLinkResolver;
use crate::resolve::{follow_short_link, MatchContext, NotSupported, ResolveFailure, Resolver};
use regex::Regex;
use std::sync::{Arc, OnceLock};
use url::Url;

const QUERY_PARAMS: &[&str] = &["q", "query", "ll", "daddr", "destination"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GoogleView {
    Place,
    Query,
    MapCenter,
}

impl SourceVariant for GoogleView {
    const TAGS: &'static [&'static str] = &["place", "query", "map_center"];

    fn tag(self) -> &'static str {
        match self {
            Self::Place => "place",
            Self::Query => "query",
            Self::MapCenter => "map_center",
        }
    }
}

impl GoogleView {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "place" => Some(Self::Place),
            "query" => Some(Self::Query),
            "map_center" => Some(Self::MapCenter),
            _ => None,
        }
    }
}

fn place_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"!3d(-?\d+(?:\.\d+)?)!4d(-?\d+(?:\.\d+)?)").expect("place regex is valid"))
}

fn center_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"@(-?\d+(?:\.\d+)?),(-?\d+(?:\.\d+)?)").expect("center regex is valid"))
}

fn is_short_host(url: &Url) -> bool {
    match url.host_str() {
        Some("maps.app.goo.gl") => true,
        Some("goo.gl") => url.path().starts_with("/maps"),
        _ => false,
    }
}

fn is_maps_url(url: &Url) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.trim_start_matches("www.");
    match host.strip_prefix("maps.") {
        Some(rest) => rest.starts_with("google."),
        None => host.starts_with("google.") && url.path().starts_with("/maps"),
    }
}

/// Decoded path segment following `/place/` or `/search/`.
fn segment_after(url: &Url, marker: &str) -> Option<String> {
    let mut segments = url.path_segments()?;
    segments.by_ref().find(|s| *s == marker)?;
    let raw = segments.next()?.replace('+', " ");
    let decoded = url::form_urlencoded::parse(format!("v={}", raw).as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())?;
    (!decoded.is_empty()).then_some(decoded)
}

/// The most specific point in a long link.
fn find_point(url: &Url) -> Option<(GoogleView, String, String)> {
    let path = url.path();
    if let Some(caps) = place_regex().captures(path) {
        return Some((GoogleView::Place, caps[1].to_string(), caps[2].to_string()));
    }

    let from_params = QUERY_PARAMS.iter().find_map(|name| {
        url.query_pairs()
            .find(|(k, _)| k == name)
            .and_then(|(_, v)| parse_pair(&v))
    });
    let from_path = || ["search", "place"].iter().find_map(|m| segment_after(url, m).as_deref().and_then(parse_pair));
    if let Some((lat, lon)) = from_params.or_else(from_path) {
        return Some((GoogleView::Query, lat.to_string(), lon.to_string()));
    }

    viewport(url).map(|(lat, lon)| (GoogleView::MapCenter, lat, lon))
}

fn viewport(url: &Url) -> Option<(String, String)> {
    center_regex()
        .captures(url.path())
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
}

pub struct GoogleMapsResolver {
    follower: Arc<dyn ShortLinkResolver>,
}

impl GoogleMapsResolver {
    pub fn new(follower: Arc<dyn ShortLinkResolver>) -> Self {
        Self { follower }
    }
}

impl Resolver for GoogleMapsResolver {
    fn id(&self) -> &'static str {
        "google"
    }

    fn label(&self) -> &str {
        "Google Maps"
    }

    fn variants(&self) -> &'static [&'static str] {
        GoogleView::TAGS
    }

    fn can_handle(&self, input: &str) -> Option<MatchContext> {
        let url = Url::parse(input.trim()).ok()?;
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        if is_short_host(&url) {
            return Some(MatchContext::for_url(input, url).shortened());
        }
        if !is_maps_url(&url) {
            return None;
        }

        let (view, lat, lon) = find_point(&url)?;
        let place_name = segment_after(&url, "place").filter(|name| parse_pair(name).is_none());
        let center = if view == GoogleView::MapCenter { None } else { viewport(&url) };
        let mut ctx = MatchContext::for_url(input, url)
            .with_field("view", view.tag())
            .with_field("lat", lat)
            .with_field("lon", lon);
        if let Some(name) = place_name {
            ctx = ctx.with_field("name", name);
        }
        if let Some((lat, lon)) = center {
            ctx = ctx.with_field("center_lat", lat).with_field("center_lon", lon);
        }
        Some(ctx)
    }

    fn resolve(&self, ctx: MatchContext) -> Result<Vec<LocationCandidate>, ResolveFailure> {
        if ctx.short {
            return follow_short_link(self, self.follower.as_ref(), &ctx);
        }

        let (Some(view), Some(lat), Some(lon)) = (
            ctx.field("view").and_then(GoogleView::from_tag),
            ctx.number("lat"),
            ctx.number("lon"),
        ) else {
            return Ok(Vec::new());
        };
        let c = coordinate(self.id(), lat, lon)?;

        let mut candidate = LocationCandidate::new(self.id(), c, ctx.input.as_str())
            .with_prefix(self.label())
            .with_variant(view);
        if let Some(url) = &ctx.url {
            candidate = candidate.with_source_url(url);
        }
        if let Some(name) = ctx.field("name") {
            candidate = candidate.with_inline_label(name);
        }
        let mut out = vec![candidate];

        let center = match (ctx.number("center_lat"), ctx.number("center_lon")) {
            (Some(lat), Some(lon)) => Coordinate::new(lat, lon).ok(),
            _ => None,
        };
        if let Some(center) = center.filter(|m| m.canonical_key() != c.canonical_key()) {
            let mut candidate = LocationCandidate::new(self.id(), center, ctx.input.as_str())
                .with_prefix(self.label())
                .with_variant(GoogleView::MapCenter);
            if let Some(url) = &ctx.url {
                candidate = candidate.with_source_url(url);
            }
            out.push(candidate);
        }
        Ok(out)
    }

    fn share_link(&self, coord: &Coordinate) -> Result<String, NotSupported> {
        Ok(format!("https://www.google.com/maps/search/?api=1&query={}", coord))
    }

    fn drive_link(&self, coord: &Coordinate) -> Result<String, NotSupported> {
        Ok(format!("https://www.google.com/maps/dir/?api=1&destination={}", coord))
    }
}
