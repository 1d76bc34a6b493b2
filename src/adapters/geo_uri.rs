//! `geo:` URIs (RFC 5870), including the Android `geo:0,0?q=lat,lon(label)`
//! form. Registered in both dispatch lists: a single `geo:` input, and any
//! number of them inside message text.

use super::{coordinate, parse_pair};
use crate::candidate::{LocationCandidate, SourceVariant};
use crate::geo::Coordinate;
use crate::resolve::{MatchContext, NotSupported, ResolveFailure, Resolver};
use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy)]
pub enum GeoForm {
    /// Coordinates in the URI path.
    Point,
    /// Coordinates in the `q=` parameter.
    Query,
}

impl SourceVariant for GeoForm {
    const TAGS: &'static [&'static str] = &["point", "query"];

    fn tag(self) -> &'static str {
        match self {
            Self::Point => "point",
            Self::Query => "query",
        }
    }
}

fn geo_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\bgeo:([-+]?\d{1,3}(?:\.\d+)?),([-+]?\d{1,3}(?:\.\d+)?)(?:,[-+]?\d+(?:\.\d+)?)?(?:;[^\s;?]*)*(?:\?(\S*))?",
        )
        .expect("geo uri regex is valid")
    })
}

struct GeoHit {
    raw: String,
    lat: f64,
    lon: f64,
    label: Option<String>,
    form: GeoForm,
}

/// `lat,lon` optionally followed by `(label)`.
fn parse_query_point(q: &str) -> Option<(f64, f64, Option<String>)> {
    let (pair, label) = match q.split_once('(') {
        Some((pair, rest)) => {
            let label = rest.trim_end_matches(')').trim();
            (pair, (!label.is_empty()).then(|| label.to_string()))
        }
        None => (q, None),
    };
    let (lat, lon) = parse_pair(pair)?;
    Some((lat, lon, label))
}

fn scan(text: &str) -> Vec<GeoHit> {
    geo_regex()
        .captures_iter(text)
        .filter_map(|caps| {
            let raw = caps[0].to_string();
            let lat: f64 = caps[1].parse().ok()?;
            let lon: f64 = caps[2].parse().ok()?;

            let q = caps.get(3).and_then(|query| {
                url::form_urlencoded::parse(query.as_str().as_bytes())
                    .find(|(k, _)| k == "q")
                    .map(|(_, v)| v.into_owned())
            });
            if let Some((qlat, qlon, label)) = q.as_deref().and_then(parse_query_point) {
                return Some(GeoHit { raw, lat: qlat, lon: qlon, label, form: GeoForm::Query });
            }
            // geo:0,0?q=<address> is a search, not a location.
            if lat == 0.0 && lon == 0.0 && q.is_some() {
                return None;
            }
            Some(GeoHit { raw, lat, lon, label: None, form: GeoForm::Point })
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct GeoUriResolver;

impl GeoUriResolver {
    pub fn new() -> Self {
        Self
    }
}

impl Resolver for GeoUriResolver {
    fn id(&self) -> &'static str {
        "geo"
    }

    fn label(&self) -> &str {
        "Geo URI"
    }

    fn variants(&self) -> &'static [&'static str] {
        GeoForm::TAGS
    }

    fn can_handle(&self, input: &str) -> Option<MatchContext> {
        (!scan(input).is_empty()).then(|| MatchContext::text(input))
    }

    fn resolve(&self, ctx: MatchContext) -> Result<Vec<LocationCandidate>, ResolveFailure> {
        scan(&ctx.input)
            .into_iter()
            .map(|hit| {
                let c = coordinate(self.id(), hit.lat, hit.lon)?;
                let mut candidate = LocationCandidate::new(self.id(), c, hit.raw)
                    .with_prefix(self.label())
                    .with_variant(hit.form);
                if let Some(label) = hit.label {
                    candidate = candidate.with_inline_label(label);
                }
                Ok(candidate)
            })
            .collect()
    }

    fn share_link(&self, coord: &Coordinate) -> Result<String, NotSupported> {
        Ok(format!("geo:{}", coord))
    }
}
