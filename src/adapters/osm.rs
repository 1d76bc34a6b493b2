//! OpenStreetMap links: `?mlat=..&mlon=..` markers, `#map=zoom/lat/lon`
//! views, and `osm.org/go/<code>` short links. Short codes are interleaved
//! quadtile bits, decoded locally without a redirect.

use super::{coordinate, parse_number};
use crate::candidate::{LocationCandidate, SourceVariant};
use crate::geo::Coordinate;
use crate::resolve::{MatchContext, NotSupported, ResolveFailure, Resolver, ResolverError};
use url::Url;

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_~";
const MAX_ZOOM: u8 = 20;
const SHARE_ZOOM: u8 = 17;

#[derive(Debug, Clone, Copy)]
pub enum OsmView {
    Marker,
    MapCenter,
    ShortCode,
}

impl SourceVariant for OsmView {
    const TAGS: &'static [&'static str] = &["marker", "map_center", "short_code"];

    fn tag(self) -> &'static str {
        match self {
            Self::Marker => "marker",
            Self::MapCenter => "map_center",
            Self::ShortCode => "short_code",
        }
    }
}

fn digit(c: char) -> Option<u64> {
    // `@` is the pre-2010 spelling of `~`.
    let c = if c == '@' { '~' } else { c };
    ALPHABET.iter().position(|&b| b as char == c).map(|i| i as u64)
}

/// Decode a short code into `(lat, lon, zoom)`.
pub fn decode_short_code(code: &str) -> Option<(f64, f64, i32)> {
    let mut x: u64 = 0;
    let mut y: u64 = 0;
    let mut z: i32 = -8;
    let mut digits = 0;
    let mut chars = code.chars().peekable();

    while let Some(d) = chars.peek().and_then(|&c| digit(c)) {
        chars.next();
        x <<= 3;
        y <<= 3;
        for j in (0..3).rev() {
            if d & (1 << (2 * j + 1)) != 0 {
                x |= 1 << j;
            }
            if d & (1 << (2 * j)) != 0 {
                y |= 1 << j;
            }
        }
        z += 3;
        digits += 1;
        if digits > 10 {
            return None;
        }
    }
    if digits == 0 {
        return None;
    }

    let scale = 2f64.powi(2 - 3 * digits);
    let lon = x as f64 * scale * 90.0 - 180.0;
    let lat = y as f64 * scale * 45.0 - 90.0;

    let dashes = chars.take_while(|&c| c == '-').count();
    match dashes {
        0 => {}
        1 => z -= 2,
        _ => z -= 1,
    }
    Some((lat, lon, z))
}

/// Encode a point at `zoom` the way openstreetmap.org builds its short links.
/// Zoom levels above the supported maximum encode at the maximum.
pub fn encode_short_code(lat: f64, lon: f64, zoom: u8) -> String {
    let x = ((lon + 180.0) * 2f64.powi(32) / 360.0).round() as u64 & 0xFFFF_FFFF;
    let y = ((lat + 90.0) * 2f64.powi(32) / 180.0).round() as u64 & 0xFFFF_FFFF;

    let mut c: u64 = 0;
    for i in (0..32).rev() {
        c = (c << 2) | (((x >> i) & 1) << 1) | ((y >> i) & 1);
    }

    let zoom = zoom.min(MAX_ZOOM) as usize + 8;
    let mut out = String::new();
    for i in 0..zoom.div_ceil(3) {
        let d = (c >> (58 - 6 * i)) & 0x3f;
        out.push(ALPHABET[d as usize] as char);
    }
    for _ in 0..zoom % 3 {
        out.push('-');
    }
    out
}

fn is_osm_host(host: &str) -> bool {
    matches!(host, "openstreetmap.org" | "www.openstreetmap.org" | "osm.org" | "www.osm.org")
}

/// `map=zoom/lat/lon` from the fragment (or, for old links, the query).
fn map_view(url: &Url) -> Option<(String, String, String)> {
    let from_fragment = url.fragment().and_then(|f| {
        url::form_urlencoded::parse(f.as_bytes())
            .find(|(k, _)| k == "map")
            .map(|(_, v)| v.into_owned())
    });
    let value = from_fragment.or_else(|| url.query_pairs().find(|(k, _)| k == "map").map(|(_, v)| v.into_owned()))?;
    let mut parts = value.splitn(3, '/');
    Some((parts.next()?.to_string(), parts.next()?.to_string(), parts.next()?.to_string()))
}

#[derive(Debug, Default)]
pub struct OsmResolver;

impl OsmResolver {
    pub fn new() -> Self {
        Self
    }

    fn build(&self, ctx: &MatchContext, c: Coordinate, view: OsmView) -> LocationCandidate {
        let mut candidate = LocationCandidate::new(self.id(), c, ctx.input.as_str())
            .with_prefix(self.label())
            .with_variant(view);
        if let Some(url) = &ctx.url {
            candidate = candidate.with_source_url(url);
        }
        candidate
    }

    fn check_zoom(&self, zoom: &str) -> Result<(), ResolveFailure> {
        match zoom.trim().parse::<u8>() {
            Ok(z) if z <= MAX_ZOOM => Ok(()),
            _ => Err(ResolverError::new(self.id(), format!("Zoom {} is out of range 0..{}", zoom, MAX_ZOOM)).into()),
        }
    }
}

impl Resolver for OsmResolver {
    fn id(&self) -> &'static str {
        "osm"
    }

    fn label(&self) -> &str {
        "OpenStreetMap"
    }

    fn variants(&self) -> &'static [&'static str] {
        OsmView::TAGS
    }

    fn can_handle(&self, input: &str) -> Option<MatchContext> {
        let url = Url::parse(input.trim()).ok()?;
        if !is_osm_host(url.host_str()?) {
            return None;
        }

        if let Some(code) = url.path().strip_prefix("/go/") {
            let code = code.to_string();
            return Some(MatchContext::for_url(input, url).with_field("code", code));
        }

        let param = |name: &str| url.query_pairs().find(|(k, _)| k == name).map(|(_, v)| v.into_owned());
        if let (Some(mlat), Some(mlon)) = (param("mlat"), param("mlon")) {
            return Some(
                MatchContext::for_url(input, url.clone())
                    .with_field("mlat", mlat)
                    .with_field("mlon", mlon),
            );
        }

        let (zoom, lat, lon) = map_view(&url)?;
        Some(
            MatchContext::for_url(input, url)
                .with_field("zoom", zoom)
                .with_field("lat", lat)
                .with_field("lon", lon),
        )
    }

    fn resolve(&self, ctx: MatchContext) -> Result<Vec<LocationCandidate>, ResolveFailure> {
        if let Some(code) = ctx.field("code") {
            let (lat, lon, _) = decode_short_code(code)
                .ok_or_else(|| ResolverError::new(self.id(), format!("Short link code '{}' is not valid", code)))?;
            let c = coordinate(self.id(), lat, lon)?;
            return Ok(vec![self.build(&ctx, c, OsmView::ShortCode)]);
        }

        if let (Some(lat), Some(lon)) = (ctx.field("mlat"), ctx.field("mlon")) {
            let (Some(lat), Some(lon)) = (parse_number(lat), parse_number(lon)) else {
                return Err(ResolverError::new(self.id(), "Marker coordinates are not numbers").into());
            };
            let c = coordinate(self.id(), lat, lon)?;
            return Ok(vec![self.build(&ctx, c, OsmView::Marker)]);
        }

        if let Some(zoom) = ctx.field("zoom") {
            self.check_zoom(zoom)?;
            let (Some(lat), Some(lon)) = (ctx.number("lat"), ctx.number("lon")) else {
                return Err(ResolverError::new(self.id(), "Map view coordinates are not numbers").into());
            };
            let c = coordinate(self.id(), lat, lon)?;
            return Ok(vec![self.build(&ctx, c, OsmView::MapCenter)]);
        }

        Ok(Vec::new())
    }

    fn share_link(&self, coord: &Coordinate) -> Result<String, NotSupported> {
        Ok(format!(
            "https://www.openstreetmap.org/?mlat={lat:.6}&mlon={lon:.6}#map={z}/{lat:.6}/{lon:.6}",
            lat = coord.lat(),
            lon = coord.lon(),
            z = SHARE_ZOOM
        ))
    }

    fn drive_link(&self, coord: &Coordinate) -> Result<String, NotSupported> {
        Ok(format!(
            "https://www.openstreetmap.org/directions?route=%3B{:.6}%2C{:.6}",
            coord.lat(),
            coord.lon()
        ))
    }

    fn share_text(&self, coord: &Coordinate) -> Result<String, NotSupported> {
        Ok(format!("https://osm.org/go/{}", encode_short_code(coord.lat(), coord.lon(), SHARE_ZOOM)))
    }
}
