//! Coordinate pairs typed straight into a message.
//!
//! Two forms: signed decimals (`50.087451, 14.420671`) and hemisphere
//! letters (`50.087451°N, 14.420671°E`, the form `format_coords` prints).
//! Plain decimals need at least three fractional digits so prices and
//! scores are not picked up.

use super::{coordinate, parse_number};
use crate::candidate::{LocationCandidate, SourceVariant};
use crate::geo::Coordinate;
use crate::resolve::{MatchContext, NotSupported, ResolveFailure, Resolver};
use regex::{Captures, Regex};
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy)]
pub enum PairForm {
    Decimal,
    Hemisphere,
}

impl SourceVariant for PairForm {
    const TAGS: &'static [&'static str] = &["decimal", "hemisphere"];

    fn tag(self) -> &'static str {
        match self {
            Self::Decimal => "decimal",
            Self::Hemisphere => "hemisphere",
        }
    }
}

fn decimal_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([-+]?\d{1,3}\.\d{3,})\s*[,;]\s*([-+]?\d{1,3}\.\d{3,})").expect("decimal pair regex is valid")
    })
}

fn hemisphere_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(\d{1,3}(?:\.\d+)?)\s*°?\s*([NS])\s*[,;]?\s*(\d{1,3}(?:\.\d+)?)\s*°?\s*([EW])\b")
            .expect("hemisphere pair regex is valid")
    })
}

fn glued(c: Option<char>) -> bool {
    c.is_some_and(|c| c.is_alphanumeric() || c == '.')
}

/// A decimal pair must not be glued to surrounding digits, dots or letters.
fn is_isolated(text: &str, start: usize, end: usize) -> bool {
    !glued(text[..start].chars().next_back()) && !glued(text[end..].chars().next())
}

#[derive(Debug, Default)]
pub struct CoordinatePairResolver;

impl CoordinatePairResolver {
    pub fn new() -> Self {
        Self
    }

    fn decimal_pairs<'t>(text: &'t str) -> impl Iterator<Item = Captures<'t>> + 't {
        decimal_regex().captures_iter(text).filter(move |c| {
            let m = c.get(0).map(|m| (m.start(), m.end()));
            m.is_some_and(|(s, e)| is_isolated(text, s, e))
        })
    }

    /// The hemisphere letter already ends the match, so only the leading side
    /// is checked; a sentence may end right after `E.`.
    fn hemisphere_pairs<'t>(text: &'t str) -> impl Iterator<Item = Captures<'t>> + 't {
        hemisphere_regex().captures_iter(text).filter(move |c| {
            let start = c.get(0).map_or(0, |m| m.start());
            !glued(text[..start].chars().next_back())
        })
    }

    fn candidate(&self, lat: f64, lon: f64, raw: &str, form: PairForm) -> Result<LocationCandidate, ResolveFailure> {
        let c = coordinate(self.id(), lat, lon)?;
        Ok(LocationCandidate::new(self.id(), c, raw)
            .with_prefix(self.label())
            .with_variant(form))
    }
}

impl Resolver for CoordinatePairResolver {
    fn id(&self) -> &'static str {
        "coords"
    }

    fn label(&self) -> &str {
        "Coordinates"
    }

    fn variants(&self) -> &'static [&'static str] {
        PairForm::TAGS
    }

    fn can_handle(&self, input: &str) -> Option<MatchContext> {
        let found = Self::decimal_pairs(input).next().is_some() || Self::hemisphere_pairs(input).next().is_some();
        found.then(|| MatchContext::text(input))
    }

    /// Every pair in the text becomes a candidate. Out-of-range pairs are
    /// reported only when nothing in the text was valid.
    fn resolve(&self, ctx: MatchContext) -> Result<Vec<LocationCandidate>, ResolveFailure> {
        let text = ctx.input.as_str();
        let mut hits: Vec<(usize, Result<LocationCandidate, ResolveFailure>)> = Vec::new();

        for caps in Self::decimal_pairs(text) {
            let (Some(lat), Some(lon)) = (parse_number(&caps[1]), parse_number(&caps[2])) else {
                continue;
            };
            let start = caps.get(0).map_or(0, |m| m.start());
            hits.push((start, self.candidate(lat, lon, &caps[0], PairForm::Decimal)));
        }

        for caps in Self::hemisphere_pairs(text) {
            let (Some(lat), Some(lon)) = (parse_number(&caps[1]), parse_number(&caps[3])) else {
                continue;
            };
            let lat = if caps[2].eq_ignore_ascii_case("S") { -lat } else { lat };
            let lon = if caps[4].eq_ignore_ascii_case("W") { -lon } else { lon };
            let start = caps.get(0).map_or(0, |m| m.start());
            hits.push((start, self.candidate(lat, lon, &caps[0], PairForm::Hemisphere)));
        }

        hits.sort_by_key(|(start, _)| *start);
        let mut found = Vec::new();
        let mut first_error = None;
        for (_, hit) in hits {
            match hit {
                Ok(c) => found.push(c),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        match (found.is_empty(), first_error) {
            (true, Some(e)) => Err(e),
            _ => Ok(found),
        }
    }

    fn share_text(&self, coord: &Coordinate) -> Result<String, NotSupported> {
        Ok(coord.to_string())
    }
}
