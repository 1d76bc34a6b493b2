//! Redirect wrappers that carry the real link in a parameter: Google's
//! `/url?q=`, Facebook's `l.php?u=`, Outlook safe links (`?url=`) and the
//! like. The wrapper holds its inner resolvers and hands the embedded link
//! to the first one that accepts it.

use crate::candidate::LocationCandidate;
use crate::resolve::{check_variants, MatchContext, ResolveFailure, Resolver};
use std::sync::Arc;
use url::Url;

const LINK_PARAMS: &[&str] = &["url", "u", "q", "link", "target", "dest"];
const VIA_KEY: &str = "unwrapped-from";

pub struct UnwrapResolver {
    inner: Vec<Arc<dyn Resolver>>,
}

impl UnwrapResolver {
    pub fn new(inner: Vec<Arc<dyn Resolver>>) -> Self {
        Self { inner }
    }

    /// The embedded link and the index of the inner resolver that takes it.
    fn embedded(&self, url: &Url) -> Option<(usize, String)> {
        for name in LINK_PARAMS {
            let Some(value) = url.query_pairs().find(|(k, _)| k == name).map(|(_, v)| v.into_owned()) else {
                continue;
            };
            let Ok(target) = Url::parse(&value) else {
                continue;
            };
            if !matches!(target.scheme(), "http" | "https" | "geo") {
                continue;
            }
            let taker = self
                .inner
                .iter()
                .position(|r| r.is_available() && r.can_handle(&value).is_some());
            if let Some(idx) = taker {
                return Some((idx, value));
            }
        }
        None
    }
}

impl Resolver for UnwrapResolver {
    fn id(&self) -> &'static str {
        "unwrap"
    }

    fn label(&self) -> &str {
        "Redirect"
    }

    fn can_handle(&self, input: &str) -> Option<MatchContext> {
        let url = Url::parse(input.trim()).ok()?;
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        let (idx, target) = self.embedded(&url)?;
        Some(
            MatchContext::for_url(input, url)
                .with_field("inner", idx.to_string())
                .with_field("target", target),
        )
    }

    fn resolve(&self, ctx: MatchContext) -> Result<Vec<LocationCandidate>, ResolveFailure> {
        let inner = ctx
            .field("inner")
            .and_then(|i| i.parse::<usize>().ok())
            .and_then(|i| self.inner.get(i))
            .ok_or_else(|| ResolveFailure::Configuration("inner resolver index out of range".into()))?;
        let target = ctx.field("target").unwrap_or_default();

        let Some(inner_ctx) = inner.can_handle(target) else {
            return Ok(Vec::new());
        };
        tracing::debug!(via = inner.id(), %target, "unwrapped link");

        let host = ctx.url.as_ref().and_then(Url::host_str).unwrap_or("redirect").to_string();
        let mut candidates = check_variants(inner.as_ref(), inner.resolve(inner_ctx)?);
        for c in &mut candidates {
            c.add_description(format!("Unwrapped from a {} link.", host), Some(VIA_KEY));
        }
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{GeoUriResolver, OsmResolver, QueryResolver};
    use crate::resolve::contract::testing::{Behavior, FakeResolver};

    fn resolver() -> UnwrapResolver {
        UnwrapResolver::new(vec![
            Arc::new(OsmResolver::new()),
            Arc::new(GeoUriResolver::new()),
            Arc::new(QueryResolver::new()),
        ])
    }

    fn resolve(r: &UnwrapResolver, input: &str) -> Result<Vec<LocationCandidate>, ResolveFailure> {
        r.resolve(r.can_handle(input).expect("should match"))
    }

    #[test]
    fn test_google_redirect_to_osm() {
        let r = resolver();
        let out = resolve(
            &r,
            "https://www.google.com/url?sa=t&q=https%3A%2F%2Fwww.openstreetmap.org%2F%3Fmlat%3D50.087451%26mlon%3D14.420671",
        )
        .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].resolver(), "osm");
        assert_eq!(out[0].variant(), Some("marker"));
        assert_eq!(out[0].canonical_key(), "50.087451,14.420671");
        assert_eq!(out[0].descriptions()[0].text, "Unwrapped from a www.google.com link.");
    }

    #[test]
    fn test_first_inner_that_accepts_wins() {
        let r = resolver();
        let out = resolve(&r, "https://l.facebook.com/l.php?u=https%3A%2F%2Fmaps.example%2F%3Fll%3D1.5%2C2.5&h=x").unwrap();
        assert_eq!(out[0].resolver(), "query");

        let out = resolve(&r, "https://safelinks.example/?url=geo%3A1.5%2C2.5").unwrap();
        assert_eq!(out[0].resolver(), "geo");
    }

    #[test]
    fn test_nothing_embedded() {
        let r = resolver();
        assert!(r.can_handle("https://www.google.com/url?q=https://example.com/about").is_none());
        assert!(r.can_handle("https://www.google.com/search?q=prague").is_none());
        assert!(r.can_handle("geo:1,2").is_none());
    }

    #[test]
    fn test_inner_error_passes_through() {
        let r = UnwrapResolver::new(vec![Arc::new(FakeResolver::new("inner", "maps", Behavior::Invalid("No such place")))]);
        match resolve(&r, "https://r.example/?url=https://maps.example/1") {
            Err(ResolveFailure::Invalid(e)) => {
                assert_eq!(e.resolver, "inner");
                assert_eq!(e.message, "No such place");
            }
            other => panic!("unexpected {:?}", other.map(|v| v.len())),
        }
    }
}
