//! The resolver contract every adapter implements.
//!
//! `can_handle` is cheap and pure; `resolve` may block on I/O. The
//! dispatcher always calls them in that order and never calls `resolve` with a
//! context that did not come from the same resolver's `can_handle`.

use super::types::{MatchContext, NotSupported, ResolveFailure, ResolverError};
use crate::candidate::LocationCandidate;
use crate::geo::Coordinate;
use crate::providers::{ProviderError, ShortLinkResolver};

pub trait Resolver: Send + Sync {
    /// Stable identifier, used for labelling and for the distance notes.
    fn id(&self) -> &'static str;

    /// Human label used as the candidate prefix.
    fn label(&self) -> &str {
        self.id()
    }

    /// Every variant tag this resolver may emit. Non-empty means each
    /// candidate must carry exactly one of them.
    fn variants(&self) -> &'static [&'static str] {
        &[]
    }

    /// False when the resolver can never work (missing credentials). It is
    /// then skipped as a permanent non-match.
    fn is_available(&self) -> bool {
        true
    }

    fn can_handle(&self, input: &str) -> Option<MatchContext>;

    fn resolve(&self, ctx: MatchContext) -> Result<Vec<LocationCandidate>, ResolveFailure>;

    fn share_link(&self, _coord: &Coordinate) -> Result<String, NotSupported> {
        Err(NotSupported { resolver: self.id(), operation: "share_link" })
    }

    fn drive_link(&self, _coord: &Coordinate) -> Result<String, NotSupported> {
        Err(NotSupported { resolver: self.id(), operation: "drive_link" })
    }

    fn share_text(&self, _coord: &Coordinate) -> Result<String, NotSupported> {
        Err(NotSupported { resolver: self.id(), operation: "share_text" })
    }
}

/// Drop candidates whose variant does not match what `resolver` declares.
/// Candidates produced by a delegate keep their own provenance and are
/// checked by whoever delegated.
pub fn check_variants(resolver: &dyn Resolver, candidates: Vec<LocationCandidate>) -> Vec<LocationCandidate> {
    let declared = resolver.variants();
    candidates
        .into_iter()
        .filter(|c| {
            if c.resolver() != resolver.id() {
                return true;
            }
            let ok = match c.variant() {
                Some(tag) => declared.contains(&tag),
                None => declared.is_empty(),
            };
            if !ok {
                tracing::error!(
                    resolver = resolver.id(),
                    variant = ?c.variant(),
                    declared = ?declared,
                    "candidate dropped: variant does not match declaration"
                );
            }
            ok
        })
        .collect()
}

/// One redirect hop for a resolver's own short form: follow it, re-run the
/// resolver's `can_handle` on the target, and resolve against itself. The
/// target must be a non-short form, so this can never loop.
pub fn follow_short_link(
    resolver: &dyn Resolver,
    follower: &dyn ShortLinkResolver,
    ctx: &MatchContext,
) -> Result<Vec<LocationCandidate>, ResolveFailure> {
    let target = follower.follow(&ctx.input).map_err(|e| match e {
        ProviderError::NotFound(_) => {
            ResolverError::new(resolver.id(), format!("Short link {} does not exist", ctx.input)).into()
        }
        ProviderError::Unsupported => ResolveFailure::Transient(format!(
            "cannot follow {} without network access",
            ctx.input
        )),
        other => ResolveFailure::Transient(other.to_string()),
    })?;
    tracing::debug!(resolver = resolver.id(), from = %ctx.input, to = %target, "short link expanded");

    match resolver.can_handle(&target) {
        Some(next) if !next.short => resolver.resolve(next),
        _ => Err(ResolverError::new(
            resolver.id(),
            format!("Short link {} does not lead to a location", ctx.input),
        )
        .into()),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Configurable fake resolver shared by the dispatcher and service tests.

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Clone)]
    pub enum Behavior {
        Emit(Vec<(f64, f64)>),
        Invalid(&'static str),
        Transient,
        Configuration,
        Panic,
        Slow(Duration, Vec<(f64, f64)>),
    }

    pub struct FakeResolver {
        pub id: &'static str,
        pub needle: &'static str,
        pub behavior: Behavior,
        pub available: bool,
        pub calls: AtomicUsize,
    }

    impl FakeResolver {
        pub fn new(id: &'static str, needle: &'static str, behavior: Behavior) -> Self {
            Self { id, needle, behavior, available: true, calls: AtomicUsize::new(0) }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn emit(&self, ctx: &MatchContext, points: &[(f64, f64)]) -> Result<Vec<LocationCandidate>, ResolveFailure> {
            points
                .iter()
                .map(|&(lat, lon)| {
                    let c = Coordinate::new(lat, lon).map_err(|e| ResolveFailure::invalid_coordinate(self.id, e))?;
                    Ok(LocationCandidate::new(self.id, c, ctx.input.clone()))
                })
                .collect()
        }
    }

    impl Resolver for FakeResolver {
        fn id(&self) -> &'static str {
            self.id
        }

        fn is_available(&self) -> bool {
            self.available
        }

        fn can_handle(&self, input: &str) -> Option<MatchContext> {
            input.contains(self.needle).then(|| MatchContext::text(input))
        }

        fn resolve(&self, ctx: MatchContext) -> Result<Vec<LocationCandidate>, ResolveFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                Behavior::Emit(points) => self.emit(&ctx, points),
                Behavior::Invalid(msg) => Err(ResolverError::new(self.id, *msg).into()),
                Behavior::Transient => Err(ResolveFailure::Transient("connection reset".into())),
                Behavior::Configuration => Err(ResolveFailure::Configuration("no API key".into())),
                Behavior::Panic => panic!("resolver bug"),
                Behavior::Slow(delay, points) => {
                    std::thread::sleep(*delay);
                    self.emit(&ctx, points)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::SourceVariant;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Clone, Copy)]
    enum Kind {
        Place,
        Center,
    }

    impl SourceVariant for Kind {
        const TAGS: &'static [&'static str] = &["place", "center"];

        fn tag(self) -> &'static str {
            match self {
                Self::Place => "place",
                Self::Center => "center",
            }
        }
    }

    /// Short form `s/<code>`, long form `long:<lat>,<lon>`.
    struct Shorty;

    impl Resolver for Shorty {
        fn id(&self) -> &'static str {
            "shorty"
        }

        fn variants(&self) -> &'static [&'static str] {
            Kind::TAGS
        }

        fn can_handle(&self, input: &str) -> Option<MatchContext> {
            if input.starts_with("s/") {
                return Some(MatchContext::text(input).shortened());
            }
            let rest = input.strip_prefix("long:")?;
            let (lat, lon) = rest.split_once(',')?;
            Some(MatchContext::text(input).with_field("lat", lat).with_field("lon", lon))
        }

        fn resolve(&self, ctx: MatchContext) -> Result<Vec<LocationCandidate>, ResolveFailure> {
            if ctx.short {
                return follow_short_link(self, &MapFollower::default(), &ctx);
            }
            let c = Coordinate::new(ctx.number("lat").unwrap_or(0.0), ctx.number("lon").unwrap_or(0.0))
                .map_err(|e| ResolveFailure::invalid_coordinate(self.id(), e))?;
            Ok(vec![LocationCandidate::new(self.id(), c, ctx.input).with_variant(Kind::Center)])
        }
    }

    #[derive(Default)]
    struct MapFollower {
        seen: Mutex<Vec<String>>,
    }

    impl ShortLinkResolver for MapFollower {
        fn follow(&self, url: &str) -> Result<String, ProviderError> {
            self.seen.lock().unwrap().push(url.to_string());
            let table: HashMap<&str, &str> = [
                ("s/ok", "long:50.1,14.4"),
                ("s/loop", "s/loop"),
                ("s/junk", "https://example.com"),
            ]
            .into_iter()
            .collect();
            table
                .get(url)
                .map(|s| s.to_string())
                .ok_or_else(|| ProviderError::NotFound(url.to_string()))
        }
    }

    #[test]
    fn test_default_reverse_ops_not_supported() {
        let c = Coordinate::new(1.0, 2.0).unwrap();
        let err = Shorty.share_link(&c).unwrap_err();
        assert_eq!(err, NotSupported { resolver: "shorty", operation: "share_link" });
        assert!(Shorty.drive_link(&c).is_err());
        assert_eq!(Shorty.share_text(&c).unwrap_err().to_string(), "shorty does not support share_text");
    }

    #[test]
    fn test_short_link_one_hop() {
        let ctx = Shorty.can_handle("s/ok").unwrap();
        let out = Shorty.resolve(ctx).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].canonical_key(), "50.100000,14.400000");
    }

    #[test]
    fn test_short_link_to_short_link_is_error() {
        let ctx = Shorty.can_handle("s/loop").unwrap();
        match Shorty.resolve(ctx) {
            Err(ResolveFailure::Invalid(e)) => assert!(e.message.contains("does not lead to a location")),
            other => panic!("unexpected {:?}", other.map(|v| v.len())),
        }
    }

    #[test]
    fn test_short_link_unrecognized_target() {
        let ctx = Shorty.can_handle("s/junk").unwrap();
        assert!(matches!(Shorty.resolve(ctx), Err(ResolveFailure::Invalid(_))));
    }

    #[test]
    fn test_short_link_missing_upstream() {
        let ctx = Shorty.can_handle("s/gone").unwrap();
        match Shorty.resolve(ctx) {
            Err(ResolveFailure::Invalid(e)) => assert_eq!(e.message, "Short link s/gone does not exist"),
            other => panic!("unexpected {:?}", other.map(|v| v.len())),
        }
    }

    #[test]
    fn test_short_link_offline_is_transient() {
        let ctx = Shorty.can_handle("s/ok").unwrap();
        let r = follow_short_link(&Shorty, &crate::providers::NoRedirects, &ctx);
        assert!(matches!(r, Err(ResolveFailure::Transient(_))));
    }

    #[test]
    fn test_check_variants() {
        let c = Coordinate::new(1.0, 1.0).unwrap();
        let good = LocationCandidate::new("shorty", c, "x").with_variant(Kind::Place);
        let missing = LocationCandidate::new("shorty", c, "x");
        let delegated = LocationCandidate::new("other", c, "x");
        let kept = check_variants(&Shorty, vec![good, missing, delegated]);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].variant(), Some("place"));
        assert_eq!(kept[1].resolver(), "other");
    }

    #[test]
    fn test_check_variants_none_declared() {
        use super::testing::{Behavior, FakeResolver};
        let fake = FakeResolver::new("fake", "", Behavior::Transient);
        let c = Coordinate::new(1.0, 1.0).unwrap();
        let tagged = LocationCandidate::new("fake", c, "x").with_variant(Kind::Place);
        let plain = LocationCandidate::new("fake", c, "x");
        let kept = check_variants(&fake, vec![tagged, plain]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].variant(), None);
    }
}
