//! Ordered resolver lists and the two dispatch modes.
//!
//! URL resolvers are tried first-match: specific formats are registered ahead
//! of generic fallbacks and the first `can_handle` hit wins. Text resolvers
//! all run against the same text and their output is concatenated.

use super::collection::ResultCollection;
use super::contract::{check_variants, Resolver};
use super::types::{MatchContext, ResolveFailure};
use std::sync::Arc;

#[derive(Default, Clone)]
pub struct ResolverRegistry {
    url_resolvers: Vec<Arc<dyn Resolver>>,
    text_resolvers: Vec<Arc<dyn Resolver>>,
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a first-match resolver. Earlier registrations take priority.
    pub fn with_url(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.url_resolvers.push(resolver);
        self
    }

    /// Append a scan-all resolver.
    pub fn with_text(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.text_resolvers.push(resolver);
        self
    }

    pub fn url_resolvers(&self) -> &[Arc<dyn Resolver>] {
        &self.url_resolvers
    }

    pub fn text_resolvers(&self) -> &[Arc<dyn Resolver>] {
        &self.text_resolvers
    }

    /// Look a resolver up by id in either list.
    pub fn get(&self, id: &str) -> Option<&Arc<dyn Resolver>> {
        self.url_resolvers
            .iter()
            .chain(self.text_resolvers.iter())
            .find(|r| r.id() == id)
    }

    /// Every distinct resolver, URL ones first.
    pub fn all(&self) -> Vec<&Arc<dyn Resolver>> {
        let mut out: Vec<&Arc<dyn Resolver>> = Vec::new();
        for r in self.url_resolvers.iter().chain(self.text_resolvers.iter()) {
            if !out.iter().any(|seen| seen.id() == r.id()) {
                out.push(r);
            }
        }
        out
    }

    /// First-match mode: only the first resolver whose `can_handle` accepts
    /// `input` runs.
    pub fn first_match(&self, input: &str) -> ResultCollection {
        for resolver in &self.url_resolvers {
            if !resolver.is_available() {
                continue;
            }
            if let Some(ctx) = resolver.can_handle(input) {
                return run_matched(resolver.as_ref(), ctx);
            }
        }
        tracing::debug!(input, "no resolver matched");
        ResultCollection::new()
    }

    /// Scan-all mode: every text resolver runs; faults stay with the
    /// resolver that raised them.
    pub fn scan_all(&self, text: &str) -> ResultCollection {
        let mut out = ResultCollection::new();
        for resolver in &self.text_resolvers {
            out.merge(dispatch_one(resolver.as_ref(), text));
        }
        out
    }
}

/// Run one resolver on `input` and fold its outcome into a collection:
/// candidates and recognized-invalid errors are kept, transient and
/// configuration faults are logged and dropped.
pub fn dispatch_one(resolver: &dyn Resolver, input: &str) -> ResultCollection {
    if !resolver.is_available() {
        return ResultCollection::new();
    }
    match resolver.can_handle(input) {
        Some(ctx) => run_matched(resolver, ctx),
        None => ResultCollection::new(),
    }
}

fn run_matched(resolver: &dyn Resolver, ctx: MatchContext) -> ResultCollection {
    let mut out = ResultCollection::new();
    tracing::debug!(resolver = resolver.id(), short = ctx.short, "dispatching");
    match resolver.resolve(ctx) {
        Ok(candidates) => out.extend_locations(check_variants(resolver, candidates)),
        Err(ResolveFailure::Invalid(e)) => {
            tracing::info!(resolver = resolver.id(), message = %e.message, "input rejected");
            out.add(e);
        }
        Err(ResolveFailure::Transient(detail)) => {
            tracing::warn!(resolver = resolver.id(), %detail, "transient fault, no result");
        }
        Err(ResolveFailure::Configuration(detail)) => {
            tracing::warn!(resolver = resolver.id(), %detail, "resolver misconfigured, no result");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::contract::testing::{Behavior, FakeResolver};

    fn fake(id: &'static str, needle: &'static str, behavior: Behavior) -> Arc<FakeResolver> {
        Arc::new(FakeResolver::new(id, needle, behavior))
    }

    #[test]
    fn test_first_match_order() {
        let a = fake("a", "maps", Behavior::Emit(vec![(1.0, 1.0)]));
        let b = fake("b", "maps", Behavior::Emit(vec![(2.0, 2.0)]));

        let registry = ResolverRegistry::new().with_url(a.clone()).with_url(b.clone());
        let out = registry.first_match("https://maps.example");
        assert_eq!(out.primary().unwrap().resolver(), "a");
        assert_eq!((a.calls(), b.calls()), (1, 0));

        let swapped = ResolverRegistry::new().with_url(b.clone()).with_url(a.clone());
        let out = swapped.first_match("https://maps.example");
        assert_eq!(out.primary().unwrap().resolver(), "b");
        assert_eq!((a.calls(), b.calls()), (1, 1));
    }

    #[test]
    fn test_first_match_stops_even_when_empty() {
        let a = fake("a", "maps", Behavior::Emit(vec![]));
        let b = fake("b", "maps", Behavior::Emit(vec![(2.0, 2.0)]));
        let registry = ResolverRegistry::new().with_url(a).with_url(b.clone());
        assert!(registry.first_match("maps").is_empty());
        assert_eq!(b.calls(), 0);
    }

    #[test]
    fn test_first_match_emits_several() {
        let a = fake("a", "x", Behavior::Emit(vec![(1.0, 1.0), (2.0, 2.0)]));
        let registry = ResolverRegistry::new().with_url(a);
        assert_eq!(registry.first_match("x").location_count(), 2);
    }

    #[test]
    fn test_invalid_is_visible() {
        let a = fake("a", "x", Behavior::Invalid("Place id 42 does not exist"));
        let out = ResolverRegistry::new().with_url(a).first_match("x");
        let errors: Vec<_> = out.errors().collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Place id 42 does not exist");
    }

    #[test]
    fn test_transient_and_configuration_are_silent() {
        let t = fake("t", "x", Behavior::Transient);
        assert!(ResolverRegistry::new().with_url(t).first_match("x").is_empty());
        let c = fake("c", "x", Behavior::Configuration);
        assert!(ResolverRegistry::new().with_url(c).first_match("x").is_empty());
    }

    #[test]
    fn test_unavailable_is_skipped() {
        let mut off = FakeResolver::new("off", "x", Behavior::Emit(vec![(1.0, 1.0)]));
        off.available = false;
        let on = fake("on", "x", Behavior::Emit(vec![(2.0, 2.0)]));
        let registry = ResolverRegistry::new().with_url(Arc::new(off)).with_url(on);
        assert_eq!(registry.first_match("x").primary().unwrap().resolver(), "on");
    }

    #[test]
    fn test_scan_all_isolates_errors() {
        let bad = fake("bad", "", Behavior::Invalid("Coordinates out of range"));
        let broken = fake("broken", "", Behavior::Transient);
        let good = fake("good", "", Behavior::Emit(vec![(50.0, 14.0)]));
        let registry = ResolverRegistry::new().with_text(bad).with_text(broken).with_text(good);

        let out = registry.scan_all("some text");
        assert_eq!(out.len(), 2);
        assert_eq!(out.errors().count(), 1);
        assert_eq!(out.primary().unwrap().resolver(), "good");
    }

    #[test]
    fn test_get_and_all() {
        let a = fake("a", "x", Behavior::Transient);
        let b = fake("b", "y", Behavior::Transient);
        let registry = ResolverRegistry::new()
            .with_url(a.clone())
            .with_text(b)
            .with_text(a);
        assert_eq!(registry.get("b").unwrap().id(), "b");
        assert!(registry.get("zzz").is_none());
        let ids: Vec<_> = registry.all().iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
