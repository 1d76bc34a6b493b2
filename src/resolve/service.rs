//! Per-message orchestration.
//!
//! Every link dispatch and every scan-all resolver invocation is a unit of
//! work. Units run concurrently on the blocking pool, admitted by a shared
//! semaphore, under one deadline per message. Their results are slotted by
//! unit index, so the merged order (links in span order, then text resolvers
//! in registration order) never depends on which unit finished first.

use super::collection::ResultCollection;
use super::contract::Resolver;
use super::links::{normalize_spans, strip_spans};
use super::registry::{dispatch_one, ResolverRegistry};
use super::types::LinkSpan;
use crate::config::Settings;
use crate::providers::ShortLinkResolver;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use url::Url;

/// Per-call knobs.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Run the proximity filter with this threshold after deduplication.
    pub proximity_threshold_m: Option<f64>,
}

impl ResolveOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self { proximity_threshold_m: settings.proximity_threshold_m }
    }
}

enum Unit {
    Link(String),
    Scan(Arc<dyn Resolver>, Arc<str>),
}

impl Unit {
    fn describe(&self) -> String {
        match self {
            Self::Link(link) => format!("link {}", link),
            Self::Scan(r, _) => format!("text scan by {}", r.id()),
        }
    }

    fn run(self, registry: &ResolverRegistry, follower: &dyn ShortLinkResolver, settings: &Settings) -> ResultCollection {
        match self {
            Self::Link(link) => {
                let link = expand_shortener(&link, follower, settings);
                registry.first_match(&link)
            }
            Self::Scan(resolver, text) => dispatch_one(resolver.as_ref(), &text),
        }
    }
}

/// Follow generic shorteners (bit.ly and friends) before dispatch. A failed
/// expansion keeps the original link.
fn expand_shortener(link: &str, follower: &dyn ShortLinkResolver, settings: &Settings) -> String {
    let is_short = Url::parse(link)
        .ok()
        .and_then(|u| u.host_str().map(|h| settings.is_shortener(h)))
        .unwrap_or(false);
    if !is_short {
        return link.to_string();
    }
    match follower.follow(link) {
        Ok(target) => {
            tracing::debug!(from = link, to = %target, "shortener expanded");
            target
        }
        Err(e) => {
            tracing::warn!(link, error = %e, "shortener not followed");
            link.to_string()
        }
    }
}

#[derive(Clone)]
pub struct MessageResolutionService {
    registry: Arc<ResolverRegistry>,
    follower: Arc<dyn ShortLinkResolver>,
    settings: Arc<Settings>,
    limiter: Arc<Semaphore>,
}

impl MessageResolutionService {
    pub fn new(registry: Arc<ResolverRegistry>, follower: Arc<dyn ShortLinkResolver>, settings: Settings) -> Self {
        let limiter = Arc::new(Semaphore::new(settings.workers.max(1)));
        Self {
            registry,
            follower,
            settings: Arc::new(settings),
            limiter,
        }
    }

    pub fn registry(&self) -> &Arc<ResolverRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Resolve a message with the configured default options.
    pub async fn resolve_message(&self, text: &str, spans: &[LinkSpan]) -> ResultCollection {
        let opts = ResolveOptions::from_settings(&self.settings);
        self.resolve_message_with(text, spans, &opts).await
    }

    pub async fn resolve_message_with(&self, text: &str, spans: &[LinkSpan], opts: &ResolveOptions) -> ResultCollection {
        let deadline = self.deadline_from_now();
        let spans = normalize_spans(text, spans);
        let mut units: Vec<Unit> = spans
            .iter()
            .filter_map(|s| s.slice(text))
            .map(|link| Unit::Link(link.to_string()))
            .collect();

        let remainder: Arc<str> = Arc::from(strip_spans(text, &spans));
        if !remainder.trim().is_empty() {
            units.extend(
                self.registry
                    .text_resolvers()
                    .iter()
                    .map(|r| Unit::Scan(r.clone(), remainder.clone())),
            );
        }

        tracing::debug!(links = spans.len(), units = units.len(), "resolving message");
        let mut merged = ResultCollection::new();
        for part in self.run_units(units, deadline).await {
            merged.merge(part);
        }
        finish(merged, opts)
    }

    /// Single-value entry point (EXIF tag, a typed coordinate pair, one
    /// link): first-match, then scan-all when nothing matched. Both stages
    /// share one deadline.
    pub async fn resolve_single(&self, raw: &str) -> ResultCollection {
        let opts = ResolveOptions::from_settings(&self.settings);
        self.resolve_single_with(raw, &opts).await
    }

    pub async fn resolve_single_with(&self, raw: &str, opts: &ResolveOptions) -> ResultCollection {
        let raw = raw.trim();
        if raw.is_empty() {
            return ResultCollection::new();
        }
        let deadline = self.deadline_from_now();

        let mut merged = ResultCollection::new();
        for part in self.run_units(vec![Unit::Link(raw.to_string())], deadline).await {
            merged.merge(part);
        }
        if merged.is_empty() {
            let text: Arc<str> = Arc::from(raw);
            let units = self
                .registry
                .text_resolvers()
                .iter()
                .map(|r| Unit::Scan(r.clone(), text.clone()))
                .collect();
            for part in self.run_units(units, deadline).await {
                merged.merge(part);
            }
        }
        finish(merged, opts)
    }

    async fn run_units(&self, units: Vec<Unit>, deadline: Instant) -> Vec<ResultCollection> {
        let handles: Vec<_> = units
            .into_iter()
            .map(|unit| {
                let limiter = self.limiter.clone();
                let registry = self.registry.clone();
                let follower = self.follower.clone();
                let settings = self.settings.clone();
                let what = unit.describe();

                let work = async move {
                    let permit = limiter.acquire_owned().await.ok()?;
                    tokio::task::spawn_blocking(move || {
                        let _permit = permit;
                        unit.run(&registry, follower.as_ref(), &settings)
                    })
                    .await
                    .map_err(|e| tracing::warn!(error = %e, "resolution unit panicked"))
                    .ok()
                };

                tokio::spawn(async move {
                    match tokio::time::timeout_at(deadline, work).await {
                        Ok(Some(out)) => out,
                        Ok(None) => ResultCollection::new(),
                        Err(_) => {
                            tracing::warn!(unit = %what, "deadline exceeded, no result");
                            ResultCollection::new()
                        }
                    }
                })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(handle.await.unwrap_or_else(|e| {
                tracing::warn!(error = %e, "resolution task failed");
                ResultCollection::new()
            }));
        }
        results
    }

    fn deadline_from_now(&self) -> Instant {
        Instant::now() + self.settings.deadline()
    }
}

fn finish(mut merged: ResultCollection, opts: &ResolveOptions) -> ResultCollection {
    merged.deduplicate();
    if let Some(threshold) = opts.proximity_threshold_m {
        merged.filter_too_close(threshold);
    }
    merged
}
