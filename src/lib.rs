//! Recognize coordinates in map links and free text, normalize them into
//! [`candidate::LocationCandidate`]s, and deduplicate and filter the results.

pub mod adapters;
pub mod candidate;
pub mod config;
pub mod geo;
pub mod providers;
pub mod resolve;
pub mod server;

use config::Settings;
use providers::{HttpShortLinkResolver, NoRedirects, ShortLinkResolver};
use resolve::MessageResolutionService;
use std::sync::Arc;

/// Wire the default registry and the short-link follower for `settings`.
pub fn build_service(settings: Settings) -> MessageResolutionService {
    let follower: Arc<dyn ShortLinkResolver> = if settings.offline {
        Arc::new(NoRedirects)
    } else {
        Arc::new(HttpShortLinkResolver::new(&settings))
    };
    let registry = adapters::default_registry(follower.clone());
    MessageResolutionService::new(Arc::new(registry), follower, settings)
}
