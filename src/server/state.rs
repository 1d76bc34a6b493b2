use crate::config::Settings;
use crate::providers::{Enrichers, OsmStaticMap, StaticMapRenderer};
use crate::resolve::MessageResolutionService;
use std::sync::Arc;

pub struct AppState {
    pub service: MessageResolutionService,
    pub enrichers: Enrichers,
    pub maps: Arc<dyn StaticMapRenderer>,
}

impl AppState {
    pub fn from_settings(settings: Settings) -> Self {
        Self {
            enrichers: Enrichers::from_settings(&settings),
            maps: Arc::new(OsmStaticMap::new(&settings)),
            service: crate::build_service(settings),
        }
    }
}
