use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::geo::{format_coords, Coordinate};
use crate::providers::MapImage;
use crate::resolve::{find_links, LinkSpan, ResolveOptions, ResultCollection};

use super::state::AppState;

// ─── Error response ──────────────────────────────────────────────

#[derive(Serialize)]
struct ApiErrorBody {
    error: String,
    code: u16,
}

#[derive(Debug)]
pub(super) struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.1,
            code: self.0.as_u16(),
        };
        (self.0, Json(body)).into_response()
    }
}

fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    ApiError(status, msg.into())
}

// ─── Shared response ─────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ResolveResponse {
    pub results: ResultCollection,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary: Option<String>,
    pub rendered: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map: Option<MapImage>,
}

/// Enrichment and map rendering may block on the network, so both run on the
/// blocking pool.
async fn finish(state: &Arc<AppState>, results: ResultCollection, enrich: bool) -> Result<ResolveResponse, ApiError> {
    let state = state.clone();
    tokio::task::spawn_blocking(move || {
        if enrich {
            for candidate in results.locations() {
                candidate.enrich(&state.enrichers);
            }
        }

        let points: Vec<Coordinate> = results.locations().map(|c| *c.coordinate()).collect();
        let map = if points.is_empty() {
            None
        } else {
            state
                .maps
                .render(&points)
                .map_err(|e| tracing::debug!(error = %e, "static map unavailable"))
                .ok()
        };

        ResolveResponse {
            primary: results.primary().map(|c| c.canonical_key()),
            rendered: results.locations().map(|c| c.render()).collect(),
            map,
            results,
        }
    })
    .await
    .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("Enrichment failed: {}", e)))
}

fn options(state: &AppState, filter: Option<f64>) -> Result<ResolveOptions, ApiError> {
    if let Some(f) = filter {
        if !f.is_finite() || f < 0.0 {
            return Err(api_error(StatusCode::BAD_REQUEST, "'filter' must be a non-negative number of meters"));
        }
    }
    Ok(ResolveOptions {
        proximity_threshold_m: filter.or(state.service.settings().proximity_threshold_m),
    })
}

fn log_request(route: &str, input: &str, response: &ResolveResponse, start: Instant) {
    tracing::info!(
        route,
        input_len = input.len(),
        locations = response.results.location_count(),
        errors = response.results.errors().count(),
        elapsed_ms = format!("{:.1}", start.elapsed().as_secs_f64() * 1000.0),
        "request served"
    );
}

// ─── GET/POST /api/resolve ───────────────────────────────────────

#[derive(Deserialize)]
pub struct ResolveQuery {
    pub text: Option<String>,
    pub filter: Option<f64>,
    pub enrich: Option<bool>,
}

#[derive(Deserialize)]
pub struct ResolveRequest {
    pub text: String,
    /// Pre-identified link spans; discovered from the text when absent.
    pub spans: Option<Vec<LinkSpan>>,
    pub filter: Option<f64>,
    #[serde(default)]
    pub enrich: bool,
}

pub async fn resolve_get(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ResolveQuery>,
) -> Result<Json<ResolveResponse>, ApiError> {
    let start = Instant::now();

    let text = params.text.as_deref().unwrap_or("");
    if text.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Missing 'text' parameter"));
    }
    let opts = options(&state, params.filter)?;

    let results = state.service.resolve_message_with(text, &find_links(text), &opts).await;
    let response = finish(&state, results, params.enrich.unwrap_or(false)).await?;

    log_request("GET /api/resolve", text, &response, start);
    Ok(Json(response))
}

pub async fn resolve_post(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ResolveRequest>,
) -> Result<Json<ResolveResponse>, ApiError> {
    let start = Instant::now();

    if body.text.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Field 'text' is empty"));
    }
    let opts = options(&state, body.filter)?;
    let spans = body.spans.unwrap_or_else(|| find_links(&body.text));

    let results = state.service.resolve_message_with(&body.text, &spans, &opts).await;
    let response = finish(&state, results, body.enrich).await?;

    log_request("POST /api/resolve", &body.text, &response, start);
    Ok(Json(response))
}

// ─── GET /api/single ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct SingleQuery {
    pub input: Option<String>,
    pub filter: Option<f64>,
    pub enrich: Option<bool>,
}

pub async fn resolve_single(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SingleQuery>,
) -> Result<Json<ResolveResponse>, ApiError> {
    let start = Instant::now();

    let input = params.input.as_deref().unwrap_or("").trim();
    if input.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Missing 'input' parameter"));
    }
    let opts = options(&state, params.filter)?;

    let results = state.service.resolve_single_with(input, &opts).await;
    let response = finish(&state, results, params.enrich.unwrap_or(false)).await?;

    log_request("GET /api/single", input, &response, start);
    Ok(Json(response))
}

// ─── GET /api/share ──────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ShareQuery {
    pub resolver: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ShareResponse {
    pub resolver: String,
    pub coords: String,
    pub formatted_coords: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drive_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_text: Option<String>,
}

pub async fn share(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ShareQuery>,
) -> Result<Json<ShareResponse>, ApiError> {
    let (Some(lat), Some(lon)) = (params.lat, params.lon) else {
        return Err(api_error(StatusCode::BAD_REQUEST, "Provide 'lat' and 'lon' parameters"));
    };
    let coord = Coordinate::new(lat, lon).map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    let id = params.resolver.as_deref().unwrap_or("");
    let resolver = state
        .service
        .registry()
        .get(id)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Unknown resolver '{}'", id)))?;

    tracing::info!(route = "GET /api/share", resolver = id, coords = %coord, "request served");

    Ok(Json(ShareResponse {
        resolver: resolver.id().to_string(),
        coords: coord.to_string(),
        formatted_coords: format_coords(coord.lat(), coord.lon()),
        share_link: resolver.share_link(&coord).ok(),
        drive_link: resolver.drive_link(&coord).ok(),
        share_text: resolver.share_text(&coord).ok(),
    }))
}

// ─── GET /api/resolvers ──────────────────────────────────────────

#[derive(Serialize)]
pub struct ResolverInfo {
    pub id: &'static str,
    pub label: String,
    pub variants: &'static [&'static str],
    pub available: bool,
    pub modes: Vec<&'static str>,
}

pub async fn resolver_list(State(state): State<Arc<AppState>>) -> Json<Vec<ResolverInfo>> {
    let registry = state.service.registry();
    let in_list = |list: &[Arc<dyn crate::resolve::Resolver>], id: &str| list.iter().any(|r| r.id() == id);

    let infos = registry
        .all()
        .into_iter()
        .map(|r| {
            let mut modes = Vec::new();
            if in_list(registry.url_resolvers(), r.id()) {
                modes.push("first_match");
            }
            if in_list(registry.text_resolvers(), r.id()) {
                modes.push("scan_all");
            }
            ResolverInfo {
                id: r.id(),
                label: r.label().to_string(),
                variants: r.variants(),
                available: r.is_available(),
                modes,
            }
        })
        .collect();
    Json(infos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    fn state() -> Arc<AppState> {
        let settings = Settings { offline: true, ..Settings::default() };
        Arc::new(AppState::from_settings(settings))
    }

    #[tokio::test]
    async fn test_resolve_get() {
        let params = ResolveQuery {
            text: Some("Here: https://maps.example/?ll=50.087451,14.420671".into()),
            filter: None,
            enrich: Some(true),
        };
        let Json(resp) = resolve_get(State(state()), Query(params)).await.unwrap();
        assert_eq!(resp.primary.as_deref(), Some("50.087451,14.420671"));
        assert_eq!(resp.results.len(), 1);
        let map = resp.map.unwrap();
        assert_eq!(map.key, "50.087451,14.420671");

        let primary = serde_json::to_value(resp.results.primary().unwrap()).unwrap();
        assert_eq!(primary["timezone"]["name"], "Europe/Paris");
        assert!(primary["address"].is_null());
    }

    #[tokio::test]
    async fn test_resolve_get_missing_text() {
        let params = ResolveQuery { text: Some("  ".into()), filter: None, enrich: None };
        let err = resolve_get(State(state()), Query(params)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_resolve_post_with_spans_and_filter() {
        let text = "a https://www.openstreetmap.org/?mlat=50.087451&mlon=14.420671 b 50.087452, 14.420672 c";
        let start = text.find("https").unwrap();
        let end = text.find(" b ").unwrap();
        let body = ResolveRequest {
            text: text.into(),
            spans: Some(vec![LinkSpan::new(start, end)]),
            filter: Some(50.0),
            enrich: false,
        };
        let Json(resp) = resolve_post(State(state()), Json(body)).await.unwrap();
        let ids: Vec<_> = resp.results.locations().map(|c| c.resolver()).collect();
        assert_eq!(ids, vec!["osm"]);
        assert!(resp.rendered[0].starts_with("[OpenStreetMap](https://www.openstreetmap.org/"));
    }

    #[tokio::test]
    async fn test_negative_filter_rejected() {
        let params = ResolveQuery { text: Some("1.234567, 2.345678".into()), filter: Some(-1.0), enrich: None };
        let err = resolve_get(State(state()), Query(params)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_single_falls_back_to_text() {
        let params = SingleQuery { input: Some(" 50.087451°N, 14.420671°E ".into()), filter: None, enrich: None };
        let Json(resp) = resolve_single(State(state()), Query(params)).await.unwrap();
        assert_eq!(resp.results.primary().unwrap().resolver(), "coords");
    }

    #[tokio::test]
    async fn test_share() {
        let params = ShareQuery { resolver: Some("google".into()), lat: Some(50.087451), lon: Some(14.420671) };
        let Json(resp) = share(State(state()), Query(params)).await.unwrap();
        assert_eq!(resp.coords, "50.087451,14.420671");
        assert!(resp.share_link.unwrap().contains("query=50.087451,14.420671"));
        assert!(resp.share_text.is_none());

        let params = ShareQuery { resolver: Some("nope".into()), lat: Some(1.0), lon: Some(1.0) };
        assert_eq!(share(State(state()), Query(params)).await.unwrap_err().0, StatusCode::NOT_FOUND);

        let params = ShareQuery { resolver: Some("osm".into()), lat: Some(91.0), lon: Some(1.0) };
        assert_eq!(share(State(state()), Query(params)).await.unwrap_err().0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_resolver_list() {
        let Json(list) = resolver_list(State(state())).await;
        let geo = list.iter().find(|r| r.id == "geo").unwrap();
        assert_eq!(geo.modes, vec!["first_match", "scan_all"]);
        assert_eq!(list.len(), 6);
    }
}
