//! Network-backed collaborators: redirect following, Nominatim reverse
//! geocoding, timeapi.io zones, and open-meteo elevation.

use super::{ElevationProvider, ProviderError, ReverseGeocoder, ShortLinkResolver, TimezoneInfo, TimezoneLookup};
use crate::config::Settings;
use crate::geo::Coordinate;
use serde::Deserialize;
use url::Url;

fn agent(settings: &Settings, redirects: u32) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout(settings.http_timeout())
        .user_agent(&settings.user_agent)
        .redirects(redirects)
        .build()
}

fn endpoint(base: &str, path: &str, params: &[(&str, String)]) -> Result<Url, ProviderError> {
    let joined = format!("{}{}", base.trim_end_matches('/'), path);
    Url::parse_with_params(&joined, params).map_err(|e| ProviderError::InvalidResponse(e.to_string()))
}

fn get_json(agent: &ureq::Agent, url: &Url) -> Result<serde_json::Value, ProviderError> {
    let response = agent.get(url.as_str()).call().map_err(|e| match e {
        ureq::Error::Status(404, _) => ProviderError::NotFound(url.to_string()),
        other => ProviderError::Network(other.to_string()),
    })?;
    response
        .into_json()
        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
}

// ─── Redirects ───────────────────────────────────────────────────

/// Follows `Location` headers hop by hop, without letting the HTTP client do
/// it, so the intermediate targets stay visible in the logs.
pub struct HttpShortLinkResolver {
    agent: ureq::Agent,
    max_hops: usize,
}

impl HttpShortLinkResolver {
    pub fn new(settings: &Settings) -> Self {
        Self {
            agent: agent(settings, 0),
            max_hops: settings.max_redirect_hops.max(1),
        }
    }
}

impl ShortLinkResolver for HttpShortLinkResolver {
    fn follow(&self, url: &str) -> Result<String, ProviderError> {
        let mut current = Url::parse(url).map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        for hop in 0..self.max_hops {
            let response = match self.agent.head(current.as_str()).call() {
                Ok(r) => r,
                Err(ureq::Error::Status(404, _)) | Err(ureq::Error::Status(410, _)) => {
                    return Err(ProviderError::NotFound(current.to_string()));
                }
                Err(e) => return Err(ProviderError::Network(e.to_string())),
            };

            if !(300..400).contains(&response.status()) {
                break;
            }
            let Some(location) = response.header("location") else {
                break;
            };
            let next = next_location(&current, location)?;
            tracing::debug!(hop, from = %current, to = %next, "followed redirect");
            current = next;
        }

        Ok(current.to_string())
    }
}

/// Resolve a possibly relative `Location` header against the current URL.
fn next_location(current: &Url, location: &str) -> Result<Url, ProviderError> {
    current
        .join(location.trim())
        .map_err(|e| ProviderError::InvalidResponse(format!("bad Location '{}': {}", location, e)))
}

// ─── Nominatim ───────────────────────────────────────────────────

pub struct NominatimGeocoder {
    agent: ureq::Agent,
    base: String,
}

impl NominatimGeocoder {
    pub fn new(settings: &Settings) -> Self {
        Self {
            agent: agent(settings, 3),
            base: settings.nominatim_url.clone(),
        }
    }
}

#[derive(Deserialize)]
struct NominatimReverse {
    display_name: Option<String>,
    error: Option<String>,
}

fn parse_nominatim(value: serde_json::Value, lat: f64, lon: f64) -> Result<String, ProviderError> {
    let r: NominatimReverse =
        serde_json::from_value(value).map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
    match (r.display_name, r.error) {
        (Some(name), _) if !name.trim().is_empty() => Ok(name),
        (_, Some(err)) => Err(ProviderError::NotFound(format!("{},{}: {}", lat, lon, err))),
        _ => Err(ProviderError::InvalidResponse("no display_name".into())),
    }
}

impl ReverseGeocoder for NominatimGeocoder {
    fn reverse(&self, lat: f64, lon: f64) -> Result<String, ProviderError> {
        let url = endpoint(
            &self.base,
            "/reverse",
            &[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("format", "json".into()),
                ("zoom", "18".into()),
            ],
        )?;
        parse_nominatim(get_json(&self.agent, &url)?, lat, lon)
    }
}

// ─── timeapi.io ──────────────────────────────────────────────────

pub struct TimeApiLookup {
    agent: ureq::Agent,
    base: String,
}

impl TimeApiLookup {
    pub fn new(settings: &Settings) -> Self {
        Self {
            agent: agent(settings, 3),
            base: settings.timeapi_url.clone(),
        }
    }
}

fn parse_timeapi(value: &serde_json::Value) -> Result<TimezoneInfo, ProviderError> {
    value
        .get("timeZone")
        .and_then(|v| v.as_str())
        .map(TimezoneInfo::from_name)
        .ok_or_else(|| ProviderError::InvalidResponse("no timeZone field".into()))
}

impl TimezoneLookup for TimeApiLookup {
    fn lookup(&self, lat: f64, lon: f64) -> Result<TimezoneInfo, ProviderError> {
        let url = endpoint(
            &self.base,
            "/api/timezone/coordinate",
            &[("latitude", lat.to_string()), ("longitude", lon.to_string())],
        )?;
        parse_timeapi(&get_json(&self.agent, &url)?)
    }
}

// ─── open-meteo ──────────────────────────────────────────────────

pub struct OpenMeteoElevation {
    agent: ureq::Agent,
    base: String,
}

impl OpenMeteoElevation {
    pub fn new(settings: &Settings) -> Self {
        Self {
            agent: agent(settings, 3),
            base: settings.elevation_url.clone(),
        }
    }
}

#[derive(Deserialize)]
struct ElevationResponse {
    #[serde(default)]
    elevation: Vec<f64>,
}

fn parse_elevation(value: serde_json::Value) -> Result<f64, ProviderError> {
    let r: ElevationResponse =
        serde_json::from_value(value).map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
    r.elevation
        .first()
        .copied()
        .filter(|e| e.is_finite())
        .ok_or_else(|| ProviderError::InvalidResponse("empty elevation list".into()))
}

impl ElevationProvider for OpenMeteoElevation {
    fn fill(&self, coord: &Coordinate) -> Result<f64, ProviderError> {
        let url = endpoint(
            &self.base,
            "/v1/elevation",
            &[("latitude", coord.lat().to_string()), ("longitude", coord.lon().to_string())],
        )?;
        parse_elevation(get_json(&self.agent, &url)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_endpoint_encodes_params() {
        let url = endpoint(
            "https://nominatim.openstreetmap.org/",
            "/reverse",
            &[("lat", "50.1".into()), ("q", "a b&c".into())],
        )
        .unwrap();
        assert_eq!(url.as_str(), "https://nominatim.openstreetmap.org/reverse?lat=50.1&q=a+b%26c");
    }

    #[test]
    fn test_next_location_relative() {
        let cur = Url::parse("https://bit.ly/abc").unwrap();
        let next = next_location(&cur, "/target?x=1").unwrap();
        assert_eq!(next.as_str(), "https://bit.ly/target?x=1");

        let abs = next_location(&cur, "https://www.google.com/maps/@1,2,3z").unwrap();
        assert_eq!(abs.host_str(), Some("www.google.com"));
    }

    #[test]
    fn test_parse_nominatim() {
        let ok = parse_nominatim(json!({"display_name": "Staroměstské náměstí, Praha"}), 50.0, 14.0);
        assert_eq!(ok.unwrap(), "Staroměstské náměstí, Praha");

        let missing = parse_nominatim(json!({"error": "Unable to geocode"}), 0.0, -140.0);
        assert!(matches!(missing, Err(ProviderError::NotFound(_))));

        let empty = parse_nominatim(json!({}), 0.0, 0.0);
        assert!(matches!(empty, Err(ProviderError::InvalidResponse(_))));
    }

    #[test]
    fn test_parse_timeapi() {
        let tz = parse_timeapi(&json!({"timeZone": "Europe/Prague"})).unwrap();
        assert_eq!(tz.name, "Europe/Prague");
        assert!(parse_timeapi(&json!({"zone": "x"})).is_err());
    }

    #[test]
    fn test_parse_elevation() {
        assert_eq!(parse_elevation(json!({"elevation": [243.0]})).unwrap(), 243.0);
        assert!(parse_elevation(json!({"elevation": []})).is_err());
        assert!(parse_elevation(json!({"reason": "bad"})).is_err());
    }
}
