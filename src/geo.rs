//! Validated coordinates, the canonical dedup key, and great-circle distance.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Mean earth radius used for haversine distances.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Decimal digits kept by the canonical key (~0.11 m at the equator).
pub const KEY_PRECISION: i32 = 6;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoordinateError {
    #[error("Invalid coordinate {lat},{lon}. Lat: -90..90, Lon: -180..180")]
    InvalidCoordinate { lat: f64, lon: f64 },
    #[error("Malformed coordinate key '{0}'")]
    MalformedKey(String),
}

/// A WGS84 point. Construction is the only place range checks happen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate {
    lat: f64,
    lon: f64,
}

#[derive(Deserialize)]
struct RawCoordinate {
    lat: f64,
    lon: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = CoordinateError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Coordinate::new(raw.lat, raw.lon)
    }
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Result<Self, CoordinateError> {
        let valid = lat.is_finite()
            && lon.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lon);
        if !valid {
            return Err(CoordinateError::InvalidCoordinate { lat, lon });
        }
        Ok(Self { lat, lon })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    /// Identity used for deduplication: both axes rounded to six decimals.
    pub fn canonical_key(&self) -> String {
        format!(
            "{:.prec$},{:.prec$}",
            round_key(self.lat),
            round_key(self.lon),
            prec = KEY_PRECISION as usize
        )
    }

    /// Parse a key produced by [`Coordinate::canonical_key`].
    pub fn from_canonical_key(key: &str) -> Result<Self, CoordinateError> {
        let malformed = || CoordinateError::MalformedKey(key.to_string());
        let (lat, lon) = key.split_once(',').ok_or_else(malformed)?;
        let lat: f64 = lat.trim().parse().map_err(|_| malformed())?;
        let lon: f64 = lon.trim().parse().map_err(|_| malformed())?;
        Self::new(lat, lon)
    }

    /// Haversine great-circle distance in meters.
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lon = (other.lon - self.lon).to_radians();
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().min(1.0).asin();
        EARTH_RADIUS_M * c
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.lat, self.lon)
    }
}

fn round_key(v: f64) -> f64 {
    let scale = 10f64.powi(KEY_PRECISION);
    let r = (v * scale).round() / scale;
    // "-0.000000" and "0.000000" must collapse to one key
    if r == 0.0 {
        0.0
    } else {
        r
    }
}

/// Human readable form, e.g. `50.087451°N, 14.420671°E`.
pub fn format_coords(lat: f64, lon: f64) -> String {
    let ns = if lat >= 0.0 { 'N' } else { 'S' };
    let ew = if lon >= 0.0 { 'E' } else { 'W' };
    format!("{:.6}\u{00B0}{}, {:.6}\u{00B0}{}", lat.abs(), ns, lon.abs(), ew)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_valid_bounds() {
        assert!(Coordinate::new(90.0, 180.0).is_ok());
        assert!(Coordinate::new(-90.0, -180.0).is_ok());
        assert!(Coordinate::new(0.0, 0.0).is_ok());
    }

    #[test]
    fn test_out_of_range() {
        assert_eq!(
            Coordinate::new(90.000001, 0.0),
            Err(CoordinateError::InvalidCoordinate { lat: 90.000001, lon: 0.0 })
        );
        assert!(Coordinate::new(0.0, -180.5).is_err());
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
        assert!(Coordinate::new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_canonical_key_rounding() {
        let c = Coordinate::new(50.0874514, 14.4206706).unwrap();
        assert_eq!(c.canonical_key(), "50.087451,14.420671");
    }

    #[test]
    fn test_canonical_key_negative_zero() {
        let a = Coordinate::new(-0.0000001, 0.0).unwrap();
        let b = Coordinate::new(0.0, -0.0).unwrap();
        assert_eq!(a.canonical_key(), "0.000000,0.000000");
        assert_eq!(a.canonical_key(), b.canonical_key());
    }

    #[test]
    fn test_malformed_key() {
        assert!(matches!(
            Coordinate::from_canonical_key("abc"),
            Err(CoordinateError::MalformedKey(_))
        ));
        assert!(matches!(
            Coordinate::from_canonical_key("95.0,1.0"),
            Err(CoordinateError::InvalidCoordinate { .. })
        ));
    }

    #[test]
    fn test_distance_same_point() {
        let p = Coordinate::new(50.087451, 14.420671).unwrap();
        assert_eq!(p.distance_to(&p), 0.0);
    }

    #[test]
    fn test_distance_prague_brno() {
        let prague = Coordinate::new(50.0755, 14.4378).unwrap();
        let brno = Coordinate::new(49.1951, 16.6068).unwrap();
        let d = prague.distance_to(&brno);
        assert_relative_eq!(d, 184_300.0, max_relative = 0.01);
        assert_relative_eq!(d, brno.distance_to(&prague), epsilon = 1e-6);
    }

    #[test]
    fn test_distance_antipodal() {
        let a = Coordinate::new(0.0, 0.0).unwrap();
        let b = Coordinate::new(0.0, 180.0).unwrap();
        assert_relative_eq!(a.distance_to(&b), std::f64::consts::PI * EARTH_RADIUS_M, max_relative = 1e-9);
    }

    #[test]
    fn test_format_coords() {
        assert_eq!(format_coords(50.087451, 14.420671), "50.087451°N, 14.420671°E");
        assert_eq!(format_coords(-33.8688, -70.5), "33.868800°S, 70.500000°W");
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Result<Coordinate, _> = serde_json::from_str(r#"{"lat": 10.5, "lon": 20.25}"#);
        assert_eq!(ok.unwrap().lat(), 10.5);
        let bad: Result<Coordinate, _> = serde_json::from_str(r#"{"lat": 100.0, "lon": 0.0}"#);
        assert!(bad.is_err());
    }

    proptest! {
        #[test]
        fn key_round_trip(lat_u in -90_000_000i64..=90_000_000, lon_u in -180_000_000i64..=180_000_000) {
            let lat = lat_u as f64 / 1e6;
            let lon = lon_u as f64 / 1e6;
            let c = Coordinate::new(lat, lon).unwrap();
            let back = Coordinate::from_canonical_key(&c.canonical_key()).unwrap();
            prop_assert_eq!(back.canonical_key(), c.canonical_key());
            prop_assert!((back.lat() - lat).abs() < 1e-9);
            prop_assert!((back.lon() - lon).abs() < 1e-9);
        }

        #[test]
        fn any_in_range_is_valid(lat in -90.0f64..=90.0, lon in -180.0f64..=180.0) {
            prop_assert!(Coordinate::new(lat, lon).is_ok());
        }

        #[test]
        fn out_of_range_lat_rejected(lat in 90.0000001f64..1e6, lon in -180.0f64..=180.0) {
            let rejected = matches!(Coordinate::new(lat, lon), Err(CoordinateError::InvalidCoordinate { .. }));
            prop_assert!(rejected);
            let rejected = matches!(Coordinate::new(-lat, lon), Err(CoordinateError::InvalidCoordinate { .. }));
            prop_assert!(rejected);
        }
    }
}
