//! Great-circle distance and GPS confidence.

use crate::error::PaymentError;
use serde::{Deserialize, Serialize};

pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// A validated latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinates", into = "RawCoordinates")]
pub struct Coordinates {
    lat: f64,
    lon: f64,
}

#[derive(Serialize, Deserialize)]
struct RawCoordinates {
    lat: f64,
    lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Result<Self, PaymentError> {
        if !lat.is_finite() || !lon.is_finite() {
            return Err(PaymentError::InvalidCoordinate(format!(
                "non-finite coordinate ({lat}, {lon})"
            )));
        }
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(PaymentError::InvalidCoordinate(format!(
                "coordinate ({lat}, {lon}) out of range"
            )));
        }
        Ok(Self { lat, lon })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }
}

impl TryFrom<RawCoordinates> for Coordinates {
    type Error = PaymentError;

    fn try_from(raw: RawCoordinates) -> Result<Self, Self::Error> {
        Self::new(raw.lat, raw.lon)
    }
}

impl From<Coordinates> for RawCoordinates {
    fn from(c: Coordinates) -> Self {
        Self {
            lat: c.lat,
            lon: c.lon,
        }
    }
}

/// Haversine distance between two points, rounded to the nearest meter.
pub fn distance_meters(a: Coordinates, b: Coordinates) -> u32 {
    let phi_a = a.lat.to_radians();
    let phi_b = b.lat.to_radians();
    let d_phi = (b.lat - a.lat).to_radians();
    let d_lambda = (b.lon - a.lon).to_radians();

    let h = (d_phi / 2.0).sin().powi(2)
        + phi_a.cos() * phi_b.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).max(0.0).sqrt());

    (EARTH_RADIUS_METERS * c).round() as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

pub fn confidence_level(distance_meters: u32, threshold_meters: u32) -> Confidence {
    if distance_meters < threshold_meters {
        Confidence::High
    } else if distance_meters < threshold_meters.saturating_mul(2) {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(lat: f64, lon: f64) -> Coordinates {
        Coordinates::new(lat, lon).unwrap()
    }

    #[test]
    fn test_zero_distance() {
        let nairobi = at(-1.286389, 36.817223);
        assert_eq!(distance_meters(nairobi, nairobi), 0);
    }

    #[test]
    fn test_distance_symmetry() {
        let points = [
            at(-1.286389, 36.817223),
            at(-1.292066, 36.821945),
            at(51.5007, -0.1246),
            at(40.6892, -74.0445),
            at(0.0, 179.9),
            at(0.0, -179.9),
        ];
        for a in points {
            for b in points {
                assert_eq!(distance_meters(a, b), distance_meters(b, a));
            }
        }
    }

    #[test]
    fn test_known_distances() {
        // one degree of latitude on a 6371 km sphere
        assert_eq!(distance_meters(at(0.0, 0.0), at(1.0, 0.0)), 111_195);
        // across the antimeridian is short, not half the planet
        assert_eq!(distance_meters(at(0.0, 179.9), at(0.0, -179.9)), 22_239);
    }

    #[test]
    fn test_rejects_invalid_coordinates() {
        assert!(matches!(
            Coordinates::new(f64::NAN, 0.0),
            Err(PaymentError::InvalidCoordinate(_))
        ));
        assert!(matches!(
            Coordinates::new(0.0, f64::INFINITY),
            Err(PaymentError::InvalidCoordinate(_))
        ));
        assert!(Coordinates::new(90.5, 0.0).is_err());
        assert!(Coordinates::new(0.0, -180.5).is_err());
    }

    #[test]
    fn test_confidence_levels() {
        assert_eq!(confidence_level(0, 100), Confidence::High);
        assert_eq!(confidence_level(99, 100), Confidence::High);
        assert_eq!(confidence_level(100, 100), Confidence::Medium);
        assert_eq!(confidence_level(199, 100), Confidence::Medium);
        assert_eq!(confidence_level(200, 100), Confidence::Low);
    }
}
