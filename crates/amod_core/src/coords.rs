//! Coordinate types and fixed-precision lookup keys.
//!
//! Lookup tables are keyed by coordinates rounded to [`LATLNG_PRECISION`]
//! decimal places. Rounding happens once, at key construction, by scaling to
//! integers so the keys are `Eq + Hash` and the precision used for table
//! construction and lookup can never drift apart.

use serde::{Deserialize, Serialize};

/// Decimal places at which coordinates are rounded for table keys.
/// Four decimal places is roughly 11m of latitude, below link length.
pub const LATLNG_PRECISION: u32 = 4;

/// Scale factor corresponding to [`LATLNG_PRECISION`].
const KEY_SCALE: f64 = 10_000.0;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A geographic coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub lng: f64,
    pub lat: f64,
}

impl Coord {
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    /// Integer key of this coordinate at the fixed rounding precision.
    fn key(self) -> (i64, i64) {
        (
            (self.lng * KEY_SCALE).round() as i64,
            (self.lat * KEY_SCALE).round() as i64,
        )
    }
}

/// Rounded origin-destination key for the distance/duration tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OdKey {
    origin: (i64, i64),
    destination: (i64, i64),
}

impl OdKey {
    pub fn new(origin: Coord, destination: Coord) -> Self {
        Self {
            origin: origin.key(),
            destination: destination.key(),
        }
    }
}

/// Rounded (start, end) key for the per-link congestion table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkKey {
    start: (i64, i64),
    end: (i64, i64),
}

impl LinkKey {
    pub fn new(start: Coord, end: Coord) -> Self {
        Self {
            start: start.key(),
            end: end.key(),
        }
    }

    /// True when start and end round to the same point. Zero-length links are
    /// excluded from the unmatched-key histogram.
    pub fn is_zero_length(&self) -> bool {
        self.start == self.end
    }

    /// The rounded endpoints back in decimal degrees, as
    /// `(start_lng, start_lat, end_lng, end_lat)`.
    pub fn to_degrees(&self) -> (f64, f64, f64, f64) {
        (
            self.start.0 as f64 / KEY_SCALE,
            self.start.1 as f64 / KEY_SCALE,
            self.end.0 as f64 / KEY_SCALE,
            self.end.1 as f64 / KEY_SCALE,
        )
    }
}

/// Closed-form distance approximation used when the road network is disabled.
///
/// Equirectangular projection around the mean latitude:
/// `R * 2π/360 * sqrt((cos((olat+dlat)·π/360)·(olng−dlng))² + (olat−dlat)²)`.
/// Adequate at city scale, where the routing engine would otherwise be asked
/// for distances of a few kilometers.
pub fn equirectangular_distance_m(origin: Coord, destination: Coord) -> f64 {
    let x = ((origin.lat + destination.lat) * std::f64::consts::PI / 360.0).cos()
        * (origin.lng - destination.lng);
    let y = origin.lat - destination.lat;
    EARTH_RADIUS_M * 2.0 * std::f64::consts::PI / 360.0 * (x * x + y * y).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn keys_round_to_four_decimals() {
        let a = Coord::new(-0.123449, 51.500051);
        let b = Coord::new(-0.12345, 51.50005);
        assert_eq!(
            OdKey::new(a, Coord::new(0.1, 51.4)),
            OdKey::new(b, Coord::new(0.1, 51.4))
        );
    }

    #[test]
    fn keys_differ_past_the_rounding_precision() {
        let a = Coord::new(-0.1234, 51.5000);
        let b = Coord::new(-0.1235, 51.5000);
        let dest = Coord::new(0.1, 51.4);
        assert_ne!(OdKey::new(a, dest), OdKey::new(b, dest));
    }

    #[test]
    fn zero_length_link_detected() {
        let p = Coord::new(-0.1, 51.5);
        let q = Coord::new(-0.100004, 51.500004);
        assert!(LinkKey::new(p, q).is_zero_length());
        assert!(!LinkKey::new(p, Coord::new(-0.2, 51.5)).is_zero_length());
    }

    #[test]
    fn link_key_round_trips_to_degrees() {
        let key = LinkKey::new(Coord::new(-0.1234, 51.5), Coord::new(0.0456, 51.42));
        let (slng, slat, elng, elat) = key.to_degrees();
        assert_relative_eq!(slng, -0.1234, epsilon = 1e-9);
        assert_relative_eq!(slat, 51.5, epsilon = 1e-9);
        assert_relative_eq!(elng, 0.0456, epsilon = 1e-9);
        assert_relative_eq!(elat, 51.42, epsilon = 1e-9);
    }

    #[test]
    fn equirectangular_distance_matches_one_degree_of_latitude() {
        // One degree of latitude is ~111.19 km regardless of longitude.
        let d = equirectangular_distance_m(Coord::new(0.0, 51.0), Coord::new(0.0, 52.0));
        assert_relative_eq!(d, 111_194.9, epsilon = 100.0);
    }

    #[test]
    fn equirectangular_distance_is_symmetric_and_zero_at_identity() {
        let a = Coord::new(-0.02, 51.29);
        let b = Coord::new(0.18, 51.44);
        assert_eq!(
            equirectangular_distance_m(a, b),
            equirectangular_distance_m(b, a)
        );
        assert_eq!(equirectangular_distance_m(a, a), 0.0);
    }
}
