//! Geographic types and great-circle calculations

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Mean Earth radius in meters (spherical model)
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Geographic point in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees (-90 to 90)
    pub latitude: f64,
    /// Longitude in degrees (-180 to 180)
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a new point without range checks
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Create a point, rejecting out-of-range coordinates
    pub fn try_new(latitude: f64, longitude: f64) -> CoreResult<Self> {
        let point = Self::new(latitude, longitude);
        point.validate()?;
        Ok(point)
    }

    /// Check if this point is within coordinate range
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }

    /// Return `InvalidCoordinate` unless the point is in range
    pub fn validate(&self) -> CoreResult<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(CoreError::invalid_coordinate(self.latitude, self.longitude))
        }
    }

    /// Haversine distance to another point in meters
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let delta_lat = (other.latitude - self.latitude).to_radians();
        let delta_lng = (other.longitude - self.longitude).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (delta_lng / 2.0).sin().powi(2);
        // Rounding can push `a` a hair above 1.0 for antipodal points
        let c = 2.0 * a.clamp(0.0, 1.0).sqrt().asin();

        EARTH_RADIUS_M * c
    }

    /// Initial great-circle bearing to another point
    /// Returns bearing in degrees [0, 360); 0 when both points coincide
    pub fn bearing_to(&self, other: &GeoPoint) -> f64 {
        if self == other {
            return 0.0;
        }

        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let delta_lng = (other.longitude - self.longitude).to_radians();

        let y = delta_lng.sin() * lat2.cos();
        let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lng.cos();

        let bearing = y.atan2(x).to_degrees().rem_euclid(360.0);
        // rem_euclid can return 360.0 for tiny negative inputs
        if bearing >= 360.0 { 0.0 } else { bearing }
    }

    /// Point reached by travelling `distance_m` along `bearing_deg`
    pub fn destination(&self, distance_m: f64, bearing_deg: f64) -> GeoPoint {
        if distance_m == 0.0 {
            return *self;
        }

        let lat1 = self.latitude.to_radians();
        let lng1 = self.longitude.to_radians();
        let bearing = bearing_deg.to_radians();
        let angular_distance = distance_m / EARTH_RADIUS_M;

        let lat2 = (lat1.sin() * angular_distance.cos()
            + lat1.cos() * angular_distance.sin() * bearing.cos())
        .asin();

        let lng2 = lng1
            + (bearing.sin() * angular_distance.sin() * lat1.cos())
                .atan2(angular_distance.cos() - lat1.sin() * lat2.sin());

        // Normalize longitude back into [-180, 180)
        let lng2 = (lng2.to_degrees() + 540.0).rem_euclid(360.0) - 180.0;

        GeoPoint::new(lat2.to_degrees(), lng2)
    }

    /// Offset by raw degree deltas (used for small fixed-pattern offsets)
    pub fn offset_degrees(&self, d_lat: f64, d_lng: f64) -> GeoPoint {
        GeoPoint::new(
            (self.latitude + d_lat).clamp(-90.0, 90.0),
            self.longitude + d_lng,
        )
    }

    /// Convert to (latitude, longitude) tuple
    pub fn to_tuple(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5}, {:.5}", self.latitude, self.longitude)
    }
}

/// Great-circle distance in meters between two validated points
pub fn distance(a: &GeoPoint, b: &GeoPoint) -> CoreResult<f64> {
    a.validate()?;
    b.validate()?;
    Ok(a.distance_to(b))
}

/// Initial bearing in degrees [0, 360) between two validated points
pub fn bearing(a: &GeoPoint, b: &GeoPoint) -> CoreResult<f64> {
    a.validate()?;
    b.validate()?;
    Ok(a.bearing_to(b))
}

/// Point reached from a validated origin after `distance_m` along `bearing_deg`
pub fn destination(origin: &GeoPoint, distance_m: f64, bearing_deg: f64) -> CoreResult<GeoPoint> {
    origin.validate()?;
    Ok(origin.destination(distance_m, bearing_deg))
}

/// Eight-wind compass label for a bearing
pub fn compass_point(bearing_deg: f64) -> &'static str {
    const POINTS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];
    let index = ((bearing_deg.rem_euclid(360.0) + 22.5) / 45.0) as usize % 8;
    POINTS[index]
}

/// Bearing and distance between two points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BearingDistance {
    /// Degrees in [0, 360)
    pub bearing: f64,
    /// Meters
    pub distance: f64,
}

impl BearingDistance {
    pub fn between(from: &GeoPoint, to: &GeoPoint) -> CoreResult<Self> {
        Ok(Self {
            bearing: bearing(from, to)?,
            distance: distance(from, to)?,
        })
    }

    pub fn compass_point(&self) -> &'static str {
        compass_point(self.bearing)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_calculation() {
        // Los Angeles to San Francisco (approximately 559 km)
        let la = GeoPoint::new(34.0522, -118.2437);
        let sf = GeoPoint::new(37.7749, -122.4194);

        let d = distance(&la, &sf).unwrap();
        assert!((d - 559_000.0).abs() < 10_000.0);
    }

    #[test]
    fn test_distance_symmetry_and_zero() {
        let points = [
            GeoPoint::new(34.0522, -118.2437),
            GeoPoint::new(-33.8688, 151.2093),
            GeoPoint::new(89.9, 179.9),
            GeoPoint::new(-89.9, -179.9),
            GeoPoint::new(0.0, 180.0),
            GeoPoint::new(0.0, -180.0),
        ];

        for a in &points {
            assert_eq!(distance(a, a).unwrap(), 0.0);
            for b in &points {
                let ab = distance(a, b).unwrap();
                let ba = distance(b, a).unwrap();
                let tolerance = 1e-6 * ab.max(1.0);
                assert!((ab - ba).abs() <= tolerance, "{a} / {b}: {ab} vs {ba}");
            }
        }
    }

    #[test]
    fn test_antimeridian_distance_is_short() {
        let west = GeoPoint::new(0.0, 179.99);
        let east = GeoPoint::new(0.0, -179.99);

        let d = distance(&west, &east).unwrap();
        assert!(d < 3_000.0);
    }

    #[test]
    fn test_bearing_calculation() {
        let origin = GeoPoint::new(0.0, 0.0);
        let north = GeoPoint::new(1.0, 0.0);
        let east = GeoPoint::new(0.0, 1.0);
        let south = GeoPoint::new(-1.0, 0.0);
        let west = GeoPoint::new(0.0, -1.0);

        assert!((bearing(&origin, &north).unwrap() - 0.0).abs() < 1e-9);
        assert!((bearing(&origin, &east).unwrap() - 90.0).abs() < 1e-9);
        assert!((bearing(&origin, &south).unwrap() - 180.0).abs() < 1e-9);
        assert!((bearing(&origin, &west).unwrap() - 270.0).abs() < 1e-9);
    }

    #[test]
    fn test_bearing_same_point_is_zero() {
        let p = GeoPoint::new(34.0522, -118.2437);
        assert_eq!(bearing(&p, &p).unwrap(), 0.0);
    }

    #[test]
    fn test_bearing_polar_input_stays_in_range() {
        let pole = GeoPoint::new(90.0, 0.0);
        let other = GeoPoint::new(45.0, 45.0);

        let b = bearing(&pole, &other).unwrap();
        assert!((0.0..360.0).contains(&b));
    }

    #[test]
    fn test_invalid_coordinates_rejected() {
        let valid = GeoPoint::new(45.0, 90.0);
        let invalid_lat = GeoPoint::new(100.0, 0.0);
        let invalid_lng = GeoPoint::new(0.0, 200.0);

        assert!(matches!(
            distance(&valid, &invalid_lat),
            Err(CoreError::InvalidCoordinate { .. })
        ));
        assert!(matches!(
            bearing(&invalid_lng, &valid),
            Err(CoreError::InvalidCoordinate { .. })
        ));
        assert!(GeoPoint::try_new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_destination_round_trip() {
        let start = GeoPoint::new(34.0522, -118.2437);
        let end = start.destination(1_000.0, 45.0);

        assert!((start.distance_to(&end) - 1_000.0).abs() < 0.5);
        assert!((start.bearing_to(&end) - 45.0).abs() < 0.1);
    }

    #[test]
    fn test_destination_validates_origin() {
        let origin = GeoPoint::new(10.0, 20.0);
        assert_eq!(destination(&origin, 0.0, 90.0).unwrap(), origin);
        assert!(destination(&GeoPoint::new(0.0, 200.0), 100.0, 0.0).is_err());
    }

    #[test]
    fn test_compass_points() {
        assert_eq!(compass_point(0.0), "N");
        assert_eq!(compass_point(359.0), "N");
        assert_eq!(compass_point(44.0), "NE");
        assert_eq!(compass_point(180.0), "S");
        assert_eq!(compass_point(270.0), "W");
    }
}
