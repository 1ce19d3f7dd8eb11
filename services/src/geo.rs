//! Great-circle distance between two coordinates.
//!
//! Used purely as a threshold comparator for geofence decisions; callers must
//! not assume sub-meter accuracy.

use serde::{Deserialize, Serialize};

use crate::error::AttendanceError;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Rejects out-of-range and NaN components. A NaN never satisfies a
    /// range check, so both cases fall out of the same comparison.
    pub fn validate(&self) -> Result<(), AttendanceError> {
        if (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng) {
            Ok(())
        } else {
            Err(AttendanceError::InvalidCoordinate {
                lat: self.lat,
                lng: self.lng,
            })
        }
    }
}

/// Haversine distance in meters between `a` and `b`.
pub fn distance_meters(a: Coordinate, b: Coordinate) -> Result<f64, AttendanceError> {
    a.validate()?;
    b.validate()?;

    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);
    // Rounding can push h fractionally past 1.0 for near-antipodal points;
    // asin would then return NaN.
    let c = 2.0 * h.sqrt().min(1.0).asin();

    Ok(EARTH_RADIUS_M * c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_to_self_is_zero() {
        let p = Coordinate::new(39.0, 35.0);
        assert_eq!(distance_meters(p, p).unwrap(), 0.0);
    }

    #[test]
    fn one_degree_of_longitude_at_equator() {
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(0.0, 1.0);
        let d = distance_meters(a, b).unwrap();
        // 2 * pi * R / 360
        assert!((d - 111_194.93).abs() < 1.0, "got {d}");
    }

    #[test]
    fn distance_is_symmetric() {
        let a = Coordinate::new(-25.7545, 28.2314);
        let b = Coordinate::new(-25.7560, 28.2330);
        let d_ab = distance_meters(a, b).unwrap();
        let d_ba = distance_meters(b, a).unwrap();
        assert!((d_ab - d_ba).abs() < 1e-9);
        assert!(d_ab > 0.0);
    }

    #[test]
    fn antipodal_points_yield_a_finite_distance() {
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(0.0, 180.0);
        let d = distance_meters(a, b).unwrap();
        assert!(d.is_finite(), "got {d}");
        // Half the Earth's circumference.
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_M).abs() < 1.0, "got {d}");
    }

    #[test]
    fn rejects_out_of_range_and_nan_inputs() {
        let ok = Coordinate::new(0.0, 0.0);
        for bad in [
            Coordinate::new(90.1, 0.0),
            Coordinate::new(-91.0, 0.0),
            Coordinate::new(0.0, 180.5),
            Coordinate::new(f64::NAN, 0.0),
            Coordinate::new(0.0, f64::NAN),
        ] {
            assert!(matches!(
                distance_meters(ok, bad),
                Err(AttendanceError::InvalidCoordinate { .. })
            ));
            assert!(matches!(
                distance_meters(bad, ok),
                Err(AttendanceError::InvalidCoordinate { .. })
            ));
        }
    }
}
