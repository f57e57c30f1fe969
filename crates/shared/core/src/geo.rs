//! Great-circle geometry on a spherical Earth

use crate::entities::TrackPoint;

/// Earth radius in metres used for all distance calculations
pub const EARTH_RADIUS_M: f64 = 6_378_138.12;

/// Great-circle distance in metres between two lat/lon pairs (degrees),
/// using the law of haversines
pub fn great_circle_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    // Clamp guards against a > 1 from rounding on antipodal points
    let c = 2.0 * a.sqrt().min(1.0).asin();
    EARTH_RADIUS_M * c
}

/// Distance in metres between two track points
pub fn distance_between(a: &TrackPoint, b: &TrackPoint) -> f64 {
    great_circle_distance(a.latitude, a.longitude, b.latitude, b.longitude)
}

/// Ground speed in km/h implied by travelling `metres` in `seconds`
pub fn speed_kmh(metres: f64, seconds: f64) -> f64 {
    metres / seconds * 3.6
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_distance() {
        assert_eq!(great_circle_distance(45.0, 5.0, 45.0, 5.0), 0.0);
    }

    #[test]
    fn test_one_hundredth_degree_latitude() {
        // 0.01 deg of arc on this radius is ~1113 m
        let d = great_circle_distance(45.0, 5.0, 45.01, 5.0);
        assert!((d - 1113.2).abs() < 1.0, "got {d}");
    }

    #[test]
    fn test_symmetric() {
        let a = great_circle_distance(45.724361, 5.082576, 48.8566, 2.3522);
        let b = great_circle_distance(48.8566, 2.3522, 45.724361, 5.082576);
        assert!((a - b).abs() < 1e-6);
    }

    #[test]
    fn test_speed_kmh() {
        assert!((speed_kmh(1000.0, 10.0) - 360.0).abs() < 1e-9);
    }
}
