//! # Geographic Utilities
//!
//! Distance and heading computations used by tracklet segmentation and route
//! scoring.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two GPS points |
//! | [`heading`] | Initial great-circle bearing, normalized to [0, 360) |
//! | [`heading_difference`] | Heading change between two consecutive legs |
//! | [`polyline_length`] | Total length of a GPS track in meters |
//! | [`to_point`] | Convert a [`GpsPoint`] into a `geo::Point` (x = lng, y = lat) |
//!
//! ## Example
//!
//! ```rust
//! use route_rank::{GpsPoint, geo_utils};
//!
//! let a = GpsPoint::new(0.0, 0.0);
//! let north = GpsPoint::new(0.01, 0.0);
//! let east = GpsPoint::new(0.0, 0.01);
//!
//! assert!(geo_utils::heading(&a, &north).abs() < 1e-6);
//! assert!((geo_utils::heading(&a, &east) - 90.0).abs() < 1e-6);
//! assert!((geo_utils::haversine_distance(&a, &north) - 1111.95).abs() < 1.0);
//! ```
//!
//! All functions expect WGS84 latitude/longitude in degrees and use the
//! spherical-earth haversine model (mean radius 6,371 km).

use geo::{Bearing, Distance, Haversine, Point};

use crate::GpsPoint;

/// Convert a GPS point to a `geo` point (x = longitude, y = latitude).
#[inline]
pub fn to_point(p: &GpsPoint) -> Point<f64> {
    Point::new(p.longitude, p.latitude)
}

/// Great-circle distance in meters between two GPS points.
///
/// ```rust
/// use route_rank::{GpsPoint, geo_utils};
///
/// let london = GpsPoint::new(51.5074, -0.1278);
/// let paris = GpsPoint::new(48.8566, 2.3522);
/// let distance = geo_utils::haversine_distance(&london, &paris);
/// assert!((distance - 343_560.0).abs() < 1000.0);
/// ```
#[inline]
pub fn haversine_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    Haversine::distance(to_point(p1), to_point(p2))
}

/// Initial bearing from `from` to `to` in degrees, clockwise from north,
/// normalized to `[0, 360)`.
///
/// Coincident points yield 0.
#[inline]
pub fn heading(from: &GpsPoint, to: &GpsPoint) -> f64 {
    let bearing = Haversine::bearing(to_point(from), to_point(to));
    let normalized = bearing.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if normalized >= 360.0 {
        0.0
    } else {
        normalized
    }
}

/// Heading change between two legs, as used by the turn-rate check.
///
/// Takes the absolute difference of the two headings and, when it exceeds
/// 180°, reduces it by 180° (not the circular `360 - d`). Downstream turn-rate
/// thresholds are tuned to this reduction.
#[inline]
pub fn heading_difference(h1: f64, h2: f64) -> f64 {
    let diff = (h2 - h1).abs();
    if diff > 180.0 {
        diff - 180.0
    } else {
        diff
    }
}

/// Total length of a polyline in meters. Empty or single-point input is 0.
pub fn polyline_length(points: &[GpsPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    #[test]
    fn test_haversine_distance_same_point() {
        let p = GpsPoint::new(51.5074, -0.1278);
        assert_eq!(haversine_distance(&p, &p), 0.0);
    }

    #[test]
    fn test_heading_cardinal_directions() {
        let origin = GpsPoint::new(10.0, 10.0);
        assert!(approx_eq(heading(&origin, &GpsPoint::new(10.1, 10.0)), 0.0, 1e-6));
        assert!(approx_eq(heading(&origin, &GpsPoint::new(10.0, 10.1)), 90.0, 0.1));
        assert!(approx_eq(heading(&origin, &GpsPoint::new(9.9, 10.0)), 180.0, 1e-6));
        assert!(approx_eq(heading(&origin, &GpsPoint::new(10.0, 9.9)), 270.0, 0.1));
    }

    #[test]
    fn test_heading_always_in_range() {
        let origin = GpsPoint::new(0.0, 0.0);
        for (lat, lng) in [(0.1, -0.1), (-0.1, -0.1), (-0.1, 0.1), (0.1, 0.1)] {
            let h = heading(&origin, &GpsPoint::new(lat, lng));
            assert!((0.0..360.0).contains(&h), "heading {} out of range", h);
        }
    }

    #[test]
    fn test_heading_difference_reduces_by_180() {
        assert_eq!(heading_difference(10.0, 30.0), 20.0);
        assert_eq!(heading_difference(30.0, 10.0), 20.0);
        // 350 - 10 = 340 > 180, so 340 - 180 = 160
        assert_eq!(heading_difference(10.0, 350.0), 160.0);
        assert_eq!(heading_difference(0.0, 180.0), 180.0);
    }

    #[test]
    fn test_polyline_length() {
        assert_eq!(polyline_length(&[]), 0.0);
        assert_eq!(polyline_length(&[GpsPoint::new(1.0, 1.0)]), 0.0);

        let track = vec![
            GpsPoint::new(0.0, 0.0),
            GpsPoint::new(0.01, 0.0),
            GpsPoint::new(0.02, 0.0),
        ];
        assert!(approx_eq(polyline_length(&track), 2.0 * 1111.95, 2.0));
    }
}
