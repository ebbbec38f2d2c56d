//! Route motion scoring.
//!
//! [`MotionScorer`] is the contract the ranking code needs from a route: turn
//! one tracklet into a single number describing how well it moves along the
//! route. [`Route`] is a straightforward implementation based on heading
//! alignment with the nearest stretch of route.

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::coord_sequence::CoordSequence;
use crate::{geo_utils, GpsPoint};

/// Scores how well a tracklet follows a route.
pub trait MotionScorer: Sync {
    /// Combined motion score of `sequence` against the route split into
    /// `divisions` equal segments. Higher means stronger evidence of travel
    /// along the route; an empty sequence should score 0.
    fn combined_motion_score(&self, sequence: &CoordSequence, divisions: u32) -> f64;
}

/// A candidate route as a polyline.
#[derive(Debug, Clone)]
pub struct Route {
    points: Vec<GpsPoint>,
    tolerance_meters: f64,
}

impl Route {
    /// Create a route from its polyline. Default tolerance is 500 m.
    pub fn new(points: Vec<GpsPoint>) -> Self {
        Self { points, tolerance_meters: 500.0 }
    }

    /// Maximum distance between a tracklet leg and a route segment for the
    /// leg to count toward that segment.
    pub fn with_tolerance(mut self, meters: f64) -> Self {
        self.tolerance_meters = meters;
        self
    }

    pub fn points(&self) -> &[GpsPoint] {
        &self.points
    }

    pub fn tolerance_meters(&self) -> f64 {
        self.tolerance_meters
    }

    /// Route length in meters.
    pub fn length(&self) -> f64 {
        geo_utils::polyline_length(&self.points)
    }

    /// Midpoint and heading of each of `divisions` equal-length segments.
    fn segments(&self, divisions: u32) -> Vec<RouteSegment> {
        let resampled = resample_route(&self.points, divisions as usize + 1);
        resampled
            .windows(2)
            .map(|w| RouteSegment {
                midpoint: midpoint(&w[0], &w[1]),
                heading: geo_utils::heading(&w[0], &w[1]),
            })
            .collect()
    }
}

impl MotionScorer for Route {
    /// Sum over route segments of the best heading alignment any leg of the
    /// sequence achieved on that segment.
    ///
    /// Each leg is assigned to the segment whose midpoint is nearest to the
    /// leg's midpoint (nearest in degrees, confirmed in meters against the
    /// tolerance). Alignment is `max(0, cos(Δheading))`, so legs travelling
    /// against the route contribute nothing. The result lies in
    /// `[0, divisions]`.
    fn combined_motion_score(&self, sequence: &CoordSequence, divisions: u32) -> f64 {
        if sequence.is_empty() || self.points.len() < 2 || divisions == 0 {
            return 0.0;
        }

        let segments = self.segments(divisions);
        if segments.is_empty() {
            return 0.0;
        }
        let rtree = RTree::bulk_load(
            segments
                .iter()
                .enumerate()
                .map(|(idx, s)| IndexedPoint { idx, lat: s.midpoint.latitude, lng: s.midpoint.longitude })
                .collect(),
        );

        let mut best = vec![0.0_f64; segments.len()];
        for pair in sequence.pairs() {
            if pair.distance <= 0.0 {
                continue;
            }
            let leg_mid = midpoint(&pair.earlier.point, &pair.later.point);
            let Some(nearest) = rtree.nearest_neighbor(&[leg_mid.latitude, leg_mid.longitude]) else {
                continue;
            };
            let segment = &segments[nearest.idx];
            if geo_utils::haversine_distance(&leg_mid, &segment.midpoint) > self.tolerance_meters {
                continue;
            }

            let alignment = (pair.heading - segment.heading).to_radians().cos().max(0.0);
            if alignment > best[nearest.idx] {
                best[nearest.idx] = alignment;
            }
        }

        best.iter().sum()
    }
}

#[derive(Debug, Clone, Copy)]
struct RouteSegment {
    midpoint: GpsPoint,
    heading: f64,
}

/// A segment midpoint with its index for R-tree queries
#[derive(Debug, Clone, Copy)]
struct IndexedPoint {
    idx: usize,
    lat: f64,
    lng: f64,
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lat, self.lng])
    }
}

impl PointDistance for IndexedPoint {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dlat = self.lat - point[0];
        let dlng = self.lng - point[1];
        dlat * dlat + dlng * dlng
    }
}

fn midpoint(a: &GpsPoint, b: &GpsPoint) -> GpsPoint {
    GpsPoint::new((a.latitude + b.latitude) / 2.0, (a.longitude + b.longitude) / 2.0)
}

/// Resample a polyline to exactly `target_count` points, evenly spaced by
/// distance. Degenerate input (fewer than two points, zero length) is
/// returned as-is.
fn resample_route(points: &[GpsPoint], target_count: usize) -> Vec<GpsPoint> {
    if points.len() < 2 || target_count < 2 {
        return points.to_vec();
    }

    let total_dist = geo_utils::polyline_length(points);
    if total_dist == 0.0 {
        return points.to_vec();
    }

    let step_dist = total_dist / (target_count - 1) as f64;
    let mut resampled: Vec<GpsPoint> = vec![points[0]];

    let mut accumulated = 0.0;
    let mut next_threshold = step_dist;
    let mut prev_point = &points[0];

    for curr in points.iter().skip(1) {
        let seg_dist = geo_utils::haversine_distance(prev_point, curr);

        while seg_dist > 0.0
            && accumulated + seg_dist >= next_threshold
            && resampled.len() < target_count - 1
        {
            let ratio = (next_threshold - accumulated) / seg_dist;
            resampled.push(GpsPoint::new(
                prev_point.latitude + ratio * (curr.latitude - prev_point.latitude),
                prev_point.longitude + ratio * (curr.longitude - prev_point.longitude),
            ));
            next_threshold += step_dist;
        }

        accumulated += seg_dist;
        prev_point = curr;
    }

    if let Some(last) = points.last() {
        resampled.push(*last);
    }

    resampled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TimedPoint;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    fn north_route() -> Route {
        Route::new(vec![GpsPoint::new(0.0, 0.0), GpsPoint::new(0.1, 0.0)])
    }

    fn northbound_track(n: i64) -> CoordSequence {
        let points: Vec<TimedPoint> = (0..n)
            .map(|i| TimedPoint::new(i as f64 * 0.01, 0.0, i * 60_000))
            .collect();
        CoordSequence::from_points(&points)
    }

    #[test]
    fn test_resample_route_count_and_endpoints() {
        let points = vec![
            GpsPoint::new(0.0, 0.0),
            GpsPoint::new(0.05, 0.0),
            GpsPoint::new(0.1, 0.0),
        ];
        let resampled = resample_route(&points, 11);
        assert_eq!(resampled.len(), 11);
        assert_eq!(resampled[0], points[0]);
        assert_eq!(resampled[10], points[2]);
        assert!(approx_eq(resampled[5].latitude, 0.05, 1e-9));
    }

    #[test]
    fn test_resample_degenerate_route() {
        let single = vec![GpsPoint::new(1.0, 1.0)];
        assert_eq!(resample_route(&single, 10), single);

        let stationary = vec![GpsPoint::new(1.0, 1.0), GpsPoint::new(1.0, 1.0)];
        assert_eq!(resample_route(&stationary, 10).len(), 2);
    }

    #[test]
    fn test_empty_sequence_scores_zero() {
        assert_eq!(north_route().combined_motion_score(&CoordSequence::default(), 10), 0.0);
    }

    #[test]
    fn test_aligned_track_scores_every_segment() {
        // Ten legs along a route split into ten segments
        let score = north_route().combined_motion_score(&northbound_track(11), 10);
        assert!(approx_eq(score, 10.0, 1e-6), "score was {}", score);
    }

    #[test]
    fn test_reverse_track_scores_zero() {
        let points: Vec<TimedPoint> = (0..11)
            .map(|i| TimedPoint::new(0.1 - i as f64 * 0.01, 0.0, i * 60_000))
            .collect();
        let score = north_route().combined_motion_score(&CoordSequence::from_points(&points), 10);
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_partial_track_scores_partially() {
        let score = north_route().combined_motion_score(&northbound_track(4), 10);
        assert!(approx_eq(score, 3.0, 1e-6), "score was {}", score);
    }

    #[test]
    fn test_far_away_track_scores_zero() {
        let points: Vec<TimedPoint> = (0..5)
            .map(|i| TimedPoint::new(i as f64 * 0.01, 1.0, i * 60_000))
            .collect();
        let score = north_route()
            .with_tolerance(200.0)
            .combined_motion_score(&CoordSequence::from_points(&points), 10);
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_route_length() {
        assert!(approx_eq(north_route().length(), 11_119.5, 5.0));
        assert_eq!(north_route().tolerance_meters(), 500.0);
    }
}
