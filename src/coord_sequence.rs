//! Ordered chains of timed points and their kinematics.

use crate::{geo_utils, stats, TimedPoint};

/// Kinematics between two consecutive timed points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredPair {
    pub earlier: TimedPoint,
    pub later: TimedPoint,
    /// Great-circle distance in meters
    pub distance: f64,
    /// Absolute time difference in seconds
    pub time_delta: f64,
    /// Meters per second; 0 when both points share a timestamp
    pub speed: f64,
    /// Initial bearing from `earlier` to `later`, degrees in [0, 360)
    pub heading: f64,
}

impl ScoredPair {
    pub fn new(earlier: TimedPoint, later: TimedPoint) -> Self {
        let distance = geo_utils::haversine_distance(&earlier.point, &later.point);
        let time_delta = earlier.seconds_between(&later);
        let speed = if time_delta > 0.0 { distance / time_delta } else { 0.0 };
        let heading = geo_utils::heading(&earlier.point, &later.point);

        Self { earlier, later, distance, time_delta, speed, heading }
    }
}

/// Summary of per-segment speeds (m/s). All zero for sequences without pairs.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SpeedStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub stddev: f64,
}

/// A time-ascending chain of [`ScoredPair`]s.
///
/// Consecutive pairs share a point: `pairs[i].later == pairs[i + 1].earlier`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoordSequence {
    pairs: Vec<ScoredPair>,
}

impl CoordSequence {
    /// Build a sequence from timed points, sorted by timestamp (stable for
    /// equal timestamps). Fewer than two points give an empty sequence.
    ///
    /// ```rust
    /// use route_rank::{CoordSequence, TimedPoint};
    ///
    /// let seq = CoordSequence::from_points(&[
    ///     TimedPoint::new(0.0, 0.0, 0),
    ///     TimedPoint::new(0.01, 0.0, 600_000),
    /// ]);
    /// assert_eq!(seq.len(), 1);
    /// assert!((seq.speed_stats().avg - 1.853).abs() < 0.01);
    /// ```
    pub fn from_points(points: &[TimedPoint]) -> Self {
        let mut sorted = points.to_vec();
        sorted.sort_by_key(|p| p.timestamp);

        let pairs = sorted
            .windows(2)
            .map(|w| ScoredPair::new(w[0], w[1]))
            .collect();

        Self { pairs }
    }

    pub fn pairs(&self) -> &[ScoredPair] {
        &self.pairs
    }

    /// Number of pairs (one less than the number of points).
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// The timed points in order.
    pub fn points(&self) -> Vec<TimedPoint> {
        match self.pairs.first() {
            None => Vec::new(),
            Some(first) => std::iter::once(first.earlier)
                .chain(self.pairs.iter().map(|p| p.later))
                .collect(),
        }
    }

    /// Sum of pair distances in meters.
    pub fn total_distance(&self) -> f64 {
        self.pairs.iter().map(|p| p.distance).sum()
    }

    /// Seconds from the first point to the last.
    pub fn duration_secs(&self) -> f64 {
        self.pairs.iter().map(|p| p.time_delta).sum()
    }

    /// Speed of each pair in m/s.
    pub fn speeds(&self) -> Vec<f64> {
        self.pairs.iter().map(|p| p.speed).collect()
    }

    pub fn speed_stats(&self) -> SpeedStats {
        let speeds = self.speeds();
        if speeds.is_empty() {
            return SpeedStats::default();
        }

        let min = speeds.iter().copied().fold(f64::INFINITY, f64::min);
        let max = speeds.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let avg = speeds.iter().sum::<f64>() / speeds.len() as f64;

        SpeedStats { min, max, avg, stddev: stats::std_dev(&speeds) }
    }
}
