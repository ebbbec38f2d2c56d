//! # Tracklet Segmentation and Evidence of Motion
//!
//! An entity's pings arrive unordered and may mix several trips, long pauses
//! and outright noise. Segmentation sorts them by time and greedily splits
//! them into tracklets: maximal runs in which every new ping is kinematically
//! plausible given the ping appended just before it.
//!
//! ## Consistency check
//!
//! A candidate ping continues the current tracklet when, relative to the
//! tracklet's most recently appended ping:
//! 1. the time gap is below `max_time_between_pings_secs`,
//! 2. the implied speed is in `(0, max_speed_mps)`, and
//! 3. if the tracklet has at least two pings, the turn rate across the last
//!    two legs is below `max_turn_rate_deg_per_sec`.
//!
//! The check always looks at the most recently appended ping, never at the
//! tracklet's first ping. Otherwise the current tracklet is closed and the
//! candidate starts a new one.
//!
//! ## Evidence
//!
//! Each tracklet is scored by a [`MotionScorer`]; the scores are summarized
//! as an [`EvidenceOfMotion`] (total, max, population stddev).

use log::debug;

use crate::coord_sequence::CoordSequence;
use crate::route::MotionScorer;
use crate::{geo_utils, stats, Ping, TimedPoint};

/// Kinematic thresholds for tracklet segmentation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionLimits {
    pub max_time_between_pings_secs: f64,
    pub max_speed_mps: f64,
    pub max_turn_rate_deg_per_sec: f64,
}

impl Default for MotionLimits {
    fn default() -> Self {
        Self {
            max_time_between_pings_secs: 3600.0,
            max_speed_mps: 1000.0,
            max_turn_rate_deg_per_sec: 10.0,
        }
    }
}

/// Whether moving from `prev` to `next` is plausible continuous motion.
///
/// `before_prev`, when given, is the point preceding `prev` in the same
/// tracklet and enables the turn-rate check.
///
/// ```rust
/// use route_rank::{consistent_with_motion, MotionLimits, TimedPoint};
///
/// // ~1 km in ten minutes
/// let a = TimedPoint::new(0.0, 0.0, 0);
/// let b = TimedPoint::new(0.009, 0.0, 600_000);
/// assert!(consistent_with_motion(&a, &b, None, &MotionLimits::default()));
/// ```
pub fn consistent_with_motion(
    prev: &TimedPoint,
    next: &TimedPoint,
    before_prev: Option<&TimedPoint>,
    limits: &MotionLimits,
) -> bool {
    let dt = prev.seconds_between(next);
    if !(dt > 0.0 && dt < limits.max_time_between_pings_secs) {
        return false;
    }

    let speed = geo_utils::haversine_distance(&prev.point, &next.point) / dt;
    if !(speed > 0.0 && speed < limits.max_speed_mps) {
        return false;
    }

    match before_prev {
        None => true,
        Some(earlier) => {
            let first_leg = geo_utils::heading(&earlier.point, &prev.point);
            let second_leg = geo_utils::heading(&prev.point, &next.point);
            let turn = geo_utils::heading_difference(first_leg, second_leg);
            let elapsed = earlier.seconds_between(prev) + dt;
            turn / elapsed < limits.max_turn_rate_deg_per_sec
        }
    }
}

/// Greedy, single-pass tracklet builder.
///
/// Feed points in ascending time order with [`push`](Self::push), then call
/// [`finish`](Self::finish). The state is the open tracklet; its last two
/// points are all the consistency check needs.
#[derive(Debug, Clone)]
pub struct TrackletSegmenter {
    limits: MotionLimits,
    closed: Vec<Vec<TimedPoint>>,
    current: Vec<TimedPoint>,
}

impl TrackletSegmenter {
    pub fn new(limits: MotionLimits) -> Self {
        Self { limits, closed: Vec::new(), current: Vec::new() }
    }

    /// Extend the open tracklet with `point`, or close it and start a new
    /// one at `point`.
    pub fn push(&mut self, point: TimedPoint) {
        let continues = match self.current.as_slice() {
            [] => true,
            [only] => consistent_with_motion(only, &point, None, &self.limits),
            [.., before_last, last] => {
                consistent_with_motion(last, &point, Some(before_last), &self.limits)
            }
        };

        if continues {
            self.current.push(point);
        } else {
            let finished = std::mem::replace(&mut self.current, vec![point]);
            self.closed.push(finished);
        }
    }

    /// All non-empty tracklets, oldest first, each in ascending time order.
    pub fn finish(mut self) -> Vec<Vec<TimedPoint>> {
        if !self.current.is_empty() {
            self.closed.push(self.current);
        }
        self.closed.retain(|t| !t.is_empty());
        self.closed
    }
}

/// Split an entity's timed points into tracklets.
///
/// Points are sorted by timestamp first, then fed through a
/// [`TrackletSegmenter`]. Each tracklet becomes a [`CoordSequence`], so a
/// single-point tracklet yields an empty sequence.
///
/// # Arguments
///
/// * `points` - Timed points in any order
/// * `limits` - Thresholds for [`consistent_with_motion`]
///
/// # Returns
///
/// One [`CoordSequence`] per tracklet, oldest first.
///
/// # Example
///
/// ```rust
/// use route_rank::{segment_tracklets, MotionLimits, TimedPoint};
///
/// let points = vec![
///     TimedPoint::new(0.00, 0.0, 0),
///     TimedPoint::new(0.01, 0.0, 60_000),
///     TimedPoint::new(0.02, 0.0, 120_000),
///     // Two hours later
///     TimedPoint::new(0.03, 0.0, 7_320_000),
/// ];
///
/// let tracklets = segment_tracklets(&points, &MotionLimits::default());
/// assert_eq!(tracklets.len(), 2);
/// assert_eq!(tracklets[0].len(), 2);
/// assert!(tracklets[1].is_empty());
/// ```
pub fn segment_tracklets(points: &[TimedPoint], limits: &MotionLimits) -> Vec<CoordSequence> {
    let mut sorted = points.to_vec();
    sorted.sort_by_key(|p| p.timestamp);

    let mut segmenter = TrackletSegmenter::new(*limits);
    for point in sorted {
        segmenter.push(point);
    }

    segmenter
        .finish()
        .iter()
        .map(|tracklet| CoordSequence::from_points(tracklet))
        .collect()
}

/// Aggregate motion scores of all tracklets attributed to one entity.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EvidenceOfMotion {
    pub total: f64,
    pub max: f64,
    pub stddev: f64,
}

impl EvidenceOfMotion {
    /// No motion evidence.
    pub const NONE: EvidenceOfMotion = EvidenceOfMotion { total: 0.0, max: 0.0, stddev: 0.0 };

    /// Summarize tracklet scores; [`NONE`](Self::NONE) when there are none.
    pub fn from_scores(scores: &[f64]) -> Self {
        if scores.is_empty() {
            return Self::NONE;
        }
        Self {
            total: scores.iter().sum(),
            max: scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            stddev: stats::std_dev(scores),
        }
    }

    /// Combine evidence from two partitions: totals add, maxima take the
    /// larger, stddevs combine assuming independence.
    pub fn merge(&self, other: &EvidenceOfMotion) -> EvidenceOfMotion {
        EvidenceOfMotion {
            total: self.total + other.total,
            max: self.max.max(other.max),
            stddev: stats::combined_std_dev(self.stddev, other.stddev),
        }
    }
}

/// Evidence of motion for one entity's pings.
///
/// Pings without a timestamp or with invalid coordinates are ignored. Every
/// tracklet, including single-ping ones, is scored once by `scorer` against
/// the route split into `route_divisions` segments.
pub fn evidence_of_motion<S: MotionScorer + ?Sized>(
    pings: &[Ping],
    scorer: &S,
    route_divisions: u32,
    limits: &MotionLimits,
) -> EvidenceOfMotion {
    let timed: Vec<TimedPoint> = pings
        .iter()
        .filter(|p| p.point.is_valid())
        .filter_map(Ping::timed_point)
        .collect();
    if timed.is_empty() {
        return EvidenceOfMotion::NONE;
    }

    let tracklets = segment_tracklets(&timed, limits);
    let scores: Vec<f64> = tracklets
        .iter()
        .map(|sequence| scorer.combined_motion_score(sequence, route_divisions))
        .collect();

    debug!(
        "[Motion] {} timed pings -> {} tracklets (longest {} legs)",
        timed.len(),
        tracklets.len(),
        tracklets.iter().map(CoordSequence::len).max().unwrap_or(0)
    );

    EvidenceOfMotion::from_scores(&scores)
}
