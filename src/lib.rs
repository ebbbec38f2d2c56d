//! # Route Rank
//!
//! Ranks tracked entities by how strongly their timestamped pings support
//! having traveled along a candidate route, as opposed to merely appearing
//! nearby.
//!
//! This library provides:
//! - Grid binning and coverage counting over a bounding box ([`grid`])
//! - Greedy segmentation of pings into motion tracklets ([`motion`])
//! - A tf-idf style composite score per entity ([`ranking`])
//! - An associative merge so partitions can be ranked independently and
//!   combined afterwards ([`RankingValues::merge`])
//!
//! ## Features
//!
//! - **`parallel`** - Compute per-entity statistics with rayon
//! - **`serde`** - Serialize/deserialize the public value types
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use geo::polygon;
//! use route_rank::{
//!     Bounds, GpsPoint, Ping, PingCollection, RankingConfig, Route,
//!     RouteAndSurroundingFeatures,
//! };
//!
//! // A straight route heading north, buffered into a thin corridor
//! let route = Route::new(vec![GpsPoint::new(0.0, 0.0), GpsPoint::new(0.1, 0.0)]);
//! let buffer = polygon![
//!     (x: -0.005, y: 0.0), (x: 0.005, y: 0.0),
//!     (x: 0.005, y: 0.1), (x: -0.005, y: 0.1),
//! ];
//!
//! // One vehicle driving the corridor at ~18 m/s, one ping per minute
//! let pings: Vec<Ping> = (0..10)
//!     .map(|i| Ping::new("truck-7", i as f64 * 0.01, 0.0, Some(i * 60_000)))
//!     .collect();
//! let box_features = PingCollection::from_pings(pings);
//! let tube_features = box_features.filter(|p| p.point.longitude.abs() <= 0.005);
//!
//! let envelope = Bounds { min_lat: -0.05, max_lat: 0.15, min_lng: -0.05, max_lng: 0.05 };
//! let config = RankingConfig { grid_divisions: 20, ..RankingConfig::default() };
//! let ranker = RouteAndSurroundingFeatures::new(&route, &box_features, &tube_features, &config);
//!
//! let results = ranker.rank(&envelope, &[buffer]).unwrap();
//! let truck = &results["truck-7"];
//! assert_eq!(truck.tube_count, 10);
//! assert!(truck.combined_score() > 0.0);
//! ```

use std::collections::HashMap;

pub mod coord_sequence;
pub mod error;
pub mod features;
pub mod geo_utils;
pub mod grid;
pub mod motion;
pub mod ranking;
pub mod results;
pub mod route;
pub mod source;
pub mod stats;

pub use coord_sequence::{CoordSequence, ScoredPair, SpeedStats};
pub use error::RankingError;
pub use features::RouteAndSurroundingFeatures;
pub use grid::{CellId, Grid, GridCounts};
pub use motion::{
    consistent_with_motion, evidence_of_motion, segment_tracklets, EvidenceOfMotion, MotionLimits,
    TrackletSegmenter,
};
pub use ranking::RankingValues;
pub use results::{top_ranked, RankedEntity, SortField};
pub use route::{MotionScorer, Route};
pub use source::{PingCollection, PingSource};

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use route_rank::GpsPoint;
/// let point = GpsPoint::new(51.5074, -0.1278); // London
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// True for a finite latitude in `[-90, 90]` and longitude in
    /// `[-180, 180]`.
    ///
    /// Pings failing this are ignored by cell counting, per-key totals and
    /// motion evidence.
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Axis-aligned bounding envelope in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

/// A single observation of a tracked entity.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ping {
    /// Entity identifier this observation belongs to
    pub key: String,
    /// Observed position
    pub point: GpsPoint,
    /// Observation time as Unix epoch milliseconds, if known
    pub timestamp: Option<i64>,
}

impl Ping {
    /// Create a new ping.
    pub fn new(key: impl Into<String>, latitude: f64, longitude: f64, timestamp: Option<i64>) -> Self {
        Self {
            key: key.into(),
            point: GpsPoint::new(latitude, longitude),
            timestamp,
        }
    }

    /// The ping as a [`TimedPoint`], or `None` without a timestamp.
    pub fn timed_point(&self) -> Option<TimedPoint> {
        self.timestamp.map(|timestamp| TimedPoint { point: self.point, timestamp })
    }
}

/// A position with a resolved timestamp (Unix epoch milliseconds).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimedPoint {
    pub point: GpsPoint,
    pub timestamp: i64,
}

impl TimedPoint {
    pub fn new(latitude: f64, longitude: f64, timestamp: i64) -> Self {
        Self { point: GpsPoint::new(latitude, longitude), timestamp }
    }

    /// Absolute time between two points in seconds.
    #[inline]
    pub fn seconds_between(&self, other: &TimedPoint) -> f64 {
        other.timestamp.abs_diff(self.timestamp) as f64 / 1000.0
    }
}

/// Configuration for a ranking run.
///
/// Passed explicitly into [`RouteAndSurroundingFeatures`] so concurrent runs
/// with different tunings never interfere.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RankingConfig {
    /// Grid cells per side of the box envelope.
    /// Default: 100
    pub grid_divisions: u32,

    /// Number of segments the route scorer divides the route into.
    /// Default: 100
    pub route_divisions: u32,

    /// Pings further apart than this never share a tracklet.
    /// Default: 3600.0 seconds
    pub max_time_between_pings_secs: f64,

    /// Upper bound on plausible speed between consecutive pings.
    /// Default: 1000.0 m/s (covers aircraft)
    pub max_speed_mps: f64,

    /// Upper bound on heading change per second across two legs.
    /// Default: 10.0 degrees/second
    pub max_turn_rate_deg_per_sec: f64,

    /// Results skipped by [`RouteAndSurroundingFeatures::rank_sorted`].
    /// Default: 0
    pub skip_results: usize,

    /// Results returned by [`RouteAndSurroundingFeatures::rank_sorted`].
    /// Default: 1000
    pub max_results: usize,

    /// Sort order for [`RouteAndSurroundingFeatures::rank_sorted`].
    /// Default: [`SortField::CombinedScore`]
    pub sort_by: SortField,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            grid_divisions: 100,
            route_divisions: 100,
            max_time_between_pings_secs: 3600.0,
            max_speed_mps: 1000.0,
            max_turn_rate_deg_per_sec: 10.0,
            skip_results: 0,
            max_results: 1000,
            sort_by: SortField::CombinedScore,
        }
    }
}

impl RankingConfig {
    /// Check that every tuning value is usable.
    pub fn validate(&self) -> Result<(), RankingError> {
        if self.grid_divisions == 0 {
            return Err(RankingError::invalid_config("grid_divisions must be at least 1"));
        }
        if self.route_divisions == 0 {
            return Err(RankingError::invalid_config("route_divisions must be at least 1"));
        }
        let positive = [
            ("max_time_between_pings_secs", self.max_time_between_pings_secs),
            ("max_speed_mps", self.max_speed_mps),
            ("max_turn_rate_deg_per_sec", self.max_turn_rate_deg_per_sec),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(RankingError::invalid_config(format!(
                    "{} must be a positive finite number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// Motion thresholds used by tracklet segmentation.
    pub fn motion_limits(&self) -> MotionLimits {
        MotionLimits {
            max_time_between_pings_secs: self.max_time_between_pings_secs,
            max_speed_mps: self.max_speed_mps,
            max_turn_rate_deg_per_sec: self.max_turn_rate_deg_per_sec,
        }
    }
}

/// Per-entity ranking output of one run.
pub type RankingResults = HashMap<String, RankingValues>;

// ============================================================================
// Tests
// ============================================================================
