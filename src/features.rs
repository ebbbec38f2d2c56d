//! # Route and Surrounding Features
//!
//! Ties one route to two ping collections and produces a [`RankingValues`]
//! per entity:
//!
//! - the **box** collection: every ping inside the bounding envelope, the
//!   baseline for how common an entity is in the area;
//! - the **tube** collection: the subset of pings inside the buffered route
//!   corridor.
//!
//! ## Algorithm
//! 1. Lay a `grid_divisions × grid_divisions` grid over the envelope
//! 2. Mark tube cells: cells whose center lies in a corridor polygon
//! 3. Count pings per cell per entity, box-wide and over tube cells only
//! 4. Coverage = number of cells with at least one ping
//! 5. Spread = stddev of per-cell counts over all tube cells (zero-padded)
//! 6. Motion evidence from each entity's box pings
//! 7. One [`RankingValues`] per entity seen in either collection

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use geo::Polygon;
use log::info;

use crate::grid::{self, CellId, Grid, GridCounts};
use crate::motion::{evidence_of_motion, EvidenceOfMotion};
use crate::results::{top_ranked, RankedEntity};
use crate::route::MotionScorer;
use crate::source::PingSource;
use crate::{stats, Bounds, RankingConfig, RankingError, RankingResults, RankingValues};

/// One ranking query: a route, its surroundings, and the tuning to use.
pub struct RouteAndSurroundingFeatures<'a, R: MotionScorer + ?Sized, S: PingSource + ?Sized> {
    route: &'a R,
    box_features: &'a S,
    tube_features: &'a S,
    config: &'a RankingConfig,
}

impl<'a, R: MotionScorer + ?Sized, S: PingSource + ?Sized> RouteAndSurroundingFeatures<'a, R, S> {
    pub fn new(
        route: &'a R,
        box_features: &'a S,
        tube_features: &'a S,
        config: &'a RankingConfig,
    ) -> Self {
        Self { route, box_features, tube_features, config }
    }

    /// Rank every entity seen in the box or tube collection.
    ///
    /// # Arguments
    ///
    /// * `box_envelope` - Envelope the grid is laid over
    /// * `route_buffers` - Corridor polygons (x = longitude, y = latitude)
    ///
    /// # Returns
    ///
    /// One [`RankingValues`] per entity key, in no meaningful order. Use
    /// [`rank_sorted`](Self::rank_sorted) for a sorted page.
    ///
    /// # Errors
    ///
    /// [`RankingError::InvalidConfig`] for unusable tuning values and
    /// [`RankingError::InvalidGrid`] for a non-finite or inverted envelope.
    pub fn rank(
        &self,
        box_envelope: &Bounds,
        route_buffers: &[Polygon<f64>],
    ) -> Result<RankingResults, RankingError> {
        self.config.validate()?;
        let start = Instant::now();

        let grid = Grid::new(*box_envelope, self.config.grid_divisions)?;
        let tube_cells = grid.cells_intersecting(route_buffers);
        let n_tube_cells = tube_cells.len() as u64;

        let box_counts = self.box_features.grid_counts(&grid);
        let tube_counts = grid::restrict_to(self.tube_features.grid_counts(&grid), &tube_cells);

        let box_cells_covered = grid::cells_covered(&box_counts);
        let tube_cells_covered = grid::cells_covered(&tube_counts);

        let box_key_counts = self.box_features.count_keys();
        let tube_key_counts = self.tube_features.count_keys();

        let mut keys: Vec<&str> = box_key_counts
            .keys()
            .chain(tube_key_counts.keys())
            .map(String::as_str)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        keys.sort_unstable();

        let tube_stddevs = tube_cell_stddevs(&tube_counts, &tube_cells);
        let evidence = self.motion_evidence(&keys);

        let results: RankingResults = keys
            .iter()
            .map(|key| {
                let values = RankingValues {
                    tube_count: tube_key_counts.get(*key).copied().unwrap_or(0),
                    box_count: box_key_counts.get(*key).copied().unwrap_or(0),
                    box_cells_covered: box_cells_covered.get(*key).copied().unwrap_or(0),
                    tube_cells_covered: tube_cells_covered.get(*key).copied().unwrap_or(0),
                    tube_cells_stddev: tube_stddevs.get(*key).copied().unwrap_or(0.0),
                    motion_evidence: evidence.get(*key).copied().unwrap_or(EvidenceOfMotion::NONE),
                    grid_divisions: self.config.grid_divisions,
                    n_tube_cells,
                };
                (key.to_string(), values)
            })
            .collect();

        info!(
            "[Ranking] Ranked {} entities on a {}x{} grid ({} tube cells) in {:?}",
            results.len(),
            self.config.grid_divisions,
            self.config.grid_divisions,
            n_tube_cells,
            start.elapsed()
        );

        Ok(results)
    }

    /// [`rank`](Self::rank), then sort and page with the config's
    /// `sort_by`, `skip_results` and `max_results`.
    pub fn rank_sorted(
        &self,
        box_envelope: &Bounds,
        route_buffers: &[Polygon<f64>],
    ) -> Result<Vec<RankedEntity>, RankingError> {
        let results = self.rank(box_envelope, route_buffers)?;
        Ok(top_ranked(
            &results,
            self.config.sort_by,
            self.config.skip_results,
            self.config.max_results,
        ))
    }

    /// Motion evidence for each key, from its box pings.
    fn motion_evidence(&self, keys: &[&str]) -> HashMap<String, EvidenceOfMotion> {
        let limits = self.config.motion_limits();
        let divisions = self.config.route_divisions;
        let evidence_for = |key: &str| {
            let pings = self.box_features.pings_for(key);
            (key.to_string(), evidence_of_motion(pings, self.route, divisions, &limits))
        };

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            keys.par_iter().map(|key| evidence_for(key)).collect()
        }

        #[cfg(not(feature = "parallel"))]
        {
            keys.iter().map(|key| evidence_for(key)).collect()
        }
    }
}

/// Per-entity stddev of counts over every tube cell, with zeros for tube
/// cells the entity never visited.
fn tube_cell_stddevs(tube_counts: &GridCounts, tube_cells: &HashSet<CellId>) -> HashMap<String, f64> {
    let mut per_key: HashMap<&str, Vec<u64>> = HashMap::new();
    for (cell, counts) in tube_counts {
        if !tube_cells.contains(cell) {
            continue;
        }
        for (key, count) in counts {
            per_key.entry(key.as_str()).or_default().push(*count);
        }
    }

    let n = tube_cells.len();
    let stddev_for = |(key, visited): (&&str, &Vec<u64>)| {
        let mut padded: Vec<f64> = visited.iter().map(|c| *c as f64).collect();
        padded.resize(n.max(padded.len()), 0.0);
        (key.to_string(), stats::std_dev(&padded))
    };

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        per_key.par_iter().map(stddev_for).collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        per_key.iter().map(stddev_for).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord_sequence::CoordSequence;
    use crate::results::SortField;
    use crate::{Ping, PingCollection, Route};
    use geo::polygon;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    /// Scores every tracklet by its number of legs.
    struct LegCounter;

    impl MotionScorer for LegCounter {
        fn combined_motion_score(&self, sequence: &CoordSequence, _divisions: u32) -> f64 {
            sequence.len() as f64
        }
    }

    /// 10°×10° box with a corridor over the two western columns of a 10×10 grid.
    fn envelope() -> Bounds {
        Bounds { min_lat: 0.0, max_lat: 10.0, min_lng: 0.0, max_lng: 10.0 }
    }

    fn corridor() -> Polygon<f64> {
        polygon![(x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 10.0), (x: 0.0, y: 10.0)]
    }

    fn config() -> RankingConfig {
        RankingConfig { grid_divisions: 10, ..RankingConfig::default() }
    }

    fn in_corridor(ping: &Ping) -> bool {
        ping.point.longitude <= 2.0
    }

    /// "follower" drives up the corridor (lng 0.5) at ~18.5 m/s;
    /// "loiterer" sits in one corridor cell and one box cell;
    /// "bystander" never enters the corridor.
    fn scenario() -> PingCollection {
        let mut pings = Vec::new();
        for i in 0..10 {
            pings.push(Ping::new("follower", 0.5 + i as f64 * 0.01, 0.5, Some(i * 60_000)));
        }
        for i in 0..4 {
            pings.push(Ping::new("loiterer", 5.5, 1.5, Some(i * 7_200_000)));
        }
        pings.push(Ping::new("loiterer", 5.5, 6.5, None));
        for i in 0..3 {
            pings.push(Ping::new("bystander", 8.5, 8.5 - i as f64 * 0.01, Some(i * 60_000)));
        }
        PingCollection::from_pings(pings)
    }

    #[test]
    fn test_rank_counts_and_coverage() {
        let box_features = scenario();
        let tube_features = box_features.filter(in_corridor);
        let config = config();
        let ranker = RouteAndSurroundingFeatures::new(&LegCounter, &box_features, &tube_features, &config);

        let results = ranker.rank(&envelope(), &[corridor()]).unwrap();
        assert_eq!(results.len(), 3);

        let follower = &results["follower"];
        assert_eq!(follower.tube_count, 10);
        assert_eq!(follower.box_count, 10);
        assert_eq!(follower.box_cells_covered, 1);
        assert_eq!(follower.tube_cells_covered, 1);
        assert_eq!(follower.n_tube_cells, 20);
        assert_eq!(follower.grid_divisions, 10);
        assert_eq!(follower.motion_evidence.total, 9.0);

        let loiterer = &results["loiterer"];
        assert_eq!(loiterer.tube_count, 4);
        assert_eq!(loiterer.box_count, 5);
        assert_eq!(loiterer.box_cells_covered, 2);
        assert_eq!(loiterer.tube_cells_covered, 1);
        // Zero-length hops never form legs
        assert_eq!(loiterer.motion_evidence.total, 0.0);
        assert_eq!(loiterer.combined_score(), 0.0);

        let bystander = &results["bystander"];
        assert_eq!(bystander.tube_count, 0);
        assert_eq!(bystander.tube_cells_covered, 0);
        assert_eq!(bystander.tube_cells_stddev, 0.0);
        assert_eq!(bystander.box_count, 3);
        assert_eq!(bystander.idf(), 100.0_f64.ln());
        assert_eq!(bystander.combined_score_no_motion(), 0.0);
    }

    #[test]
    fn test_invariants_hold_for_every_entity() {
        let box_features = scenario();
        let tube_features = box_features.filter(in_corridor);
        let config = config();
        let ranker = RouteAndSurroundingFeatures::new(&LegCounter, &box_features, &tube_features, &config);

        for (key, v) in ranker.rank(&envelope(), &[corridor()]).unwrap() {
            assert!(v.tube_cells_covered <= v.box_cells_covered, "{}", key);
            assert!(v.tube_count <= v.box_count, "{}", key);
            assert!(v.tube_cells_covered <= v.n_tube_cells, "{}", key);
        }
    }

    #[test]
    fn test_tube_cell_stddev_is_zero_padded() {
        let box_features = scenario();
        let tube_features = box_features.filter(in_corridor);
        let config = config();
        let ranker = RouteAndSurroundingFeatures::new(&LegCounter, &box_features, &tube_features, &config);
        let results = ranker.rank(&envelope(), &[corridor()]).unwrap();

        // 10 pings in one of 20 cells: mean 0.5, variance (9.5² + 19 × 0.5²) / 20
        let expected = ((9.5_f64.powi(2) + 19.0 * 0.25) / 20.0).sqrt();
        assert!(approx_eq(results["follower"].tube_cells_stddev, expected, 1e-12));

        let direct = tube_cell_stddevs(
            &tube_features.grid_counts(&Grid::new(envelope(), 10).unwrap()),
            &Grid::new(envelope(), 10).unwrap().cells_intersecting(&[corridor()]),
        );
        assert!(approx_eq(direct["loiterer"], ((3.8_f64.powi(2) + 19.0 * 0.04) / 20.0).sqrt(), 1e-12));
    }

    #[test]
    fn test_tube_pings_outside_tube_cells_are_not_coverage() {
        // Tube collection claims a ping the grid puts outside the corridor cells
        let box_features = PingCollection::from_pings(vec![Ping::new("edge", 5.5, 2.5, None)]);
        let tube_features = box_features.clone();
        let config = config();
        let ranker = RouteAndSurroundingFeatures::new(&LegCounter, &box_features, &tube_features, &config);

        let edge = ranker.rank(&envelope(), &[corridor()]).unwrap()["edge"];
        assert_eq!(edge.tube_count, 1);
        assert_eq!(edge.tube_cells_covered, 0);
        assert_eq!(edge.box_cells_covered, 1);
    }

    #[test]
    fn test_no_corridor_cells() {
        let box_features = scenario();
        let tube_features = PingCollection::new();
        let config = config();
        let ranker = RouteAndSurroundingFeatures::new(&LegCounter, &box_features, &tube_features, &config);

        let results = ranker.rank(&envelope(), &[]).unwrap();
        for v in results.values() {
            assert_eq!(v.n_tube_cells, 0);
            assert_eq!(v.avg_per_tube_cell(), 0.0);
            assert_eq!(v.percentage_of_tube_cells_covered(), 0.0);
        }
    }

    #[test]
    fn test_empty_collections() {
        let empty = PingCollection::new();
        let config = config();
        let ranker = RouteAndSurroundingFeatures::new(&LegCounter, &empty, &empty, &config);
        assert!(ranker.rank(&envelope(), &[corridor()]).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_inputs_fail() {
        let empty = PingCollection::new();
        let bad_config = RankingConfig { grid_divisions: 0, ..RankingConfig::default() };
        let ranker = RouteAndSurroundingFeatures::new(&LegCounter, &empty, &empty, &bad_config);
        assert!(matches!(
            ranker.rank(&envelope(), &[corridor()]),
            Err(RankingError::InvalidConfig(_))
        ));

        let config = config();
        let ranker = RouteAndSurroundingFeatures::new(&LegCounter, &empty, &empty, &config);
        let inverted = Bounds { min_lat: 10.0, max_lat: 0.0, min_lng: 0.0, max_lng: 10.0 };
        assert!(matches!(ranker.rank(&inverted, &[corridor()]), Err(RankingError::InvalidGrid(_))));
    }

    #[test]
    fn test_rank_with_reference_route() {
        let route = Route::new(vec![
            crate::GpsPoint::new(0.5, 0.5),
            crate::GpsPoint::new(0.59, 0.5),
        ]);
        let box_features = scenario();
        let tube_features = box_features.filter(in_corridor);
        let config = RankingConfig { route_divisions: 9, ..config() };
        let ranker = RouteAndSurroundingFeatures::new(&route, &box_features, &tube_features, &config);

        let results = ranker.rank(&envelope(), &[corridor()]).unwrap();
        let follower = &results["follower"];
        assert!(approx_eq(follower.motion_evidence.total, 9.0, 1e-6));
        assert!(follower.combined_score() > 0.0);
        assert_eq!(results["bystander"].combined_score(), 0.0);
    }

    #[test]
    fn test_rank_sorted_pages_results() {
        let box_features = scenario();
        let tube_features = box_features.filter(in_corridor);
        let config = RankingConfig {
            grid_divisions: 10,
            sort_by: SortField::TubeCount,
            max_results: 2,
            ..RankingConfig::default()
        };
        let ranker = RouteAndSurroundingFeatures::new(&LegCounter, &box_features, &tube_features, &config);

        let page = ranker.rank_sorted(&envelope(), &[corridor()]).unwrap();
        let keys: Vec<&str> = page.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["follower", "loiterer"]);
    }

    #[test]
    fn test_partitions_merge_back() {
        // Ranking two halves of the data and merging matches the additive
        // fields of ranking everything at once.
        let all = scenario();
        let (first, second): (Vec<Ping>, Vec<Ping>) = all
            .pings_for("follower")
            .iter()
            .cloned()
            .partition(|p| p.point.latitude < 0.55);
        let config = config();

        let rank = |pings: Vec<Ping>| {
            let box_features = PingCollection::from_pings(pings);
            let tube_features = box_features.filter(in_corridor);
            RouteAndSurroundingFeatures::new(&LegCounter, &box_features, &tube_features, &config)
                .rank(&envelope(), &[corridor()])
                .unwrap()["follower"]
        };

        let whole = rank(all.pings_for("follower").to_vec());
        let merged = rank(first).merge(&rank(second)).unwrap();
        assert_eq!(merged.tube_count, whole.tube_count);
        assert_eq!(merged.box_count, whole.box_count);
        assert_eq!(merged.n_tube_cells, whole.n_tube_cells);
    }
}
