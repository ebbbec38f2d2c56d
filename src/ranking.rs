//! # Ranking Values
//!
//! Per-entity counts from one ranking run and the scores derived from them.
//!
//! The scoring borrows from information retrieval: grid cells play the role
//! of documents and an entity's pings play the role of a term.
//!
//! | Score | Formula |
//! |-------|---------|
//! | [`idf`](RankingValues::idf) | `ln(grid_divisions² / box_cells_covered)` |
//! | [`tf_idf`](RankingValues::tf_idf) | `idf × tube_count` |
//! | [`avg_per_tube_cell`](RankingValues::avg_per_tube_cell) | `tube_count / n_tube_cells` |
//! | [`scaled_tf_idf`](RankingValues::scaled_tf_idf) | `idf × avg_per_tube_cell` |
//! | [`tube_cell_deviation_score`](RankingValues::tube_cell_deviation_score) | `exp(-tube_cells_stddev / avg_per_tube_cell)` |
//! | [`percentage_of_tube_cells_covered`](RankingValues::percentage_of_tube_cells_covered) | `tube_cells_covered / n_tube_cells` |
//! | [`combined_score_no_motion`](RankingValues::combined_score_no_motion) | geometric mean of the three above |
//! | [`combined_score`](RankingValues::combined_score) | geometric mean with `ln(motion total + 1)` and motion max |
//!
//! `scaled_tf_idf` is not bounded above, so neither composite is confined
//! to `[0, 1]` even though the coverage and spread terms are.

use crate::motion::EvidenceOfMotion;
use crate::{stats, RankingError};

/// Counts, coverage and motion evidence for one entity in one ranking run.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RankingValues {
    /// Pings inside the route corridor
    pub tube_count: u64,
    /// Pings inside the bounding box
    pub box_count: u64,
    /// Distinct grid cells touched anywhere in the box
    pub box_cells_covered: u64,
    /// Distinct tube cells touched
    pub tube_cells_covered: u64,
    /// Spread of per-cell counts over all tube cells, zero-padded
    pub tube_cells_stddev: f64,
    pub motion_evidence: EvidenceOfMotion,
    /// Grid cells per side for this run
    pub grid_divisions: u32,
    /// Grid cells whose center lies in the route corridor for this run
    pub n_tube_cells: u64,
}

impl RankingValues {
    /// An entity with nothing observed, for a run with the given grid.
    pub fn empty(grid_divisions: u32, n_tube_cells: u64) -> Self {
        Self {
            tube_count: 0,
            box_count: 0,
            box_cells_covered: 0,
            tube_cells_covered: 0,
            tube_cells_stddev: 0.0,
            motion_evidence: EvidenceOfMotion::NONE,
            grid_divisions,
            n_tube_cells,
        }
    }

    /// Inverse document frequency of the entity across the box.
    ///
    /// Grid cells are the documents, so an entity seen in few of them is
    /// rare and scores high.
    ///
    /// # Returns
    ///
    /// `ln(grid_divisions² / box_cells_covered)`, or `f64::MAX` when the
    /// entity covers no cells at all.
    ///
    /// # Example
    ///
    /// ```rust
    /// use route_rank::RankingValues;
    ///
    /// let mut values = RankingValues::empty(10, 5);
    /// assert_eq!(values.idf(), f64::MAX);
    ///
    /// values.box_cells_covered = 20;
    /// assert!((values.idf() - 5.0_f64.ln()).abs() < 1e-12);
    /// ```
    pub fn idf(&self) -> f64 {
        if self.box_cells_covered == 0 {
            return f64::MAX;
        }
        let total_cells = self.grid_divisions as f64 * self.grid_divisions as f64;
        (total_cells / self.box_cells_covered as f64).ln()
    }

    pub fn tf_idf(&self) -> f64 {
        self.idf() * self.tube_count as f64
    }

    /// Mean pings per tube cell; 0 when the run has no tube cells.
    pub fn avg_per_tube_cell(&self) -> f64 {
        if self.n_tube_cells == 0 {
            return 0.0;
        }
        self.tube_count as f64 / self.n_tube_cells as f64
    }

    pub fn scaled_tube_cell_stddev(&self) -> f64 {
        let avg = self.avg_per_tube_cell();
        if avg > 0.0 {
            self.tube_cells_stddev / avg
        } else {
            0.0
        }
    }

    /// 1 for pings spread evenly over the corridor, towards 0 as they pile
    /// up in a few cells.
    pub fn tube_cell_deviation_score(&self) -> f64 {
        (-self.scaled_tube_cell_stddev()).exp()
    }

    pub fn scaled_tf_idf(&self) -> f64 {
        self.idf() * self.avg_per_tube_cell()
    }

    /// Fraction of tube cells touched; 0 when the run has no tube cells.
    pub fn percentage_of_tube_cells_covered(&self) -> f64 {
        if self.n_tube_cells == 0 {
            return 0.0;
        }
        self.tube_cells_covered as f64 / self.n_tube_cells as f64
    }

    pub fn combined_score_no_motion(&self) -> f64 {
        stats::geometric_mean(&[
            self.scaled_tf_idf(),
            self.percentage_of_tube_cells_covered(),
            self.tube_cell_deviation_score(),
        ])
    }

    /// Final score; exactly 0 without motion evidence.
    pub fn combined_score(&self) -> f64 {
        if self.motion_evidence.total > 0.0 {
            stats::geometric_mean(&[
                self.combined_score_no_motion(),
                (self.motion_evidence.total + 1.0).ln(),
                self.motion_evidence.max,
            ])
        } else {
            0.0
        }
    }

    /// Combine results computed over disjoint partitions of the same run.
    ///
    /// Counts and coverage add; stddevs combine assuming independence.
    /// Fails if the two values come from runs with different grids.
    ///
    /// ```rust
    /// use route_rank::RankingValues;
    ///
    /// let mut east = RankingValues::empty(10, 5);
    /// east.tube_count = 4;
    /// east.box_count = 6;
    /// let mut west = RankingValues::empty(10, 5);
    /// west.tube_count = 1;
    /// west.box_count = 2;
    ///
    /// let both = east.merge(&west).unwrap();
    /// assert_eq!(both.tube_count, 5);
    /// assert_eq!(both.box_count, 8);
    ///
    /// assert!(east.merge(&RankingValues::empty(20, 5)).is_err());
    /// ```
    pub fn merge(&self, other: &RankingValues) -> Result<RankingValues, RankingError> {
        if self.grid_divisions != other.grid_divisions || self.n_tube_cells != other.n_tube_cells {
            return Err(RankingError::IncompatibleMerge {
                left_divisions: self.grid_divisions,
                right_divisions: other.grid_divisions,
                left_tube_cells: self.n_tube_cells,
                right_tube_cells: other.n_tube_cells,
            });
        }

        Ok(RankingValues {
            tube_count: self.tube_count + other.tube_count,
            box_count: self.box_count + other.box_count,
            box_cells_covered: self.box_cells_covered + other.box_cells_covered,
            tube_cells_covered: self.tube_cells_covered + other.tube_cells_covered,
            tube_cells_stddev: stats::combined_std_dev(self.tube_cells_stddev, other.tube_cells_stddev),
            motion_evidence: self.motion_evidence.merge(&other.motion_evidence),
            grid_divisions: self.grid_divisions,
            n_tube_cells: self.n_tube_cells,
        })
    }
}
