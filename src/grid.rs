//! Fixed N×N grid over a bounding envelope.
//!
//! Cells are equal-sized in degrees. Every point maps to exactly one cell:
//! points on the max edge or outside the envelope clamp to the nearest edge
//! cell. Route corridors are matched to cells by testing cell *centers*
//! against the corridor polygons, so a cell that the corridor only clips at a
//! corner is not a tube cell.

use std::collections::{HashMap, HashSet};

use geo::{BoundingRect, Intersects, Polygon};
use rstar::{RTree, RTreeObject, AABB};

use crate::{geo_utils, Bounds, GpsPoint, RankingError};

/// Per-cell, per-entity observation counts: `cell -> (entity key -> count)`.
pub type GridCounts = HashMap<CellId, HashMap<String, u64>>;

/// Grid cell coordinate. `row` indexes latitude, `col` indexes longitude,
/// both counted from the envelope's south-west corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellId {
    pub row: u32,
    pub col: u32,
}

impl CellId {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }
}

/// An N×N lattice laid over a bounding envelope.
#[derive(Debug, Clone)]
pub struct Grid {
    envelope: Bounds,
    divisions: u32,
    cell_height: f64,
    cell_width: f64,
}

impl Grid {
    /// Divide `envelope` into `divisions × divisions` cells.
    ///
    /// Fails for zero divisions and for non-finite or inverted envelopes.
    /// A zero-width or zero-height envelope is accepted; every point then
    /// falls in row (or column) 0 along that axis.
    pub fn new(envelope: Bounds, divisions: u32) -> Result<Self, RankingError> {
        if divisions == 0 {
            return Err(RankingError::invalid_grid("divisions must be at least 1"));
        }
        let corners = [envelope.min_lat, envelope.max_lat, envelope.min_lng, envelope.max_lng];
        if corners.iter().any(|c| !c.is_finite()) {
            return Err(RankingError::invalid_grid(format!(
                "envelope has non-finite corners: {:?}",
                envelope
            )));
        }
        if envelope.min_lat > envelope.max_lat || envelope.min_lng > envelope.max_lng {
            return Err(RankingError::invalid_grid(format!(
                "envelope min exceeds max: {:?}",
                envelope
            )));
        }

        let n = divisions as f64;
        Ok(Self {
            envelope,
            divisions,
            cell_height: (envelope.max_lat - envelope.min_lat) / n,
            cell_width: (envelope.max_lng - envelope.min_lng) / n,
        })
    }

    pub fn envelope(&self) -> &Bounds {
        &self.envelope
    }

    pub fn divisions(&self) -> u32 {
        self.divisions
    }

    /// Total number of cells (`divisions²`).
    pub fn cell_count(&self) -> u64 {
        self.divisions as u64 * self.divisions as u64
    }

    /// Find the cell containing a point.
    ///
    /// Rows count up from `min_lat`, columns from `min_lng`. A point on the
    /// max edge or outside the envelope clamps to the nearest edge cell, so
    /// this never fails. NaN coordinates land in index 0.
    ///
    /// # Arguments
    ///
    /// * `point` - Position to bin
    ///
    /// # Returns
    ///
    /// The [`CellId`] of the (possibly clamped) cell.
    ///
    /// # Example
    ///
    /// ```rust
    /// use route_rank::{Bounds, CellId, GpsPoint, Grid};
    ///
    /// let envelope = Bounds { min_lat: 0.0, max_lat: 10.0, min_lng: 0.0, max_lng: 10.0 };
    /// let grid = Grid::new(envelope, 10)?;
    ///
    /// assert_eq!(grid.cell_id_for(&GpsPoint::new(2.5, 7.5)), CellId::new(2, 7));
    /// // Outside the envelope: clamped to the edge
    /// assert_eq!(grid.cell_id_for(&GpsPoint::new(-5.0, 20.0)), CellId::new(0, 9));
    /// # Ok::<(), route_rank::RankingError>(())
    /// ```
    pub fn cell_id_for(&self, point: &GpsPoint) -> CellId {
        CellId {
            row: self.axis_index(point.latitude, self.envelope.min_lat, self.cell_height),
            col: self.axis_index(point.longitude, self.envelope.min_lng, self.cell_width),
        }
    }

    /// Center of `cell`.
    pub fn cell_center(&self, cell: CellId) -> GpsPoint {
        GpsPoint::new(
            self.envelope.min_lat + (cell.row as f64 + 0.5) * self.cell_height,
            self.envelope.min_lng + (cell.col as f64 + 0.5) * self.cell_width,
        )
    }

    /// Every cell with its center, row-major from the south-west corner.
    ///
    /// Calling again restarts the enumeration.
    pub fn cells_with_centers(&self) -> impl Iterator<Item = (CellId, GpsPoint)> + '_ {
        (0..self.divisions).flat_map(move |row| {
            (0..self.divisions).map(move |col| {
                let cell = CellId { row, col };
                (cell, self.cell_center(cell))
            })
        })
    }

    /// Find the tube cells for a set of corridor polygons.
    ///
    /// A cell qualifies when its *center* intersects any polygon. Polygon
    /// bounding boxes are indexed in an R-tree so each center is only tested
    /// against the polygons that could contain it.
    ///
    /// # Arguments
    ///
    /// * `polygons` - Corridor polygons with x = longitude, y = latitude
    ///
    /// # Returns
    ///
    /// The set of matching cells; empty when `polygons` is empty.
    ///
    /// # Example
    ///
    /// ```rust
    /// use geo::polygon;
    /// use route_rank::{Bounds, Grid};
    ///
    /// let envelope = Bounds { min_lat: 0.0, max_lat: 10.0, min_lng: 0.0, max_lng: 10.0 };
    /// let grid = Grid::new(envelope, 10)?;
    ///
    /// // Two columns wide, full height
    /// let corridor = polygon![
    ///     (x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 10.0), (x: 0.0, y: 10.0),
    /// ];
    /// assert_eq!(grid.cells_intersecting(&[corridor]).len(), 20);
    /// # Ok::<(), route_rank::RankingError>(())
    /// ```
    pub fn cells_intersecting(&self, polygons: &[Polygon<f64>]) -> HashSet<CellId> {
        let indexed: Vec<IndexedPolygon> = polygons
            .iter()
            .filter_map(|polygon| {
                let rect = polygon.bounding_rect()?;
                Some(IndexedPolygon {
                    polygon,
                    envelope: AABB::from_corners(
                        [rect.min().x, rect.min().y],
                        [rect.max().x, rect.max().y],
                    ),
                })
            })
            .collect();

        if indexed.is_empty() {
            return HashSet::new();
        }
        let rtree = RTree::bulk_load(indexed);

        self.cells_with_centers()
            .filter(|(_, center)| {
                let point = geo_utils::to_point(center);
                rtree
                    .locate_in_envelope_intersecting(&AABB::from_point([point.x(), point.y()]))
                    .any(|candidate| candidate.polygon.intersects(&point))
            })
            .map(|(cell, _)| cell)
            .collect()
    }

    fn axis_index(&self, value: f64, min: f64, cell_size: f64) -> u32 {
        if cell_size <= 0.0 {
            return 0;
        }
        let idx = ((value - min) / cell_size).floor();
        // NaN also lands in the first cell
        if !(idx >= 0.0) {
            0
        } else if idx >= self.divisions as f64 {
            self.divisions - 1
        } else {
            idx as u32
        }
    }
}

/// A corridor polygon with its bounding box, for R-tree pre-filtering
struct IndexedPolygon<'a> {
    polygon: &'a Polygon<f64>,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedPolygon<'_> {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Cap every count at 1, turning observation volume into cell coverage.
pub fn binarize(counts: &GridCounts) -> GridCounts {
    counts
        .iter()
        .map(|(cell, per_key)| {
            let ones = per_key
                .iter()
                .filter(|(_, count)| **count > 0)
                .map(|(key, _)| (key.clone(), 1))
                .collect();
            (*cell, ones)
        })
        .collect()
}

/// Number of distinct cells each entity appears in.
pub fn cells_covered(counts: &GridCounts) -> HashMap<String, u64> {
    let mut covered: HashMap<String, u64> = HashMap::new();
    for per_key in binarize(counts).values() {
        for (key, one) in per_key {
            *covered.entry(key.clone()).or_insert(0) += one;
        }
    }
    covered
}

/// Keep only the cells in `cells`.
pub fn restrict_to(counts: GridCounts, cells: &HashSet<CellId>) -> GridCounts {
    counts
        .into_iter()
        .filter(|(cell, _)| cells.contains(cell))
        .collect()
}
