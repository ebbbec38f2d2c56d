//! Observation sources.
//!
//! [`PingSource`] is the seam to whatever store holds the raw observations.
//! The ranking code only needs per-key ping lists; per-key totals and
//! per-cell counts have default implementations a store may override with
//! something cheaper (e.g. a pushed-down aggregation query).

use std::collections::HashMap;

use crate::grid::{Grid, GridCounts};
use crate::Ping;

/// A collection of pings grouped by entity key.
pub trait PingSource: Sync {
    /// Entity keys with at least one ping.
    fn keys(&self) -> Vec<&str>;

    /// All pings for `key`; empty if the key is unknown.
    fn pings_for(&self, key: &str) -> &[Ping];

    /// Number of pings per entity key. Pings with invalid coordinates are
    /// not counted.
    fn count_keys(&self) -> HashMap<String, u64> {
        self.keys()
            .into_iter()
            .map(|key| {
                let valid = self.pings_for(key).iter().filter(|p| p.point.is_valid()).count();
                (key.to_string(), valid as u64)
            })
            .filter(|(_, count)| *count > 0)
            .collect()
    }

    /// Number of pings per entity key in each grid cell. Pings with invalid
    /// coordinates are skipped rather than clamped into an edge cell.
    fn grid_counts(&self, grid: &Grid) -> GridCounts {
        let mut counts: GridCounts = HashMap::new();
        for key in self.keys() {
            for ping in self.pings_for(key).iter().filter(|p| p.point.is_valid()) {
                *counts
                    .entry(grid.cell_id_for(&ping.point))
                    .or_default()
                    .entry(key.to_string())
                    .or_insert(0) += 1;
            }
        }
        counts
    }
}

/// In-memory [`PingSource`].
#[derive(Debug, Clone, Default)]
pub struct PingCollection {
    by_key: HashMap<String, Vec<Ping>>,
}

impl PingCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Group `pings` by their entity key, preserving input order per key.
    pub fn from_pings(pings: impl IntoIterator<Item = Ping>) -> Self {
        let mut collection = Self::new();
        for ping in pings {
            collection.push(ping);
        }
        collection
    }

    pub fn push(&mut self, ping: Ping) {
        self.by_key.entry(ping.key.clone()).or_default().push(ping);
    }

    /// Total number of pings.
    pub fn len(&self) -> usize {
        self.by_key.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// A new collection holding only the pings that satisfy `predicate`.
    ///
    /// Typically used to derive the route-proximal (tube) subset from the
    /// box-wide collection.
    pub fn filter(&self, predicate: impl Fn(&Ping) -> bool) -> Self {
        Self::from_pings(self.by_key.values().flatten().filter(|p| predicate(p)).cloned())
    }
}

impl FromIterator<Ping> for PingCollection {
    fn from_iter<I: IntoIterator<Item = Ping>>(iter: I) -> Self {
        Self::from_pings(iter)
    }
}

impl PingSource for PingCollection {
    fn keys(&self) -> Vec<&str> {
        self.by_key.keys().map(String::as_str).collect()
    }

    fn pings_for(&self, key: &str) -> &[Ping] {
        self.by_key.get(key).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Bounds, CellId};

    fn sample() -> PingCollection {
        PingCollection::from_pings(vec![
            Ping::new("a", 0.5, 0.5, Some(0)),
            Ping::new("a", 0.6, 0.6, Some(1_000)),
            Ping::new("a", 9.5, 9.5, None),
            Ping::new("b", 0.5, 0.5, Some(0)),
        ])
    }

    #[test]
    fn test_groups_by_key() {
        let pings = sample();
        assert_eq!(pings.len(), 4);
        assert!(!pings.is_empty());
        assert_eq!(pings.pings_for("a").len(), 3);
        assert_eq!(pings.pings_for("b").len(), 1);
        assert!(pings.pings_for("missing").is_empty());

        let mut keys = pings.keys();
        keys.sort();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_count_keys() {
        let counts = sample().count_keys();
        assert_eq!(counts["a"], 3);
        assert_eq!(counts["b"], 1);
        assert_eq!(counts.len(), 2);
    }

    #[test]
    fn test_grid_counts() {
        let grid = Grid::new(Bounds { min_lat: 0.0, max_lat: 10.0, min_lng: 0.0, max_lng: 10.0 }, 10)
            .unwrap();
        let counts = sample().grid_counts(&grid);

        let corner = &counts[&CellId::new(0, 0)];
        assert_eq!(corner["a"], 2);
        assert_eq!(corner["b"], 1);
        assert_eq!(counts[&CellId::new(9, 9)]["a"], 1);
        assert_eq!(counts.len(), 2);
    }

    #[test]
    fn test_invalid_coordinates_are_not_counted() {
        let mut pings = sample();
        pings.push(Ping::new("a", f64::NAN, 0.5, Some(2_000)));
        pings.push(Ping::new("b", 0.5, 200.0, Some(1_000)));
        pings.push(Ping::new("ghost", -91.0, 0.0, Some(0)));

        let counts = pings.count_keys();
        assert_eq!(counts["a"], 3);
        assert_eq!(counts["b"], 1);
        assert!(!counts.contains_key("ghost"));

        let grid = Grid::new(Bounds { min_lat: 0.0, max_lat: 10.0, min_lng: 0.0, max_lng: 10.0 }, 10)
            .unwrap();
        let cells = pings.grid_counts(&grid);
        let corner = &cells[&CellId::new(0, 0)];
        assert_eq!(corner["a"], 2);
        assert_eq!(corner["b"], 1);
        assert!(!corner.contains_key("ghost"));
        assert_eq!(cells.len(), 2);
    }

    #[test]
    fn test_filter() {
        let near_origin = sample().filter(|p| p.point.latitude < 1.0);
        assert_eq!(near_origin.len(), 3);
        assert_eq!(near_origin.pings_for("a").len(), 2);

        let nothing = sample().filter(|_| false);
        assert!(nothing.is_empty());
        assert!(nothing.count_keys().is_empty());
    }

    #[test]
    fn test_collect_from_iterator() {
        let pings: PingCollection = (0..3).map(|i| Ping::new("x", 0.0, 0.0, Some(i))).collect();
        assert_eq!(pings.pings_for("x").len(), 3);
    }
}
