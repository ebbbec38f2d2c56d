//! Error types for route ranking.

use thiserror::Error;

/// Errors that can occur while building a grid, validating a configuration,
/// or combining ranking results.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RankingError {
    /// Grid construction failed (zero divisions, inverted or non-finite envelope)
    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    /// A tuning value is out of range
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Two results computed over different grid configurations were merged
    #[error(
        "Cannot merge ranking values from different runs: \
         grid_divisions {left_divisions} vs {right_divisions}, \
         n_tube_cells {left_tube_cells} vs {right_tube_cells}"
    )]
    IncompatibleMerge {
        left_divisions: u32,
        right_divisions: u32,
        left_tube_cells: u64,
        right_tube_cells: u64,
    },
}

impl RankingError {
    /// Creates an invalid grid error.
    pub fn invalid_grid(msg: impl Into<String>) -> Self {
        Self::InvalidGrid(msg.into())
    }

    /// Creates an invalid config error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
