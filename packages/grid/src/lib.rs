#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Spatiotemporal aggregation for the crime forecast pipeline.
//!
//! Incidents flow through these stages in order:
//!
//! 1. [`bounds::BoundsEstimator`] derives the geographic box.
//! 2. [`geo_grid::GeoGrid`] partitions that box into `N x N` cells.
//! 3. [`daily::build_daily_grids`] counts incidents per cell per day.
//! 4. [`standardize`] z-scores every cell with one global scaler.
//! 5. [`window::windows`] slides a fixed-length window over the days to
//!    produce `(history, next day)` training pairs.

pub mod bounds;
pub mod daily;
pub mod geo_grid;
pub mod standardize;
pub mod window;

use crime_forecast_grid_models::GeoBox;

/// Errors raised while building or reshaping grids.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    /// The box has zero or negative extent, or a non-finite edge.
    #[error(
        "Invalid bounds (south={}, west={}, north={}, east={}): expected south < north and west < east",
        bounds.south, bounds.west, bounds.north, bounds.east
    )]
    InvalidBox {
        /// The offending box.
        bounds: GeoBox,
    },

    /// Grid resolution must be at least one cell per side.
    #[error("Grid size must be positive")]
    ZeroGridSize,

    /// Window length must be at least one day.
    #[error("Window length must be positive")]
    ZeroWindowLength,

    /// Not enough days to form a single window plus label.
    #[error(
        "Insufficient data: {available} day(s) available, at least {required} required for one window and its label"
    )]
    InsufficientData {
        /// Number of daily grids supplied.
        available: usize,
        /// `window_length + 1`.
        required: usize,
    },

    /// A grid did not have the resolution the operation expected.
    #[error("Grid shape mismatch: expected {expected}x{expected}, got {actual}x{actual}")]
    ShapeMismatch {
        /// Expected cells per side.
        expected: usize,
        /// Actual cells per side.
        actual: usize,
    },

    /// Standardization needs at least one grid.
    #[error("Cannot standardize an empty grid sequence")]
    EmptyGrids,
}
