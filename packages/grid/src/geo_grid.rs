//! Mapping between geographic coordinates and grid cells.
//!
//! Binning and bounds reporting share the same edge function, so a cell's
//! reported sub-box is exactly the region whose points bin into it.

use crime_forecast_grid_models::{CellIndex, GeoBox};

use crate::GridError;

/// An `N x N` partition of a geographic box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoGrid {
    bounds: GeoBox,
    size: usize,
}

impl GeoGrid {
    /// Creates a grid over `bounds` with `size` cells per side.
    ///
    /// # Errors
    ///
    /// * [`GridError::InvalidBox`] if the box is degenerate or non-finite
    /// * [`GridError::ZeroGridSize`] if `size` is zero
    pub fn new(bounds: GeoBox, size: usize) -> Result<Self, GridError> {
        if size == 0 {
            return Err(GridError::ZeroGridSize);
        }
        if !bounds.is_valid() {
            return Err(GridError::InvalidBox { bounds });
        }
        Ok(Self { bounds, size })
    }

    #[must_use]
    pub const fn bounds(&self) -> GeoBox {
        self.bounds
    }

    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Bins `(lat, lng)` into a cell.
    ///
    /// Points outside the box are clamped to the nearest edge cell rather
    /// than rejected.
    #[must_use]
    pub fn cell_index(&self, lat: f64, lng: f64) -> CellIndex {
        let b = &self.bounds;
        CellIndex {
            i: self.band((lat - b.south) / b.lat_span()),
            j: self.band((lng - b.west) / b.lng_span()),
        }
    }

    /// The sub-box covered by `cell`.
    ///
    /// Adjacent cells share identical edge values and the outermost edges
    /// equal the grid bounds, so the cells tile the box exactly.
    #[must_use]
    pub fn cell_bounds(&self, cell: CellIndex) -> GeoBox {
        let b = &self.bounds;
        GeoBox {
            south: self.edge(b.south, b.north, cell.i),
            north: self.edge(b.south, b.north, cell.i + 1),
            west: self.edge(b.west, b.east, cell.j),
            east: self.edge(b.west, b.east, cell.j + 1),
        }
    }

    /// Every cell in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = CellIndex> + '_ {
        (0..self.size).flat_map(move |i| (0..self.size).map(move |j| CellIndex { i, j }))
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn band(&self, fraction: f64) -> usize {
        let raw = (fraction * self.size as f64).floor();
        if raw.is_nan() || raw <= 0.0 {
            0
        } else if raw >= (self.size - 1) as f64 {
            self.size - 1
        } else {
            raw as usize
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn edge(&self, low: f64, high: f64, k: usize) -> f64 {
        if k >= self.size {
            return high;
        }
        (high - low).mul_add(k as f64 / self.size as f64, low)
    }
}
