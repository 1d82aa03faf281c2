//! Per-cell features summarizing a window of grids.

use crime_forecast_grid_models::Grid;

/// Number of features per cell, including the bias term.
pub const FEATURE_COUNT: usize = 4;

/// Features for every cell of a window, row-major.
///
/// For cell `(i, j)` the features are:
///
/// 0. bias (`1.0`)
/// 1. mean of the cell over the window
/// 2. the cell's value on the most recent day
/// 3. mean of the window-mean over the cell's 3x3 neighbourhood (clipped
///    at the grid edges)
#[derive(Debug, Clone)]
pub struct WindowFeatures {
    size: usize,
    rows: Vec<[f64; FEATURE_COUNT]>,
}

impl WindowFeatures {
    /// Computes features for `window`. All grids must share `size`; an
    /// empty window yields all-zero features apart from the bias.
    #[must_use]
    pub fn extract(window: &[Grid], size: usize) -> Self {
        let cells = size * size;
        let mean = window_mean(window, size);
        let last = window
            .last()
            .map_or_else(|| vec![0.0; cells], |g| g.values.clone());

        let mut rows = Vec::with_capacity(cells);
        for i in 0..size {
            for j in 0..size {
                let k = i * size + j;
                rows.push([1.0, mean[k], last[k], neighbourhood_mean(&mean, size, i, j)]);
            }
        }
        Self { size, rows }
    }

    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Feature rows, one per cell in row-major order.
    #[must_use]
    pub fn rows(&self) -> &[[f64; FEATURE_COUNT]] {
        &self.rows
    }
}

/// Per-cell mean over the window.
#[must_use]
pub fn window_mean(window: &[Grid], size: usize) -> Vec<f64> {
    let mut out = vec![0.0; size * size];
    if window.is_empty() {
        return out;
    }
    for g in window {
        for (acc, v) in out.iter_mut().zip(&g.values) {
            *acc += v;
        }
    }
    #[allow(clippy::cast_precision_loss)]
    let n = window.len() as f64;
    for v in &mut out {
        *v /= n;
    }
    out
}

fn neighbourhood_mean(values: &[f64], size: usize, i: usize, j: usize) -> f64 {
    let mut sum = 0.0;
    let mut count = 0_u32;
    for ni in i.saturating_sub(1)..=(i + 1).min(size - 1) {
        for nj in j.saturating_sub(1)..=(j + 1).min(size - 1) {
            sum += values[ni * size + nj];
            count += 1;
        }
    }
    sum / f64::from(count)
}
