//! Global z-score standardization of daily grids.
//!
//! One [`Scaler`] is fitted over every cell of every day. The same scaler
//! must be applied at inference; refitting on live data would shift the
//! inputs away from what the model was trained on.

use crime_forecast_grid_models::{DailyGrid, Grid, Scaler};

use crate::GridError;

/// Standardized grids together with the scaler that produced them.
#[derive(Debug, Clone)]
pub struct Standardized {
    /// One grid per input day, in input order.
    pub grids: Vec<Grid>,
    /// Fitted parameters.
    pub scaler: Scaler,
}

/// Fits a scaler over all cells of all `grids` and returns the z-scored
/// sequence.
///
/// Uses the population standard deviation. A zero (or non-finite) standard
/// deviation is floored to `1`, so constant input standardizes to all
/// zeros.
///
/// # Errors
///
/// * [`GridError::EmptyGrids`] if `grids` is empty or has no cells
/// * [`GridError::ShapeMismatch`] if the grids do not all share the first
///   grid's size, or a grid's counts do not fill its size
pub fn fit(grids: &[DailyGrid]) -> Result<Standardized, GridError> {
    if let Some(first) = grids.first() {
        let expected = first.size;
        if let Some(bad) = grids
            .iter()
            .find(|g| g.size != expected || g.counts.len() != expected * expected)
        {
            return Err(GridError::ShapeMismatch {
                expected,
                actual: bad.size,
            });
        }
    }

    let count: usize = grids.iter().map(|g| g.counts.len()).sum();
    if count == 0 {
        return Err(GridError::EmptyGrids);
    }

    #[allow(clippy::cast_precision_loss)]
    let n = count as f64;
    let cells = || grids.iter().flat_map(|g| g.counts.iter().map(|&c| f64::from(c)));

    let mean = cells().sum::<f64>() / n;
    let variance = cells().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    let std = variance.sqrt();
    let std = if std > 0.0 && std.is_finite() {
        std
    } else {
        log::debug!("Zero variance across {count} cells, flooring std to 1");
        1.0
    };

    let scaler = Scaler { mean, std };
    log::info!("Fitted scaler over {count} cells: mean={mean:.6}, std={std:.6}");

    Ok(Standardized {
        grids: apply(grids, &scaler),
        scaler,
    })
}

/// Standardizes count grids with an existing scaler.
#[must_use]
pub fn apply(grids: &[DailyGrid], scaler: &Scaler) -> Vec<Grid> {
    grids
        .iter()
        .map(|g| Grid {
            size: g.size,
            values: g
                .counts
                .iter()
                .map(|&c| scaler.transform(f64::from(c)))
                .collect(),
        })
        .collect()
}

/// Maps standardized grids back to count units.
#[must_use]
pub fn invert(grids: &[Grid], scaler: &Scaler) -> Vec<Grid> {
    grids
        .iter()
        .map(|g| Grid {
            size: g.size,
            values: g.values.iter().map(|&v| scaler.inverse(v)).collect(),
        })
        .collect()
}
