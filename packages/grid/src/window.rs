//! Sliding windows over a standardized daily sequence.

use crime_forecast_grid_models::Grid;

use crate::GridError;

/// A run of consecutive days paired with the day that follows it.
#[derive(Debug, Clone, Copy)]
pub struct TrainingPair<'a> {
    /// `length` consecutive grids.
    pub window: &'a [Grid],
    /// The grid immediately after `window`.
    pub label: &'a Grid,
}

/// Produces every `(window, label)` pair that fits in `grids`.
///
/// Yields exactly `grids.len() - length` pairs; pair `k` has
/// `window == grids[k..k + length]` and `label == grids[k + length]`.
///
/// # Errors
///
/// * [`GridError::ZeroWindowLength`] if `length` is zero
/// * [`GridError::InsufficientData`] if fewer than `length + 1` grids are
///   supplied, since no training pair could be formed
pub fn windows(grids: &[Grid], length: usize) -> Result<Vec<TrainingPair<'_>>, GridError> {
    if length == 0 {
        return Err(GridError::ZeroWindowLength);
    }
    if grids.len() <= length {
        return Err(GridError::InsufficientData {
            available: grids.len(),
            required: length + 1,
        });
    }

    Ok(grids
        .windows(length + 1)
        .map(|run| TrainingPair {
            window: &run[..length],
            label: &run[length],
        })
        .collect())
}

/// The most recent `length` grids, for inference.
///
/// # Errors
///
/// * [`GridError::ZeroWindowLength`] if `length` is zero
/// * [`GridError::InsufficientData`] if fewer than `length` grids exist
pub fn latest(grids: &[Grid], length: usize) -> Result<&[Grid], GridError> {
    if length == 0 {
        return Err(GridError::ZeroWindowLength);
    }
    if grids.len() < length {
        return Err(GridError::InsufficientData {
            available: grids.len(),
            required: length,
        });
    }
    Ok(&grids[grids.len() - length..])
}
