#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Grid-to-grid forecast models.
//!
//! A model maps a window of standardized daily grids to one risk grid of
//! the same shape. The pipeline only depends on the [`ForecastModel`]
//! contract, so any regressor satisfying it can be dropped in. Two are
//! provided:
//!
//! * [`linear::LinearGridModel`], a shared-weight linear regression over
//!   per-cell window features, fitted in closed form.
//! * [`persistence::MeanPersistenceModel`], the baseline used when no
//!   trained artifact exists: it predicts the window mean.
//!
//! [`artifact`] persists a trained model together with the bounds and
//! scaler it was trained with.

pub mod artifact;
pub mod features;
pub mod linear;
pub mod persistence;

use std::path::PathBuf;

use crime_forecast_grid::window::TrainingPair;
use crime_forecast_grid_models::Grid;
use serde::{Deserialize, Serialize};

use crate::linear::LinearGridModel;
use crate::persistence::MeanPersistenceModel;

/// Errors that can occur while training, persisting or running a model.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// No model artifact exists at the given location.
    #[error("Model not found: {}", path.display())]
    ModelNotFound {
        /// Path that was checked.
        path: PathBuf,
    },

    /// A grid's resolution differs from the one the model was trained on.
    #[error("Grid size mismatch: model expects {expected}x{expected}, got {actual}x{actual}")]
    GridSizeMismatch {
        /// Resolution baked into the model.
        expected: usize,
        /// Resolution supplied.
        actual: usize,
    },

    /// The input window has the wrong number of days.
    #[error("Window length mismatch: model expects {expected} day(s), got {actual}")]
    WindowLengthMismatch {
        /// Window length baked into the model.
        expected: usize,
        /// Window length supplied.
        actual: usize,
    },

    /// Training was attempted without any examples.
    #[error("No training pairs supplied")]
    NoTrainingPairs,

    /// JSON serialization/deserialization failed.
    #[error("JSON error in {}: {source}", path.display())]
    Json {
        /// File being read or written.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },

    /// I/O error (file read/write/rename).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Training hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainOptions {
    /// L2 penalty on the non-bias weights.
    pub ridge: f64,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self { ridge: 1e-3 }
    }
}

/// A trainable function from a window of grids to one risk grid.
///
/// Output values are unconstrained reals in the standardized space of the
/// inputs; they are relative risk scores, not probabilities.
pub trait ForecastModel: Send + Sync {
    /// Fits a model to `pairs`. Every window in `pairs` must have the same
    /// length and every grid the same resolution.
    ///
    /// # Errors
    ///
    /// * [`ModelError::NoTrainingPairs`] if `pairs` is empty
    /// * [`ModelError::GridSizeMismatch`] or
    ///   [`ModelError::WindowLengthMismatch`] on inconsistent shapes
    fn train(pairs: &[TrainingPair<'_>], options: &TrainOptions) -> Result<Self, ModelError>
    where
        Self: Sized;

    /// Cells per side the model expects.
    fn grid_size(&self) -> usize;

    /// Days per input window the model expects.
    fn window_length(&self) -> usize;

    /// Predicts the grid following `window`.
    ///
    /// # Errors
    ///
    /// * [`ModelError::WindowLengthMismatch`] if `window` has the wrong
    ///   number of days
    /// * [`ModelError::GridSizeMismatch`] if any grid has the wrong size
    fn predict(&self, window: &[Grid]) -> Result<Grid, ModelError>;
}

/// Checks `window` against a model's expected shape.
///
/// # Errors
///
/// Returns the first mismatch found.
pub fn check_window(
    window: &[Grid],
    grid_size: usize,
    window_length: usize,
) -> Result<(), ModelError> {
    if window.len() != window_length {
        return Err(ModelError::WindowLengthMismatch {
            expected: window_length,
            actual: window.len(),
        });
    }
    if let Some(bad) = window.iter().find(|g| g.size != grid_size) {
        return Err(ModelError::GridSizeMismatch {
            expected: grid_size,
            actual: bad.size,
        });
    }
    Ok(())
}

/// Infers `(grid_size, window_length)` from training pairs and checks that
/// every pair agrees.
///
/// # Errors
///
/// * [`ModelError::NoTrainingPairs`] if `pairs` is empty
/// * a shape mismatch if any pair disagrees with the first
pub fn training_shape(pairs: &[TrainingPair<'_>]) -> Result<(usize, usize), ModelError> {
    let first = pairs.first().ok_or(ModelError::NoTrainingPairs)?;
    let grid_size = first.label.size;
    let window_length = first.window.len();
    for pair in pairs {
        check_window(pair.window, grid_size, window_length)?;
        if pair.label.size != grid_size {
            return Err(ModelError::GridSizeMismatch {
                expected: grid_size,
                actual: pair.label.size,
            });
        }
    }
    Ok((grid_size, window_length))
}

/// A persisted model of any supported kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SavedModel {
    /// Trained shared-weight linear model.
    Linear(LinearGridModel),
    /// Window-mean baseline.
    MeanPersistence(MeanPersistenceModel),
}

impl SavedModel {
    fn inner(&self) -> &dyn ForecastModel {
        match self {
            Self::Linear(m) => m as &dyn ForecastModel,
            Self::MeanPersistence(m) => m,
        }
    }

    /// Whether this is the untrained baseline.
    #[must_use]
    pub const fn is_baseline(&self) -> bool {
        matches!(self, Self::MeanPersistence(_))
    }

    #[must_use]
    pub fn grid_size(&self) -> usize {
        self.inner().grid_size()
    }

    #[must_use]
    pub fn window_length(&self) -> usize {
        self.inner().window_length()
    }

    /// Predicts the grid following `window`.
    ///
    /// # Errors
    ///
    /// See [`ForecastModel::predict`].
    pub fn predict(&self, window: &[Grid]) -> Result<Grid, ModelError> {
        self.inner().predict(window)
    }

    /// Rolls the model forward `steps` days, feeding each prediction back
    /// into the window, and returns every predicted grid in order.
    ///
    /// # Errors
    ///
    /// See [`ForecastModel::predict`].
    pub fn rollout(&self, window: &[Grid], steps: usize) -> Result<Vec<Grid>, ModelError> {
        let mut current = window.to_vec();
        let mut out = Vec::with_capacity(steps);
        for _ in 0..steps {
            let next = self.predict(&current)?;
            if !current.is_empty() {
                current.remove(0);
            }
            current.push(next.clone());
            out.push(next);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(size: usize, v: f64) -> Grid {
        Grid::from_values(size, vec![v; size * size]).unwrap()
    }

    #[test]
    fn check_window_reports_length_first() {
        let window = vec![constant(2, 0.0)];
        assert!(matches!(
            check_window(&window, 3, 2),
            Err(ModelError::WindowLengthMismatch {
                expected: 2,
                actual: 1
            })
        ));
        assert!(matches!(
            check_window(&window, 3, 1),
            Err(ModelError::GridSizeMismatch {
                expected: 3,
                actual: 2
            })
        ));
        assert!(check_window(&window, 2, 1).is_ok());
    }

    #[test]
    fn rollout_slides_predictions_into_the_window() {
        let model = SavedModel::MeanPersistence(MeanPersistenceModel::new(1, 2));
        let window = vec![constant(1, 0.0), constant(1, 4.0)];
        let out = model.rollout(&window, 3).unwrap();
        let values: Vec<f64> = out.iter().map(|g| g.values[0]).collect();
        assert!((values[0] - 2.0).abs() < 1e-12);
        assert!((values[1] - 3.0).abs() < 1e-12);
        assert!((values[2] - 2.5).abs() < 1e-12);
    }

    #[test]
    fn training_shape_requires_pairs() {
        assert!(matches!(
            training_shape(&[]),
            Err(ModelError::NoTrainingPairs)
        ));
    }
}
