//! Window-mean baseline.
//!
//! Served when no trained artifact exists, so a forecast request always
//! gets an answer of the right shape.

use crime_forecast_grid::window::TrainingPair;
use crime_forecast_grid_models::Grid;
use serde::{Deserialize, Serialize};

use crate::features::{WindowFeatures, window_mean};
use crate::{ForecastModel, ModelError, TrainOptions, check_window, training_shape};

/// Predicts each cell as its mean over the input window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeanPersistenceModel {
    grid_size: usize,
    window_length: usize,
}

impl MeanPersistenceModel {
    #[must_use]
    pub const fn new(grid_size: usize, window_length: usize) -> Self {
        Self {
            grid_size,
            window_length,
        }
    }

    pub(crate) fn predict_features(&self, features: &WindowFeatures) -> Grid {
        Grid {
            size: features.size(),
            values: features.rows().iter().map(|row| row[1]).collect(),
        }
    }
}

impl ForecastModel for MeanPersistenceModel {
    fn train(pairs: &[TrainingPair<'_>], _options: &TrainOptions) -> Result<Self, ModelError> {
        let (grid_size, window_length) = training_shape(pairs)?;
        Ok(Self::new(grid_size, window_length))
    }

    fn grid_size(&self) -> usize {
        self.grid_size
    }

    fn window_length(&self) -> usize {
        self.window_length
    }

    fn predict(&self, window: &[Grid]) -> Result<Grid, ModelError> {
        check_window(window, self.grid_size, self.window_length)?;
        Ok(Grid {
            size: self.grid_size,
            values: window_mean(window, self.grid_size),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicts_window_mean() {
        let model = MeanPersistenceModel::new(2, 2);
        let a = Grid::from_values(2, vec![0.0, 2.0, 4.0, 6.0]).unwrap();
        let b = Grid::from_values(2, vec![2.0, 2.0, 0.0, -6.0]).unwrap();
        let out = model.predict(&[a, b]).unwrap();
        assert_eq!(out.values, vec![1.0, 2.0, 2.0, 0.0]);
    }

    #[test]
    fn all_zero_window_predicts_zero() {
        let model = MeanPersistenceModel::new(3, 1);
        let out = model.predict(&[Grid::zeros(3)]).unwrap();
        assert!(out.values.iter().all(|&v| v == 0.0));
    }
}
