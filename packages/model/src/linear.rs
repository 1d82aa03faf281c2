//! Shared-weight linear grid model.
//!
//! Every cell is predicted from its own [`WindowFeatures`] row with one
//! weight vector shared across the grid, the same way a convolution kernel
//! is shared across positions. Weights are the ridge least-squares
//! solution over every cell of every training pair, so training is
//! deterministic.

use crime_forecast_grid::window::TrainingPair;
use crime_forecast_grid_models::Grid;
use serde::{Deserialize, Serialize};

use crate::features::{FEATURE_COUNT, WindowFeatures};
use crate::persistence::MeanPersistenceModel;
use crate::{ForecastModel, ModelError, TrainOptions, check_window, training_shape};

/// Weights that reproduce the window-mean baseline.
const PERSISTENCE_WEIGHTS: [f64; FEATURE_COUNT] = [0.0, 1.0, 0.0, 0.0];

/// A trained linear model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearGridModel {
    grid_size: usize,
    window_length: usize,
    /// Bias, window mean, last day, neighbourhood mean.
    weights: [f64; FEATURE_COUNT],
    /// Mean squared error on the training pairs.
    training_mse: f64,
}

impl LinearGridModel {
    #[must_use]
    pub const fn weights(&self) -> &[f64; FEATURE_COUNT] {
        &self.weights
    }

    #[must_use]
    pub const fn training_mse(&self) -> f64 {
        self.training_mse
    }

    fn predict_features(&self, features: &WindowFeatures) -> Grid {
        let values = features
            .rows()
            .iter()
            .map(|row| dot(&self.weights, row))
            .collect();
        Grid {
            size: features.size(),
            values,
        }
    }
}

impl ForecastModel for LinearGridModel {
    fn train(pairs: &[TrainingPair<'_>], options: &TrainOptions) -> Result<Self, ModelError> {
        let (grid_size, window_length) = training_shape(pairs)?;

        let mut xtx = [[0.0; FEATURE_COUNT]; FEATURE_COUNT];
        let mut xty = [0.0; FEATURE_COUNT];
        let features: Vec<WindowFeatures> = pairs
            .iter()
            .map(|p| WindowFeatures::extract(p.window, grid_size))
            .collect();

        for (f, pair) in features.iter().zip(pairs) {
            for (row, &y) in f.rows().iter().zip(&pair.label.values) {
                for a in 0..FEATURE_COUNT {
                    xty[a] += row[a] * y;
                    for b in 0..FEATURE_COUNT {
                        xtx[a][b] += row[a] * row[b];
                    }
                }
            }
        }
        // The bias is left unpenalized.
        for (a, row) in xtx.iter_mut().enumerate().skip(1) {
            row[a] += options.ridge;
        }

        let weights = solve(xtx, xty).unwrap_or_else(|| {
            log::warn!("Normal equations are singular, falling back to window-mean weights");
            PERSISTENCE_WEIGHTS
        });

        let mut model = Self {
            grid_size,
            window_length,
            weights,
            training_mse: 0.0,
        };
        let training_mse = mse(pairs, &features, |f| model.predict_features(f));
        model.training_mse = training_mse;

        let baseline = MeanPersistenceModel::new(grid_size, window_length);
        let baseline_mse = mse(pairs, &features, |f| baseline.predict_features(f));
        log::info!(
            "Trained linear grid model on {} pair(s): weights={:?}, mse={:.6} (baseline {:.6})",
            pairs.len(),
            model.weights,
            model.training_mse,
            baseline_mse
        );

        Ok(model)
    }

    fn grid_size(&self) -> usize {
        self.grid_size
    }

    fn window_length(&self) -> usize {
        self.window_length
    }

    fn predict(&self, window: &[Grid]) -> Result<Grid, ModelError> {
        check_window(window, self.grid_size, self.window_length)?;
        Ok(self.predict_features(&WindowFeatures::extract(window, self.grid_size)))
    }
}

fn dot(w: &[f64; FEATURE_COUNT], x: &[f64; FEATURE_COUNT]) -> f64 {
    w.iter().zip(x).map(|(a, b)| a * b).sum()
}

fn mse(
    pairs: &[TrainingPair<'_>],
    features: &[WindowFeatures],
    predict: impl Fn(&WindowFeatures) -> Grid,
) -> f64 {
    let mut sum = 0.0;
    let mut count = 0_usize;
    for (f, pair) in features.iter().zip(pairs) {
        let predicted = predict(f);
        for (p, y) in predicted.values.iter().zip(&pair.label.values) {
            sum += (p - y) * (p - y);
            count += 1;
        }
    }
    if count == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = count as f64;
    sum / n
}

/// Solves `a * x = b` by Gaussian elimination with partial pivoting.
/// Returns `None` when `a` is singular.
fn solve(
    mut a: [[f64; FEATURE_COUNT]; FEATURE_COUNT],
    mut b: [f64; FEATURE_COUNT],
) -> Option<[f64; FEATURE_COUNT]> {
    const PIVOT_EPSILON: f64 = 1e-12;

    for col in 0..FEATURE_COUNT {
        let pivot = (col..FEATURE_COUNT)
            .max_by(|&r1, &r2| a[r1][col].abs().total_cmp(&a[r2][col].abs()))?;
        if a[pivot][col].abs() < PIVOT_EPSILON {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..FEATURE_COUNT {
            let factor = a[row][col] / a[col][col];
            for k in col..FEATURE_COUNT {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = [0.0; FEATURE_COUNT];
    for row in (0..FEATURE_COUNT).rev() {
        let tail: f64 = (row + 1..FEATURE_COUNT).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    x.iter().all(|v| v.is_finite()).then_some(x)
}
