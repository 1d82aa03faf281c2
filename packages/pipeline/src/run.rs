//! The training half of the pipeline.

use std::sync::Arc;

use crime_forecast_grid::bounds::BoundsEstimator;
use crime_forecast_grid::daily::build_daily_grids;
use crime_forecast_grid::geo_grid::GeoGrid;
use crime_forecast_grid::standardize::{self, Standardized};
use crime_forecast_grid::window::{self, TrainingPair};
use crime_forecast_grid_models::{DateRange, GeoBox, Grid, Point, Scaler};
use crime_forecast_ingest::loader::{LoadedIncidents, load_incidents};
use crime_forecast_ingest::progress::ProgressCallback;
use crime_forecast_model::artifact::{ModelArtifact, ModelMetadata};
use crime_forecast_model::linear::LinearGridModel;
use crime_forecast_model::{ForecastModel, SavedModel, TrainOptions};

use crate::PipelineError;
use crate::config::ForecastConfig;

/// Everything one training run derives from its input points.
///
/// Bounds and scaler are fixed here and persisted with the model, so the
/// serving path can bin and standardize new data exactly as training did.
#[derive(Debug, Clone)]
pub struct TrainingRun {
    /// Box the grid partitions.
    pub bounds: GeoBox,
    /// Global standardization fitted over every training cell.
    pub scaler: Scaler,
    /// Days covered by `grids`.
    pub range: DateRange,
    /// Cells per side.
    pub grid_size: usize,
    /// Days per model input window.
    pub window_length: usize,
    /// One standardized grid per day of `range`.
    pub grids: Vec<Grid>,
}

impl TrainingRun {
    /// Runs bounds derivation, daily binning and standardization over
    /// `points`.
    ///
    /// # Errors
    ///
    /// * [`PipelineError::NoData`] if `points` is empty
    /// * [`PipelineError::Grid`] if the grid cannot be built or the days
    ///   covered are too few for one window and its label
    pub fn prepare(points: &[Point], config: &ForecastConfig) -> Result<Self, PipelineError> {
        let range = DateRange::covering(points).ok_or(PipelineError::NoData)?;
        let bounds = BoundsEstimator::new(config.default_bounds)
            .compute_for_binning(points, config.degenerate_padding);
        let grid = GeoGrid::new(bounds, config.grid_size)?;

        let daily = build_daily_grids(points, &grid, range);
        let Standardized { grids, scaler } = standardize::fit(&daily)?;

        let run = Self {
            bounds,
            scaler,
            range,
            grid_size: config.grid_size,
            window_length: config.window_length,
            grids,
        };
        let pairs = run.pairs()?.len();
        log::info!(
            "Prepared {} day(s) from {} to {}: {pairs} training pair(s) of {} day(s)",
            run.grids.len(),
            range.start,
            range.end,
            run.window_length
        );
        Ok(run)
    }

    /// Every `(window, next day)` pair over the standardized sequence.
    ///
    /// # Errors
    ///
    /// * [`PipelineError::Grid`] if there are not enough days
    pub fn pairs(&self) -> Result<Vec<TrainingPair<'_>>, PipelineError> {
        Ok(window::windows(&self.grids, self.window_length)?)
    }

    /// Bounds and scaler to persist alongside the model.
    #[must_use]
    pub const fn metadata(&self) -> ModelMetadata {
        ModelMetadata {
            bounds: self.bounds,
            scaler: self.scaler,
        }
    }

    /// Fits a model of type `M` to this run's pairs.
    ///
    /// # Errors
    ///
    /// * [`PipelineError::Grid`] if there are not enough days
    /// * [`PipelineError::Model`] if training fails
    pub fn train<M: ForecastModel>(&self, options: &TrainOptions) -> Result<M, PipelineError> {
        let pairs = self.pairs()?;
        Ok(M::train(&pairs, options)?)
    }
}

/// Loads `config.data_path`, reporting progress through `progress`.
///
/// # Errors
///
/// * [`PipelineError::Ingest`] if the file is missing, lacks a mandatory
///   column, or (under the strict row policy) contains a bad row
pub fn load_points(
    config: &ForecastConfig,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<LoadedIncidents, PipelineError> {
    let loaded = load_incidents(&config.data_path, &config.load_options(), progress)?;
    log::info!(
        "Loaded {} incident(s) from {} ({} row(s) read, {} dropped)",
        loaded.points.len(),
        config.data_path.display(),
        loaded.rows_read,
        loaded.rows_dropped
    );
    Ok(loaded)
}

/// Runs the full training pipeline and writes the artifact to
/// `config.model_dir`.
///
/// # Errors
///
/// Any stage's error; see [`load_points`] and [`TrainingRun::prepare`].
/// Nothing is written unless every stage succeeds.
pub fn train_and_save(
    config: &ForecastConfig,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<ModelArtifact, PipelineError> {
    let loaded = load_points(config, progress)?;
    let run = TrainingRun::prepare(&loaded.points, config)?;
    let model: LinearGridModel = run.train(&config.train_options())?;

    let artifact = ModelArtifact {
        model: SavedModel::Linear(model),
        metadata: run.metadata(),
    };
    artifact.save(&config.model_dir)?;
    Ok(artifact)
}

#[cfg(test)]
mod tests {
    use std::fmt::Write as _;
    use std::path::PathBuf;

    use chrono::NaiveDate;
    use crime_forecast_grid::GridError;
    use crime_forecast_ingest::progress::null_progress;

    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("crime_forecast_{name}_{}", uuid::Uuid::new_v4()))
    }

    fn point(day: u32, lat: f64, lng: f64) -> Point {
        Point {
            day: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            lat,
            lng,
            category: None,
        }
    }

    fn small_config() -> ForecastConfig {
        ForecastConfig {
            grid_size: 4,
            window_length: 2,
            ..ForecastConfig::default()
        }
    }

    #[test]
    fn prepare_builds_one_grid_per_day() {
        let points = vec![
            point(1, 37.70, -122.50),
            point(2, 37.80, -122.40),
            point(4, 37.75, -122.45),
        ];
        let run = TrainingRun::prepare(&points, &small_config()).unwrap();

        assert_eq!(run.grids.len(), 4);
        assert!(run.grids.iter().all(|g| g.size == 4));
        assert!((run.bounds.south - 37.70).abs() < 1e-12);
        assert!((run.bounds.east + 122.40).abs() < 1e-12);
        assert_eq!(run.pairs().unwrap().len(), 2);
        assert_eq!(run.metadata().scaler, run.scaler);
    }

    #[test]
    fn prepare_widens_single_point_bounds() {
        let points = vec![point(1, 10.0, 20.0), point(5, 10.0, 20.0)];
        let run = TrainingRun::prepare(&points, &small_config()).unwrap();
        assert!(run.bounds.is_valid());
        assert!(run.bounds.contains(10.0, 20.0));
    }

    #[test]
    fn prepare_requires_points() {
        assert!(matches!(
            TrainingRun::prepare(&[], &small_config()),
            Err(PipelineError::NoData)
        ));
    }

    #[test]
    fn prepare_requires_enough_days() {
        let points = vec![point(1, 37.70, -122.50), point(2, 37.80, -122.40)];
        let err = TrainingRun::prepare(&points, &small_config()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Grid(GridError::InsufficientData {
                available: 2,
                required: 3
            })
        ));
        assert!(err.is_configuration_error());
    }

    fn write_incidents(path: &std::path::Path, days: u32) {
        let mut csv = String::from("Date,Lat,Lon,Category\n");
        for d in 1..=days {
            for k in 0..(d % 3 + 1) {
                let lat = 37.71 + 0.01 * f64::from((d + k) % 10);
                let lng = -122.51 + 0.015 * f64::from((d * 3 + k) % 10);
                writeln!(csv, "2024-03-{d:02},{lat},{lng},THEFT").unwrap();
            }
        }
        csv.push_str("not a date,37.75,-122.45,THEFT\n");
        std::fs::write(path, csv).unwrap();
    }

    #[test]
    fn train_and_save_writes_a_loadable_artifact() {
        let data = temp_path("incidents.csv");
        let model_dir = temp_path("models");
        write_incidents(&data, 20);
        let config = ForecastConfig {
            data_path: data.clone(),
            model_dir: model_dir.clone(),
            ..small_config()
        };

        let artifact = train_and_save(&config, &null_progress()).unwrap();
        let loaded = ModelArtifact::load(&model_dir).unwrap();
        std::fs::remove_file(&data).ok();
        std::fs::remove_dir_all(&model_dir).ok();

        assert_eq!(loaded, artifact);
        assert!(!loaded.model.is_baseline());
        assert_eq!(loaded.model.grid_size(), 4);
        assert_eq!(loaded.model.window_length(), 2);
        assert!(loaded.metadata.bounds.is_valid());
    }

    #[test]
    fn failed_training_writes_nothing() {
        let data = temp_path("incidents.csv");
        let model_dir = temp_path("models");
        std::fs::write(&data, "x,y\n1,2\n").unwrap();
        let config = ForecastConfig {
            data_path: data.clone(),
            model_dir: model_dir.clone(),
            ..small_config()
        };

        let err = train_and_save(&config, &null_progress()).unwrap_err();
        std::fs::remove_file(&data).ok();

        assert!(err.is_configuration_error());
        assert!(!model_dir.exists());
    }
}
