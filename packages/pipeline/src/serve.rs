//! The serving half of the pipeline.
//!
//! Every request reads the artifact from disk, so a freshly trained model
//! is picked up without a restart. When no artifact exists the window-mean
//! baseline is served over the configured default bounds instead.

use chrono::{Days, NaiveDate};
use crime_forecast_grid::daily::build_daily_grids;
use crime_forecast_grid::geo_grid::GeoGrid;
use crime_forecast_grid::standardize;
use crime_forecast_grid_models::{CellIndex, DailyGrid, DateRange, GeoBox, Grid, Point, Scaler};
use crime_forecast_ingest::IngestError;
use crime_forecast_ingest::loader::load_incidents;
use crime_forecast_ingest::progress::null_progress;
use crime_forecast_model::ModelError;
use crime_forecast_model::artifact::{ModelArtifact, ModelMetadata};
use crime_forecast_model::features::window_mean;

use crate::PipelineError;
use crate::config::ForecastConfig;

/// One predicted cell with its geographic extent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastCell {
    /// Row (south to north) and column (west to east).
    pub cell: CellIndex,
    /// Relative risk score in standardized units.
    pub risk: f64,
    /// The cell's sub-box of the model's bounds.
    pub bounds: GeoBox,
}

/// A full risk grid mapped back to geography.
#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    /// Cells per side.
    pub grid_size: usize,
    /// Whether the baseline produced this forecast.
    pub baseline: bool,
    /// `grid_size * grid_size` cells, row-major.
    pub cells: Vec<ForecastCell>,
}

/// Metadata paired with the baseline when no artifact exists.
#[must_use]
pub const fn fallback_metadata(config: &ForecastConfig) -> ModelMetadata {
    ModelMetadata {
        bounds: config.default_bounds,
        scaler: Scaler::identity(),
    }
}

/// Rebuilds the most recent `window_length` standardized daily grids from
/// `points`, binned over `metadata.bounds` and scaled with
/// `metadata.scaler` (never refitted).
///
/// The window ends at `end`, or at the latest day in `points` when `end`
/// is `None`. Days without incidents are zero-count grids. With no points
/// and no `end`, every day is a zero-count grid.
///
/// # Errors
///
/// * [`PipelineError::Grid`] if the bounds or grid size are unusable
/// * [`PipelineError::Config`] if the window reaches before the calendar
///   start
pub fn latest_window(
    points: &[Point],
    metadata: &ModelMetadata,
    grid_size: usize,
    window_length: usize,
    end: Option<NaiveDate>,
) -> Result<Vec<Grid>, PipelineError> {
    let grid = GeoGrid::new(metadata.bounds, grid_size)?;

    let Some(end) = end.or_else(|| points.iter().map(|p| p.day).max()) else {
        log::debug!("No recent points, serving an all-zero {window_length} day window");
        let zero = metadata.scaler.transform(0.0);
        return Ok(vec![
            Grid {
                size: grid_size,
                values: vec![zero; grid_size * grid_size],
            };
            window_length
        ]);
    };

    let back = u64::try_from(window_length.saturating_sub(1)).unwrap_or(u64::MAX);
    let range = end
        .checked_sub_days(Days::new(back))
        .and_then(|start| DateRange::new(start, end))
        .ok_or_else(|| PipelineError::Config {
            message: format!("window_length {window_length} reaches before the earliest date"),
        })?;

    let daily = build_daily_grids(points, &grid, range);
    log::debug!(
        "Latest window {} .. {} holds {} incident(s)",
        range.start,
        range.end,
        daily.iter().map(DailyGrid::total).sum::<u64>()
    );
    Ok(standardize::apply(&daily, &metadata.scaler))
}

/// Runs `artifact` over `window` for `steps` days and maps the per-cell
/// mean of the predictions onto geographic cells.
///
/// # Errors
///
/// * [`PipelineError::Model`] if `window` does not fit the model
/// * [`PipelineError::Grid`] if the artifact's bounds are unusable
pub fn forecast_from_window(
    artifact: &ModelArtifact,
    window: &[Grid],
    steps: usize,
) -> Result<Forecast, PipelineError> {
    let grid_size = artifact.model.grid_size();
    let predictions = artifact.model.rollout(window, steps.max(1))?;
    let risk = Grid {
        size: grid_size,
        values: window_mean(&predictions, grid_size),
    };

    let geo = GeoGrid::new(artifact.metadata.bounds, grid_size)?;
    let cells = geo
        .cells()
        .map(|cell| ForecastCell {
            cell,
            risk: risk.get(cell.i, cell.j),
            bounds: geo.cell_bounds(cell),
        })
        .collect();

    Ok(Forecast {
        grid_size,
        baseline: artifact.model.is_baseline(),
        cells,
    })
}

/// Reads the incident file for serving. A missing file yields no points,
/// so the forecast degrades to an empty-history window instead of failing.
///
/// # Errors
///
/// * [`PipelineError::Ingest`] for any failure other than a missing file
pub fn recent_points(config: &ForecastConfig) -> Result<Vec<Point>, PipelineError> {
    match load_incidents(&config.data_path, &config.load_options(), &null_progress()) {
        Ok(loaded) => Ok(loaded.points),
        Err(IngestError::FileNotFound { path }) => {
            log::warn!(
                "Incident file {} not found, forecasting from an empty history",
                path.display()
            );
            Ok(vec![])
        }
        Err(e) => Err(e.into()),
    }
}

/// Serves one forecast request.
///
/// `requested_grid`, when given, must equal the loaded model's grid size.
/// `steps` is the number of days to roll forward (at least one).
///
/// # Errors
///
/// * [`PipelineError::Model`] with [`ModelError::GridSizeMismatch`] if the
///   request disagrees with the model
/// * [`PipelineError::Model`] if an existing artifact cannot be read
/// * [`PipelineError::Ingest`] if the incident file is unreadable
pub fn forecast(
    config: &ForecastConfig,
    steps: usize,
    requested_grid: Option<usize>,
) -> Result<Forecast, PipelineError> {
    let artifact = ModelArtifact::load_or_baseline(
        &config.model_dir,
        fallback_metadata(config),
        config.grid_size,
        config.window_length,
    )?;

    let grid_size = artifact.model.grid_size();
    if let Some(actual) = requested_grid.filter(|&g| g != grid_size) {
        return Err(ModelError::GridSizeMismatch {
            expected: grid_size,
            actual,
        }
        .into());
    }

    let points = recent_points(config)?;
    let window = latest_window(
        &points,
        &artifact.metadata,
        grid_size,
        artifact.model.window_length(),
        None,
    )?;
    forecast_from_window(&artifact, &window, steps)
}
