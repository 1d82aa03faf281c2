#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Training and serving pipeline for grid-based crime risk forecasting.
//!
//! Training is a strict sequence: load incidents, derive bounds, build
//! daily grids, standardize, window, fit, persist. Each stage consumes the
//! complete output of the previous one and the state shared between them
//! travels in a [`run::TrainingRun`] value.
//!
//! Serving ([`serve`]) reads the persisted artifact, rebuilds the most
//! recent window from real data using the persisted bounds and scaler, and
//! maps every predicted cell back to its geographic bounds.

pub mod config;
pub mod run;
pub mod serve;

use std::path::PathBuf;

use crime_forecast_grid::GridError;
use crime_forecast_ingest::IngestError;
use crime_forecast_model::ModelError;

/// Errors that can occur anywhere in the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Reading the incident file failed.
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// Building or reshaping grids failed.
    #[error(transparent)]
    Grid(#[from] GridError),

    /// Training, persisting or running the model failed.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// A configuration value or request parameter is unusable.
    #[error("Configuration error: {message}")]
    Config {
        /// What is wrong, naming the offending field.
        message: String,
    },

    /// The config file is not valid TOML for [`config::ForecastConfig`].
    #[error("Failed to parse config file {}: {source}", path.display())]
    ConfigFile {
        /// File that was read.
        path: PathBuf,
        /// Underlying parse error.
        source: toml::de::Error,
    },

    /// The incident file contained no usable rows.
    #[error("No usable incidents to train on")]
    NoData,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Whether the error was caused by configuration or request parameters
    /// rather than by the environment. These map to client errors over
    /// HTTP.
    #[must_use]
    pub const fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::Config { .. }
                | Self::ConfigFile { .. }
                | Self::Ingest(IngestError::MissingColumn { .. })
                | Self::Grid(
                    GridError::InvalidBox { .. }
                        | GridError::ZeroGridSize
                        | GridError::ZeroWindowLength
                        | GridError::InsufficientData { .. }
                        | GridError::ShapeMismatch { .. }
                )
                | Self::Model(
                    ModelError::GridSizeMismatch { .. } | ModelError::WindowLengthMismatch { .. }
                )
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_configuration_errors() {
        let mismatch = PipelineError::from(ModelError::GridSizeMismatch {
            expected: 50,
            actual: 20,
        });
        assert!(mismatch.is_configuration_error());
        assert!(mismatch.to_string().contains("50x50"));

        let short = PipelineError::from(GridError::InsufficientData {
            available: 3,
            required: 15,
        });
        assert!(short.is_configuration_error());

        let missing = PipelineError::from(ModelError::ModelNotFound {
            path: PathBuf::from("models/model.json"),
        });
        assert!(!missing.is_configuration_error());
        assert!(!PipelineError::NoData.is_configuration_error());
    }
}
