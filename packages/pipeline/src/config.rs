//! Forecast pipeline configuration.
//!
//! The defaults are embedded from `config/default.toml` at compile time.
//! A user file (from `--config` or `CRIME_FORECAST_CONFIG`) only needs the
//! keys it changes; everything else falls back to the defaults.

use std::path::{Path, PathBuf};

use crime_forecast_grid_models::GeoBox;
use crime_forecast_ingest::InvalidRowPolicy;
use crime_forecast_ingest::columns::ColumnAliases;
use crime_forecast_ingest::loader::LoadOptions;
use crime_forecast_model::TrainOptions;
use serde::{Deserialize, Serialize};

use crate::PipelineError;

/// Environment variable naming a config file to load.
pub const CONFIG_ENV: &str = "CRIME_FORECAST_CONFIG";

const DEFAULT_TOML: &str = include_str!("../config/default.toml");

/// Settings shared by the training CLI and the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Cells per side of the spatial grid.
    pub grid_size: usize,
    /// Days of history per model input window.
    pub window_length: usize,
    /// Incident CSV.
    pub data_path: PathBuf,
    /// Artifact directory.
    pub model_dir: PathBuf,
    /// Bounds used when none can be derived from data.
    pub default_bounds: GeoBox,
    /// Handling of unusable rows.
    pub on_invalid_row: InvalidRowPolicy,
    /// Field delimiter.
    pub delimiter: char,
    /// Degrees used to widen a degenerate bounds axis.
    pub degenerate_padding: f64,
    /// Ridge penalty for training.
    pub ridge: f64,
    /// Accepted header names.
    pub columns: ColumnAliases,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            grid_size: 50,
            window_length: 14,
            data_path: PathBuf::from("data/incidents.csv"),
            model_dir: PathBuf::from("models"),
            default_bounds: GeoBox::new(37.703, -122.527, 37.833, -122.349),
            on_invalid_row: InvalidRowPolicy::Drop,
            delimiter: ',',
            degenerate_padding: 0.001,
            ridge: 0.001,
            columns: ColumnAliases::default(),
        }
    }
}

impl ForecastConfig {
    /// The configuration embedded in the binary.
    ///
    /// # Panics
    ///
    /// Panics if the embedded TOML is malformed (checked by tests).
    #[must_use]
    pub fn embedded() -> Self {
        toml::de::from_str(DEFAULT_TOML)
            .unwrap_or_else(|e| panic!("Failed to parse embedded default config: {e}"))
    }

    /// Loads `path` if given, else the file named by [`CONFIG_ENV`], else
    /// the embedded defaults. The result is validated.
    ///
    /// # Errors
    ///
    /// * [`PipelineError::Io`] if the file cannot be read
    /// * [`PipelineError::ConfigFile`] if it is not valid TOML
    /// * [`PipelineError::Config`] if a value is out of range
    pub fn load(path: Option<&Path>) -> Result<Self, PipelineError> {
        let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let config = match path.map(Path::to_path_buf).or(from_env) {
            Some(path) => {
                log::info!("Loading config from {}", path.display());
                let contents = std::fs::read_to_string(&path)?;
                Self::parse(&contents).map_err(|source| PipelineError::ConfigFile { path, source })?
            }
            None => Self::embedded(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Parses a (possibly partial) TOML document.
    ///
    /// # Errors
    ///
    /// Returns the TOML error if `contents` does not deserialize.
    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::de::from_str(contents)
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// * [`PipelineError::Config`] naming the first bad field
    pub fn validate(&self) -> Result<(), PipelineError> {
        let fail = |message: String| Err(PipelineError::Config { message });
        if self.grid_size == 0 {
            return fail("grid_size must be positive".to_owned());
        }
        if self.window_length == 0 {
            return fail("window_length must be positive".to_owned());
        }
        if !self.default_bounds.is_valid() {
            return fail(format!(
                "default_bounds must satisfy south < north and west < east, got {:?}",
                self.default_bounds
            ));
        }
        if !self.delimiter.is_ascii() {
            return fail(format!("delimiter must be a single ASCII character, got {:?}", self.delimiter));
        }
        if !(self.degenerate_padding.is_finite() && self.degenerate_padding > 0.0) {
            return fail(format!(
                "degenerate_padding must be a positive number, got {}",
                self.degenerate_padding
            ));
        }
        if !(self.ridge.is_finite() && self.ridge >= 0.0) {
            return fail(format!("ridge must be non-negative, got {}", self.ridge));
        }
        Ok(())
    }

    /// Loader options derived from this config.
    #[must_use]
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            delimiter: u8::try_from(self.delimiter).unwrap_or(b','),
            on_invalid_row: self.on_invalid_row,
            aliases: self.columns.clone(),
        }
    }

    /// Training options derived from this config.
    #[must_use]
    pub const fn train_options(&self) -> TrainOptions {
        TrainOptions { ridge: self.ridge }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_config_matches_defaults() {
        assert_eq!(ForecastConfig::embedded(), ForecastConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = ForecastConfig::parse("grid_size = 10\non_invalid_row = \"fail\"\n").unwrap();
        assert_eq!(config.grid_size, 10);
        assert_eq!(config.on_invalid_row, InvalidRowPolicy::Fail);
        assert_eq!(config.window_length, 14);
        assert_eq!(config.default_bounds, ForecastConfig::default().default_bounds);
    }

    #[test]
    fn rejects_unknown_row_policy() {
        assert!(ForecastConfig::parse("on_invalid_row = \"ignore\"\n").is_err());
    }

    #[test]
    fn validation_names_the_bad_field() {
        let config = ForecastConfig {
            window_length: 0,
            ..ForecastConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("window_length"), "{err}");

        let config = ForecastConfig {
            default_bounds: GeoBox::new(1.0, 1.0, 1.0, 2.0),
            ..ForecastConfig::default()
        };
        assert!(config.validate().unwrap_err().to_string().contains("default_bounds"));
    }

    #[test]
    fn load_options_use_the_delimiter() {
        let config = ForecastConfig {
            delimiter: ';',
            ..ForecastConfig::default()
        };
        assert_eq!(config.load_options().delimiter, b';');
    }
}
