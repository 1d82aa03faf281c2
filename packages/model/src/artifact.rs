//! On-disk model artifacts.
//!
//! An artifact directory holds two JSON files:
//!
//! * `model.json`: the [`SavedModel`]
//! * `meta.json`: `{bounds, scaler}` used at training time
//!
//! Both are written to a temporary sibling and renamed into place, so a
//! reader never observes a partially written file. The training process is
//! the only writer; the server only reads.

use std::path::{Path, PathBuf};

use crime_forecast_grid_models::{GeoBox, Scaler};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

use crate::persistence::MeanPersistenceModel;
use crate::{ModelError, SavedModel};

/// File name of the serialized model inside an artifact directory.
pub const MODEL_FILE: &str = "model.json";

/// File name of the metadata record inside an artifact directory.
pub const META_FILE: &str = "meta.json";

/// Bounds and scaler the model was trained with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Geographic box the grid partitions.
    pub bounds: GeoBox,
    /// Standardization applied to every input grid.
    pub scaler: Scaler,
}

/// A model together with its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelArtifact {
    pub model: SavedModel,
    pub metadata: ModelMetadata,
}

impl ModelArtifact {
    /// The untrained baseline for a `grid_size` grid and `window_length`
    /// day windows, paired with `metadata`.
    #[must_use]
    pub const fn baseline(metadata: ModelMetadata, grid_size: usize, window_length: usize) -> Self {
        Self {
            model: SavedModel::MeanPersistence(MeanPersistenceModel::new(grid_size, window_length)),
            metadata,
        }
    }

    /// Writes the artifact into `dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// * [`ModelError::Io`] if the directory or files cannot be written
    /// * [`ModelError::Json`] if serialization fails
    pub fn save(&self, dir: &Path) -> Result<(), ModelError> {
        std::fs::create_dir_all(dir)?;
        write_json_atomic(&dir.join(META_FILE), &self.metadata)?;
        write_json_atomic(&dir.join(MODEL_FILE), &self.model)?;
        log::info!("Saved model artifact to {}", dir.display());
        Ok(())
    }

    /// Reads the artifact in `dir`.
    ///
    /// # Errors
    ///
    /// * [`ModelError::ModelNotFound`] if either file is absent
    /// * [`ModelError::Json`] if either file is malformed
    pub fn load(dir: &Path) -> Result<Self, ModelError> {
        let model_path = dir.join(MODEL_FILE);
        let meta_path = dir.join(META_FILE);
        for path in [&model_path, &meta_path] {
            if !path.exists() {
                return Err(ModelError::ModelNotFound { path: path.clone() });
            }
        }
        Ok(Self {
            model: read_json(&model_path)?,
            metadata: read_json(&meta_path)?,
        })
    }

    /// Reads the artifact in `dir`, or returns the baseline built from
    /// `fallback` when none exists. Other errors still propagate.
    ///
    /// # Errors
    ///
    /// * [`ModelError::Json`] if an existing artifact is malformed
    /// * [`ModelError::Io`] if an existing artifact cannot be read
    pub fn load_or_baseline(
        dir: &Path,
        fallback: ModelMetadata,
        grid_size: usize,
        window_length: usize,
    ) -> Result<Self, ModelError> {
        match Self::load(dir) {
            Err(ModelError::ModelNotFound { path }) => {
                log::info!(
                    "No model at {}, serving {grid_size}x{grid_size} window-mean baseline",
                    path.display()
                );
                Ok(Self::baseline(fallback, grid_size, window_length))
            }
            other => other,
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ModelError> {
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|source| ModelError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), ModelError> {
    let json = serde_json::to_string_pretty(value).map_err(|source| ModelError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let tmp = temp_sibling(path);
    std::fs::write(&tmp, json)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        std::fs::remove_file(&tmp).ok();
        return Err(e.into());
    }
    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
    path.with_file_name(format!(".{name}.{}.tmp", uuid::Uuid::new_v4()))
}
