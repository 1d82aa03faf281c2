#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Loads geotagged incidents from delimited files.
//!
//! The header is resolved once against a table of accepted aliases
//! ([`columns`]), then every row is parsed into a
//! [`Point`](crime_forecast_grid_models::Point). Rows with non-finite
//! coordinates or unparseable timestamps are data-quality issues: they are
//! dropped by default, or reported when the caller opts into
//! [`InvalidRowPolicy::Fail`].

pub mod columns;
pub mod loader;
pub mod parsing;
pub mod progress;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::columns::Field;

/// Errors that can occur while loading incidents.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The input file does not exist.
    #[error("Incidents file not found: {}", path.display())]
    FileNotFound {
        /// Path that was requested.
        path: PathBuf,
    },

    /// One or more mandatory columns could not be matched in the header.
    #[error("Missing required column(s): {}", join_fields(fields))]
    MissingColumn {
        /// Every mandatory field left unresolved.
        fields: Vec<Field>,
    },

    /// A row failed validation under [`InvalidRowPolicy::Fail`].
    #[error("Invalid row {row} in {}: {reason}", path.display())]
    InvalidRow {
        /// File being read.
        path: PathBuf,
        /// Line number of the offending row (header is line 1).
        row: u64,
        /// What was wrong with it.
        reason: String,
    },

    /// The CSV reader failed.
    #[error("CSV error in {}: {source}", path.display())]
    Csv {
        /// File being read.
        path: PathBuf,
        /// Underlying error.
        source: csv::Error,
    },

    /// I/O error (file open/read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn join_fields(fields: &[Field]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// What to do with a row whose coordinates or timestamp are unusable.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InvalidRowPolicy {
    /// Skip the row and keep loading.
    #[default]
    Drop,
    /// Abort the load with [`IngestError::InvalidRow`].
    Fail,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_column_message_names_every_field() {
        let err = IngestError::MissingColumn {
            fields: vec![Field::Timestamp, Field::Latitude, Field::Longitude],
        };
        assert_eq!(
            err.to_string(),
            "Missing required column(s): timestamp, lat, lng"
        );
    }

    #[test]
    fn policy_parses_from_config_strings() {
        assert_eq!("drop".parse::<InvalidRowPolicy>().unwrap(), InvalidRowPolicy::Drop);
        assert_eq!("fail".parse::<InvalidRowPolicy>().unwrap(), InvalidRowPolicy::Fail);
        assert_eq!(InvalidRowPolicy::default(), InvalidRowPolicy::Drop);
    }
}
