//! Case-insensitive resolution of logical fields against a CSV header.
//!
//! Sources name the same data differently (`Date` vs `occurred_at`, `Lon`
//! vs `lng`), so each logical [`Field`] has a list of accepted aliases.
//! Timestamp, latitude and longitude are mandatory; category is optional.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};

use crate::IngestError;

/// A logical column the loader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
pub enum Field {
    /// When the incident occurred.
    #[strum(serialize = "timestamp")]
    Timestamp,
    /// Latitude (WGS84).
    #[strum(serialize = "lat")]
    Latitude,
    /// Longitude (WGS84).
    #[strum(serialize = "lng")]
    Longitude,
    /// Free-text incident category.
    #[strum(serialize = "category")]
    Category,
}

/// Accepted header names per field, compared case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnAliases {
    /// Aliases for [`Field::Timestamp`].
    pub timestamp: Vec<String>,
    /// Aliases for [`Field::Latitude`].
    pub latitude: Vec<String>,
    /// Aliases for [`Field::Longitude`].
    pub longitude: Vec<String>,
    /// Aliases for [`Field::Category`].
    pub category: Vec<String>,
}

impl Default for ColumnAliases {
    fn default() -> Self {
        let owned = |names: &[&str]| names.iter().map(|&s| s.to_owned()).collect();
        Self {
            timestamp: owned(&["datetime", "occurred_at", "date", "time"]),
            latitude: owned(&["latitude", "lat"]),
            longitude: owned(&["longitude", "lon", "lng"]),
            category: owned(&["category", "type", "offense"]),
        }
    }
}

impl ColumnAliases {
    fn for_field(&self, field: Field) -> &[String] {
        match field {
            Field::Timestamp => &self.timestamp,
            Field::Latitude => &self.latitude,
            Field::Longitude => &self.longitude,
            Field::Category => &self.category,
        }
    }
}

/// A header column matched to a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumn {
    /// Header name as it appears in the file.
    pub name: String,
    /// Zero-based position in the header.
    pub index: usize,
}

/// The result of resolving a header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub timestamp: ResolvedColumn,
    pub latitude: ResolvedColumn,
    pub longitude: ResolvedColumn,
    pub category: Option<ResolvedColumn>,
}

/// Resolves every field against `header`.
///
/// For each field the first header entry (in header order) whose trimmed,
/// lowercased name is one of the field's aliases wins.
///
/// # Errors
///
/// * [`IngestError::MissingColumn`] naming every mandatory field that has
///   no match. Resolution is all-or-nothing.
pub fn resolve<S: AsRef<str>>(
    header: &[S],
    aliases: &ColumnAliases,
) -> Result<ColumnMapping, IngestError> {
    let find = |field: Field| {
        let candidates = aliases.for_field(field);
        header.iter().enumerate().find_map(|(index, h)| {
            let name = h.as_ref().trim();
            let lower = name.to_lowercase();
            candidates
                .iter()
                .any(|c| c.to_lowercase() == lower)
                .then(|| ResolvedColumn {
                    name: name.to_owned(),
                    index,
                })
        })
    };

    let timestamp = find(Field::Timestamp);
    let latitude = find(Field::Latitude);
    let longitude = find(Field::Longitude);
    let category = find(Field::Category);

    match (timestamp, latitude, longitude) {
        (Some(timestamp), Some(latitude), Some(longitude)) => Ok(ColumnMapping {
            timestamp,
            latitude,
            longitude,
            category,
        }),
        (timestamp, latitude, longitude) => {
            let fields = [
                (Field::Timestamp, timestamp.is_none()),
                (Field::Latitude, latitude.is_none()),
                (Field::Longitude, longitude.is_none()),
            ]
            .into_iter()
            .filter_map(|(field, missing)| missing.then_some(field))
            .collect();
            Err(IngestError::MissingColumn { fields })
        }
    }
}
