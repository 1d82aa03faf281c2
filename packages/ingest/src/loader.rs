//! Streams a delimited incident file into [`Point`]s.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crime_forecast_grid_models::Point;

use crate::columns::{self, ColumnAliases, ColumnMapping};
use crate::parsing::{parse_coordinate, parse_day};
use crate::progress::ProgressCallback;
use crate::{IngestError, InvalidRowPolicy};

/// How often (in rows) the progress position is refreshed.
const PROGRESS_INTERVAL: u64 = 10_000;

/// Options controlling how a file is read.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Field delimiter byte.
    pub delimiter: u8,
    /// What to do with unusable rows.
    pub on_invalid_row: InvalidRowPolicy,
    /// Accepted header names per field.
    pub aliases: ColumnAliases,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            on_invalid_row: InvalidRowPolicy::Drop,
            aliases: ColumnAliases::default(),
        }
    }
}

/// The outcome of loading a file.
#[derive(Debug, Clone)]
pub struct LoadedIncidents {
    /// Every valid row, in file order.
    pub points: Vec<Point>,
    /// How the header was resolved.
    pub columns: ColumnMapping,
    /// Data rows read (excluding the header).
    pub rows_read: u64,
    /// Rows dropped under [`InvalidRowPolicy::Drop`].
    pub rows_dropped: u64,
}

/// Reads and trims the header row of `path`.
///
/// # Errors
///
/// * [`IngestError::FileNotFound`] if `path` does not exist
/// * [`IngestError::Csv`] if the header cannot be read
pub fn read_header(path: &Path, delimiter: u8) -> Result<Vec<String>, IngestError> {
    let mut reader = open(path, delimiter)?;
    let header = reader.headers().map_err(|source| IngestError::Csv {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(header.iter().map(|h| h.trim().to_owned()).collect())
}

/// Loads every incident in `path`.
///
/// The header is resolved once; each row is then parsed for latitude,
/// longitude and a calendar day. Under [`InvalidRowPolicy::Drop`] rows
/// with non-finite coordinates or an unparseable timestamp are skipped and
/// counted; under [`InvalidRowPolicy::Fail`] the first such row aborts the
/// load.
///
/// # Errors
///
/// * [`IngestError::FileNotFound`] if `path` does not exist
/// * [`IngestError::MissingColumn`] if a mandatory field is not in the header
/// * [`IngestError::InvalidRow`] for a bad row under [`InvalidRowPolicy::Fail`]
/// * [`IngestError::Csv`] if the file is not readable as CSV
pub fn load_incidents(
    path: &Path,
    options: &LoadOptions,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<LoadedIncidents, IngestError> {
    let mut reader = open(path, options.delimiter)?;
    let csv_err = |source: csv::Error| IngestError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let header: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(|h| h.trim().to_owned())
        .collect();
    let columns = columns::resolve(&header, &options.aliases)?;
    log::debug!("Resolved columns for {}: {columns:?}", path.display());

    if let Ok(meta) = std::fs::metadata(path) {
        progress.set_total(meta.len());
    }
    progress.set_message(format!("Loading {}", path.display()));

    let mut points = Vec::new();
    let mut rows_read = 0_u64;
    let mut rows_dropped = 0_u64;
    let mut record = csv::StringRecord::new();

    while reader.read_record(&mut record).map_err(csv_err)? {
        rows_read += 1;
        let line = record.position().map_or(rows_read + 1, csv::Position::line);

        match parse_row(&record, &columns) {
            Ok(point) => points.push(point),
            Err(reason) => match options.on_invalid_row {
                InvalidRowPolicy::Drop => {
                    rows_dropped += 1;
                    log::debug!("Dropping row {line} of {}: {reason}", path.display());
                }
                InvalidRowPolicy::Fail => {
                    return Err(IngestError::InvalidRow {
                        path: path.to_path_buf(),
                        row: line,
                        reason,
                    });
                }
            },
        }

        if rows_read % PROGRESS_INTERVAL == 0
            && let Some(pos) = record.position()
        {
            progress.set_position(pos.byte());
        }
    }

    if rows_dropped > 0 {
        log::warn!(
            "Dropped {rows_dropped} of {rows_read} row(s) in {} (non-finite coordinates or unparseable timestamp)",
            path.display()
        );
    }
    log::debug!("Parsed {} incident(s) from {}", points.len(), path.display());
    progress.finish(format!("Loaded {} incident(s)", points.len()));

    Ok(LoadedIncidents {
        points,
        columns,
        rows_read,
        rows_dropped,
    })
}

fn open(path: &Path, delimiter: u8) -> Result<csv::Reader<std::fs::File>, IngestError> {
    if !path.exists() {
        return Err(IngestError::FileNotFound {
            path: PathBuf::from(path),
        });
    }
    let file = std::fs::File::open(path)?;
    Ok(csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(file))
}

fn parse_row(record: &csv::StringRecord, columns: &ColumnMapping) -> Result<Point, String> {
    let cell = |index: usize| record.get(index).unwrap_or("");

    let raw_lat = cell(columns.latitude.index);
    let lat = parse_coordinate(raw_lat)
        .ok_or_else(|| format!("invalid {} '{raw_lat}'", columns.latitude.name))?;

    let raw_lng = cell(columns.longitude.index);
    let lng = parse_coordinate(raw_lng)
        .ok_or_else(|| format!("invalid {} '{raw_lng}'", columns.longitude.name))?;

    let raw_ts = cell(columns.timestamp.index);
    let day =
        parse_day(raw_ts).ok_or_else(|| format!("invalid {} '{raw_ts}'", columns.timestamp.name))?;

    let category = columns
        .category
        .as_ref()
        .map(|c| cell(c.index).trim())
        .filter(|c| !c.is_empty())
        .map(str::to_owned);

    Ok(Point {
        day,
        lat,
        lng,
        category,
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::columns::Field;
    use crate::progress::null_progress;

    fn fixture(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "crime_forecast_ingest_{}.csv",
            uuid::Uuid::new_v4()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn loads_valid_rows_and_drops_bad_ones() {
        let path = fixture(
            "Date,Lat,Lon,Category\n\
             2024-01-01 08:00:00,37.77,-122.41,THEFT\n\
             2024-01-01 23:59:59,37.78,-122.42,\n\
             garbage,37.70,-122.40,ASSAULT\n\
             2024-01-02,NaN,-122.40,ROBBERY\n\
             2024-01-02,37.71,,ROBBERY\n\
             2024-01-03T10:00:00Z,37.72,-122.43,BURGLARY\n",
        );
        let loaded = load_incidents(&path, &LoadOptions::default(), &null_progress()).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.rows_read, 6);
        assert_eq!(loaded.rows_dropped, 3);
        assert_eq!(loaded.points.len(), 3);

        let first = &loaded.points[0];
        assert_eq!(first.day, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(first.category.as_deref(), Some("THEFT"));
        assert_eq!(loaded.points[1].day, first.day);
        assert!(loaded.points[1].category.is_none());
        assert_eq!(
            loaded.points[2].day,
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()
        );
    }

    #[test]
    fn strict_policy_reports_row_number() {
        let path = fixture("datetime,latitude,longitude\n2024-01-01,1,2\n2024-01-01,x,2\n");
        let options = LoadOptions {
            on_invalid_row: InvalidRowPolicy::Fail,
            ..LoadOptions::default()
        };
        let err = load_incidents(&path, &options, &null_progress()).unwrap_err();
        std::fs::remove_file(&path).ok();

        match err {
            IngestError::InvalidRow { row, reason, .. } => {
                assert_eq!(row, 3);
                assert!(reason.contains("latitude"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_file_is_reported() {
        let path = std::env::temp_dir().join("crime_forecast_definitely_missing.csv");
        let err = load_incidents(&path, &LoadOptions::default(), &null_progress()).unwrap_err();
        assert!(matches!(err, IngestError::FileNotFound { .. }));
    }

    #[test]
    fn missing_columns_abort_the_load() {
        let path = fixture("x,y\n1,2\n");
        let err = load_incidents(&path, &LoadOptions::default(), &null_progress()).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(
            err,
            IngestError::MissingColumn { ref fields } if fields.len() == 3 && fields[0] == Field::Timestamp
        ));
    }

    #[test]
    fn honors_custom_delimiter() {
        let path = fixture("time;lat;lng\n2024-02-02;1.5;2.5\n");
        let options = LoadOptions {
            delimiter: b';',
            ..LoadOptions::default()
        };
        let loaded = load_incidents(&path, &options, &null_progress()).unwrap();
        let header = read_header(&path, b';').unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.points.len(), 1);
        assert!((loaded.points[0].lng - 2.5).abs() < f64::EPSILON);
        assert_eq!(header, vec!["time", "lat", "lng"]);
    }
}
