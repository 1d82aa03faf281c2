#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the crime forecast server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the pipeline types to allow independent evolution of the API
//! contract.

use chrono::{DateTime, Utc};
use crime_forecast_grid_models::{GeoBox, Point};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// How far ahead a forecast looks.
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
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Horizon {
    /// The next day.
    #[default]
    Day,
    /// The next seven days.
    Week,
    /// The next thirty days.
    Month,
}

impl Horizon {
    /// Number of daily steps the model is rolled forward.
    #[must_use]
    pub const fn steps(self) -> usize {
        match self {
            Self::Day => 1,
            Self::Week => 7,
            Self::Month => 30,
        }
    }
}

/// Query parameters for the forecast endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastQueryParams {
    /// `day`, `week` or `month`. Defaults to `day`.
    pub horizon: Option<String>,
    /// Cells per side. Must match the loaded model when given.
    pub grid: Option<usize>,
}

/// One cell of a forecast.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiForecastCell {
    /// Row index, south to north.
    pub i: usize,
    /// Column index, west to east.
    pub j: usize,
    /// Relative risk score (standardized units, not a probability).
    pub risk: f64,
    /// Geographic extent of the cell.
    pub bounds: GeoBox,
}

/// Response body of `GET /api/forecast`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiForecastResponse {
    /// Horizon the forecast covers.
    pub horizon: Horizon,
    /// Cells per side.
    pub grid_size: usize,
    /// When the forecast was computed.
    pub generated_at: DateTime<Utc>,
    /// `grid_size * grid_size` cells, row-major.
    pub result: Vec<ApiForecastCell>,
}

/// Category of a live incident.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum LiveIncidentType {
    Theft,
    Assault,
    Robbery,
    Burglary,
    Vandalism,
}

impl LiveIncidentType {
    /// Every type, in a fixed order.
    pub const ALL: [Self; 5] = [
        Self::Theft,
        Self::Assault,
        Self::Robbery,
        Self::Burglary,
        Self::Vandalism,
    ];
}

/// An incident pushed over `GET /api/stream/incidents`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiLiveIncident {
    /// Unique incident ID.
    pub id: String,
    /// Incident category.
    #[serde(rename = "type")]
    pub incident_type: LiveIncidentType,
    /// When the incident occurred (ISO 8601).
    pub occurred_at: DateTime<Utc>,
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
}

impl From<&ApiLiveIncident> for Point {
    fn from(incident: &ApiLiveIncident) -> Self {
        Self {
            day: incident.occurred_at.date_naive(),
            lat: incident.lat,
            lng: incident.lng,
            category: Some(incident.incident_type.to_string()),
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the server is healthy.
    pub healthy: bool,
    /// Server version.
    pub version: String,
}

/// Error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code.
    pub error: String,
    /// Human-readable description.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone};

    use super::*;

    #[test]
    fn horizon_parses_and_maps_to_steps() {
        assert_eq!("week".parse::<Horizon>().unwrap(), Horizon::Week);
        assert!("year".parse::<Horizon>().is_err());
        assert_eq!(Horizon::default().steps(), 1);
        assert_eq!(Horizon::Week.steps(), 7);
        assert_eq!(Horizon::Month.steps(), 30);
    }

    #[test]
    fn forecast_response_uses_camel_case() {
        let response = ApiForecastResponse {
            horizon: Horizon::Month,
            grid_size: 1,
            generated_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
            result: vec![ApiForecastCell {
                i: 0,
                j: 0,
                risk: 0.5,
                bounds: GeoBox::new(1.0, 2.0, 3.0, 4.0),
            }],
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["horizon"], "month");
        assert_eq!(json["gridSize"], 1);
        assert_eq!(json["generatedAt"], "2024-01-02T03:04:05Z");
        assert_eq!(json["result"][0]["bounds"]["east"], 4.0);
    }

    #[test]
    fn live_incident_serializes_type_field() {
        let incident = ApiLiveIncident {
            id: "abc".to_string(),
            incident_type: LiveIncidentType::Vandalism,
            occurred_at: Utc.with_ymd_and_hms(2024, 5, 6, 23, 59, 0).unwrap(),
            lat: 37.75,
            lng: -122.4,
        };
        let json = serde_json::to_value(&incident).unwrap();
        assert_eq!(json["type"], "VANDALISM");
        assert_eq!(json["occurredAt"], "2024-05-06T23:59:00Z");

        let point = Point::from(&incident);
        assert_eq!(point.day, NaiveDate::from_ymd_opt(2024, 5, 6).unwrap());
        assert_eq!(point.category.as_deref(), Some("VANDALISM"));
    }
}
