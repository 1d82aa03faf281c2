#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Spatial and temporal data types shared across the forecast pipeline.
//!
//! These are the shapes that flow between stages: geographic boxes,
//! incident points truncated to a calendar day, daily count grids,
//! real-valued grids (standardized inputs and model outputs) and the
//! persisted scaler. Logic that operates on them lives in
//! `crime_forecast_grid`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A geographic bounding box in WGS84 coordinates.
///
/// A box used for binning must satisfy `south < north` and `west < east`;
/// see [`GeoBox::is_valid`]. A box computed from a single point is
/// degenerate and has to be [`widened`](GeoBox::widened) first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBox {
    /// Southern latitude boundary.
    pub south: f64,
    /// Western longitude boundary.
    pub west: f64,
    /// Northern latitude boundary.
    pub north: f64,
    /// Eastern longitude boundary.
    pub east: f64,
}

impl GeoBox {
    /// Creates a new box from its four edges.
    #[must_use]
    pub const fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south,
            west,
            north,
            east,
        }
    }

    /// Latitude extent in degrees.
    #[must_use]
    pub fn lat_span(&self) -> f64 {
        self.north - self.south
    }

    /// Longitude extent in degrees.
    #[must_use]
    pub fn lng_span(&self) -> f64 {
        self.east - self.west
    }

    /// Whether every edge is finite and the box has positive area.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        [self.south, self.west, self.north, self.east]
            .iter()
            .all(|v| v.is_finite())
            && self.south < self.north
            && self.west < self.east
    }

    /// Whether `(lat, lng)` lies inside the box, edges included.
    #[must_use]
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        lat >= self.south && lat <= self.north && lng >= self.west && lng <= self.east
    }

    /// Returns a copy with any zero-extent axis expanded by `padding`
    /// degrees on each side. Axes that already have extent are untouched.
    #[must_use]
    pub fn widened(self, padding: f64) -> Self {
        let mut out = self;
        if out.south >= out.north {
            out.south -= padding;
            out.north += padding;
        }
        if out.west >= out.east {
            out.west -= padding;
            out.east += padding;
        }
        out
    }
}

/// Index of a grid cell: `i` is the latitude band (row, counted from the
/// south edge), `j` the longitude band (column, counted from the west edge).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellIndex {
    /// Row (latitude band).
    pub i: usize,
    /// Column (longitude band).
    pub j: usize,
}

/// A single incident reduced to what the grid builder needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Calendar day of occurrence (time of day discarded).
    pub day: NaiveDate,
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
    /// Raw category label, if the source had one.
    pub category: Option<String>,
}

/// An inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// First day (inclusive).
    pub start: NaiveDate,
    /// Last day (inclusive).
    pub end: NaiveDate,
}

impl DateRange {
    /// Creates a range, returning `None` when `end` precedes `start`.
    #[must_use]
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// The smallest range covering every point's day, or `None` for an
    /// empty slice.
    #[must_use]
    pub fn covering(points: &[Point]) -> Option<Self> {
        let start = points.iter().map(|p| p.day).min()?;
        let end = points.iter().map(|p| p.day).max()?;
        Some(Self { start, end })
    }

    /// Number of days in the range, both ends included.
    #[must_use]
    pub fn total_days(&self) -> usize {
        usize::try_from((self.end - self.start).num_days() + 1).unwrap_or(0)
    }

    /// Zero-based offset of `day` from the start of the range, or `None`
    /// when it falls outside.
    #[must_use]
    pub fn offset(&self, day: NaiveDate) -> Option<usize> {
        if day < self.start || day > self.end {
            return None;
        }
        usize::try_from((day - self.start).num_days()).ok()
    }
}

/// Incident counts per cell for one calendar day, row-major.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyGrid {
    /// Day these counts belong to.
    pub day: NaiveDate,
    /// Cells per side.
    pub size: usize,
    /// `size * size` counts, row `i` at `i * size..(i + 1) * size`.
    pub counts: Vec<u32>,
}

impl DailyGrid {
    /// An all-zero grid for `day`.
    #[must_use]
    pub fn zeros(day: NaiveDate, size: usize) -> Self {
        Self {
            day,
            size,
            counts: vec![0; size * size],
        }
    }

    #[must_use]
    pub fn get(&self, cell: CellIndex) -> u32 {
        self.counts[cell.i * self.size + cell.j]
    }

    pub fn increment(&mut self, cell: CellIndex) {
        self.counts[cell.i * self.size + cell.j] += 1;
    }

    /// Sum of every cell.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|&c| u64::from(c)).sum()
    }
}

/// A square grid of real values, row-major. Used for standardized inputs,
/// training labels and model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    /// Cells per side.
    pub size: usize,
    /// `size * size` values.
    pub values: Vec<f64>,
}

impl Grid {
    #[must_use]
    pub fn zeros(size: usize) -> Self {
        Self {
            size,
            values: vec![0.0; size * size],
        }
    }

    /// Wraps `values`, returning `None` unless it holds exactly
    /// `size * size` entries.
    #[must_use]
    pub fn from_values(size: usize, values: Vec<f64>) -> Option<Self> {
        (values.len() == size * size).then_some(Self { size, values })
    }

    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.size + j]
    }
}

/// Global standardization parameters, fitted once over a training sequence
/// and reused verbatim at inference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    /// Mean cell count.
    pub mean: f64,
    /// Population standard deviation (never zero).
    pub std: f64,
}

impl Scaler {
    /// The scaler that leaves values unchanged.
    #[must_use]
    pub const fn identity() -> Self {
        Self {
            mean: 0.0,
            std: 1.0,
        }
    }

    #[must_use]
    pub fn transform(&self, value: f64) -> f64 {
        (value - self.mean) / self.std
    }

    #[must_use]
    pub fn inverse(&self, value: f64) -> f64 {
        value.mul_add(self.std, self.mean)
    }
}
