//! Derives the geographic box a training run bins into.

use crime_forecast_grid_models::{GeoBox, Point};

/// Computes the minimal box enclosing a point set, falling back to a
/// configured default when there are no points.
#[derive(Debug, Clone, Copy)]
pub struct BoundsEstimator {
    default_bounds: GeoBox,
}

impl BoundsEstimator {
    #[must_use]
    pub const fn new(default_bounds: GeoBox) -> Self {
        Self { default_bounds }
    }

    /// Returns the enclosing box of `points`, or the default box when
    /// `points` is empty.
    ///
    /// A single point (or points sharing a latitude or longitude) yields a
    /// degenerate box. Use [`Self::compute_for_binning`] when the result
    /// feeds a grid.
    #[must_use]
    pub fn compute(&self, points: &[Point]) -> GeoBox {
        if points.is_empty() {
            log::warn!("No points to derive bounds from, using configured default bounds");
            return self.default_bounds;
        }

        let mut b = GeoBox::new(
            f64::INFINITY,
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::NEG_INFINITY,
        );
        for p in points {
            b.south = b.south.min(p.lat);
            b.north = b.north.max(p.lat);
            b.west = b.west.min(p.lng);
            b.east = b.east.max(p.lng);
        }
        b
    }

    /// Like [`Self::compute`], but widens any zero-extent axis by `padding`
    /// degrees so the box can be partitioned.
    #[must_use]
    pub fn compute_for_binning(&self, points: &[Point], padding: f64) -> GeoBox {
        let b = self.compute(points);
        if b.is_valid() {
            return b;
        }
        log::warn!(
            "Derived bounds are degenerate (south={}, west={}, north={}, east={}), widening by {padding} degrees",
            b.south,
            b.west,
            b.north,
            b.east
        );
        b.widened(padding)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    const DEFAULT: GeoBox = GeoBox::new(37.703, -122.527, 37.833, -122.349);

    fn point(lat: f64, lng: f64) -> Point {
        Point {
            day: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            lat,
            lng,
            category: None,
        }
    }

    #[test]
    fn empty_input_returns_default_box() {
        assert_eq!(BoundsEstimator::new(DEFAULT).compute(&[]), DEFAULT);
    }

    #[test]
    fn single_point_is_degenerate() {
        let b = BoundsEstimator::new(DEFAULT).compute(&[point(10.0, 20.0)]);
        assert_eq!(b, GeoBox::new(10.0, 20.0, 10.0, 20.0));
        assert!(!b.is_valid());
    }

    #[test]
    fn encloses_all_points() {
        let b = BoundsEstimator::new(DEFAULT).compute(&[
            point(1.0, -5.0),
            point(-2.0, 3.0),
            point(0.5, 7.5),
        ]);
        assert_eq!(b, GeoBox::new(-2.0, -5.0, 1.0, 7.5));
    }

    #[test]
    fn binning_bounds_are_always_valid() {
        let est = BoundsEstimator::new(DEFAULT);
        let b = est.compute_for_binning(&[point(10.0, 20.0)], 0.001);
        assert!(b.is_valid());
        assert!(b.contains(10.0, 20.0));
    }
}
