//! Daily incident count grids.

use crime_forecast_grid_models::{DailyGrid, DateRange, Point};

use crate::geo_grid::GeoGrid;

/// Builds one count grid per calendar day in `range`, inclusive.
///
/// Days without incidents get an all-zero grid, so the output is gapless
/// and has exactly `range.total_days()` entries. Points whose day falls
/// outside `range` are skipped. Points outside the grid's bounds are
/// clamped into the nearest edge cell, never dropped. Accumulation is a
/// plain count, so point order does not affect the result.
#[must_use]
pub fn build_daily_grids(points: &[Point], grid: &GeoGrid, range: DateRange) -> Vec<DailyGrid> {
    let mut grids: Vec<DailyGrid> = range
        .start
        .iter_days()
        .take(range.total_days())
        .map(|day| DailyGrid::zeros(day, grid.size()))
        .collect();

    let mut skipped = 0_u64;
    for p in points {
        let Some(offset) = range.offset(p.day) else {
            skipped += 1;
            continue;
        };
        grids[offset].increment(grid.cell_index(p.lat, p.lng));
    }

    if skipped > 0 {
        log::debug!(
            "Skipped {skipped} point(s) outside {} .. {}",
            range.start,
            range.end
        );
    }
    log::info!(
        "Built {} daily {}x{} grid(s) from {} point(s)",
        grids.len(),
        grid.size(),
        grid.size(),
        points.len()
    );

    grids
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use crime_forecast_grid_models::{CellIndex, GeoBox};

    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn point(d: u32, lat: f64, lng: f64) -> Point {
        Point {
            day: day(d),
            lat,
            lng,
            category: None,
        }
    }

    fn ten_by_ten() -> GeoGrid {
        GeoGrid::new(GeoBox::new(0.0, 0.0, 10.0, 10.0), 10).unwrap()
    }

    #[test]
    fn three_points_one_day_three_cells() {
        let points = vec![point(1, 0.5, 0.5), point(1, 5.5, 2.5), point(1, 9.5, 9.5)];
        let range = DateRange::new(day(1), day(1)).unwrap();
        let grids = build_daily_grids(&points, &ten_by_ten(), range);

        assert_eq!(grids.len(), 1);
        let g = &grids[0];
        assert_eq!(g.total(), 3);
        assert_eq!(g.counts.iter().filter(|&&c| c == 1).count(), 3);
        assert_eq!(g.counts.iter().filter(|&&c| c == 0).count(), 97);
        assert_eq!(g.get(CellIndex { i: 0, j: 0 }), 1);
        assert_eq!(g.get(CellIndex { i: 5, j: 2 }), 1);
        assert_eq!(g.get(CellIndex { i: 9, j: 9 }), 1);
    }

    #[test]
    fn fills_gaps_with_zero_grids() {
        let points = vec![point(1, 1.0, 1.0), point(4, 1.0, 1.0), point(4, 1.2, 1.3)];
        let range = DateRange::covering(&points).unwrap();
        let grids = build_daily_grids(&points, &ten_by_ten(), range);

        assert_eq!(grids.len(), 4);
        let totals: Vec<u64> = grids.iter().map(DailyGrid::total).collect();
        assert_eq!(totals, vec![1, 0, 0, 2]);
        assert_eq!(grids[2].day, day(3));
        assert_eq!(grids[3].get(CellIndex { i: 1, j: 1 }), 2);
    }

    #[test]
    fn skips_points_outside_range() {
        let points = vec![point(1, 1.0, 1.0), point(9, 1.0, 1.0)];
        let range = DateRange::new(day(1), day(2)).unwrap();
        let grids = build_daily_grids(&points, &ten_by_ten(), range);
        let total: u64 = grids.iter().map(DailyGrid::total).sum();
        assert_eq!(total, 1);
    }

    #[test]
    fn clamps_points_outside_bounds_into_edge_cells() {
        let points = vec![point(1, 1.0, 1.0), point(1, 10.5, 1.0), point(1, 5.0, -0.1)];
        let range = DateRange::new(day(1), day(1)).unwrap();
        let grids = build_daily_grids(&points, &ten_by_ten(), range);
        assert_eq!(grids[0].total(), 3);
        assert_eq!(grids[0].get(CellIndex { i: 9, j: 1 }), 1);
        assert_eq!(grids[0].get(CellIndex { i: 5, j: 0 }), 1);
        assert_eq!(grids[0].get(CellIndex { i: 1, j: 1 }), 1);
    }

    #[test]
    fn point_just_past_the_north_edge_is_counted() {
        let points = vec![point(1, 10.0 + 1e-9, 10.0)];
        let range = DateRange::new(day(1), day(1)).unwrap();
        let grids = build_daily_grids(&points, &ten_by_ten(), range);
        assert_eq!(grids[0].total(), 1);
        assert_eq!(grids[0].get(CellIndex { i: 9, j: 9 }), 1);
    }

    #[test]
    fn result_is_independent_of_point_order() {
        let mut points = vec![
            point(2, 3.3, 4.4),
            point(1, 9.9, 0.1),
            point(3, 3.3, 4.4),
            point(2, 7.0, 7.0),
        ];
        let range = DateRange::covering(&points).unwrap();
        let forward = build_daily_grids(&points, &ten_by_ten(), range);
        points.reverse();
        let backward = build_daily_grids(&points, &ten_by_ten(), range);
        assert_eq!(forward, backward);
    }
}
