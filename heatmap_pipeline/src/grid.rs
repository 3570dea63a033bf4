//! Grid-size policy and grid-point generation for the Tile Builder (§4.5).

use heatmap_core::geometry::{Bounds, METERS_PER_DEGREE_LAT, metres_per_degree_lng};

/// Default base grid cell, in meters, at `GRID_ZOOM_BASE` (§4.5).
pub const BASE_GRID_M: f64 = 200.0;
/// Zoom at which `BASE_GRID_M` applies without scaling (§4.5).
pub const GRID_ZOOM_BASE: u8 = 10;
/// Smallest permitted grid cell, in meters (§4.5).
pub const MIN_GRID_M: f64 = 50.0;
/// Largest permitted grid cell, in meters (§4.5).
pub const MAX_GRID_CELL_M: f64 = 300.0;

/// `gridSize = clamp(BASE_GRID / 2^(z - GRID_ZOOM_BASE), MIN_GRID, MAX_GRID_CELL)` (§4.5).
#[must_use]
pub fn grid_size_for_zoom(z: u8) -> f64 {
	let scale = 2f64.powi(i32::from(z) - i32::from(GRID_ZOOM_BASE));
	(BASE_GRID_M / scale).clamp(MIN_GRID_M, MAX_GRID_CELL_M)
}

/// A materialized grid over `bounds`, row-major south-to-north by row,
/// west-to-east within a row (§5 Ordering guarantees, §8 invariant 1).
pub struct Grid {
	pub rows: usize,
	pub cols: usize,
	pub points: Vec<(f64, f64)>,
}

/// Builds the grid whose physical cell is approximately `grid_size_m`
/// meters at `bounds`' center latitude (§4.5 step 4). Cell centers are
/// offset half a step in from each edge so every point lies inside
/// `bounds`.
#[must_use]
pub fn build_grid(bounds: Bounds, grid_size_m: f64) -> Grid {
	let center_lat = bounds.center().lat;
	let dlat = grid_size_m / METERS_PER_DEGREE_LAT;
	let dlng = grid_size_m / metres_per_degree_lng(center_lat);

	let rows = ((bounds.north - bounds.south) / dlat).ceil().max(1.0) as usize;
	let cols = ((bounds.east - bounds.west) / dlng).ceil().max(1.0) as usize;

	let mut points = Vec::with_capacity(rows * cols);
	for row in 0..rows {
		let lat = bounds.south + (row as f64 + 0.5) * dlat;
		for col in 0..cols {
			let lng = bounds.west + (col as f64 + 0.5) * dlng;
			points.push((lat, lng));
		}
	}

	Grid { rows, cols, points }
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	#[test]
	fn grid_size_matches_base_at_the_base_zoom() {
		assert_eq!(grid_size_for_zoom(GRID_ZOOM_BASE), BASE_GRID_M);
	}

	#[test]
	fn grid_size_shrinks_as_zoom_increases_but_floors_at_min() {
		assert_eq!(grid_size_for_zoom(GRID_ZOOM_BASE + 2), 50.0);
		assert!(grid_size_for_zoom(GRID_ZOOM_BASE + 10) >= MIN_GRID_M);
	}

	#[test]
	fn grid_size_grows_as_zoom_decreases_but_caps_at_max() {
		assert_eq!(grid_size_for_zoom(GRID_ZOOM_BASE - 1), 300.0);
		assert_eq!(grid_size_for_zoom(0), MAX_GRID_CELL_M);
	}

	#[test]
	fn grid_point_count_matches_invariant_1() {
		let bounds = Bounds::new(52.30, 52.20, 21.10, 21.00);
		let grid = build_grid(bounds, 200.0);
		assert_eq!(grid.points.len(), grid.rows * grid.cols);
	}

	#[test]
	fn grid_is_row_major_south_to_north_west_to_east() {
		let bounds = Bounds::new(52.30, 52.20, 21.10, 21.00);
		let grid = build_grid(bounds, 200.0);
		for window in grid.points.windows(2) {
			let (lat_a, lng_a) = window[0];
			let (lat_b, lng_b) = window[1];
			assert!(lat_b > lat_a || (lat_b == lat_a && lng_b > lng_a));
		}
	}

	#[test]
	fn grid_points_stay_within_bounds() {
		let bounds = Bounds::new(52.30, 52.20, 21.10, 21.00);
		let grid = build_grid(bounds, 200.0);
		for (lat, lng) in grid.points {
			assert!(lat >= bounds.south && lat <= bounds.north);
			assert!(lng >= bounds.west && lng <= bounds.east);
		}
	}
}
