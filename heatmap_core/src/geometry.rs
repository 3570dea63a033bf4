//! Tile geometry: slippy-map tile/bounds conversion and viewport→tile cover.

use serde::{Deserialize, Serialize};

/// Mean meters per degree of latitude; a single-value approximation that is
/// sufficient across the deployed domain (Poland).
pub const METERS_PER_DEGREE_LAT: f64 = 111_320.0;

/// Mean earth radius used by the haversine distance in `heatmap_spatial`.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Fixed zoom at which POIs are fetched/cached.
pub const POI_TILE_ZOOM: u8 = 13;

/// Fixed zoom at which heatmap tiles are served and cached.
pub const HEATMAP_TILE_ZOOM: u8 = 13;

/// A point in WGS84 degrees.
///
/// Invariant: `-90.0 <= lat <= 90.0` and `-180.0 < lng <= 180.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
	pub lat: f64,
	pub lng: f64,
}

impl LatLng {
	#[must_use]
	pub fn new(lat: f64, lng: f64) -> Self {
		Self { lat, lng }
	}

	#[must_use]
	pub fn is_valid(&self) -> bool {
		(-90.0..=90.0).contains(&self.lat) && self.lng > -180.0 && self.lng <= 180.0
	}
}

/// A geographic bounding box. Invariant: `south < north` and `west < east`;
/// antimeridian wraparound is not supported (out of scope for this domain).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
	pub north: f64,
	pub south: f64,
	pub east: f64,
	pub west: f64,
}

impl Bounds {
	#[must_use]
	pub fn new(north: f64, south: f64, east: f64, west: f64) -> Self {
		Self { north, south, east, west }
	}

	#[must_use]
	pub fn is_valid(&self) -> bool {
		self.south < self.north && self.west < self.east
	}

	#[must_use]
	pub fn center(&self) -> LatLng {
		LatLng::new((self.north + self.south) / 2.0, (self.east + self.west) / 2.0)
	}

	/// Pad the bounds by `meters` in every direction, converting to degrees
	/// at the bounds' center latitude.
	#[must_use]
	pub fn padded(&self, meters: f64) -> Self {
		let center_lat = self.center().lat;
		let dlat = meters / METERS_PER_DEGREE_LAT;
		let dlng = meters / metres_per_degree_lng(center_lat);
		Self {
			north: (self.north + dlat).min(90.0),
			south: (self.south - dlat).max(-90.0),
			east: self.east + dlng,
			west: self.west - dlng,
		}
	}
}

/// A slippy-map tile `(z, x, y)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tile {
	pub z: u8,
	pub x: u32,
	pub y: u32,
}

impl Tile {
	#[must_use]
	pub fn new(z: u8, x: u32, y: u32) -> Self {
		Self { z, x, y }
	}
}

/// `cos(lat) * METERS_PER_DEGREE_LAT`, the meters-per-degree-longitude at a
/// given latitude (degrees).
#[must_use]
pub fn metres_per_degree_lng(lat_deg: f64) -> f64 {
	lat_deg.to_radians().cos() * METERS_PER_DEGREE_LAT
}

fn lng_to_tile_x(lng: f64, z: u8) -> f64 {
	(lng + 180.0) / 360.0 * 2f64.powi(i32::from(z))
}

fn lat_to_tile_y(lat: f64, z: u8) -> f64 {
	let lat_rad = lat.to_radians();
	(1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / std::f64::consts::PI) / 2.0 * 2f64.powi(i32::from(z))
}

fn tile_x_to_lng(x: f64, z: u8) -> f64 {
	x / 2f64.powi(i32::from(z)) * 360.0 - 180.0
}

fn tile_y_to_lat(y: f64, z: u8) -> f64 {
	let n = std::f64::consts::PI - 2.0 * std::f64::consts::PI * y / 2f64.powi(i32::from(z));
	(0.5 * (n.exp() - (-n).exp())).atan().to_degrees()
}

/// Standard slippy→lat/lng inverse. Bit-exact to the web-Mercator tile
/// scheme so tiles stitch without gaps at any zoom.
#[must_use]
pub fn tile_to_bounds(tile: Tile) -> Bounds {
	let Tile { z, x, y } = tile;
	Bounds {
		north: tile_y_to_lat(f64::from(y), z),
		south: tile_y_to_lat(f64::from(y) + 1.0, z),
		west: tile_x_to_lng(f64::from(x), z),
		east: tile_x_to_lng(f64::from(x) + 1.0, z),
	}
}

/// Emits the rectangular set of tiles covering `bounds` at zoom `z`.
///
/// A tile is included iff its bounds intersect the open interior of
/// `bounds`, plus all tiles touching the boundary — implemented here by
/// flooring the min tile coordinate and taking the tile containing the
/// (exclusive) max edge, which is equivalent for a rectangular cover.
#[must_use]
pub fn bounds_to_tiles(bounds: Bounds, z: u8) -> Vec<Tile> {
	let n = 2u32.pow(u32::from(z));
	let x_min = lng_to_tile_x(bounds.west, z).floor().max(0.0) as u32;
	let x_max = (lng_to_tile_x(bounds.east, z).ceil() as u32).saturating_sub(1).min(n - 1);
	let y_min = lat_to_tile_y(bounds.north, z).floor().max(0.0) as u32;
	let y_max = (lat_to_tile_y(bounds.south, z).ceil() as u32).saturating_sub(1).min(n - 1);

	let mut tiles = Vec::with_capacity(((x_max - x_min + 1) * (y_max - y_min + 1)) as usize);
	for y in y_min..=y_max {
		for x in x_min..=x_max {
			tiles.push(Tile::new(z, x, y));
		}
	}
	tiles
}

/// Returns `tiles` plus every tile within Chebyshev distance `r` of any tile
/// already in the set, deduplicated. All input tiles must share a zoom.
#[must_use]
pub fn expand_by_radius(tiles: &[Tile], r: u32) -> Vec<Tile> {
	if tiles.is_empty() || r == 0 {
		return tiles.to_vec();
	}
	let z = tiles[0].z;
	let n = 2i64.pow(u32::from(z));
	let mut seen = std::collections::HashSet::new();
	let mut out = Vec::new();
	for t in tiles {
		for dy in -(r as i64)..=(r as i64) {
			for dx in -(r as i64)..=(r as i64) {
				let nx = i64::from(t.x) + dx;
				let ny = i64::from(t.y) + dy;
				if nx < 0 || ny < 0 || nx >= n || ny >= n {
					continue;
				}
				let candidate = Tile::new(z, nx as u32, ny as u32);
				if seen.insert(candidate) {
					out.push(candidate);
				}
			}
		}
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	#[test]
	fn tile_to_bounds_round_trips_through_cover() {
		let tile = Tile::new(13, 4520, 2650);
		let bounds = tile_to_bounds(tile);
		assert!(bounds.is_valid());
		let cover = bounds_to_tiles(bounds, 13);
		assert!(cover.contains(&tile));
	}

	#[test]
	fn bounds_to_tiles_covers_a_small_viewport() {
		// Warsaw-ish viewport, expected to cover a handful of Z13 tiles.
		let bounds = Bounds::new(52.30, 52.20, 21.10, 21.00);
		let tiles = bounds_to_tiles(bounds, HEATMAP_TILE_ZOOM);
		assert!(!tiles.is_empty());
		assert!(tiles.len() < 36);
	}

	#[test]
	fn expand_by_radius_includes_original_tiles() {
		let base = vec![Tile::new(13, 100, 100)];
		let expanded = expand_by_radius(&base, 1);
		assert!(expanded.contains(&base[0]));
		assert_eq!(expanded.len(), 9);
	}

	#[test]
	fn expand_by_radius_zero_is_identity() {
		let base = vec![Tile::new(13, 5, 5), Tile::new(13, 5, 6)];
		assert_eq!(expand_by_radius(&base, 0), base);
	}

	#[test]
	fn metres_per_degree_lng_shrinks_towards_the_poles() {
		assert!(metres_per_degree_lng(52.0) < METERS_PER_DEGREE_LAT);
		assert!(metres_per_degree_lng(0.0) > metres_per_degree_lng(60.0));
	}

	#[test]
	fn bounds_padded_grows_in_every_direction() {
		let b = Bounds::new(52.30, 52.20, 21.10, 21.00);
		let p = b.padded(1000.0);
		assert!(p.north > b.north && p.south < b.south);
		assert!(p.east > b.east && p.west < b.west);
	}
}
