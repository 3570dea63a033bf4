//! A uniform-grid bucket index over a single factor's POIs (§4.2).
//!
//! POIs are hashed by `(floor(lat/cell), floor(lng/cell))` into buckets;
//! `nearest_distance` and `count_within_radius` expand outward from the
//! query point's cell in concentric rings, stopping as soon as the ring's
//! minimum possible distance rules out any closer match.

use std::collections::HashMap;

use heatmap_core::geometry::{METERS_PER_DEGREE_LAT, metres_per_degree_lng};
use heatmap_core::model::Poi;

use crate::haversine::haversine_to_poi;

/// Default cell size in latitude-degrees, ≈ 1.1 km (§4.2).
pub const DEFAULT_CELL_SIZE_DEG: f64 = 0.01;

type CellKey = (i64, i64);

/// An immutable, `Arc`-shareable spatial index over one factor's POIs.
/// Built once per tile-build and shared by reference with every evaluator
/// worker (§5 Shared-resource policy).
#[derive(Debug, Clone)]
pub struct SpatialIndex {
	cell_size: f64,
	buckets: HashMap<CellKey, Vec<Poi>>,
}

impl SpatialIndex {
	/// Builds an index over `pois` with the default cell size.
	#[must_use]
	pub fn build(pois: &[Poi]) -> Self {
		Self::build_with_cell_size(pois, DEFAULT_CELL_SIZE_DEG)
	}

	#[must_use]
	pub fn build_with_cell_size(pois: &[Poi], cell_size: f64) -> Self {
		let mut buckets: HashMap<CellKey, Vec<Poi>> = HashMap::new();
		for poi in pois {
			buckets.entry(cell_of(poi.lat, poi.lng, cell_size)).or_default().push(poi.clone());
		}
		Self { cell_size, buckets }
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.buckets.values().all(Vec::is_empty)
	}

	/// Nearest haversine distance (meters) from `(lat, lng)` to any indexed
	/// POI, truncated search at `cap` meters. Returns `+inf` if nothing is
	/// within `cap` (§4.2).
	#[must_use]
	pub fn nearest_distance(&self, lat: f64, lng: f64, cap: f64) -> f64 {
		if self.buckets.is_empty() {
			return f64::INFINITY;
		}
		let (cx, cy) = cell_of(lat, lng, self.cell_size);
		let mut best = f64::INFINITY;
		let ring_meters = self.cell_size * metres_per_degree_lng(lat);

		let mut ring: i64 = 0;
		loop {
			for (dx, dy) in ring_cells(ring) {
				if let Some(pois) = self.buckets.get(&(cx + dx, cy + dy)) {
					for poi in pois {
						let d = haversine_to_poi(lat, lng, poi);
						if d <= cap && d < best {
							best = d;
						}
					}
				}
			}

			// A query point may sit anywhere within its own cell, so the
			// ring just scanned is only guaranteed to rule out the next
			// ring starting at `ring * cell size` away, not `(ring + 1) *
			// cell size`; using the post-increment ring index here would
			// over-prune. `metres_per_degree_lng` is also the smaller of
			// the two degree->meter conversions, so this stays a genuine
			// lower bound in every direction (§4.2, §8 invariant 7).
			let next_ring_min_distance = ring as f64 * ring_meters;
			if next_ring_min_distance > cap || (best.is_finite() && next_ring_min_distance > best) {
				break;
			}

			ring += 1;
			if ring > 100_000 {
				// Pathological cap on a near-empty planet; never hit in practice.
				break;
			}
		}

		best
	}

	/// Count of indexed POIs within `radius` meters of `(lat, lng)`,
	/// haversine-filtered (§4.2).
	#[must_use]
	pub fn count_within_radius(&self, lat: f64, lng: f64, radius: f64) -> u32 {
		let (cx, cy) = cell_of(lat, lng, self.cell_size);
		let cell_span = (radius / (self.cell_size * METERS_PER_DEGREE_LAT)).ceil() as i64 + 1;

		let mut count = 0;
		for dy in -cell_span..=cell_span {
			for dx in -cell_span..=cell_span {
				if let Some(pois) = self.buckets.get(&(cx + dx, cy + dy)) {
					for poi in pois {
						if haversine_to_poi(lat, lng, poi) <= radius {
							count += 1;
						}
					}
				}
			}
		}
		count
	}
}

fn cell_of(lat: f64, lng: f64, cell_size: f64) -> CellKey {
	((lat / cell_size).floor() as i64, (lng / cell_size).floor() as i64)
}

/// The `(dx, dy)` offsets forming the square ring at Chebyshev distance
/// `ring` from the origin cell (ring 0 is just the origin cell itself).
fn ring_cells(ring: i64) -> Vec<(i64, i64)> {
	if ring == 0 {
		return vec![(0, 0)];
	}
	let mut cells = Vec::with_capacity((8 * ring) as usize);
	for dx in -ring..=ring {
		cells.push((dx, -ring));
		cells.push((dx, ring));
	}
	for dy in (-ring + 1)..ring {
		cells.push((-ring, dy));
		cells.push((ring, dy));
	}
	cells
}
