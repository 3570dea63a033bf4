//! The Tile Builder (§4.5): orchestrates bounds → POI fetch → indexes →
//! parallel evaluation → optional normalization → `TileResult` assembly,
//! wrapped in a per-tile deadline.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use heatmap_core::error::HeatmapError;
use heatmap_core::fingerprint::heatmap_fingerprint;
use heatmap_core::geometry::{Tile, tile_to_bounds};
use heatmap_core::model::{Factor, HeatmapPoint, ScoringParams, TileResult};
use heatmap_spatial::index::SpatialIndex;
use heatmap_spatial::kernel::normalize_to_viewport;

use crate::grid::{build_grid, grid_size_for_zoom};
use crate::poi_store::PoiStoreAdapter;

/// Default per-tile build deadline (§5 Timeouts).
pub const DEFAULT_TILE_DEADLINE: Duration = Duration::from_secs(60);

/// Builds one tile's [`TileResult`] (§4.5). Stateless beyond the POI
/// adapter and worker-count policy it's handed; safe to share via `Arc` and
/// call concurrently for different tiles.
pub struct TileBuilder {
	poi_store: Arc<PoiStoreAdapter>,
	cpu_bound: usize,
	deadline: Duration,
}

impl TileBuilder {
	#[must_use]
	pub fn new(poi_store: Arc<PoiStoreAdapter>, cpu_bound: usize, deadline: Duration) -> Self {
		Self { poi_store, cpu_bound, deadline }
	}

	/// Builds `tile` for `factors`/`params`, using `grid_size_override` if
	/// given or the zoom-derived default otherwise (§4.5). Wrapped in a
	/// `tokio::time::timeout`; exceeding the deadline surfaces as
	/// `HeatmapError::Deadline` (§5 Timeouts, §7 Deadline).
	pub async fn build(&self, tile: Tile, factors: &[Factor], params: &ScoringParams, grid_size_override: Option<f64>) -> Result<TileResult, HeatmapError> {
		let Tile { z, x, y } = tile;
		match tokio::time::timeout(self.deadline, self.build_inner(tile, factors, params, grid_size_override)).await {
			Ok(result) => result,
			Err(_) => {
				log::warn!("tile build deadline exceeded: {z}/{x}/{y}");
				Err(HeatmapError::Deadline { z, x, y })
			}
		}
	}

	async fn build_inner(&self, tile: Tile, factors: &[Factor], params: &ScoringParams, grid_size_override: Option<f64>) -> Result<TileResult, HeatmapError> {
		let bounds = tile_to_bounds(tile);
		let grid_size = grid_size_override.unwrap_or_else(|| grid_size_for_zoom(tile.z));

		let contributing: Vec<&Factor> = factors.iter().filter(|f| f.contributes()).collect();
		let max_horizon = contributing.iter().map(|f| f.max_distance).fold(0.0_f64, f64::max);
		let padded_bounds = bounds.padded(max_horizon);

		let mut indexes: HashMap<String, SpatialIndex> = HashMap::new();
		for factor in &contributing {
			let pois = self
				.poi_store
				.fetch_for_bounds(factor, padded_bounds)
				.await
				.map_err(|err| HeatmapError::StoreUnavailable { message: err.to_string() })?;
			indexes.insert(factor.id.clone(), SpatialIndex::build(&pois));
		}

		let grid = build_grid(bounds, grid_size);
		let owned_factors: Vec<Factor> = contributing.into_iter().cloned().collect();
		let mut values = heatmap_spatial::evaluator::evaluate_grid(&grid.points, &owned_factors, &indexes, params, self.cpu_bound);

		if params.normalize_to_viewport {
			normalize_to_viewport(&mut values);
		}

		let points: Vec<HeatmapPoint> = grid
			.points
			.iter()
			.zip(values.iter())
			.map(|(&(lat, lng), &value)| HeatmapPoint { lat, lng, value })
			.collect();

		let factor_weights = factors.iter().filter(|f| f.contributes()).map(|f| (f.id.clone(), f.weight)).collect();

		Ok(TileResult {
			coords: tile,
			points,
			factor_weights,
			generated_at: current_unix_time(),
			source_fingerprint: heatmap_fingerprint(factors, params, grid_size),
		})
	}
}

fn current_unix_time() -> i64 {
	std::time::SystemTime::now()
		.duration_since(std::time::UNIX_EPOCH)
		.map(|d| d.as_secs() as i64)
		.unwrap_or(0)
}
