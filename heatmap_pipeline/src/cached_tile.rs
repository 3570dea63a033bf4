//! Shared cache-key construction for anything that needs one built tile
//! rather than a whole coordinated viewport (§4.6, §4.7): the Request
//! Coordinator's batches, and the single-tile and prewarm HTTP endpoints.

use std::sync::Arc;

use heatmap_core::error::HeatmapError;
use heatmap_core::fingerprint::heatmap_fingerprint;
use heatmap_core::geometry::Tile;
use heatmap_core::model::{Factor, ScoringParams, TileResult};
use heatmap_core::{TileCache, TileCacheKey, TileCacheKind};

use crate::grid::grid_size_for_zoom;
use crate::tile_builder::TileBuilder;

/// Resolves `tile` through `cache`, building it with `builder` on a miss.
/// Every caller that wants a single cached heatmap tile should go through
/// here rather than constructing a [`TileCacheKey`] inline, so the
/// fingerprint/grid-size policy has exactly one place it can drift.
pub async fn build_tile_cached(
	cache: &Arc<TileCache>,
	builder: &Arc<TileBuilder>,
	tile: Tile,
	factors: &[Factor],
	params: &ScoringParams,
	grid_size_override: Option<f64>,
) -> Result<Arc<TileResult>, HeatmapError> {
	let grid_size = grid_size_override.unwrap_or_else(|| grid_size_for_zoom(tile.z));
	let fingerprint = heatmap_fingerprint(factors, params, grid_size);
	let key = TileCacheKey::new(TileCacheKind::Heatmap, tile.z, tile.x, tile.y, fingerprint);

	let builder = Arc::clone(builder);
	let factors = factors.to_vec();
	let params = *params;
	cache.get_or_build(key, move || async move { builder.build(tile, &factors, &params, grid_size_override).await }).await
}
