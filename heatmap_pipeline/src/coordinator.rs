//! The Request Coordinator (§4.7): turns one viewport request into an
//! ordered, batched set of Tile Cache lookups, shrinking the context-expansion
//! radius if it would blow the total-tile budget.

use std::sync::Arc;
use std::time::Duration;

use heatmap_core::error::HeatmapError;
use heatmap_core::geometry::{Bounds, Tile, bounds_to_tiles, expand_by_radius};
use heatmap_core::model::{Factor, ScoringParams, TileResult};
use heatmap_core::TileCache;

use crate::cached_tile::build_tile_cached;
use crate::tile_builder::TileBuilder;

/// Viewport tile-count ceiling before context expansion (§4.7 step 1).
pub const MAX_VIEWPORT_TILES: usize = 36;
/// Total tile-count ceiling after context expansion (§4.7 step 2).
pub const MAX_TOTAL_TILES: usize = 64;
/// Tiles dispatched per wave of parallel Tile Cache lookups (§4.7 step 4).
pub const BATCH_SIZE: usize = 5;
/// Pause between batches (§4.7 step 4).
pub const BATCH_DELAY: Duration = Duration::from_millis(1);

/// One resolved tile, tagged with whether it fell inside the original
/// viewport or only appeared via context-expansion, so callers can prioritize
/// rendering the viewport subset first.
///
/// `result` is independently fallible: one tile's deadline or store failure
/// must not take down the rest of the batch, so the HTTP layer can still
/// return every tile that did build alongside an error marker for the ones
/// that didn't.
pub struct CoordinatorTile {
	pub tile: Tile,
	pub in_viewport: bool,
	pub result: Result<Arc<TileResult>, HeatmapError>,
}

/// Orchestrates viewport → ordered tile list → batched cache-backed builds.
pub struct RequestCoordinator {
	cache: Arc<TileCache>,
	builder: Arc<TileBuilder>,
	zoom: u8,
}

impl RequestCoordinator {
	#[must_use]
	pub fn new(cache: Arc<TileCache>, builder: Arc<TileBuilder>, zoom: u8) -> Self {
		Self { cache, builder, zoom }
	}

	/// Resolves every tile covering `viewport` plus a `radius`-tile context
	/// expansion, in viewport-first order (§4.7).
	///
	/// Returns `TooLarge` immediately, before any cache or store activity, if
	/// the viewport alone exceeds [`MAX_VIEWPORT_TILES`] (§8 scenario S6).
	pub async fn resolve_viewport(&self, viewport: Bounds, radius: u32, factors: &[Factor], params: &ScoringParams) -> Result<Vec<CoordinatorTile>, HeatmapError> {
		let viewport_tiles = bounds_to_tiles(viewport, self.zoom);
		if viewport_tiles.len() > MAX_VIEWPORT_TILES {
			return Err(HeatmapError::TooLarge { observed: viewport_tiles.len(), max: MAX_VIEWPORT_TILES });
		}

		let ordered = self.ordered_tile_list(&viewport_tiles, radius);

		let mut resolved = Vec::with_capacity(ordered.len());
		for batch in ordered.chunks(BATCH_SIZE) {
			let mut handles = Vec::with_capacity(batch.len());
			for &(tile, in_viewport) in batch {
				let cache = Arc::clone(&self.cache);
				let builder = Arc::clone(&self.builder);
				let factors = factors.to_vec();
				let params = *params;
				handles.push(tokio::spawn(async move { (tile, in_viewport, build_tile_cached(&cache, &builder, tile, &factors, &params, None).await) }));
			}

			for (&(tile, in_viewport), handle) in batch.iter().zip(handles) {
				let result = match handle.await {
					Ok((_, _, result)) => result,
					Err(err) => Err(HeatmapError::internal(format!("tile build task panicked: {err}"))),
				};
				resolved.push(CoordinatorTile { tile, in_viewport, result });
			}

			if ordered.len() > BATCH_SIZE {
				tokio::time::sleep(BATCH_DELAY).await;
			}
		}

		Ok(resolved)
	}

	/// Builds the viewport-first, then-expanded tile order, shrinking
	/// `radius` downward until the expanded set fits [`MAX_TOTAL_TILES`]
	/// (§4.7 steps 2-3).
	fn ordered_tile_list(&self, viewport_tiles: &[Tile], radius: u32) -> Vec<(Tile, bool)> {
		let mut r = radius;
		let expanded = loop {
			let candidate = expand_by_radius(viewport_tiles, r);
			if candidate.len() <= MAX_TOTAL_TILES || r == 0 {
				break candidate;
			}
			r -= 1;
		};

		let mut ordered = Vec::with_capacity(expanded.len());
		for &tile in viewport_tiles {
			ordered.push((tile, true));
		}
		for tile in expanded {
			if !viewport_tiles.contains(&tile) {
				ordered.push((tile, false));
			}
		}
		ordered
	}
}
