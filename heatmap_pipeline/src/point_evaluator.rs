//! The Point Evaluator (§4.3, §6 `/api/heatmap-point`): the uncached,
//! single-point counterpart to the Tile Builder, used for popup breakdowns
//! rather than whole-tile rendering.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use heatmap_core::error::HeatmapError;
use heatmap_core::geometry::Bounds;
use heatmap_core::model::{Factor, FactorBreakdown, ScoringParams};
use heatmap_spatial::index::SpatialIndex;
use heatmap_spatial::kernel::factor_breakdown;

use crate::poi_store::PoiStoreAdapter;

/// Deadline for one point's POI fetch + breakdown, matching the Tile
/// Builder's own per-tile deadline policy.
pub const DEFAULT_POINT_DEADLINE: Duration = Duration::from_secs(10);

/// Fetches the POIs around one point and returns its per-factor breakdown.
/// Unlike the Tile Builder this never touches the tile cache: a popup
/// request is cheap enough, and specific enough to one lat/lng, that caching
/// it would mostly miss.
pub struct PointEvaluator {
	poi_store: Arc<PoiStoreAdapter>,
	deadline: Duration,
}

impl PointEvaluator {
	#[must_use]
	pub fn new(poi_store: Arc<PoiStoreAdapter>, deadline: Duration) -> Self {
		Self { poi_store, deadline }
	}

	/// Evaluates `(lat, lng)` against `factors`/`params`, returning the
	/// sorted per-factor breakdown and the aggregate `K`.
	pub async fn evaluate(&self, lat: f64, lng: f64, factors: &[Factor], params: &ScoringParams) -> Result<(Vec<FactorBreakdown>, f64), HeatmapError> {
		match tokio::time::timeout(self.deadline, self.evaluate_inner(lat, lng, factors, params)).await {
			Ok(result) => result,
			Err(_) => {
				log::warn!("point evaluation deadline exceeded at ({lat}, {lng})");
				Err(HeatmapError::internal("point evaluation deadline exceeded"))
			}
		}
	}

	async fn evaluate_inner(&self, lat: f64, lng: f64, factors: &[Factor], params: &ScoringParams) -> Result<(Vec<FactorBreakdown>, f64), HeatmapError> {
		let contributing: Vec<&Factor> = factors.iter().filter(|f| f.contributes()).collect();

		let mut indexes: HashMap<String, SpatialIndex> = HashMap::new();
		for factor in &contributing {
			let search_bounds = Bounds::new(lat, lat, lng, lng).padded(factor.max_distance);
			let pois = self
				.poi_store
				.fetch_for_bounds(factor, search_bounds)
				.await
				.map_err(|err| HeatmapError::StoreUnavailable { message: err.to_string() })?;
			indexes.insert(factor.id.clone(), SpatialIndex::build(&pois));
		}

		Ok(factor_breakdown(lat, lng, factors, &indexes, params))
	}
}
