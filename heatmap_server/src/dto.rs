//! Wire request/response shapes for the JSON API (§6 External Interfaces).
//!
//! These are deliberately distinct from the domain types in
//! `heatmap_core::model`: the wire format is camelCase,
//! `#[serde(deny_unknown_fields)]` on every request so a client typo surfaces
//! as 400 rather than being silently ignored, and a couple of field names
//! (`coordinates` vs. `coords`) differ from the internal `TileResult` shape.

use std::collections::HashMap;

use heatmap_core::geometry::Tile;
use heatmap_core::model::{Factor, FactorBreakdown, HeatmapPoint, ScoringParams, TileResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TileCoords {
	pub z: u8,
	pub x: u32,
	pub y: u32,
}

impl From<TileCoords> for Tile {
	fn from(value: TileCoords) -> Self {
		Tile::new(value.z, value.x, value.y)
	}
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TileCoordsOut {
	pub z: u8,
	pub x: u32,
	pub y: u32,
}

impl From<Tile> for TileCoordsOut {
	fn from(value: Tile) -> Self {
		Self { z: value.z, x: value.x, y: value.y }
	}
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LatLngIn {
	pub lat: f64,
	pub lng: f64,
}

/// `POST /api/heatmap-tile` request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TileRequest {
	pub tile: TileCoords,
	pub factors: Vec<Factor>,
	pub scoring_params: ScoringParams,
	pub grid_size: Option<f64>,
	/// Overrides `scoringParams.normalizeToViewport` when present, matching
	/// the external interface's top-level shorthand.
	pub normalize_to_viewport: Option<bool>,
}

/// `POST /api/heatmap-tile` response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TileResponse {
	pub coordinates: TileCoordsOut,
	pub points: Vec<HeatmapPoint>,
	pub factor_weights: HashMap<String, i32>,
	pub generated_at: i64,
}

impl From<TileResult> for TileResponse {
	fn from(result: TileResult) -> Self {
		Self {
			coordinates: result.coords.into(),
			points: result.points,
			factor_weights: result.factor_weights,
			generated_at: result.generated_at,
		}
	}
}

/// `POST /api/heatmap-tile` request body, viewport variant: same scoring
/// inputs, but a `bounds`/`zoom`/`tileRadius` in place of a single tile.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ViewportRequest {
	pub bounds: heatmap_core::geometry::Bounds,
	pub zoom: u8,
	pub factors: Vec<Factor>,
	pub scoring_params: ScoringParams,
	/// Context-expansion radius in tiles; defaults to 0 (viewport tiles
	/// only) when omitted (§6).
	pub tile_radius: Option<u32>,
}

/// One entry in a viewport response's tile array: either the full tile
/// result, or `{coords, error}` for a tile that failed to build (§7).
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum TileResultEntry {
	Ok {
		coordinates: TileCoordsOut,
		points: Vec<HeatmapPoint>,
		#[serde(rename = "factorWeights")]
		factor_weights: HashMap<String, i32>,
		#[serde(rename = "generatedAt")]
		generated_at: i64,
	},
	Err {
		coords: TileCoordsOut,
		error: String,
	},
}

/// `POST /api/heatmap-tile` (viewport variant) response body. `tiles` is
/// synchronous with `results`: it names exactly the tiles `results` covers,
/// in the same order.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportResponse {
	pub tiles: Vec<TileCoordsOut>,
	pub results: Vec<TileResultEntry>,
}

/// `POST /api/heatmap-point` request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PointRequest {
	pub point: LatLngIn,
	pub factors: Vec<Factor>,
	pub scoring_params: ScoringParams,
}

/// `POST /api/heatmap-point` response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointResponse {
	pub breakdown: Vec<FactorBreakdown>,
	pub k: f64,
}

/// `POST /api/admin/prewarm` request body: a rectangular tile range plus the
/// factor/params config to build ahead of traffic.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PrewarmRequest {
	pub tiles: Vec<TileCoords>,
	pub factors: Vec<Factor>,
	pub scoring_params: ScoringParams,
	pub grid_size: Option<f64>,
}

/// `POST /api/admin/prewarm` response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrewarmResponse {
	pub built: usize,
	pub failed: usize,
}

/// `GET /healthz` response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
	pub status: &'static str,
	pub cache: heatmap_core::cache::CacheStatsSnapshot,
}
