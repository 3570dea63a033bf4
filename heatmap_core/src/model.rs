//! Domain value types shared across the pipeline: factors, POIs, scoring
//! parameters, and the shapes produced by the kernel and the tile builder.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::geometry::Tile;

/// A named scoring criterion with a sign (via `weight`), a distance horizon,
/// and the OSM tag selectors used by the POI store to materialize matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Factor {
	pub id: String,
	/// In `[-100, 100]`. Positive: proximity is desirable. Negative:
	/// proximity is undesirable. Zero: the factor is ignored.
	pub weight: i32,
	/// Truncation horizon in meters; beyond it distance is treated as equal
	/// to `max_distance`.
	pub max_distance: f64,
	pub enabled: bool,
	pub osm_tags: Vec<String>,
}

impl Factor {
	/// A factor only contributes to scoring when enabled and non-neutral.
	#[must_use]
	pub fn contributes(&self) -> bool {
		self.enabled && self.weight != 0
	}

	#[must_use]
	pub fn is_negative(&self) -> bool {
		self.weight < 0
	}
}

/// A single point of interest, scoped to one factor. The same OSM feature
/// may be materialized once per factor it matches; duplicates across
/// factors are expected and are not deduplicated (§9 open question).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Poi {
	pub id: i64,
	pub factor_id: String,
	pub lat: f64,
	pub lng: f64,
	pub name: Option<String>,
}

/// The monotone transform applied to a normalized distance ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceCurve {
	Linear,
	Log,
	Exp,
	Power,
}

/// Parameters controlling the scoring kernel's curve shape and power-mean
/// asymmetry for one request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringParams {
	pub distance_curve: DistanceCurve,
	/// In `[0.1, 10]`; shapes the curve (see `heatmap_spatial::curve`).
	pub sensitivity: f64,
	/// Controls per-factor exponent asymmetry in the power mean.
	pub lambda: f64,
	pub normalize_to_viewport: bool,
}

/// One grid sample within a tile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapPoint {
	pub lat: f64,
	pub lng: f64,
	/// Aggregate K in `[0, 1]`; lower is better.
	pub value: f64,
}

/// A fully-built, cacheable tile result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileResult {
	pub coords: Tile,
	/// Row-major grid order: south-to-north by row, west-to-east within a
	/// row.
	pub points: Vec<HeatmapPoint>,
	pub factor_weights: HashMap<String, i32>,
	pub generated_at: i64,
	pub source_fingerprint: Vec<u8>,
}

/// Per-factor breakdown of one point's score, for popups. Not tile-cached.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactorBreakdown {
	pub factor_id: String,
	pub weight: i32,
	pub distance: f64,
	pub max_distance: f64,
	pub score: f64,
	pub is_negative: bool,
	pub contribution: f64,
	pub effective_exponent: f64,
	#[serde(rename = "noPOIs")]
	pub no_pois: bool,
	pub nearby_count: u32,
}
