//! The typed error hierarchy for the heatmap pipeline.
//!
//! Library code (`heatmap_spatial`, `heatmap_pipeline`) speaks `anyhow` for
//! internal plumbing; a [`HeatmapError`] is the concrete boundary type that
//! the Tile Builder and Request Coordinator translate into before handing a
//! result to the HTTP layer, where `heatmap_server` maps it to a response.

use serde::Serialize;
use thiserror::Error;

/// One of the five error kinds named in the error-handling design.
#[derive(Debug, Error, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum HeatmapError {
	/// Zoom outside the permitted range, weights out of `[-100, 100]`,
	/// negative `maxDistance`, sensitivity out of `[0.1, 10]`, or a
	/// malformed viewport (`south >= north` or `west >= east`).
	#[error("invalid input: {message}")]
	InvalidInput { message: String, field: Option<String> },

	/// The viewport (or its radius-expansion) covers too many tiles.
	#[error("viewport too large: {observed} tiles, max {max}")]
	TooLarge { observed: usize, max: usize },

	/// The POI store or the L2 cache is unreachable and no in-process
	/// fallback could serve the request.
	#[error("upstream store unavailable: {message}")]
	StoreUnavailable { message: String },

	/// The per-tile build deadline elapsed.
	#[error("deadline exceeded building tile {z}/{x}/{y}")]
	Deadline { z: u8, x: u32, y: u32 },

	/// Anything else: evaluator failure after fallback also failed, a
	/// kernel numerical invariant violated by caller-supplied NaNs, etc.
	#[error("internal error: {message}")]
	Internal { message: String },

	/// An admin endpoint was called without, or with the wrong, bearer secret.
	#[error("unauthorized: {message}")]
	Unauthorized { message: String },
}

impl HeatmapError {
	#[must_use]
	pub fn invalid(message: impl Into<String>) -> Self {
		Self::InvalidInput { message: message.into(), field: None }
	}

	#[must_use]
	pub fn invalid_field(message: impl Into<String>, field: impl Into<String>) -> Self {
		Self::InvalidInput { message: message.into(), field: Some(field.into()) }
	}

	#[must_use]
	pub fn internal(message: impl Into<String>) -> Self {
		Self::Internal { message: message.into() }
	}

	#[must_use]
	pub fn unauthorized(message: impl Into<String>) -> Self {
		Self::Unauthorized { message: message.into() }
	}

	/// HTTP status code this error kind maps to.
	#[must_use]
	pub fn status_code(&self) -> u16 {
		match self {
			Self::InvalidInput { .. } => 400,
			Self::Unauthorized { .. } => 401,
			Self::TooLarge { .. } => 413,
			Self::StoreUnavailable { .. } => 502,
			Self::Deadline { .. } => 504,
			Self::Internal { .. } => 500,
		}
	}
}
