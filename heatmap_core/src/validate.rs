//! Request-boundary input validation, shared by every HTTP handler that
//! accepts a viewport, factor set, or scoring parameters. Library code below
//! this boundary trusts its inputs; this module is where untrusted values
//! get turned into `HeatmapError::InvalidInput` or accepted.

use crate::geometry::Bounds;
use crate::error::HeatmapError;
use crate::model::{Factor, ScoringParams};

/// Minimum permitted zoom for a heatmap tile request.
pub const MIN_ZOOM: u8 = 0;
/// Maximum permitted zoom for a heatmap tile request.
pub const MAX_ZOOM: u8 = 20;

/// Rejects a zoom outside `[MIN_ZOOM, MAX_ZOOM]`.
pub fn validate_zoom(z: u8) -> Result<(), HeatmapError> {
	if (MIN_ZOOM..=MAX_ZOOM).contains(&z) {
		Ok(())
	} else {
		Err(HeatmapError::invalid_field(format!("zoom {z} outside [{MIN_ZOOM}, {MAX_ZOOM}]"), "z"))
	}
}

/// Rejects a factor with an out-of-range weight, a non-positive
/// `max_distance`, or an empty id.
pub fn validate_factor(factor: &Factor) -> Result<(), HeatmapError> {
	if factor.id.trim().is_empty() {
		return Err(HeatmapError::invalid_field("factor id must not be empty", "id"));
	}
	if !(-100..=100).contains(&factor.weight) {
		return Err(HeatmapError::invalid_field(format!("weight {} outside [-100, 100]", factor.weight), "weight"));
	}
	if !(factor.max_distance.is_finite() && factor.max_distance > 0.0) {
		return Err(HeatmapError::invalid_field(format!("maxDistance {} must be a positive, finite number of meters", factor.max_distance), "maxDistance"));
	}
	Ok(())
}

/// Validates every factor in `factors`.
pub fn validate_factors(factors: &[Factor]) -> Result<(), HeatmapError> {
	factors.iter().try_for_each(validate_factor)
}

/// Rejects a `sensitivity` outside `[0.1, 10]` or a non-finite `lambda`.
pub fn validate_scoring_params(params: &ScoringParams) -> Result<(), HeatmapError> {
	if !(0.1..=10.0).contains(&params.sensitivity) {
		return Err(HeatmapError::invalid_field(format!("sensitivity {} outside [0.1, 10]", params.sensitivity), "sensitivity"));
	}
	if !params.lambda.is_finite() {
		return Err(HeatmapError::invalid_field("lambda must be finite", "lambda"));
	}
	Ok(())
}

/// Rejects a malformed viewport (`south >= north` or `west >= east`) or one
/// with any non-finite coordinate.
pub fn validate_viewport(viewport: Bounds) -> Result<(), HeatmapError> {
	let finite = [viewport.north, viewport.south, viewport.east, viewport.west].iter().all(|v| v.is_finite());
	if !finite {
		return Err(HeatmapError::invalid("viewport coordinates must be finite"));
	}
	if !viewport.is_valid() {
		return Err(HeatmapError::invalid("viewport must satisfy south < north and west < east"));
	}
	Ok(())
}
