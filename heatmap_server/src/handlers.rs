//! HTTP handlers for the heatmap API (§6 External Interfaces).
//!
//! Each handler does the same three things: validate the untrusted request
//! at the boundary (`heatmap_core::validate`), run the pipeline operation,
//! and translate the result into the wire DTOs in `dto`. Errors convert into
//! [`ErrorResponse`] via `?`, so a handler's body reads top-to-bottom as the
//! happy path.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use heatmap_core::error::HeatmapError;
use heatmap_core::geometry::Tile;
use heatmap_core::model::ScoringParams;
use heatmap_core::validate::{validate_factors, validate_scoring_params, validate_viewport, validate_zoom};
use serde::Deserialize;

use crate::dto::{HealthResponse, PointRequest, PointResponse, PrewarmRequest, PrewarmResponse, TileRequest, TileResponse, TileResultEntry, ViewportRequest, ViewportResponse};
use crate::error_response::ErrorResponse;
use crate::state::AppState;

/// Either shape the `/api/heatmap-tile` endpoint accepts (§6: "same, but
/// body carries..."): a single tile, or a viewport to cover with tiles.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HeatmapTileRequest {
	Viewport(ViewportRequest),
	Tile(TileRequest),
}

fn effective_params(mut params: ScoringParams, normalize_override: Option<bool>) -> ScoringParams {
	if let Some(normalize) = normalize_override {
		params.normalize_to_viewport = normalize;
	}
	params
}

pub async fn heatmap_tile(State(state): State<AppState>, Json(body): Json<HeatmapTileRequest>) -> Result<Response, ErrorResponse> {
	match body {
		HeatmapTileRequest::Tile(req) => single_tile(state, req).await,
		HeatmapTileRequest::Viewport(req) => viewport(state, req).await,
	}
}

async fn single_tile(state: AppState, req: TileRequest) -> Result<Response, ErrorResponse> {
	validate_zoom(req.tile.z)?;
	validate_factors(&req.factors)?;
	validate_scoring_params(&req.scoring_params)?;

	let params = effective_params(req.scoring_params, req.normalize_to_viewport);
	let tile: Tile = req.tile.into();

	let result = heatmap_pipeline::build_tile_cached(&state.cache, &state.builder, tile, &req.factors, &params, req.grid_size).await?;
	let response: TileResponse = result.as_ref().clone().into();
	Ok(Json(response).into_response())
}

async fn viewport(state: AppState, req: ViewportRequest) -> Result<Response, ErrorResponse> {
	validate_zoom(req.zoom)?;
	if req.zoom != state.config.heatmap_tile_zoom {
		return Err(HeatmapError::invalid_field(
			format!("zoom {} does not match the server's fixed heatmap zoom {}", req.zoom, state.config.heatmap_tile_zoom),
			"zoom",
		)
		.into());
	}
	validate_viewport(req.bounds)?;
	validate_factors(&req.factors)?;
	validate_scoring_params(&req.scoring_params)?;

	let resolved = state.coordinator.resolve_viewport(req.bounds, req.tile_radius.unwrap_or(0), &req.factors, &req.scoring_params).await?;

	let mut tiles = Vec::with_capacity(resolved.len());
	let mut results = Vec::with_capacity(resolved.len());
	let mut any_succeeded = false;

	for coordinator_tile in resolved {
		tiles.push(coordinator_tile.tile.into());
		match coordinator_tile.result {
			Ok(tile_result) => {
				any_succeeded = true;
				results.push(TileResultEntry::Ok {
					coordinates: tile_result.coords.into(),
					points: tile_result.points.clone(),
					factor_weights: tile_result.factor_weights.clone(),
					generated_at: tile_result.generated_at,
				});
			}
			Err(err) => results.push(TileResultEntry::Err { coords: coordinator_tile.tile.into(), error: err.to_string() }),
		}
	}

	let body = ViewportResponse { tiles, results };
	let status = if any_succeeded || body.results.is_empty() { StatusCode::OK } else { StatusCode::GATEWAY_TIMEOUT };
	Ok((status, Json(body)).into_response())
}

pub async fn heatmap_point(State(state): State<AppState>, Json(req): Json<PointRequest>) -> Result<Json<PointResponse>, ErrorResponse> {
	validate_factors(&req.factors)?;
	validate_scoring_params(&req.scoring_params)?;

	let (breakdown, k) = state.point_evaluator.evaluate(req.point.lat, req.point.lng, &req.factors, &req.scoring_params).await?;
	Ok(Json(PointResponse { breakdown, k }))
}

/// Bearer-token gate for the admin endpoint (§6 "gated by the `ADMIN_SECRET`
/// shared secret passed as a bearer token"). Absent config or a mismatched
/// token both fail closed as 401.
fn authorize_admin(headers: &HeaderMap, admin_secret: Option<&str>) -> Result<(), HeatmapError> {
	let Some(expected) = admin_secret else {
		return Err(HeatmapError::unauthorized("admin endpoint is not configured"));
	};
	let provided = headers
		.get(header::AUTHORIZATION)
		.and_then(|value| value.to_str().ok())
		.and_then(|value| value.strip_prefix("Bearer "));
	if provided == Some(expected) {
		Ok(())
	} else {
		Err(HeatmapError::unauthorized("missing or invalid bearer token"))
	}
}

pub async fn admin_prewarm(State(state): State<AppState>, headers: HeaderMap, Json(req): Json<PrewarmRequest>) -> Result<Json<PrewarmResponse>, ErrorResponse> {
	authorize_admin(&headers, state.config.admin_secret.as_deref())?;
	validate_factors(&req.factors)?;
	validate_scoring_params(&req.scoring_params)?;
	for tile in &req.tiles {
		validate_zoom(tile.z)?;
	}

	let build_futures = req.tiles.iter().map(|&tile| {
		let cache = Arc::clone(&state.cache);
		let builder = Arc::clone(&state.builder);
		let factors = req.factors.clone();
		let params = req.scoring_params;
		let grid_size = req.grid_size;
		async move { heatmap_pipeline::build_tile_cached(&cache, &builder, tile.into(), &factors, &params, grid_size).await }
	});

	let outcomes = futures::future::join_all(build_futures).await;
	let built = outcomes.iter().filter(|o| o.is_ok()).count();
	let failed = outcomes.len() - built;
	for outcome in &outcomes {
		if let Err(err) = outcome {
			log::warn!("prewarm failed for a tile: {err}");
		}
	}

	Ok(Json(PrewarmResponse { built, failed }))
}

pub async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
	Json(HealthResponse { status: "ok", cache: state.cache.stats() })
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::http::HeaderValue;

	#[test]
	fn missing_admin_secret_config_is_always_unauthorized() {
		let headers = HeaderMap::new();
		assert!(authorize_admin(&headers, None).is_err());
	}

	#[test]
	fn wrong_bearer_token_is_unauthorized() {
		let mut headers = HeaderMap::new();
		headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer wrong"));
		assert!(authorize_admin(&headers, Some("correct")).is_err());
	}

	#[test]
	fn correct_bearer_token_is_authorized() {
		let mut headers = HeaderMap::new();
		headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer correct"));
		assert!(authorize_admin(&headers, Some("correct")).is_ok());
	}
}
