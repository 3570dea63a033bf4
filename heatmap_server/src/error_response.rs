//! Maps a [`HeatmapError`] to an HTTP response: status code via
//! `HeatmapError::status_code` (§7), body as the `{error: {kind, message,
//! details}}` envelope (§7.1).
//!
//! `HeatmapError` lives in `heatmap_core`, which doesn't depend on axum, so
//! the `IntoResponse` impl lives here instead — the HTTP layer owns the
//! wire-format decision, not the domain crate.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use heatmap_core::error::HeatmapError;
use serde_json::Value;

pub struct ErrorResponse(pub HeatmapError);

impl From<HeatmapError> for ErrorResponse {
	fn from(err: HeatmapError) -> Self {
		Self(err)
	}
}

impl IntoResponse for ErrorResponse {
	fn into_response(self) -> Response {
		let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

		let mut flattened = match serde_json::to_value(&self.0) {
			Ok(Value::Object(map)) => map,
			_ => serde_json::Map::new(),
		};
		let kind = flattened.remove("kind").unwrap_or(Value::String("internal".to_string()));
		let message = flattened.remove("message").unwrap_or(Value::String(self.0.to_string()));

		let mut error = serde_json::Map::new();
		error.insert("kind".to_string(), kind);
		error.insert("message".to_string(), message);
		if !flattened.is_empty() {
			error.insert("details".to_string(), Value::Object(flattened));
		}

		(status, Json(serde_json::json!({ "error": Value::Object(error) }))).into_response()
	}
}
