//! Axum HTTP server exposing the heatmap tile pipeline: the tile/viewport,
//! point, admin prewarm, and health endpoints (§6 External Interfaces).
//!
//! `lib.rs` owns only router composition and the cross-cutting protection
//! stack; `main` owns process lifecycle (config, pool, signal handling).

pub mod dto;
pub mod error_response;
pub mod handlers;
pub mod state;

use std::time::Duration;

use axum::error_handling::HandleErrorLayer;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{BoxError, Router};
use tower::ServiceBuilder;
use tower::buffer::BufferLayer;
use tower::limit::ConcurrencyLimitLayer;
use tower::load_shed::LoadShedLayer;
use tower::timeout::TimeoutLayer;
use tower_http::catch_panic::CatchPanicLayer;

pub use state::AppState;

/// Global backpressure layers applied outside request routing, from
/// innermost to outermost: `LoadShed -> ConcurrencyLimit -> Buffer ->
/// Timeout -> CatchPanic -> HandleError`. These protect the process from
/// overload independently of any single tile's per-request deadline.
const GLOBAL_CONCURRENCY: usize = 256;
const GLOBAL_BUFFER: usize = 512;

/// Builds the full application router: API routes plus the global
/// protection stack. `request_timeout` is the hard per-request wall-clock
/// cap (distinct from the Tile Builder's own per-tile deadline, which
/// bounds only the pipeline portion of a request).
#[must_use]
pub fn router(state: AppState, request_timeout: Duration) -> Router {
	let api = Router::new()
		.route("/api/heatmap-tile", post(handlers::heatmap_tile))
		.route("/api/heatmap-point", post(handlers::heatmap_point))
		.route("/api/admin/prewarm", post(handlers::admin_prewarm))
		.route("/healthz", get(handlers::healthz))
		.with_state(state);

	let overload_handler = HandleErrorLayer::new(|err: BoxError| async move {
		log::warn!("request rejected by protection layer: {err}");
		let mut response = (StatusCode::SERVICE_UNAVAILABLE, "heatmap server overloaded, try later").into_response();
		response.headers_mut().insert("Retry-After", "2".parse().unwrap());
		Ok::<_, std::convert::Infallible>(response)
	});

	let protection = ServiceBuilder::new()
		.layer(overload_handler)
		.layer(CatchPanicLayer::new())
		.layer(TimeoutLayer::new(request_timeout))
		.layer(BufferLayer::new(GLOBAL_BUFFER))
		.layer(ConcurrencyLimitLayer::new(GLOBAL_CONCURRENCY))
		.layer(LoadShedLayer::new());

	api.layer(protection)
}
