//! Shared application state handed to every handler via axum's `State`
//! extractor (§3.1 `AppConfig`), built once in `main` and cloned cheaply via
//! `Arc`.

use std::sync::Arc;

use heatmap_core::{AppConfig, TileCache};
use heatmap_pipeline::{PointEvaluator, RequestCoordinator, TileBuilder};

/// Everything a request handler needs to resolve a tile, a point, or an
/// admin prewarm. Cheap to clone: every field is an `Arc`.
#[derive(Clone)]
pub struct AppState {
	pub cache: Arc<TileCache>,
	pub coordinator: Arc<RequestCoordinator>,
	pub builder: Arc<TileBuilder>,
	pub point_evaluator: Arc<PointEvaluator>,
	pub config: Arc<AppConfig>,
}
