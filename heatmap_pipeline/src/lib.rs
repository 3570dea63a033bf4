//! POI Store Adapter, Tile Builder, and Request Coordinator (§4.5-§4.7): the
//! pipeline that turns a viewport request into built, cached heatmap tiles.

pub mod cached_tile;
pub mod coordinator;
pub mod grid;
pub mod point_evaluator;
pub mod poi_store;
pub mod postgres_source;
pub mod tile_builder;

pub use cached_tile::build_tile_cached;
pub use coordinator::{BATCH_DELAY, BATCH_SIZE, CoordinatorTile, MAX_TOTAL_TILES, MAX_VIEWPORT_TILES, RequestCoordinator};
pub use grid::{Grid, build_grid, grid_size_for_zoom};
pub use point_evaluator::PointEvaluator;
pub use poi_store::{PoiSource, PoiStoreAdapter};
pub use postgres_source::PostgresPoiSource;
pub use tile_builder::{DEFAULT_TILE_DEADLINE, TileBuilder};
