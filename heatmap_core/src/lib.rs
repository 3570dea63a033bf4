//! Shared types, errors, configuration and cache primitives used across the
//! heatmap tile pipeline crates.

pub mod cache;
pub mod concurrency;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod geometry;
pub mod model;
pub mod validate;

pub use cache::{CacheStats, CacheStatsSnapshot, L2Cache, TileCache, TileCacheKey, TileCacheKind};
pub use concurrency::ConcurrencyLimits;
pub use config::AppConfig;
pub use error::HeatmapError;
pub use geometry::{Bounds, LatLng, Tile};
pub use model::{DistanceCurve, Factor, FactorBreakdown, HeatmapPoint, Poi, ScoringParams, TileResult};
pub use validate::{validate_factor, validate_factors, validate_scoring_params, validate_viewport, validate_zoom};
