//! Environment-driven process configuration, resolved once at startup and
//! validated eagerly so malformed deployments fail fast rather than at
//! first request.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::geometry::{HEATMAP_TILE_ZOOM, POI_TILE_ZOOM};

/// Process-wide configuration, built once in `main` and shared via `Arc`.
#[derive(Debug, Clone)]
pub struct AppConfig {
	/// POI store DSN.
	pub database_url: String,
	/// Optional shared L2 cache backend DSN.
	pub cache_url: Option<String>,
	/// Shared secret gating the admin prewarm endpoint.
	pub admin_secret: Option<String>,
	/// Parallel evaluator worker cap; defaults to `min(cpus, 8)`.
	pub max_workers: usize,
	pub poi_tile_zoom: u8,
	pub heatmap_tile_zoom: u8,
	pub bind_addr: SocketAddr,
	pub request_timeout: Duration,
}

impl AppConfig {
	/// Reads and validates configuration from the process environment.
	pub fn from_env() -> Result<Self> {
		let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
		let cache_url = env::var("CACHE_URL").ok();
		let admin_secret = env::var("ADMIN_SECRET").ok();

		let default_workers = num_cpus::get().min(8);
		let max_workers = parse_env_or("MAX_WORKERS", default_workers)?;
		let poi_tile_zoom = parse_env_or("POI_TILE_ZOOM", POI_TILE_ZOOM)?;
		let heatmap_tile_zoom = parse_env_or("HEATMAP_TILE_ZOOM", HEATMAP_TILE_ZOOM)?;

		let bind_addr_str = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
		let bind_addr: SocketAddr = bind_addr_str
			.parse()
			.with_context(|| format!("BIND_ADDR is not a valid socket address: {bind_addr_str}"))?;

		let request_timeout_ms: u64 = parse_env_or("REQUEST_TIMEOUT_MS", 30_000)?;

		Ok(Self {
			database_url,
			cache_url,
			admin_secret,
			max_workers: max_workers.max(1),
			poi_tile_zoom,
			heatmap_tile_zoom,
			bind_addr,
			request_timeout: Duration::from_millis(request_timeout_ms),
		})
	}
}

fn parse_env_or<T>(key: &str, default: T) -> Result<T>
where
	T: std::str::FromStr,
	T::Err: std::error::Error + Send + Sync + 'static,
{
	match env::var(key) {
		Ok(value) => value.parse::<T>().with_context(|| format!("{key} is not valid: {value}")),
		Err(_) => Ok(default),
	}
}
