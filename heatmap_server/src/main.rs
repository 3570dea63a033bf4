//! Process entry point: parses configuration, builds the Postgres pool and
//! the pipeline components, and serves the HTTP API with graceful shutdown.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use heatmap_core::{AppConfig, ConcurrencyLimits, TileCache};
use heatmap_pipeline::{DEFAULT_TILE_DEADLINE, PoiStoreAdapter, PointEvaluator, PostgresPoiSource, RequestCoordinator, TileBuilder};
use heatmap_server::AppState;
use tokio_postgres::Config as PgConfig;

/// The heatmap tile-pipeline server. All configuration is read from the
/// environment (§6 Config); flags only control logging verbosity.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
	/// Increase log verbosity (-v = debug, -vv = trace).
	#[arg(short, long, action = clap::ArgAction::Count)]
	verbose: u8,
}

fn main() -> Result<()> {
	let cli = Cli::parse();

	let level = match cli.verbose {
		0 => log::LevelFilter::Info,
		1 => log::LevelFilter::Debug,
		_ => log::LevelFilter::Trace,
	};
	env_logger::Builder::new().filter_level(level).format_timestamp(None).init();

	tokio::runtime::Builder::new_multi_thread().enable_all().build()?.block_on(run())
}

async fn run() -> Result<()> {
	let config = AppConfig::from_env().context("loading configuration from the environment")?;
	log::info!("starting heatmap server on {}", config.bind_addr);

	let pool = build_pool(&config.database_url, config.max_workers.max(4)).context("building the Postgres connection pool")?;
	let poi_source = Arc::new(PostgresPoiSource::new(pool));
	let poi_store = Arc::new(PoiStoreAdapter::new(poi_source, config.poi_tile_zoom));

	let cpu_bound = ConcurrencyLimits::new(config.max_workers).cpu_bound;
	let builder = Arc::new(TileBuilder::new(Arc::clone(&poi_store), cpu_bound, DEFAULT_TILE_DEADLINE));
	let point_evaluator = Arc::new(PointEvaluator::new(poi_store, heatmap_pipeline::point_evaluator::DEFAULT_POINT_DEADLINE));

	let cache = Arc::new(TileCache::new(10_000, std::time::Duration::from_secs(24 * 3600), None));
	let coordinator = Arc::new(RequestCoordinator::new(Arc::clone(&cache), Arc::clone(&builder), config.heatmap_tile_zoom));

	let request_timeout = config.request_timeout;
	let bind_addr = config.bind_addr;
	let state = AppState { cache, coordinator, builder, point_evaluator, config: Arc::new(config) };

	let app = heatmap_server::router(state, request_timeout);

	let listener = tokio::net::TcpListener::bind(bind_addr).await.with_context(|| format!("binding {bind_addr}"))?;
	log::info!("listening on {bind_addr}");

	axum::serve(listener, app.into_make_service())
		.with_graceful_shutdown(shutdown_signal())
		.await
		.context("serving HTTP")?;

	log::info!("heatmap server shut down");
	Ok(())
}

/// Builds a `deadpool-postgres` pool from a `DATABASE_URL`-style DSN.
/// `Fast` recycling trusts connections returned to the pool rather than
/// re-validating them on every checkout, matching how the pipeline's own
/// short-lived per-tile queries are expected to behave under normal load.
fn build_pool(database_url: &str, max_size: usize) -> Result<Pool> {
	let pg_config = PgConfig::from_str(database_url).context("DATABASE_URL is not a valid Postgres connection string")?;
	let manager = Manager::from_config(pg_config, tokio_postgres::NoTls, ManagerConfig { recycling_method: RecyclingMethod::Fast });
	Pool::builder(manager).max_size(max_size).build().context("constructing the connection pool")
}

/// Waits for SIGINT (Ctrl-C) or, on unix, SIGTERM, so in-flight requests and
/// single-flight builds can drain before the process exits (§5 Cancellation
/// semantics: orphaned single-flight builds are allowed to run to
/// completion, but the listener stops accepting new connections).
async fn shutdown_signal() {
	let ctrl_c = async {
		tokio::signal::ctrl_c().await.expect("failed to install Ctrl-C handler");
	};

	#[cfg(unix)]
	let terminate = async {
		tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
			.expect("failed to install SIGTERM handler")
			.recv()
			.await;
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		() = ctrl_c => {},
		() = terminate => {},
	}
	log::info!("shutdown signal received");
}
