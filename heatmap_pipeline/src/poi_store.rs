//! The POI Store Adapter (§6 "POI Store contract (consumed)"): fetches POIs
//! for a factor intersecting a bounds, coalescing concurrent overlapping
//! calls and caching at POI-tile-aligned boundaries with a 24h TTL.
//!
//! The database is the source of truth (§6 persistent state layout,
//! `osm_pois`); this adapter never writes to it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::FutureExt;
use futures::future::Shared;
use heatmap_core::error::HeatmapError;
use heatmap_core::geometry::{Bounds, Tile, bounds_to_tiles, tile_to_bounds};
use heatmap_core::model::{Factor, Poi};
use heatmap_derive::context;
use moka::future::Cache;
use std::future::Future;
use std::pin::Pin;

/// TTL a POI tile stays cached once fetched (§3 Lifecycles: "24 h or until
/// evicted").
const POI_CACHE_TTL: Duration = Duration::from_secs(24 * 3600);

/// The raw data-access contract: given a factor and a bounds, return the
/// POIs the database holds for it. Implementations speak to the real
/// datastore; the adapter above this trait owns caching and coalescing so
/// every implementation gets those for free.
#[async_trait]
pub trait PoiSource: Send + Sync {
	async fn fetch_pois(&self, factor: &Factor, bounds: Bounds) -> anyhow::Result<Vec<Poi>>;
}

type PoiFetchFuture = Shared<Pin<Box<dyn Future<Output = Result<Arc<Vec<Poi>>, HeatmapError>> + Send>>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PoiCacheKey {
	factor_id: String,
	tile: Tile,
}

/// Wraps a [`PoiSource`] with tile-aligned caching and single-flight
/// coalescing (§6: "the adapter is responsible for (a) deduplicating
/// concurrent overlapping calls, (b) caching at tile-aligned boundaries
/// with the documented TTL").
pub struct PoiStoreAdapter {
	source: Arc<dyn PoiSource>,
	poi_tile_zoom: u8,
	cache: Cache<PoiCacheKey, Arc<Vec<Poi>>>,
	in_flight: DashMap<PoiCacheKey, PoiFetchFuture>,
}

impl PoiStoreAdapter {
	#[must_use]
	pub fn new(source: Arc<dyn PoiSource>, poi_tile_zoom: u8) -> Self {
		Self {
			source,
			poi_tile_zoom,
			cache: Cache::builder().max_capacity(50_000).time_to_live(POI_CACHE_TTL).build(),
			in_flight: DashMap::new(),
		}
	}

	/// Returns every POI of `factor` intersecting `bounds`. Internally this
	/// covers `bounds` with POI-tile-zoom tiles and fetches/caches each tile
	/// independently, so overlapping requests across tiles reuse work
	/// (§3 Lifecycles, §6).
	#[context("fetching POIs for factor '{}'", factor.id)]
	pub async fn fetch_for_bounds(&self, factor: &Factor, bounds: Bounds) -> anyhow::Result<Vec<Poi>> {
		let tiles = bounds_to_tiles(bounds, self.poi_tile_zoom);
		let mut pois = Vec::new();
		for tile in tiles {
			let tile_pois = self.fetch_tile(factor, tile).await.map_err(|err| anyhow::anyhow!(err))?;
			pois.extend(tile_pois.iter().cloned());
		}
		Ok(pois)
	}

	async fn fetch_tile(&self, factor: &Factor, tile: Tile) -> Result<Arc<Vec<Poi>>, HeatmapError> {
		let key = PoiCacheKey { factor_id: factor.id.clone(), tile };

		if let Some(hit) = self.cache.get(&key).await {
			return Ok(hit);
		}

		if let Some(existing) = self.in_flight.get(&key) {
			log::debug!("poi store single-flight join: factor='{}' tile={tile:?}", factor.id);
			return existing.value().clone().await;
		}

		let source = Arc::clone(&self.source);
		let factor = factor.clone();
		let tile_bounds = tile_to_bounds(tile);
		let fut: Pin<Box<dyn Future<Output = Result<Arc<Vec<Poi>>, HeatmapError>> + Send>> = Box::pin(async move {
			source
				.fetch_pois(&factor, tile_bounds)
				.await
				.map(Arc::new)
				.map_err(|err| HeatmapError::StoreUnavailable { message: err.to_string() })
		});
		let shared = fut.shared();

		let shared = match self.in_flight.entry(key.clone()) {
			dashmap::mapref::entry::Entry::Occupied(existing) => existing.get().clone(),
			dashmap::mapref::entry::Entry::Vacant(slot) => {
				slot.insert(shared.clone());
				shared
			}
		};

		let result = shared.await;
		self.in_flight.remove(&key);

		if let Ok(pois) = &result {
			self.cache.insert(key, Arc::clone(pois)).await;
		}

		result
	}
}

#[cfg(test)]
pub mod test_support {
	//! An in-memory [`PoiSource`] for pipeline tests; never reachable from
	//! production code.
	use super::{Bounds, Factor, Poi, PoiSource};
	use async_trait::async_trait;
	use std::sync::Arc;
	use std::sync::atomic::{AtomicUsize, Ordering};

	pub struct InMemoryPoiSource {
		pois: Vec<Poi>,
		pub fetch_count: Arc<AtomicUsize>,
	}

	impl InMemoryPoiSource {
		#[must_use]
		pub fn new(pois: Vec<Poi>) -> Self {
			Self { pois, fetch_count: Arc::new(AtomicUsize::new(0)) }
		}
	}

	#[async_trait]
	impl PoiSource for InMemoryPoiSource {
		async fn fetch_pois(&self, factor: &Factor, bounds: Bounds) -> anyhow::Result<Vec<Poi>> {
			self.fetch_count.fetch_add(1, Ordering::SeqCst);
			Ok(self
				.pois
				.iter()
				.filter(|p| p.factor_id == factor.id && p.lat <= bounds.north && p.lat >= bounds.south && p.lng <= bounds.east && p.lng >= bounds.west)
				.cloned()
				.collect())
		}
	}
}

#[cfg(test)]
mod tests {
	use super::test_support::InMemoryPoiSource;
	use super::*;
	use std::sync::atomic::Ordering;

	fn factor(id: &str) -> Factor {
		Factor { id: id.to_string(), weight: 100, max_distance: 500.0, enabled: true, osm_tags: vec![] }
	}

	#[tokio::test]
	async fn fetching_the_same_bounds_twice_only_hits_the_source_once_per_tile() {
		let source = Arc::new(InMemoryPoiSource::new(vec![Poi { id: 1, factor_id: "grocery".into(), lat: 52.40, lng: 16.92, name: None }]));
		let adapter = PoiStoreAdapter::new(source.clone(), 13);

		let bounds = Bounds::new(52.41, 52.39, 16.93, 16.91);
		let first = adapter.fetch_for_bounds(&factor("grocery"), bounds).await.unwrap();
		let second = adapter.fetch_for_bounds(&factor("grocery"), bounds).await.unwrap();

		assert_eq!(first.len(), 1);
		assert_eq!(second.len(), 1);
		assert_eq!(source.fetch_count.load(Ordering::SeqCst), 1, "second fetch should be served from cache");
	}

	#[tokio::test]
	async fn concurrent_overlapping_fetches_coalesce() {
		let source = Arc::new(InMemoryPoiSource::new(vec![Poi { id: 1, factor_id: "grocery".into(), lat: 52.40, lng: 16.92, name: None }]));
		let adapter = Arc::new(PoiStoreAdapter::new(source.clone(), 13));
		let bounds = Bounds::new(52.41, 52.39, 16.93, 16.91);

		let mut handles = Vec::new();
		for _ in 0..8 {
			let adapter = Arc::clone(&adapter);
			let bounds = bounds;
			handles.push(tokio::spawn(async move { adapter.fetch_for_bounds(&factor("grocery"), bounds).await.unwrap() }));
		}
		for h in handles {
			h.await.unwrap();
		}

		assert_eq!(source.fetch_count.load(Ordering::SeqCst), 1);
	}
}
