//! The multi-tier tile cache (§4.6): an in-process `moka` LRU+TTL tier (L1)
//! in front of an optional externally-provided shared tier (L2), with
//! single-flight coalescing of concurrent misses on the same key.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::FutureExt;
use futures::future::Shared;
use moka::future::Cache;

use crate::error::HeatmapError;
use crate::model::TileResult;

/// Distinguishes the two tile pipelines that share this cache shape; part of
/// the cache key so a heatmap tile and a property tile at the same
/// `(z, x, y)` never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileCacheKind {
	Heatmap,
	Property,
}

/// `(kind, z, x, y, fingerprint)` — the full tile cache key (§4.6). The
/// fingerprint is produced by `heatmap_core::fingerprint` (heatmap) or by
/// the property pipeline's own filter-hash (out of this core's scope); both
/// arrive here as opaque bytes already canonicalized by the caller.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct TileCacheKey {
	pub kind: TileCacheKind,
	pub z: u8,
	pub x: u32,
	pub y: u32,
	pub fingerprint: Vec<u8>,
}

impl TileCacheKey {
	#[must_use]
	pub fn new(kind: TileCacheKind, z: u8, x: u32, y: u32, fingerprint: Vec<u8>) -> Self {
		Self { kind, z, x, y, fingerprint }
	}
}

/// The L2 contract the core consumes (§6): an opaque byte store. Failure of
/// either operation must degrade the core to L1-only, never surface to the
/// client — so both methods return `Option`/`()` rather than `Result`; the
/// implementation is responsible for swallowing and logging its own errors.
#[async_trait]
pub trait L2Cache: Send + Sync {
	async fn get(&self, key: &TileCacheKey) -> Option<Vec<u8>>;
	async fn set(&self, key: &TileCacheKey, bytes: Vec<u8>, ttl: Duration);
}

type BuildFuture = Shared<Pin<Box<dyn Future<Output = Result<Arc<TileResult>, HeatmapError>> + Send>>>;

/// Per-key hit/miss/fill counters and the in-flight gauge (§4.6
/// Observability). Snapshotted via [`TileCache::stats`].
#[derive(Debug, Default)]
pub struct CacheStats {
	l1_hits: AtomicU64,
	l2_hits: AtomicU64,
	misses: AtomicU64,
	single_flight_joins: AtomicU64,
	builds: AtomicU64,
}

/// A snapshot of [`CacheStats`], cheap to clone and serialize for the
/// `/healthz` response.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatsSnapshot {
	pub l1_hits: u64,
	pub l2_hits: u64,
	pub misses: u64,
	pub single_flight_joins: u64,
	pub builds: u64,
	pub in_flight: u64,
}

impl CacheStats {
	fn snapshot(&self, in_flight: u64) -> CacheStatsSnapshot {
		CacheStatsSnapshot {
			l1_hits: self.l1_hits.load(Ordering::Relaxed),
			l2_hits: self.l2_hits.load(Ordering::Relaxed),
			misses: self.misses.load(Ordering::Relaxed),
			single_flight_joins: self.single_flight_joins.load(Ordering::Relaxed),
			builds: self.builds.load(Ordering::Relaxed),
			in_flight,
		}
	}
}

/// The two-tier tile cache: `moka` L1 plus an optional `L2Cache` trait
/// object, with single-flight coalescing on miss.
pub struct TileCache {
	l1: Cache<TileCacheKey, Arc<TileResult>>,
	l2: Option<Arc<dyn L2Cache>>,
	in_flight: DashMap<TileCacheKey, BuildFuture>,
	stats: CacheStats,
}

impl Clone for TileCacheKey {
	fn clone(&self) -> Self {
		Self { kind: self.kind, z: self.z, x: self.x, y: self.y, fingerprint: self.fingerprint.clone() }
	}
}

impl TileCache {
	/// `max_entries`/`ttl` follow §4.6: 10,000 entries / 24h for heatmap,
	/// 1,000 entries / 12h for property tiles. `l2` is `None` to collapse to
	/// an L1-only cache, the default.
	#[must_use]
	pub fn new(max_entries: u64, ttl: Duration, l2: Option<Arc<dyn L2Cache>>) -> Self {
		let l1 = Cache::builder().max_capacity(max_entries).time_to_live(ttl).build();
		Self { l1, l2, in_flight: DashMap::new(), stats: CacheStats::default() }
	}

	#[must_use]
	pub fn stats(&self) -> CacheStatsSnapshot {
		self.stats.snapshot(self.in_flight.len() as u64)
	}

	/// Fetch `key`, building it with `builder` on a full miss. Concurrent
	/// misses on the same key coalesce onto a single build (§4.6, §8
	/// invariant 9): the builder runs exactly once and every waiter observes
	/// the same `Arc<TileResult>`.
	///
	/// `builder` is only invoked when neither L1 nor L2 has the key; L2 hits
	/// populate L1 on the way back (§4.6).
	pub async fn get_or_build<F, Fut>(&self, key: TileCacheKey, builder: F) -> Result<Arc<TileResult>, HeatmapError>
	where
		F: FnOnce() -> Fut + Send + 'static,
		Fut: Future<Output = Result<TileResult, HeatmapError>> + Send + 'static,
	{
		if let Some(hit) = self.l1.get(&key).await {
			self.stats.l1_hits.fetch_add(1, Ordering::Relaxed);
			log::debug!("tile cache l1 hit: {key:?}");
			return Ok(hit);
		}

		if let Some(l2) = &self.l2
			&& let Some(bytes) = l2.get(&key).await
			&& let Ok(result) = serde_json::from_slice::<TileResult>(&bytes)
		{
			self.stats.l2_hits.fetch_add(1, Ordering::Relaxed);
			log::debug!("tile cache l2 hit: {key:?}");
			let result = Arc::new(result);
			self.l1.insert(key.clone(), Arc::clone(&result)).await;
			return Ok(result);
		}

		self.stats.misses.fetch_add(1, Ordering::Relaxed);

		// Join an in-flight build if one already exists for this key.
		if let Some(existing) = self.in_flight.get(&key) {
			self.stats.single_flight_joins.fetch_add(1, Ordering::Relaxed);
			log::debug!("tile cache single-flight join: {key:?}");
			return existing.value().clone().await;
		}

		let fut: Pin<Box<dyn Future<Output = Result<Arc<TileResult>, HeatmapError>> + Send>> =
			Box::pin(async move { builder().await.map(Arc::new) });
		let shared = fut.shared();

		// Another task may have inserted between our `get` above and here;
		// `entry` makes the check-then-insert atomic for this key's shard.
		let shared = match self.in_flight.entry(key.clone()) {
			dashmap::mapref::entry::Entry::Occupied(existing) => {
				self.stats.single_flight_joins.fetch_add(1, Ordering::Relaxed);
				existing.get().clone()
			}
			dashmap::mapref::entry::Entry::Vacant(slot) => {
				slot.insert(shared.clone());
				shared
			}
		};

		self.stats.builds.fetch_add(1, Ordering::Relaxed);
		let result = shared.await;
		self.in_flight.remove(&key);

		if let Ok(result) = &result {
			self.l1.insert(key.clone(), Arc::clone(result)).await;
			if let Some(l2) = &self.l2
				&& let Ok(bytes) = serde_json::to_vec(result.as_ref())
			{
				l2.set(&key, bytes, Duration::from_secs(24 * 3600)).await;
			}
		}

		result
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::geometry::Tile;
	use std::sync::atomic::AtomicUsize;
	use std::time::Duration as StdDuration;

	fn key(seed: u8) -> TileCacheKey {
		TileCacheKey::new(TileCacheKind::Heatmap, 13, 100, u32::from(seed), vec![seed])
	}

	fn sample_result(tile: Tile) -> TileResult {
		TileResult {
			coords: tile,
			points: vec![],
			factor_weights: Default::default(),
			generated_at: 0,
			source_fingerprint: vec![],
		}
	}

	#[tokio::test]
	async fn a_miss_builds_and_a_second_call_hits_l1() {
		let cache = TileCache::new(100, StdDuration::from_secs(60), None);
		let k = key(1);
		let calls = Arc::new(AtomicUsize::new(0));

		let build = |calls: Arc<AtomicUsize>| {
			calls.fetch_add(1, Ordering::SeqCst);
			async move { Ok(sample_result(Tile::new(13, 100, 1))) }
		};

		cache.get_or_build(k.clone(), { let calls = Arc::clone(&calls); move || build(calls) }).await.unwrap();
		cache.get_or_build(k.clone(), { let calls = Arc::clone(&calls); move || build(calls) }).await.unwrap();

		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert_eq!(cache.stats().l1_hits, 1);
	}

	#[tokio::test]
	async fn concurrent_misses_on_the_same_key_coalesce_to_one_build() {
		let cache = Arc::new(TileCache::new(100, StdDuration::from_secs(60), None));
		let k = key(2);
		let calls = Arc::new(AtomicUsize::new(0));

		let mut handles = Vec::new();
		for _ in 0..16 {
			let cache = Arc::clone(&cache);
			let k = k.clone();
			let calls = Arc::clone(&calls);
			handles.push(tokio::spawn(async move {
				cache
					.get_or_build(k, move || async move {
						calls.fetch_add(1, Ordering::SeqCst);
						tokio::time::sleep(StdDuration::from_millis(10)).await;
						Ok(sample_result(Tile::new(13, 100, 2)))
					})
					.await
			}));
		}

		let mut results = Vec::new();
		for h in handles {
			results.push(h.await.unwrap().unwrap());
		}

		assert_eq!(calls.load(Ordering::SeqCst), 1, "builder should run exactly once");
		for r in &results {
			assert!(Arc::ptr_eq(r, &results[0]), "every waiter observes the same instance");
		}
	}

	#[tokio::test]
	async fn a_failed_build_is_not_cached_and_can_be_retried() {
		let cache = TileCache::new(100, StdDuration::from_secs(60), None);
		let k = key(3);

		let err = cache
			.get_or_build(k.clone(), || async { Err(HeatmapError::internal("boom")) })
			.await;
		assert!(err.is_err());

		let ok = cache.get_or_build(k, || async { Ok(sample_result(Tile::new(13, 100, 3))) }).await;
		assert!(ok.is_ok());
	}
}
