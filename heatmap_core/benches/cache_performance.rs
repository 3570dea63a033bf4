//! Benchmarks the tiered tile cache's hit/miss/single-flight paths,
//! mirroring the teacher's own `cache_performance` bench
//! (`versatiles_core/benches/cache_performance.rs`): a `moka`-backed cache
//! compared against a naive mutex-guarded `HashMap` under concurrent load.

use std::collections::HashMap;
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use heatmap_core::cache::{TileCache, TileCacheKey, TileCacheKind};
use heatmap_core::error::HeatmapError;
use heatmap_core::geometry::Tile;
use heatmap_core::model::TileResult;
use tokio::runtime::Runtime;
use tokio::sync::Mutex as AsyncMutex;

fn key(i: u32) -> TileCacheKey {
	TileCacheKey::new(TileCacheKind::Heatmap, 13, i, i, i.to_le_bytes().to_vec())
}

fn sample_result(i: u32) -> TileResult {
	TileResult {
		coords: Tile::new(13, i, i),
		points: Vec::new(),
		factor_weights: HashMap::new(),
		generated_at: 0,
		source_fingerprint: Vec::new(),
	}
}

/// A naive mutex-guarded `HashMap`, standing in for "no tiered cache at
/// all" so the `moka` path's concurrent-read advantage is visible.
struct MutexCache {
	inner: Arc<AsyncMutex<HashMap<Vec<u8>, Arc<TileResult>>>>,
}

impl MutexCache {
	fn new() -> Self {
		Self { inner: Arc::new(AsyncMutex::new(HashMap::new())) }
	}

	async fn get_or_build(&self, key: Vec<u8>, result: TileResult) -> Arc<TileResult> {
		let mut guard = self.inner.lock().await;
		guard.entry(key).or_insert_with(|| Arc::new(result)).clone()
	}
}

fn bench_l1_hit_path(c: &mut Criterion) {
	let rt = Runtime::new().unwrap();
	let mut group = c.benchmark_group("tile_cache_l1_hit");
	group.throughput(Throughput::Elements(1));

	let cache = rt.block_on(async {
		let cache = TileCache::new(10_000, Duration::from_secs(3600), None);
		cache.get_or_build(key(1), || async { Ok(sample_result(1)) }).await.unwrap();
		cache
	});

	group.bench_function("moka_l1_hit", |b| {
		b.to_async(&rt).iter(|| async { black_box(cache.get_or_build(key(1), || async { Ok(sample_result(1)) }).await.unwrap()) });
	});

	let mutex_cache = MutexCache::new();
	rt.block_on(mutex_cache.get_or_build(vec![1], sample_result(1)));
	group.bench_function("mutex_hashmap_hit", |b| {
		b.to_async(&rt).iter(|| async { black_box(mutex_cache.get_or_build(vec![1], sample_result(1)).await) });
	});

	group.finish();
}

fn bench_concurrent_single_flight(c: &mut Criterion) {
	let rt = Runtime::new().unwrap();
	let mut group = c.benchmark_group("tile_cache_single_flight");
	group.throughput(Throughput::Elements(16));

	group.bench_function("moka_coalesced_miss", |b| {
		b.to_async(&rt).iter(|| async {
			let cache = Arc::new(TileCache::new(1_000, Duration::from_secs(60), None));
			let mut handles = Vec::new();
			for _ in 0..16 {
				let cache = Arc::clone(&cache);
				handles.push(tokio::spawn(async move {
					cache.get_or_build(key(2), || async { Ok::<_, HeatmapError>(sample_result(2)) }).await.unwrap()
				}));
			}
			for h in handles {
				black_box(h.await.unwrap());
			}
		});
	});

	group.finish();
}

criterion_group!(benches, bench_l1_hit_path, bench_concurrent_single_flight);
criterion_main!(benches);
