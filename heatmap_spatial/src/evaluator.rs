//! The parallel per-point evaluator (§4.4): distributes grid points across
//! a `rayon` thread pool slice once the grid is large enough to amortize
//! worker overhead, falling back to a full serial re-evaluation on any
//! worker panic so correctness beats throughput.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use heatmap_core::model::{Factor, ScoringParams};
use rayon::prelude::*;

use crate::index::SpatialIndex;
use crate::kernel::score_point;

/// Below this grid size the evaluator runs on the calling thread (§4.4): the
/// overhead of spawning a pool would dwarf the work itself.
pub const PARALLEL_THRESHOLD: usize = 10_000;

/// Work-item count per worker used to size the pool (§4.4: `ceil(N/3000)`).
const POINTS_PER_WORKER: usize = 3_000;

/// Chooses the worker count for `n` points: single-threaded below
/// [`PARALLEL_THRESHOLD`], otherwise `min(cpu_bound, ceil(n / 3000))`.
#[must_use]
pub fn worker_count_for(n: usize, cpu_bound: usize) -> usize {
	if n < PARALLEL_THRESHOLD {
		return 1;
	}
	cpu_bound.min(n.div_ceil(POINTS_PER_WORKER)).max(1)
}

/// Evaluates the kernel across every `(lat, lng)` in `points`, in the
/// caller's order — the orchestrator concatenates worker outputs in the
/// original slice order, so the result preserves row-major grid order
/// (§4.4 Result order, §5 Ordering guarantees).
///
/// `factors` and `indexes` are shared read-only across every worker; no
/// worker touches mutable state beyond its own point slice (§4.4, §5
/// Shared-resource policy). A worker panic falls back to a full serial
/// re-evaluation of the entire grid rather than just the failing slice
/// (§4.4 Failure: "correctness beats throughput").
#[must_use]
pub fn evaluate_grid(points: &[(f64, f64)], factors: &[Factor], indexes: &HashMap<String, SpatialIndex>, params: &ScoringParams, cpu_bound: usize) -> Vec<f64> {
	if points.len() < PARALLEL_THRESHOLD {
		return evaluate_serial(points, factors, indexes, params);
	}

	let workers = worker_count_for(points.len(), cpu_bound);
	let pool = rayon::ThreadPoolBuilder::new().num_threads(workers).panic_handler(|_| {}).build();

	let outcome = match pool {
		Ok(pool) => {
			let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
				pool.install(|| points.par_iter().map(|&(lat, lng)| score_point(lat, lng, factors, indexes, params)).collect::<Vec<_>>())
			}));
			attempt.ok()
		}
		Err(err) => {
			log::warn!("failed to build evaluator thread pool ({workers} workers): {err}; falling back to serial evaluation");
			None
		}
	};

	match outcome {
		Some(values) => values,
		None => {
			log::warn!("parallel evaluator worker failed; falling back to a full serial re-evaluation of {} points", points.len());
			evaluate_serial(points, factors, indexes, params)
		}
	}
}

fn evaluate_serial(points: &[(f64, f64)], factors: &[Factor], indexes: &HashMap<String, SpatialIndex>, params: &ScoringParams) -> Vec<f64> {
	points.iter().map(|&(lat, lng)| score_point(lat, lng, factors, indexes, params)).collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use heatmap_core::model::{DistanceCurve, Poi};
	use pretty_assertions::assert_eq;

	fn factor(id: &str, weight: i32) -> Factor {
		Factor { id: id.to_string(), weight, max_distance: 500.0, enabled: true, osm_tags: vec![] }
	}

	fn params() -> ScoringParams {
		ScoringParams { distance_curve: DistanceCurve::Linear, sensitivity: 1.0, lambda: 0.0, normalize_to_viewport: false }
	}

	#[test]
	fn worker_count_is_one_below_threshold() {
		assert_eq!(worker_count_for(9_999, 8), 1);
	}

	#[test]
	fn worker_count_scales_with_grid_size_above_threshold() {
		assert_eq!(worker_count_for(10_000, 8), 4);
		assert_eq!(worker_count_for(30_000, 8), 8);
		assert_eq!(worker_count_for(100_000, 4), 4);
	}

	#[test]
	fn small_grid_matches_serial_evaluation() {
		let factors = vec![factor("grocery", 100)];
		let mut indexes = HashMap::new();
		indexes.insert("grocery".to_string(), SpatialIndex::build(&[Poi { id: 1, factor_id: "grocery".into(), lat: 52.40, lng: 16.92, name: None }]));

		let points: Vec<(f64, f64)> = (0..50).map(|i| (52.40 + f64::from(i) * 0.0001, 16.92)).collect();
		let parallel_path = evaluate_grid(&points, &factors, &indexes, &params(), 4);
		let serial_path = evaluate_serial(&points, &factors, &indexes, &params());
		assert_eq!(parallel_path, serial_path);
	}

	#[test]
	fn large_grid_preserves_input_order() {
		let factors = vec![factor("grocery", 100)];
		let mut indexes = HashMap::new();
		indexes.insert("grocery".to_string(), SpatialIndex::build(&[Poi { id: 1, factor_id: "grocery".into(), lat: 52.40, lng: 16.92, name: None }]));

		// Above PARALLEL_THRESHOLD so the rayon path is exercised.
		let points: Vec<(f64, f64)> = (0..12_000).map(|i| (52.0 + f64::from(i) * 0.00001, 16.0 + f64::from(i) * 0.00001)).collect();
		let parallel_result = evaluate_grid(&points, &factors, &indexes, &params(), 4);
		let serial_result = evaluate_serial(&points, &factors, &indexes, &params());
		assert_eq!(parallel_result, serial_result, "parallel and serial evaluation must agree exactly for identical deterministic input");
	}
}
