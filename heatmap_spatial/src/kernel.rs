//! The scoring kernel (§4.3): per-factor value computation and the
//! weighted power-mean aggregation that produces the final `K ∈ [0, 1]`.
//!
//! The kernel never fails: invalid weights are treated as zero and the only
//! caller contract is that lat/lng/params are finite (NaN from the caller
//! is a programming error handled by the Tile Builder's input validation,
//! not here — §4.3 Errors).

use std::collections::HashMap;

use heatmap_core::model::{Factor, FactorBreakdown, ScoringParams};

use crate::curve::apply_curve;
use crate::density::density_bonus;
use crate::index::SpatialIndex;

/// Floor applied before raising a per-factor value to its exponent, so that
/// `0^p` for `p < 1` never produces a singularity (§4.3, §9 Design Notes).
const VALUE_FLOOR: f64 = 1e-10;

struct PerFactor {
	weight: i32,
	value: f64,
	exponent: f64,
	distance: f64,
	nearby_count: u32,
}

/// Computes one factor's `{distance, value, nearby_count}` against the
/// point `(lat, lng)`. Returns `None` if the factor doesn't contribute
/// (disabled or zero weight) — callers filter these out before folding, not
/// after, so their absence never perturbs the accumulation order (§4.3,
/// §8 invariant 3).
fn evaluate_factor(factor: &Factor, index: Option<&SpatialIndex>, lat: f64, lng: f64, params: &ScoringParams) -> Option<PerFactor> {
	if !factor.contributes() {
		return None;
	}

	let is_negative = factor.is_negative();
	let (value, distance, nearby_count) = match index.filter(|idx| !idx.is_empty()) {
		None => {
			// Absence of any POI: good for negative factors, bad for positive.
			let value = if is_negative { 0.0 } else { 1.0 };
			(value, f64::INFINITY, 0)
		}
		Some(index) => {
			let d = index.nearest_distance(lat, lng, factor.max_distance);
			let capped_d = d.min(factor.max_distance);
			let ratio = (capped_d / factor.max_distance).clamp(0.0, 1.0);
			let normalized = apply_curve(params.distance_curve, ratio, params.sensitivity);

			if is_negative {
				(1.0 - normalized, d, 0)
			} else {
				let search_radius = 0.5 * factor.max_distance;
				let count = index.count_within_radius(lat, lng, search_radius);
				let bonus = density_bonus(count);
				((normalized - bonus).max(0.0), d, count)
			}
		}
	};

	let exponent = 1.0 + params.lambda * (f64::from(factor.weight) / 100.0).powi(2);

	Some(PerFactor { weight: factor.weight, value, exponent, distance, nearby_count })
}

/// The weighted power-mean aggregation (§4.3): folds `(weight, value,
/// exponent)` triples, in the caller-supplied order, into the final `K`.
fn aggregate(contributions: impl Iterator<Item = (f64, f64, f64)>) -> f64 {
	let mut power_sum = 0.0;
	let mut total_weight = 0.0;
	let mut weighted_exp_sum = 0.0;

	for (weight, value, exponent) in contributions {
		power_sum += weight * value.max(VALUE_FLOOR).powf(exponent);
		total_weight += weight;
		weighted_exp_sum += weight * exponent;
	}

	if total_weight == 0.0 {
		return 0.5;
	}

	let mean_exponent = weighted_exp_sum / total_weight;
	let k = (power_sum / total_weight).powf(1.0 / mean_exponent);
	k.clamp(0.0, 1.0)
}

/// Scores one grid point against `factors` (in caller order) using the
/// per-factor `indexes` map. Returns the aggregate `K ∈ [0, 1]`.
#[must_use]
pub fn score_point(lat: f64, lng: f64, factors: &[Factor], indexes: &HashMap<String, SpatialIndex>, params: &ScoringParams) -> f64 {
	let contributions = factors
		.iter()
		.filter_map(|factor| evaluate_factor(factor, indexes.get(&factor.id), lat, lng, params))
		.map(|pf| (f64::from(pf.weight.abs()), pf.value, pf.exponent));

	aggregate(contributions)
}

/// Full per-factor breakdown for popups (§4.3, §6 `/api/heatmap-point`),
/// sorted by descending `|contribution|`. Not tile-cached.
#[must_use]
pub fn factor_breakdown(lat: f64, lng: f64, factors: &[Factor], indexes: &HashMap<String, SpatialIndex>, params: &ScoringParams) -> (Vec<FactorBreakdown>, f64) {
	let mut rows: Vec<(FactorBreakdown, f64, f64, f64)> = Vec::new();

	for factor in factors {
		let Some(pf) = evaluate_factor(factor, indexes.get(&factor.id), lat, lng, params) else {
			continue;
		};
		let weight = f64::from(pf.weight.abs());
		let contribution = weight * pf.value.max(VALUE_FLOOR).powf(pf.exponent);
		rows.push((
			FactorBreakdown {
				factor_id: factor.id.clone(),
				weight: factor.weight,
				distance: pf.distance,
				max_distance: factor.max_distance,
				score: pf.value,
				is_negative: factor.is_negative(),
				contribution,
				effective_exponent: pf.exponent,
				no_pois: pf.distance.is_infinite(),
				nearby_count: pf.nearby_count,
			},
			weight,
			pf.value,
			pf.exponent,
		));
	}

	let k = aggregate(rows.iter().map(|(_, w, v, e)| (*w, *v, *e)));

	let mut breakdowns: Vec<FactorBreakdown> = rows.into_iter().map(|(b, ..)| b).collect();
	breakdowns.sort_by(|a, b| b.contribution.abs().partial_cmp(&a.contribution.abs()).unwrap_or(std::cmp::Ordering::Equal));

	(breakdowns, k)
}

/// Linearly rescales `values` so `min -> 0, max -> 1`; a no-op when
/// `max == min` (§4.3 Normalization).
pub fn normalize_to_viewport(values: &mut [f64]) {
	let Some(&min) = values.iter().min_by(|a, b| a.partial_cmp(b).unwrap()) else { return };
	let Some(&max) = values.iter().max_by(|a, b| a.partial_cmp(b).unwrap()) else { return };
	if (max - min).abs() < f64::EPSILON {
		return;
	}
	for v in values.iter_mut() {
		*v = (*v - min) / (max - min);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use heatmap_core::model::{DistanceCurve, Poi};
	use pretty_assertions::assert_eq;

	fn factor(id: &str, weight: i32, max_distance: f64) -> Factor {
		Factor { id: id.to_string(), weight, max_distance, enabled: true, osm_tags: vec![] }
	}

	fn linear_params(lambda: f64) -> ScoringParams {
		ScoringParams { distance_curve: DistanceCurve::Linear, sensitivity: 1.0, lambda, normalize_to_viewport: false }
	}

	fn indexes_with(id: &str, pois: Vec<Poi>) -> HashMap<String, SpatialIndex> {
		let mut m = HashMap::new();
		m.insert(id.to_string(), SpatialIndex::build(&pois));
		m
	}

	#[test]
	fn s1_single_factor_arithmetic() {
		let factors = vec![factor("grocery", 100, 500.0)];
		let pois = vec![Poi { id: 1, factor_id: "grocery".into(), lat: 52.40, lng: 16.92, name: None }];
		let indexes = indexes_with("grocery", pois);
		let params = linear_params(0.0);

		let k_at_poi = score_point(52.40, 16.92, &factors, &indexes, &params);
		assert!(k_at_poi < 1e-6, "expected ~0 at the POI, got {k_at_poi}");

		// ~500m away -> normalizedDistance = 1 -> K = 1
		let k_far = score_point(52.400, 16.9275, &factors, &indexes, &params);
		assert!((k_far - 1.0).abs() < 0.05, "expected ~1 at max distance, got {k_far}");
	}

	#[test]
	fn s2_sign_symmetry() {
		let factors = vec![factor("highways", -50, 1000.0)];
		let pois = vec![Poi { id: 1, factor_id: "highways".into(), lat: 52.40, lng: 16.92, name: None }];
		let indexes = indexes_with("highways", pois);
		let params = linear_params(0.0);

		let k_at_poi = score_point(52.40, 16.92, &factors, &indexes, &params);
		assert!((k_at_poi - 1.0).abs() < 1e-6, "at the POI the negative factor should be worst, got {k_at_poi}");
	}

	#[test]
	fn s3_density_bonus() {
		// 4 POIs within 100m, one exactly 50m from the query point.
		let base_lat = 52.40;
		let base_lng = 16.92;
		let pois = vec![
			Poi { id: 1, factor_id: "park".into(), lat: base_lat + 0.00045, lng: base_lng, name: None }, // ~50m north
			Poi { id: 2, factor_id: "park".into(), lat: base_lat - 0.0007, lng: base_lng, name: None },
			Poi { id: 3, factor_id: "park".into(), lat: base_lat, lng: base_lng + 0.0007, name: None },
			Poi { id: 4, factor_id: "park".into(), lat: base_lat, lng: base_lng - 0.0007, name: None },
		];
		let factors = vec![factor("park", 100, 500.0)];
		let indexes = indexes_with("park", pois);
		let params = linear_params(0.0);

		let (breakdown, k) = factor_breakdown(base_lat, base_lng, &factors, &indexes, &params);
		assert_eq!(breakdown.len(), 1);
		assert!(breakdown[0].nearby_count >= 4);
		assert!(k < 0.1, "expected a small K after the density bonus, got {k}");
	}

	#[test]
	fn s4_power_mean_with_lambda_one() {
		// Two synthetic factors with known pre-computed values (not POI-driven):
		// A: weight 100, value 0.1; B: weight 10, value 0.9.
		let k = aggregate(
			[(100.0, 0.1, 1.0 + 1.0 * 1.0_f64.powi(2)), (10.0, 0.9, 1.0 + 1.0 * 0.1_f64.powi(2))].into_iter(),
		);
		assert!((k - 0.275).abs() < 0.01, "got {k}");
	}

	#[test]
	fn s5_viewport_normalization() {
		let mut values = [0.30, 0.35, 0.40, 0.45];
		normalize_to_viewport(&mut values);
		let expected = [0.0, 1.0 / 3.0, 2.0 / 3.0, 1.0];
		for (a, b) in values.iter().zip(expected) {
			assert!((a - b).abs() < 1e-9, "{values:?} != {expected:?}");
		}
	}

	#[test]
	fn normalization_is_a_no_op_when_flat() {
		let mut values = [0.5, 0.5, 0.5];
		normalize_to_viewport(&mut values);
		assert_eq!(values, [0.5, 0.5, 0.5]);
	}

	#[test]
	fn lambda_zero_reduces_to_the_weighted_arithmetic_mean() {
		let factors = vec![factor("a", 100, 500.0), factor("b", -50, 500.0)];
		let mut indexes = HashMap::new();
		indexes.insert("a".to_string(), SpatialIndex::build(&[]));
		indexes.insert("b".to_string(), SpatialIndex::build(&[]));
		let params = linear_params(0.0);

		// No POIs: a (positive) absent -> value 1; b (negative) absent -> value 0.
		let k = score_point(52.4, 16.9, &factors, &indexes, &params);
		let expected_mean = (100.0 * 1.0 + 50.0 * 0.0) / 150.0;
		assert!((k - expected_mean).abs() < 1e-9, "k={k} expected={expected_mean}");
	}

	#[test]
	fn disabled_and_zero_weight_factors_do_not_change_k() {
		let pois = vec![Poi { id: 1, factor_id: "a".into(), lat: 52.40, lng: 16.92, name: None }];
		let with_noise = vec![
			factor("a", 100, 500.0),
			Factor { enabled: false, ..factor("b", 80, 500.0) },
			factor("c", 0, 500.0),
		];
		let without_noise = vec![factor("a", 100, 500.0)];
		let indexes = indexes_with("a", pois);
		let params = linear_params(0.3);

		let k1 = score_point(52.401, 16.921, &with_noise, &indexes, &params);
		let k2 = score_point(52.401, 16.921, &without_noise, &indexes, &params);
		assert_eq!(k1, k2);
	}

	#[test]
	fn polarity_flip_maps_value_to_one_minus_value() {
		let pois = vec![Poi { id: 1, factor_id: "x".into(), lat: 52.40, lng: 16.92, name: None }];
		let indexes = indexes_with("x", pois);
		let params = linear_params(0.0);

		let positive = vec![factor("x", 60, 500.0)];
		let negative = vec![factor("x", -60, 500.0)];
		let (pos_breakdown, _) = factor_breakdown(52.401, 16.921, &positive, &indexes, &params);
		let (neg_breakdown, _) = factor_breakdown(52.401, 16.921, &negative, &indexes, &params);

		assert!((pos_breakdown[0].score + neg_breakdown[0].score - 1.0).abs() < 1e-9);
	}
}
