//! Stable SHA-256 fingerprints of a tile's scoring configuration, used as
//! the volatile part of the tile cache key (§4.6).

use sha2::{Digest, Sha256};

use crate::model::{Factor, ScoringParams};

/// Hashes the enabled/weighted factor set plus scoring params and grid size
/// into a stable fingerprint. Invariant under permutation of `factors`
/// (§8 invariant 8): factors are sorted by id before hashing.
#[must_use]
pub fn heatmap_fingerprint(factors: &[Factor], params: &ScoringParams, grid_size: f64) -> Vec<u8> {
	let mut relevant: Vec<&Factor> = factors.iter().filter(|f| f.contributes()).collect();
	relevant.sort_by(|a, b| a.id.cmp(&b.id));

	let mut hasher = Sha256::new();
	for factor in relevant {
		hasher.update(factor.id.as_bytes());
		hasher.update(factor.weight.to_le_bytes());
		hasher.update(factor.max_distance.to_le_bytes());
	}
	hasher.update([params.distance_curve as u8]);
	hasher.update(params.sensitivity.to_le_bytes());
	hasher.update(params.lambda.to_le_bytes());
	hasher.update([u8::from(params.normalize_to_viewport)]);
	hasher.update(grid_size.to_le_bytes());

	hasher.finalize().to_vec()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::DistanceCurve;

	fn factor(id: &str, weight: i32) -> Factor {
		Factor {
			id: id.to_string(),
			weight,
			max_distance: 500.0,
			enabled: true,
			osm_tags: vec![],
		}
	}

	fn params() -> ScoringParams {
		ScoringParams {
			distance_curve: DistanceCurve::Linear,
			sensitivity: 1.0,
			lambda: 0.0,
			normalize_to_viewport: false,
		}
	}

	#[test]
	fn fingerprint_is_stable_under_factor_permutation() {
		let a = vec![factor("grocery", 100), factor("transit", 50)];
		let b = vec![factor("transit", 50), factor("grocery", 100)];
		assert_eq!(heatmap_fingerprint(&a, &params(), 200.0), heatmap_fingerprint(&b, &params(), 200.0));
	}

	#[test]
	fn disabled_factors_do_not_affect_the_fingerprint() {
		let mut with_disabled = vec![factor("grocery", 100)];
		with_disabled.push(Factor { enabled: false, ..factor("ignored", 10) });
		let without = vec![factor("grocery", 100)];
		assert_eq!(
			heatmap_fingerprint(&with_disabled, &params(), 200.0),
			heatmap_fingerprint(&without, &params(), 200.0)
		);
	}

	#[test]
	fn different_params_change_the_fingerprint() {
		let factors = vec![factor("grocery", 100)];
		let mut other = params();
		other.lambda = 1.0;
		assert_ne!(heatmap_fingerprint(&factors, &params(), 200.0), heatmap_fingerprint(&factors, &other, 200.0));
	}
}
