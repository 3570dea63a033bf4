//! Distance curves: monotone transforms of a normalized distance ratio
//! `r = min(d, maxDistance) / maxDistance ∈ [0, 1]` into a value contribution
//! in `[0, 1]` (§4.3).

use heatmap_core::model::DistanceCurve;

/// Sensitivity is always clamped to `[0.1, 10]` before shaping a curve; this
/// prevents divide-by-zero / overflow at the extremes (§4.3).
fn clamp_sensitivity(s: f64) -> f64 {
	s.clamp(0.1, 10.0)
}

/// Applies `curve` to ratio `r` (expected already clamped to `[0, 1]` by the
/// caller) with sensitivity `s`. Every curve satisfies `C(0, s) = 0`,
/// `C(1, s) = 1`, and is non-decreasing in `r` (§8 invariant 5).
#[must_use]
pub fn apply_curve(curve: DistanceCurve, r: f64, s: f64) -> f64 {
	let s = clamp_sensitivity(s);
	match curve {
		DistanceCurve::Linear => r,
		DistanceCurve::Log => {
			let b = 1.0 + (std::f64::consts::E - 1.0) * s;
			(1.0 + r * (b - 1.0)).ln() / b.ln()
		}
		DistanceCurve::Exp => {
			let k = 3.0 * s;
			1.0 - (-k * r).exp()
		}
		DistanceCurve::Power => {
			let n = 0.5 / s;
			r.powf(n)
		}
	}
}
