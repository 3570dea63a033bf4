//! Great-circle distance on a spherical earth. The single copy of this
//! function in the repository (§9 Design Notes: worker-side duplication is
//! resolved by sharing this crate rather than re-declaring it per worker).

use heatmap_core::geometry::EARTH_RADIUS_M;
use heatmap_core::model::Poi;

/// Haversine distance in meters between two lat/lng points (degrees).
#[must_use]
pub fn haversine_distance_m(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
	let (lat1, lng1, lat2, lng2) = (lat1.to_radians(), lng1.to_radians(), lat2.to_radians(), lng2.to_radians());
	let dlat = lat2 - lat1;
	let dlng = lng2 - lng1;
	let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
	let c = 2.0 * a.sqrt().asin();
	EARTH_RADIUS_M * c
}

/// Distance in meters from `(lat, lng)` to a POI.
#[must_use]
pub fn haversine_to_poi(lat: f64, lng: f64, poi: &Poi) -> f64 {
	haversine_distance_m(lat, lng, poi.lat, poi.lng)
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	#[test]
	fn same_point_is_zero_distance() {
		assert_eq!(haversine_distance_m(52.4, 16.92, 52.4, 16.92), 0.0);
	}

	#[test]
	fn one_degree_of_latitude_is_about_111_km() {
		let d = haversine_distance_m(52.0, 16.0, 53.0, 16.0);
		assert!((d - 111_195.0).abs() < 500.0, "got {d}");
	}

	#[test]
	fn distance_is_symmetric() {
		let a = haversine_distance_m(52.40, 16.92, 52.41, 16.95);
		let b = haversine_distance_m(52.41, 16.95, 52.40, 16.92);
		assert!((a - b).abs() < 1e-9);
	}
}
