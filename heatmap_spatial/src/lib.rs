//! Haversine geometry, the uniform-grid spatial index, the weighted scoring
//! kernel (§4.3), and the parallel per-point evaluator (§4.4).
//!
//! This crate is the "shared module linked into every worker" the design
//! notes call for (§9): there is exactly one copy of `haversine`, the
//! curves, the density bonus and `SpatialIndex` in the repository, and
//! `evaluator::evaluate` borrows it from a `rayon` scope rather than
//! re-declaring it per worker.

pub mod curve;
pub mod density;
pub mod evaluator;
pub mod haversine;
pub mod index;
pub mod kernel;

pub use curve::apply_curve;
pub use evaluator::evaluate_grid;
pub use haversine::haversine_distance_m;
pub use index::SpatialIndex;
pub use kernel::{factor_breakdown, score_point};
