//! A [`PoiSource`] backed by `osm_pois` via `deadpool-postgres` (§6
//! "POI Store (Postgres impl)"). The database is the single source of truth
//! for POIs; there is no fallback store (§9 Open Question, resolved).

use async_trait::async_trait;
use deadpool_postgres::Pool;
use heatmap_core::geometry::Bounds;
use heatmap_core::model::{Factor, Poi};

use crate::poi_store::PoiSource;

/// `osm_pois(id, factor_id, lat, lng, geom, name, tags)`, compound primary
/// key `(id, factor_id)` (§6 Persistent state layout). `geom` carries a GIST
/// index; this source filters on `lat`/`lng` directly rather than issuing a
/// PostGIS `&&` bbox operator, since the schema's `factor_id` column already
/// lets a plain btree-assisted range scan do the work at this scale.
pub struct PostgresPoiSource {
	pool: Pool,
}

impl PostgresPoiSource {
	#[must_use]
	pub fn new(pool: Pool) -> Self {
		Self { pool }
	}
}

#[async_trait]
impl PoiSource for PostgresPoiSource {
	async fn fetch_pois(&self, factor: &Factor, bounds: Bounds) -> anyhow::Result<Vec<Poi>> {
		let conn = self.pool.get().await?;
		let rows = conn
			.query(
				"SELECT id, factor_id, lat, lng, name FROM osm_pois \
				 WHERE factor_id = $1 AND lat BETWEEN $2 AND $3 AND lng BETWEEN $4 AND $5",
				&[&factor.id, &bounds.south, &bounds.north, &bounds.west, &bounds.east],
			)
			.await?;

		Ok(rows
			.into_iter()
			.map(|row| Poi {
				id: row.get("id"),
				factor_id: row.get("factor_id"),
				lat: row.get("lat"),
				lng: row.get("lng"),
				name: row.get("name"),
			})
			.collect())
	}
}
