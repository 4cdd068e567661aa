//! Platform-wide counters for the admin dashboard.

use surrealdb::{Connection, Surreal};
use vellum_core::error::VellumResult;
use vellum_core::repository::{PlatformStats, StatsRepository};

use crate::error::DbError;
use crate::rows::{CountRow, total_of};

#[derive(Clone)]
pub struct SurrealStatsRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealStatsRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> StatsRepository for SurrealStatsRepository<C> {
    async fn platform_stats(&self) -> VellumResult<PlatformStats> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM tenant GROUP ALL; \
                 SELECT count() AS total FROM user GROUP ALL; \
                 SELECT count() AS total FROM user WHERE is_active = true GROUP ALL; \
                 SELECT count() AS total FROM document WHERE is_deleted = false GROUP ALL; \
                 SELECT count() AS total FROM document WHERE is_deleted = true GROUP ALL; \
                 SELECT math::sum(file_size) AS total FROM document \
                     WHERE is_deleted = false GROUP ALL; \
                 SELECT count() AS total FROM message WHERE status = 'open' GROUP ALL;",
            )
            .await
            .map_err(DbError::from)?;

        let mut totals = [0u64; 7];
        for (index, slot) in totals.iter_mut().enumerate() {
            let rows: Vec<CountRow> = result.take(index).map_err(DbError::from)?;
            *slot = total_of(rows);
        }
        let [
            tenants,
            users,
            active_users,
            documents,
            deleted_documents,
            storage_bytes,
            open_messages,
        ] = totals;

        Ok(PlatformStats {
            tenants,
            users,
            active_users,
            documents,
            deleted_documents,
            storage_bytes,
            open_messages,
        })
    }
}
