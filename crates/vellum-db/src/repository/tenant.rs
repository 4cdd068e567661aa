//! SurrealDB implementation of [`TenantRepository`].

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use vellum_core::error::VellumResult;
use vellum_core::models::tenant::{CreateTenant, Tenant, UpdateTenant};
use vellum_core::repository::{PaginatedResult, Pagination, TenantRepository};

use crate::error::DbError;
use crate::rows::{CountRow, first, parse_uuid, total_of};

/// DB-side row struct including the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct TenantRow {
    record_id: String,
    name: String,
    slug: String,
    is_active: bool,
    storage_quota_bytes: Option<u64>,
    settings: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TenantRow {
    fn try_into_tenant(self) -> Result<Tenant, DbError> {
        Ok(Tenant {
            id: parse_uuid(&self.record_id, "tenant")?,
            name: self.name,
            slug: self.slug,
            is_active: self.is_active,
            storage_quota_bytes: self.storage_quota_bytes,
            settings: self.settings,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SELECT_ONE: &str = "SELECT meta::id(id) AS record_id, * FROM type::record('tenant', $id)";

/// SurrealDB implementation of the Tenant repository.
#[derive(Clone)]
pub struct SurrealTenantRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealTenantRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> TenantRepository for SurrealTenantRepository<C> {
    async fn create(&self, input: CreateTenant) -> VellumResult<Tenant> {
        let id = Uuid::new_v4();
        let settings = input
            .settings
            .unwrap_or(serde_json::Value::Object(Default::default()));

        let result = self
            .db
            .query(format!(
                "CREATE type::record('tenant', $id) SET \
                 name = $name, slug = $slug, is_active = true, \
                 storage_quota_bytes = $quota, settings = $settings; \
                 {SELECT_ONE};"
            ))
            .bind(("id", id.to_string()))
            .bind(("name", input.name))
            .bind(("slug", input.slug.to_lowercase()))
            .bind(("quota", input.storage_quota_bytes))
            .bind(("settings", settings))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("tenant", e))?;

        let rows: Vec<TenantRow> = result.take(1).map_err(DbError::from)?;
        Ok(first(rows, "tenant", id)?.try_into_tenant()?)
    }

    async fn get_by_id(&self, id: Uuid) -> VellumResult<Tenant> {
        let mut result = self
            .db
            .query(SELECT_ONE)
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TenantRow> = result.take(0).map_err(DbError::from)?;
        Ok(first(rows, "tenant", id)?.try_into_tenant()?)
    }

    async fn get_by_slug(&self, slug: &str) -> VellumResult<Tenant> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM tenant WHERE slug = $slug")
            .bind(("slug", slug.to_lowercase()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TenantRow> = result.take(0).map_err(DbError::from)?;
        Ok(first(rows, "tenant", format!("slug={slug}"))?.try_into_tenant()?)
    }

    async fn update(&self, id: Uuid, input: UpdateTenant) -> VellumResult<Tenant> {
        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.is_active.is_some() {
            sets.push("is_active = $is_active");
        }
        if input.storage_quota_bytes.is_some() {
            sets.push("storage_quota_bytes = $quota");
        }
        if input.settings.is_some() {
            sets.push("settings = $settings");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('tenant', $id) SET {}; {SELECT_ONE};",
            sets.join(", ")
        );

        let mut builder = self.db.query(query).bind(("id", id.to_string()));
        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(is_active) = input.is_active {
            builder = builder.bind(("is_active", is_active));
        }
        if let Some(quota) = input.storage_quota_bytes {
            builder = builder.bind(("quota", quota));
        }
        if let Some(settings) = input.settings {
            builder = builder.bind(("settings", settings));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("tenant", e))?;

        let rows: Vec<TenantRow> = result.take(1).map_err(DbError::from)?;
        Ok(first(rows, "tenant", id)?.try_into_tenant()?)
    }

    async fn list(&self, pagination: Pagination) -> VellumResult<PaginatedResult<Tenant>> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM tenant GROUP ALL; \
                 SELECT meta::id(id) AS record_id, * FROM tenant \
                 ORDER BY created_at ASC LIMIT $limit START $offset;",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let counts: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let rows: Vec<TenantRow> = result.take(1).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(TenantRow::try_into_tenant)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total: total_of(counts),
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
