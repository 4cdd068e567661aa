//! SurrealDB implementation of [`ActivityLogRepository`].

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use vellum_core::error::VellumResult;
use vellum_core::models::activity::{ActivityFilter, ActivityLog, CreateActivityLog};
use vellum_core::repository::{ActivityLogRepository, PaginatedResult, Pagination};

use crate::error::DbError;
use crate::rows::{CountRow, first, parse_opt_uuid, parse_uuid, total_of};

#[derive(Debug, SurrealValue)]
struct ActivityRow {
    record_id: String,
    tenant_id: String,
    user_id: Option<String>,
    action: String,
    resource_type: Option<String>,
    resource_id: Option<String>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl ActivityRow {
    fn try_into_entry(self) -> Result<ActivityLog, DbError> {
        Ok(ActivityLog {
            id: parse_uuid(&self.record_id, "activity")?,
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            user_id: parse_opt_uuid(self.user_id, "user")?,
            action: self.action,
            resource_type: self.resource_type,
            resource_id: self.resource_id,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            metadata: self.metadata,
            created_at: self.created_at,
            expires_at: self.expires_at,
        })
    }
}

/// SurrealDB implementation of the activity log repository.
#[derive(Clone)]
pub struct SurrealActivityLogRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealActivityLogRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> ActivityLogRepository for SurrealActivityLogRepository<C> {
    async fn append(&self, input: CreateActivityLog) -> VellumResult<ActivityLog> {
        let id = Uuid::new_v4();
        let metadata = input
            .metadata
            .unwrap_or(serde_json::Value::Object(Default::default()));

        let result = self
            .db
            .query(
                "CREATE type::record('activity_log', $id) SET \
                 tenant_id = $tenant_id, user_id = $user_id, action = $action, \
                 resource_type = $resource_type, resource_id = $resource_id, \
                 ip_address = $ip_address, user_agent = $user_agent, \
                 metadata = $metadata, expires_at = $expires_at; \
                 SELECT meta::id(id) AS record_id, * \
                 FROM type::record('activity_log', $id);",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("user_id", input.user_id.map(|u| u.to_string())))
            .bind(("action", input.action))
            .bind(("resource_type", input.resource_type))
            .bind(("resource_id", input.resource_id))
            .bind(("ip_address", input.ip_address))
            .bind(("user_agent", input.user_agent))
            .bind(("metadata", metadata))
            .bind(("expires_at", input.expires_at))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("activity_log", e))?;

        let rows: Vec<ActivityRow> = result.take(1).map_err(DbError::from)?;
        Ok(first(rows, "activity_log", id)?.try_into_entry()?)
    }

    async fn list(
        &self,
        filter: ActivityFilter,
        pagination: Pagination,
    ) -> VellumResult<PaginatedResult<ActivityLog>> {
        let mut conditions = Vec::new();
        let mut binds = Vec::new();
        if let Some(tenant_id) = filter.tenant_id {
            conditions.push("tenant_id = $tenant_id");
            binds.push(("tenant_id", tenant_id.to_string()));
        }
        if let Some(user_id) = filter.user_id {
            conditions.push("user_id = $user_id");
            binds.push(("user_id", user_id.to_string()));
        }
        if let Some(action) = filter.action {
            conditions.push("action = $action");
            binds.push(("action", action));
        }
        let clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let mut builder = self
            .db
            .query(format!(
                "SELECT count() AS total FROM activity_log {clause} GROUP ALL; \
                 SELECT meta::id(id) AS record_id, * FROM activity_log {clause} \
                 ORDER BY created_at DESC LIMIT $limit START $offset;"
            ))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));
        for bind in binds {
            builder = builder.bind(bind);
        }
        let mut result = builder.await.map_err(DbError::from)?;

        let counts: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let rows: Vec<ActivityRow> = result.take(1).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(ActivityRow::try_into_entry)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total: total_of(counts),
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> VellumResult<u64> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM activity_log \
                 WHERE expires_at < $now GROUP ALL; \
                 DELETE activity_log WHERE expires_at < $now;",
            )
            .bind(("now", now))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let counts: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(total_of(counts))
    }
}
