//! SurrealDB implementation of [`NotificationRepository`].
//!
//! Every method is scoped by tenant *and* recipient: a user can only
//! ever see or change their own notifications.

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use vellum_core::error::VellumResult;
use vellum_core::models::notification::{CreateNotification, Notification, NotificationSubject};
use vellum_core::repository::{NotificationRepository, PaginatedResult, Pagination};

use crate::error::DbError;
use crate::rows::{CountRow, first, parse_enum, parse_uuid, total_of};

#[derive(Debug, SurrealValue)]
struct NotificationRow {
    record_id: String,
    tenant_id: String,
    recipient_id: String,
    kind: String,
    title: String,
    body: String,
    subject_type: Option<String>,
    subject_id: Option<String>,
    is_read: bool,
    read_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl NotificationRow {
    fn try_into_notification(self) -> Result<Notification, DbError> {
        let subject = match (self.subject_type, self.subject_id) {
            (Some(kind), Some(id)) => Some(
                NotificationSubject::from_parts(&kind, parse_uuid(&id, "subject")?)
                    .map_err(DbError::Decode)?,
            ),
            _ => None,
        };
        Ok(Notification {
            id: parse_uuid(&self.record_id, "notification")?,
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            recipient_id: parse_uuid(&self.recipient_id, "recipient")?,
            kind: parse_enum(&self.kind)?,
            title: self.title,
            body: self.body,
            subject,
            is_read: self.is_read,
            read_at: self.read_at,
            created_at: self.created_at,
        })
    }
}

const SELECT_SCOPED: &str = "SELECT meta::id(id) AS record_id, * \
     FROM type::record('notification', $id) \
     WHERE tenant_id = $tenant_id AND recipient_id = $recipient_id";

/// SurrealDB implementation of the Notification repository.
#[derive(Clone)]
pub struct SurrealNotificationRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealNotificationRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> NotificationRepository for SurrealNotificationRepository<C> {
    async fn create(&self, input: CreateNotification) -> VellumResult<Notification> {
        let id = Uuid::new_v4();

        let result = self
            .db
            .query(format!(
                "CREATE type::record('notification', $id) SET \
                 tenant_id = $tenant_id, recipient_id = $recipient_id, \
                 kind = $kind, title = $title, body = $body, \
                 subject_type = $subject_type, subject_id = $subject_id, \
                 is_read = false; \
                 {SELECT_SCOPED};"
            ))
            .bind(("id", id.to_string()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("recipient_id", input.recipient_id.to_string()))
            .bind(("kind", input.kind.as_str().to_string()))
            .bind(("title", input.title))
            .bind(("body", input.body))
            .bind(("subject_type", input.subject.map(|s| s.type_str().to_string())))
            .bind(("subject_id", input.subject.map(|s| s.id().to_string())))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("notification", e))?;

        let rows: Vec<NotificationRow> = result.take(1).map_err(DbError::from)?;
        Ok(first(rows, "notification", id)?.try_into_notification()?)
    }

    async fn list_for_recipient(
        &self,
        tenant_id: Uuid,
        recipient_id: Uuid,
        unread_only: bool,
        pagination: Pagination,
    ) -> VellumResult<PaginatedResult<Notification>> {
        let clause = if unread_only {
            "WHERE tenant_id = $tenant_id AND recipient_id = $recipient_id AND is_read = false"
        } else {
            "WHERE tenant_id = $tenant_id AND recipient_id = $recipient_id"
        };

        let mut result = self
            .db
            .query(format!(
                "SELECT count() AS total FROM notification {clause} GROUP ALL; \
                 SELECT meta::id(id) AS record_id, * FROM notification {clause} \
                 ORDER BY created_at DESC LIMIT $limit START $offset;"
            ))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("recipient_id", recipient_id.to_string()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let counts: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let rows: Vec<NotificationRow> = result.take(1).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(NotificationRow::try_into_notification)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total: total_of(counts),
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn unread_count(&self, tenant_id: Uuid, recipient_id: Uuid) -> VellumResult<u64> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM notification \
                 WHERE tenant_id = $tenant_id AND recipient_id = $recipient_id \
                 AND is_read = false GROUP ALL",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("recipient_id", recipient_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let counts: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(total_of(counts))
    }

    async fn mark_read(
        &self,
        tenant_id: Uuid,
        recipient_id: Uuid,
        id: Uuid,
    ) -> VellumResult<Notification> {
        let mut result = self
            .db
            .query(format!(
                "UPDATE type::record('notification', $id) SET \
                 read_at = read_at ?? time::now(), is_read = true \
                 WHERE tenant_id = $tenant_id AND recipient_id = $recipient_id; \
                 {SELECT_SCOPED};"
            ))
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("recipient_id", recipient_id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<NotificationRow> = result.take(1).map_err(DbError::from)?;
        Ok(first(rows, "notification", id)?.try_into_notification()?)
    }

    async fn mark_all_read(&self, tenant_id: Uuid, recipient_id: Uuid) -> VellumResult<u64> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM notification \
                 WHERE tenant_id = $tenant_id AND recipient_id = $recipient_id \
                 AND is_read = false GROUP ALL; \
                 UPDATE notification SET is_read = true, read_at = time::now() \
                 WHERE tenant_id = $tenant_id AND recipient_id = $recipient_id \
                 AND is_read = false RETURN NONE;",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("recipient_id", recipient_id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let counts: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(total_of(counts))
    }

    async fn delete(&self, tenant_id: Uuid, recipient_id: Uuid, id: Uuid) -> VellumResult<()> {
        let mut result = self
            .db
            .query(format!(
                "{SELECT_SCOPED}; \
                 DELETE type::record('notification', $id) \
                 WHERE tenant_id = $tenant_id AND recipient_id = $recipient_id;"
            ))
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("recipient_id", recipient_id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<NotificationRow> = result.take(0).map_err(DbError::from)?;
        first(rows, "notification", id)?;
        Ok(())
    }
}
