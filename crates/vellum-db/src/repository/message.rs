//! SurrealDB implementation of [`MessageRepository`].

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use vellum_core::error::VellumResult;
use vellum_core::models::message::{
    CreateMessage, Message, MessageFilter, MessageResponse, MessageStatus, UpdateMessage,
};
use vellum_core::repository::{MessageRepository, PaginatedResult, Pagination};

use crate::error::DbError;
use crate::rows::{CountRow, first, parse_enum, parse_uuid, total_of};

#[derive(Debug, SurrealValue)]
struct MessageRow {
    record_id: String,
    tenant_id: String,
    sender_id: String,
    subject: String,
    body: String,
    category: String,
    status: String,
    priority: String,
    responder_id: Option<String>,
    response_body: Option<String>,
    responded_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl MessageRow {
    fn try_into_message(self) -> Result<Message, DbError> {
        let response = match (self.responder_id, self.response_body, self.responded_at) {
            (Some(responder), Some(body), Some(responded_at)) => Some(MessageResponse {
                responder_id: parse_uuid(&responder, "responder")?,
                body,
                responded_at,
            }),
            _ => None,
        };
        Ok(Message {
            id: parse_uuid(&self.record_id, "message")?,
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            sender_id: parse_uuid(&self.sender_id, "sender")?,
            subject: self.subject,
            body: self.body,
            category: parse_enum(&self.category)?,
            status: parse_enum(&self.status)?,
            priority: parse_enum(&self.priority)?,
            response,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SELECT_SCOPED: &str = "SELECT meta::id(id) AS record_id, * \
     FROM type::record('message', $id) WHERE tenant_id = $tenant_id";

/// SurrealDB implementation of the Message repository.
#[derive(Clone)]
pub struct SurrealMessageRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealMessageRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn page(
        &self,
        conditions: &[&str],
        binds: Vec<(&'static str, String)>,
        pagination: Pagination,
    ) -> Result<PaginatedResult<Message>, DbError> {
        let clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        let mut builder = self
            .db
            .query(format!(
                "SELECT count() AS total FROM message {clause} GROUP ALL; \
                 SELECT meta::id(id) AS record_id, * FROM message {clause} \
                 ORDER BY created_at DESC LIMIT $limit START $offset;"
            ))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));
        for bind in binds {
            builder = builder.bind(bind);
        }
        let mut result = builder.await?;

        let counts: Vec<CountRow> = result.take(0)?;
        let rows: Vec<MessageRow> = result.take(1)?;
        let items = rows
            .into_iter()
            .map(MessageRow::try_into_message)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total: total_of(counts),
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}

impl<C: Connection> MessageRepository for SurrealMessageRepository<C> {
    async fn create(&self, input: CreateMessage) -> VellumResult<Message> {
        let id = Uuid::new_v4();

        let result = self
            .db
            .query(format!(
                "CREATE type::record('message', $id) SET \
                 tenant_id = $tenant_id, sender_id = $sender_id, \
                 subject = $subject, body = $body, category = $category, \
                 status = $status, priority = $priority; \
                 {SELECT_SCOPED};"
            ))
            .bind(("id", id.to_string()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("sender_id", input.sender_id.to_string()))
            .bind(("subject", input.subject))
            .bind(("body", input.body))
            .bind(("category", input.category.as_str().to_string()))
            .bind(("status", MessageStatus::Open.as_str().to_string()))
            .bind(("priority", input.priority.as_str().to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("message", e))?;

        let rows: Vec<MessageRow> = result.take(1).map_err(DbError::from)?;
        Ok(first(rows, "message", id)?.try_into_message()?)
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> VellumResult<Message> {
        let mut result = self
            .db
            .query(SELECT_SCOPED)
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<MessageRow> = result.take(0).map_err(DbError::from)?;
        Ok(first(rows, "message", id)?.try_into_message()?)
    }

    async fn list_for_sender(
        &self,
        tenant_id: Uuid,
        sender_id: Uuid,
        pagination: Pagination,
    ) -> VellumResult<PaginatedResult<Message>> {
        Ok(self
            .page(
                &["tenant_id = $tenant_id", "sender_id = $sender_id"],
                vec![
                    ("tenant_id", tenant_id.to_string()),
                    ("sender_id", sender_id.to_string()),
                ],
                pagination,
            )
            .await?)
    }

    async fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdateMessage,
    ) -> VellumResult<Message> {
        let mut sets = Vec::new();
        if input.status.is_some() {
            sets.push("status = $status");
        }
        if input.priority.is_some() {
            sets.push("priority = $priority");
        }
        if input.response.is_some() {
            sets.push(
                "responder_id = $responder_id, response_body = $response_body, \
                 responded_at = $responded_at",
            );
        }
        sets.push("updated_at = time::now()");

        let mut builder = self
            .db
            .query(format!(
                "UPDATE type::record('message', $id) SET {} WHERE tenant_id = $tenant_id; \
                 {SELECT_SCOPED};",
                sets.join(", ")
            ))
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()));

        if let Some(status) = input.status {
            builder = builder.bind(("status", status.as_str().to_string()));
        }
        if let Some(priority) = input.priority {
            builder = builder.bind(("priority", priority.as_str().to_string()));
        }
        if let Some(response) = input.response {
            builder = builder
                .bind(("responder_id", response.responder_id.to_string()))
                .bind(("response_body", response.body))
                .bind(("responded_at", response.responded_at));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("message", e))?;

        let rows: Vec<MessageRow> = result.take(1).map_err(DbError::from)?;
        Ok(first(rows, "message", id)?.try_into_message()?)
    }

    async fn find_by_id(&self, id: Uuid) -> VellumResult<Message> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM type::record('message', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<MessageRow> = result.take(0).map_err(DbError::from)?;
        Ok(first(rows, "message", id)?.try_into_message()?)
    }

    async fn list_all(
        &self,
        filter: MessageFilter,
        pagination: Pagination,
    ) -> VellumResult<PaginatedResult<Message>> {
        let mut conditions = Vec::new();
        let mut binds = Vec::new();
        if let Some(tenant_id) = filter.tenant_id {
            conditions.push("tenant_id = $tenant_id");
            binds.push(("tenant_id", tenant_id.to_string()));
        }
        if let Some(status) = filter.status {
            conditions.push("status = $status");
            binds.push(("status", status.as_str().to_string()));
        }
        if let Some(priority) = filter.priority {
            conditions.push("priority = $priority");
            binds.push(("priority", priority.as_str().to_string()));
        }
        Ok(self.page(&conditions, binds, pagination).await?)
    }
}
