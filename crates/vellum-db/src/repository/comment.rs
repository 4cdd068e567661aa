//! SurrealDB implementation of [`CommentRepository`].

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use vellum_core::error::VellumResult;
use vellum_core::models::comment::{Comment, CreateComment, Reaction};
use vellum_core::repository::CommentRepository;

use crate::error::DbError;
use crate::rows::{first, from_embedded, parse_opt_uuid, parse_uuid, to_embedded};

#[derive(Debug, SurrealValue)]
struct CommentRow {
    record_id: String,
    tenant_id: String,
    document_id: String,
    author_id: String,
    content: String,
    parent_id: Option<String>,
    reactions: serde_json::Value,
    is_edited: bool,
    edited_at: Option<DateTime<Utc>>,
    is_deleted: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CommentRow {
    fn try_into_comment(self) -> Result<Comment, DbError> {
        Ok(Comment {
            id: parse_uuid(&self.record_id, "comment")?,
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            document_id: parse_uuid(&self.document_id, "document")?,
            author_id: parse_uuid(&self.author_id, "author")?,
            content: self.content,
            parent_id: parse_opt_uuid(self.parent_id, "parent")?,
            reactions: from_embedded(self.reactions)?,
            is_edited: self.is_edited,
            edited_at: self.edited_at,
            is_deleted: self.is_deleted,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Deleted comments are invisible to every read.
const SELECT_SCOPED: &str = "SELECT meta::id(id) AS record_id, * \
     FROM type::record('comment', $id) \
     WHERE tenant_id = $tenant_id AND is_deleted = false";

/// SurrealDB implementation of the Comment repository.
#[derive(Clone)]
pub struct SurrealCommentRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealCommentRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn write_scoped(
        &self,
        statement: &str,
        tenant_id: Uuid,
        id: Uuid,
        bind: Option<(&'static str, serde_json::Value)>,
    ) -> Result<Comment, DbError> {
        let mut builder = self
            .db
            .query(format!("{statement}; {SELECT_SCOPED};"))
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()));
        if let Some(bind) = bind {
            builder = builder.bind(bind);
        }
        let mut result = builder
            .await?
            .check()
            .map_err(|e| DbError::from_statement("comment", e))?;

        let rows: Vec<CommentRow> = result.take(1)?;
        first(rows, "comment", id)?.try_into_comment()
    }
}

impl<C: Connection> CommentRepository for SurrealCommentRepository<C> {
    async fn create(&self, input: CreateComment) -> VellumResult<Comment> {
        let id = Uuid::new_v4();

        let result = self
            .db
            .query(format!(
                "CREATE type::record('comment', $id) SET \
                 tenant_id = $tenant_id, document_id = $document_id, \
                 author_id = $author_id, content = $content, \
                 parent_id = $parent_id, reactions = [], \
                 is_edited = false, is_deleted = false; \
                 {SELECT_SCOPED};"
            ))
            .bind(("id", id.to_string()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("document_id", input.document_id.to_string()))
            .bind(("author_id", input.author_id.to_string()))
            .bind(("content", input.content))
            .bind(("parent_id", input.parent_id.map(|p| p.to_string())))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("comment", e))?;

        let rows: Vec<CommentRow> = result.take(1).map_err(DbError::from)?;
        Ok(first(rows, "comment", id)?.try_into_comment()?)
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> VellumResult<Comment> {
        let mut result = self
            .db
            .query(SELECT_SCOPED)
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CommentRow> = result.take(0).map_err(DbError::from)?;
        Ok(first(rows, "comment", id)?.try_into_comment()?)
    }

    async fn list_for_document(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
    ) -> VellumResult<Vec<Comment>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM comment \
                 WHERE tenant_id = $tenant_id AND document_id = $document_id \
                 AND is_deleted = false \
                 ORDER BY created_at ASC",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("document_id", document_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CommentRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .map(CommentRow::try_into_comment)
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    async fn update_content(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        content: String,
    ) -> VellumResult<Comment> {
        Ok(self
            .write_scoped(
                "UPDATE type::record('comment', $id) SET \
                 content = $content, is_edited = true, edited_at = time::now(), \
                 updated_at = time::now() \
                 WHERE tenant_id = $tenant_id AND is_deleted = false",
                tenant_id,
                id,
                Some(("content", serde_json::Value::String(content))),
            )
            .await?)
    }

    async fn set_reactions(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        reactions: Vec<Reaction>,
    ) -> VellumResult<Comment> {
        Ok(self
            .write_scoped(
                "UPDATE type::record('comment', $id) SET reactions = $reactions \
                 WHERE tenant_id = $tenant_id AND is_deleted = false",
                tenant_id,
                id,
                Some(("reactions", to_embedded(&reactions)?)),
            )
            .await?)
    }

    async fn soft_delete(&self, tenant_id: Uuid, id: Uuid) -> VellumResult<()> {
        // Existence check first: the follow-up SELECT hides deleted rows.
        self.get_by_id(tenant_id, id).await?;
        self.db
            .query(
                "UPDATE type::record('comment', $id) SET \
                 is_deleted = true, updated_at = time::now() \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;
        Ok(())
    }
}
