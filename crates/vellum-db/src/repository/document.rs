//! SurrealDB implementation of [`DocumentRepository`].
//!
//! `shared_with` and `versions` are embedded arrays on the document
//! record. Appending a version is a compare-and-set on
//! `current_version`, retried a few times under contention, so version
//! numbers stay strictly increasing and are never reused.

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;
use vellum_core::error::VellumResult;
use vellum_core::models::document::{
    CreateDocument, Document, DocumentFilter, DocumentScope, DocumentVersion, NewVersion,
    ShareEntry, UpdateDocument,
};
use vellum_core::repository::{DocumentRepository, PaginatedResult, Pagination};

use crate::error::DbError;
use crate::rows::{
    CountRow, first, from_embedded, needle, parse_opt_uuid, parse_uuid, to_embedded, total_of,
};

const MAX_VERSION_ATTEMPTS: usize = 3;

#[derive(Debug, SurrealValue)]
struct DocumentRow {
    record_id: String,
    tenant_id: String,
    owner_id: String,
    title: String,
    description: Option<String>,
    file_name: String,
    storage_key: String,
    file_size: u64,
    mime_type: String,
    tags: Vec<String>,
    shared_with: serde_json::Value,
    versions: serde_json::Value,
    current_version: u32,
    download_count: u64,
    is_deleted: bool,
    deleted_at: Option<DateTime<Utc>>,
    deleted_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DocumentRow {
    fn try_into_document(self) -> Result<Document, DbError> {
        Ok(Document {
            id: parse_uuid(&self.record_id, "document")?,
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            owner_id: parse_uuid(&self.owner_id, "owner")?,
            title: self.title,
            description: self.description,
            file_name: self.file_name,
            storage_key: self.storage_key,
            file_size: self.file_size,
            mime_type: self.mime_type,
            tags: self.tags,
            shared_with: from_embedded(self.shared_with)?,
            versions: from_embedded(self.versions)?,
            current_version: self.current_version,
            download_count: self.download_count,
            is_deleted: self.is_deleted,
            deleted_at: self.deleted_at,
            deleted_by: parse_opt_uuid(self.deleted_by, "deleted_by")?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn collect(rows: Vec<DocumentRow>) -> Result<Vec<Document>, DbError> {
    rows.into_iter().map(DocumentRow::try_into_document).collect()
}

const SELECT_SCOPED: &str = "SELECT meta::id(id) AS record_id, * \
     FROM type::record('document', $id) WHERE tenant_id = $tenant_id";

/// SurrealDB implementation of the Document repository.
#[derive(Clone)]
pub struct SurrealDocumentRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealDocumentRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn page(
        &self,
        conditions: &[&str],
        binds: Vec<(&'static str, String)>,
        pagination: Pagination,
    ) -> Result<PaginatedResult<Document>, DbError> {
        let clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        let query = format!(
            "SELECT count() AS total FROM document {clause} GROUP ALL; \
             SELECT meta::id(id) AS record_id, * FROM document {clause} \
             ORDER BY updated_at DESC LIMIT $limit START $offset;"
        );

        let mut builder = self
            .db
            .query(query)
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));
        for bind in binds {
            builder = builder.bind(bind);
        }
        let mut result = builder.await?;

        let counts: Vec<CountRow> = result.take(0)?;
        let rows: Vec<DocumentRow> = result.take(1)?;

        Ok(PaginatedResult {
            items: collect(rows)?,
            total: total_of(counts),
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    /// Run a scoped write followed by [`SELECT_SCOPED`] and decode the
    /// resulting row.
    async fn write_scoped(
        &self,
        statement: &str,
        tenant_id: Uuid,
        id: Uuid,
        binds: Vec<(&'static str, serde_json::Value)>,
    ) -> Result<Document, DbError> {
        let mut builder = self
            .db
            .query(format!("{statement}; {SELECT_SCOPED};"))
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()));
        for bind in binds {
            builder = builder.bind(bind);
        }
        let mut result = builder
            .await?
            .check()
            .map_err(|e| DbError::from_statement("document", e))?;

        let rows: Vec<DocumentRow> = result.take(1)?;
        first(rows, "document", id)?.try_into_document()
    }
}

impl<C: Connection> DocumentRepository for SurrealDocumentRepository<C> {
    async fn create(&self, input: CreateDocument) -> VellumResult<Document> {
        let now = Utc::now();
        let first_version = DocumentVersion {
            version: 1,
            file_name: input.file_name.clone(),
            storage_key: input.storage_key.clone(),
            file_size: input.file_size,
            mime_type: input.mime_type.clone(),
            uploaded_by: input.owner_id,
            change_note: None,
            created_at: now,
        };
        let versions = to_embedded(&vec![first_version])?;

        let result = self
            .db
            .query(format!(
                "CREATE type::record('document', $id) SET \
                 tenant_id = $tenant_id, owner_id = $owner_id, \
                 title = $title, description = $description, \
                 file_name = $file_name, storage_key = $storage_key, \
                 file_size = $file_size, mime_type = $mime_type, \
                 tags = $tags, shared_with = [], versions = $versions, \
                 current_version = 1, download_count = 0, is_deleted = false; \
                 {SELECT_SCOPED};"
            ))
            .bind(("id", input.id.to_string()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("owner_id", input.owner_id.to_string()))
            .bind(("title", input.title))
            .bind(("description", input.description))
            .bind(("file_name", input.file_name))
            .bind(("storage_key", input.storage_key))
            .bind(("file_size", input.file_size))
            .bind(("mime_type", input.mime_type))
            .bind(("tags", input.tags))
            .bind(("versions", versions))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("document", e))?;

        let rows: Vec<DocumentRow> = result.take(1).map_err(DbError::from)?;
        Ok(first(rows, "document", input.id)?.try_into_document()?)
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> VellumResult<Document> {
        let mut result = self
            .db
            .query(SELECT_SCOPED)
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<DocumentRow> = result.take(0).map_err(DbError::from)?;
        Ok(first(rows, "document", id)?.try_into_document()?)
    }

    async fn list_accessible(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        filter: DocumentFilter,
        pagination: Pagination,
    ) -> VellumResult<PaginatedResult<Document>> {
        let mut conditions = vec!["tenant_id = $tenant_id", "is_deleted = false"];
        let mut binds = vec![
            ("tenant_id", tenant_id.to_string()),
            ("user_id", user_id.to_string()),
        ];

        conditions.push(match filter.scope {
            DocumentScope::All => {
                "(owner_id = $user_id OR shared_with.*.user_id CONTAINS $user_id)"
            }
            DocumentScope::Owned => "owner_id = $user_id",
            DocumentScope::Shared => {
                "(owner_id != $user_id AND shared_with.*.user_id CONTAINS $user_id)"
            }
        });

        if let Some(search) = needle(filter.search) {
            conditions.push(
                "(string::contains(string::lowercase(title), $search) \
                 OR string::contains(string::lowercase(description ?? ''), $search) \
                 OR string::contains(string::lowercase(file_name), $search))",
            );
            binds.push(("search", search));
        }
        if let Some(tag) = filter.tag.filter(|t| !t.trim().is_empty()) {
            conditions.push("tags CONTAINS $tag");
            binds.push(("tag", tag.trim().to_string()));
        }
        if let Some(mime_type) = filter.mime_type.filter(|m| !m.trim().is_empty()) {
            conditions.push("mime_type = $mime_type");
            binds.push(("mime_type", mime_type.trim().to_string()));
        }

        Ok(self.page(&conditions, binds, pagination).await?)
    }

    async fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdateDocument,
    ) -> VellumResult<Document> {
        let mut sets = Vec::new();
        let mut binds = Vec::new();
        if let Some(title) = input.title {
            sets.push("title = $title");
            binds.push(("title", serde_json::Value::String(title)));
        }
        match input.description {
            Some(Some(description)) => {
                sets.push("description = $description");
                binds.push(("description", serde_json::Value::String(description)));
            }
            Some(None) => sets.push("description = NONE"),
            None => {}
        }
        if let Some(tags) = input.tags {
            sets.push("tags = $tags");
            binds.push(("tags", to_embedded(&tags)?));
        }
        sets.push("updated_at = time::now()");

        let statement = format!(
            "UPDATE type::record('document', $id) SET {} \
             WHERE tenant_id = $tenant_id AND is_deleted = false",
            sets.join(", ")
        );
        Ok(self.write_scoped(&statement, tenant_id, id, binds).await?)
    }

    async fn add_version(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        version: NewVersion,
    ) -> VellumResult<Document> {
        for attempt in 1..=MAX_VERSION_ATTEMPTS {
            let current = self.get_by_id(tenant_id, id).await?;
            let expected = current.current_version;
            let next = current
                .versions
                .iter()
                .map(|v| v.version)
                .max()
                .unwrap_or(0)
                .max(expected)
                + 1;

            let entry = DocumentVersion {
                version: next,
                file_name: version.file_name.clone(),
                storage_key: version.storage_key.clone(),
                file_size: version.file_size,
                mime_type: version.mime_type.clone(),
                uploaded_by: version.uploaded_by,
                change_note: version.change_note.clone(),
                created_at: Utc::now(),
            };
            let mut versions = current.versions;
            versions.push(entry.clone());

            let binds = vec![
                ("versions", to_embedded(&versions)?),
                ("next", serde_json::Value::from(next)),
                ("expected", serde_json::Value::from(expected)),
                ("file_name", serde_json::Value::String(version.file_name.clone())),
                ("storage_key", serde_json::Value::String(version.storage_key.clone())),
                ("file_size", serde_json::Value::from(version.file_size)),
                ("mime_type", serde_json::Value::String(version.mime_type.clone())),
            ];
            let document = self
                .write_scoped(
                    "UPDATE type::record('document', $id) SET \
                     versions = $versions, current_version = $next, \
                     file_name = $file_name, storage_key = $storage_key, \
                     file_size = $file_size, mime_type = $mime_type, \
                     updated_at = time::now() \
                     WHERE tenant_id = $tenant_id AND current_version = $expected",
                    tenant_id,
                    id,
                    binds,
                )
                .await?;

            // Another writer may have appended the same object under `next`;
            // only our exact entry (down to its timestamp) counts as applied.
            if document.version(next) == Some(&entry) {
                return Ok(document);
            }
            debug!(document_id = %id, attempt, "Concurrent version write, retrying");
        }

        Err(DbError::Query(format!("could not append version to document {id}")).into())
    }

    async fn set_shares(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        shares: Vec<ShareEntry>,
    ) -> VellumResult<Document> {
        let binds = vec![("shares", to_embedded(&shares)?)];
        Ok(self
            .write_scoped(
                "UPDATE type::record('document', $id) SET \
                 shared_with = $shares, updated_at = time::now() \
                 WHERE tenant_id = $tenant_id",
                tenant_id,
                id,
                binds,
            )
            .await?)
    }

    async fn increment_download_count(&self, tenant_id: Uuid, id: Uuid) -> VellumResult<()> {
        self.db
            .query(
                "UPDATE type::record('document', $id) SET download_count += 1 \
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

    async fn soft_delete(&self, tenant_id: Uuid, id: Uuid, deleted_by: Uuid) -> VellumResult<()> {
        let binds = vec![("deleted_by", serde_json::Value::String(deleted_by.to_string()))];
        self.write_scoped(
            "UPDATE type::record('document', $id) SET \
             is_deleted = true, deleted_at = time::now(), deleted_by = $deleted_by, \
             updated_at = time::now() \
             WHERE tenant_id = $tenant_id",
            tenant_id,
            id,
            binds,
        )
        .await?;
        Ok(())
    }

    async fn storage_used(&self, tenant_id: Uuid) -> VellumResult<u64> {
        let mut result = self
            .db
            .query(
                "SELECT math::sum(file_size) AS total FROM document \
                 WHERE tenant_id = $tenant_id AND is_deleted = false GROUP ALL",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(total_of(rows))
    }

    async fn find_by_id(&self, id: Uuid) -> VellumResult<Document> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM type::record('document', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<DocumentRow> = result.take(0).map_err(DbError::from)?;
        Ok(first(rows, "document", id)?.try_into_document()?)
    }

    async fn list_all(
        &self,
        tenant_id: Option<Uuid>,
        include_deleted: bool,
        pagination: Pagination,
    ) -> VellumResult<PaginatedResult<Document>> {
        let mut conditions = Vec::new();
        let mut binds = Vec::new();
        if let Some(tenant_id) = tenant_id {
            conditions.push("tenant_id = $tenant_id");
            binds.push(("tenant_id", tenant_id.to_string()));
        }
        if !include_deleted {
            conditions.push("is_deleted = false");
        }
        Ok(self.page(&conditions, binds, pagination).await?)
    }

    async fn list_involving(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> VellumResult<Vec<Document>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM document \
                 WHERE tenant_id = $tenant_id \
                 AND (owner_id = $user_id OR shared_with.*.user_id CONTAINS $user_id) \
                 ORDER BY created_at ASC",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<DocumentRow> = result.take(0).map_err(DbError::from)?;
        Ok(collect(rows)?)
    }

    async fn purge(&self, id: Uuid) -> VellumResult<()> {
        self.find_by_id(id).await?;
        self.db
            .query(
                "DELETE type::record('document', $id); \
                 DELETE comment WHERE document_id = $id;",
            )
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;
        Ok(())
    }
}
