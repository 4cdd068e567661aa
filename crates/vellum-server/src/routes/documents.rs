//! `/documents` routes: upload, listing, metadata, versions, sharing,
//! download links and copies.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use bytes::{Bytes, BytesMut};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;
use vellum_core::access::has_access;
use vellum_core::error::{FieldError, VellumError};
use vellum_core::models::document::{
    AccessLevel, CreateDocument, Document, DocumentFilter, DocumentScope, NewVersion,
    SharePermission, UpdateDocument, format_file_size, remove_share, upsert_share,
};
use vellum_core::models::notification::{NotificationKind, NotificationSubject};
use vellum_core::models::tenant::Tenant;
use vellum_core::repository::{DocumentRepository, UserRepository};
use vellum_mail::templates::{self, Recipient};
use vellum_storage::key::document_key;

use crate::activity::Activity;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiPath, ApiQuery, ValidatedJson, ValidatedQuery, not_blank};
use crate::middleware::{AuthUser, ClientInfo};
use crate::notify::{self, NewNotification, send_mail};
use crate::response::{self, PageQuery};
use crate::state::AppState;
use crate::views::{DocumentView, double_option};

const MAX_TAGS: usize = 20;
const MAX_TAG_LEN: usize = 50;
const MAX_TITLE_LEN: usize = 200;
const MAX_DESCRIPTION_LEN: usize = 2000;
const MAX_CHANGE_NOTE_LEN: usize = 500;

/// Extra room on top of the upload limit for the multipart framing and
/// text fields, so oversized files reach the size check below instead
/// of the transport limit.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

pub fn router(max_upload_bytes: u64) -> Router<Arc<AppState>> {
    let body_limit = usize::try_from(max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(FORM_OVERHEAD_BYTES);

    Router::new()
        .route("/", post(upload).get(list))
        .route("/{id}", get(show).patch(update).delete(remove))
        .route("/{id}/versions", post(upload_version).get(versions))
        .route("/{id}/versions/{version}/restore", post(restore_version))
        .route("/{id}/download", get(download))
        .route("/{id}/share", post(share))
        .route("/{id}/share/{user_id}", delete(unshare))
        .route("/{id}/copy", post(copy))
        .layer(DefaultBodyLimit::max(body_limit))
}

/// Load a live document of the caller's tenant and check `level`.
///
/// Documents of other tenants and soft-deleted documents are reported
/// as not found; an existing document the caller lacks rights on is
/// a 403.
pub(crate) async fn load_document(
    state: &AppState,
    caller: &AuthUser,
    id: Uuid,
    level: AccessLevel,
) -> ApiResult<Document> {
    let document = state.documents.get_by_id(caller.tenant_id(), id).await?;
    if document.is_deleted {
        return Err(VellumError::not_found("document", id).into());
    }
    if !has_access(&document, caller.id(), level) {
        return Err(
            VellumError::denied("You do not have permission to access this document").into(),
        );
    }
    Ok(document)
}

// ---------------------------------------------------------------------------
// Multipart handling
// ---------------------------------------------------------------------------

struct UploadedFile {
    file_name: String,
    mime_type: String,
    data: Bytes,
}

#[derive(Default)]
struct UploadForm {
    file: Option<UploadedFile>,
    fields: HashMap<String, String>,
}

impl UploadForm {
    fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn take_file(&mut self) -> ApiResult<UploadedFile> {
        match self.file.take() {
            Some(file) if !file.data.is_empty() => Ok(file),
            Some(_) => Err(field_error("file", "File is empty")),
            None => Err(field_error("file", "A file is required")),
        }
    }
}

fn field_error(field: &str, message: &str) -> ApiError {
    VellumError::Validation {
        message: message.to_string(),
        errors: vec![FieldError {
            field: field.to_string(),
            message: message.to_string(),
        }],
    }
    .into()
}

fn normalise_mime(raw: Option<&str>) -> String {
    raw.and_then(|m| m.split(';').next())
        .map(|m| m.trim().to_lowercase())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

/// Read every part of the form. The file part is read chunk by chunk
/// and rejected as soon as it passes `max_bytes`.
async fn read_form(multipart: &mut Multipart, max_bytes: u64) -> ApiResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let file_name = field.file_name().unwrap_or("file").to_string();
            let mime_type = normalise_mime(field.content_type());

            let mut data = BytesMut::new();
            while let Some(chunk) = field.chunk().await? {
                if (data.len() + chunk.len()) as u64 > max_bytes {
                    return Err(field_error(
                        "file",
                        &format!(
                            "File exceeds the maximum upload size of {}",
                            format_file_size(max_bytes)
                        ),
                    ));
                }
                data.extend_from_slice(&chunk);
            }
            form.file = Some(UploadedFile {
                file_name,
                mime_type,
                data: data.freeze(),
            });
        } else {
            let value = field.text().await?;
            form.fields.insert(name, value);
        }
    }
    Ok(form)
}

fn check_mime_allowed(state: &AppState, mime_type: &str) -> ApiResult<()> {
    match &state.settings.allowed_mime_types {
        Some(allowed) if !allowed.iter().any(|m| m == mime_type) => Err(field_error(
            "file",
            &format!("File type {mime_type} is not allowed"),
        )),
        _ => Ok(()),
    }
}

async fn check_quota(state: &AppState, tenant: &Tenant, additional: u64) -> ApiResult<()> {
    let Some(quota) = tenant.storage_quota_bytes else {
        return Ok(());
    };
    let used = state.documents.storage_used(tenant.id).await?;
    if used.saturating_add(additional) > quota {
        return Err(field_error(
            "file",
            &format!(
                "Storage quota exceeded ({} of {} used)",
                format_file_size(used),
                format_file_size(quota)
            ),
        ));
    }
    Ok(())
}

fn parse_tags(raw: &str) -> ApiResult<Vec<String>> {
    normalise_tags(raw.split(',').map(str::to_string).collect())
}

fn normalise_tags(raw: Vec<String>) -> ApiResult<Vec<String>> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw {
        let tag = tag.trim().to_lowercase();
        if tag.is_empty() || tags.contains(&tag) {
            continue;
        }
        if tag.chars().count() > MAX_TAG_LEN {
            return Err(field_error(
                "tags",
                &format!("Tags must be at most {MAX_TAG_LEN} characters"),
            ));
        }
        tags.push(tag);
    }
    if tags.len() > MAX_TAGS {
        return Err(field_error(
            "tags",
            &format!("At most {MAX_TAGS} tags are allowed"),
        ));
    }
    Ok(tags)
}

fn check_len(field: &str, value: &str, max: usize) -> ApiResult<()> {
    if value.chars().count() > max {
        return Err(field_error(
            field,
            &format!("{field} must be at most {max} characters"),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn upload(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    client: ClientInfo,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<impl IntoResponse> {
    let mut multipart = multipart?;
    let mut form = read_form(&mut multipart, state.settings.max_upload_bytes).await?;
    let file = form.take_file()?;

    let title = form.text("title").unwrap_or_else(|| file.file_name.clone());
    check_len("title", &title, MAX_TITLE_LEN)?;
    let description = form.text("description");
    if let Some(d) = &description {
        check_len("description", d, MAX_DESCRIPTION_LEN)?;
    }
    let tags = form.text("tags").map(|t| parse_tags(&t)).transpose()?.unwrap_or_default();

    check_mime_allowed(&state, &file.mime_type)?;
    let size = file.data.len() as u64;
    check_quota(&state, &caller.tenant, size).await?;

    let id = Uuid::new_v4();
    let storage_key = document_key(caller.tenant_id(), id, 1, &file.file_name);
    state.store.put(&storage_key, file.data, &file.mime_type).await?;

    let created = state
        .documents
        .create(CreateDocument {
            id,
            tenant_id: caller.tenant_id(),
            owner_id: caller.id(),
            title,
            description,
            file_name: file.file_name,
            storage_key: storage_key.clone(),
            file_size: size,
            mime_type: file.mime_type,
            tags,
        })
        .await;

    let document = match created {
        Ok(document) => document,
        Err(e) => {
            if let Err(cleanup) = state.store.delete(&storage_key).await {
                warn!(error = %cleanup, key = %storage_key, "Failed to remove orphaned upload");
            }
            return Err(e.into());
        }
    };

    info!(
        tenant_id = %document.tenant_id,
        document_id = %document.id,
        size,
        "Document uploaded"
    );
    Activity::new(&state, caller.tenant_id(), Some(caller.id()), "document.upload")
        .resource("document", document.id)
        .client(&client)
        .metadata(serde_json::json!({ "file_name": document.file_name, "file_size": size }))
        .record(&state);

    Ok(response::created(DocumentView::from(document)))
}

#[derive(Debug, Default, Deserialize)]
pub struct DocumentListQuery {
    pub search: Option<String>,
    pub tag: Option<String>,
    pub mime_type: Option<String>,
    #[serde(default)]
    pub scope: DocumentScope,
}

async fn list(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    ValidatedQuery(page): ValidatedQuery<PageQuery>,
    ApiQuery(query): ApiQuery<DocumentListQuery>,
) -> ApiResult<impl IntoResponse> {
    let filter = DocumentFilter {
        scope: query.scope,
        search: query.search,
        tag: query.tag.map(|t| t.trim().to_lowercase()),
        mime_type: query.mime_type,
    };
    let result = state
        .documents
        .list_accessible(caller.tenant_id(), caller.id(), filter, page.pagination())
        .await?;
    Ok(response::paginated(result.map(DocumentView::from)))
}

async fn show(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let document = load_document(&state, &caller, id, AccessLevel::View).await?;
    Ok(response::ok(DocumentView::from(document)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateDocumentRequest {
    #[validate(
        length(min = 1, max = 200, message = "title must be 1 to 200 characters"),
        custom(function = "not_blank")
    )]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
}

async fn update(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    client: ClientInfo,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateDocumentRequest>,
) -> ApiResult<impl IntoResponse> {
    load_document(&state, &caller, id, AccessLevel::Edit).await?;

    if let Some(Some(d)) = &req.description {
        check_len("description", d, MAX_DESCRIPTION_LEN)?;
    }
    let input = UpdateDocument {
        title: req.title.map(|t| t.trim().to_string()),
        description: req
            .description
            .map(|d| d.map(|d| d.trim().to_string()).filter(|d| !d.is_empty())),
        tags: req.tags.map(normalise_tags).transpose()?,
    };
    let document = state.documents.update(caller.tenant_id(), id, input).await?;

    Activity::new(&state, caller.tenant_id(), Some(caller.id()), "document.update")
        .resource("document", id)
        .client(&client)
        .record(&state);
    Ok(response::ok(DocumentView::from(document)))
}

async fn remove(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    client: ClientInfo,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    load_document(&state, &caller, id, AccessLevel::Delete).await?;
    state
        .documents
        .soft_delete(caller.tenant_id(), id, caller.id())
        .await?;

    info!(tenant_id = %caller.tenant_id(), document_id = %id, "Document deleted");
    Activity::new(&state, caller.tenant_id(), Some(caller.id()), "document.delete")
        .resource("document", id)
        .client(&client)
        .record(&state);
    Ok(response::message("Document deleted"))
}

async fn upload_version(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    client: ClientInfo,
    ApiPath(id): ApiPath<Uuid>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<impl IntoResponse> {
    let document = load_document(&state, &caller, id, AccessLevel::Edit).await?;

    let mut multipart = multipart?;
    let mut form = read_form(&mut multipart, state.settings.max_upload_bytes).await?;
    let file = form.take_file()?;
    let change_note = form.text("change_note");
    if let Some(note) = &change_note {
        check_len("change_note", note, MAX_CHANGE_NOTE_LEN)?;
    }

    check_mime_allowed(&state, &file.mime_type)?;
    let size = file.data.len() as u64;
    check_quota(&state, &caller.tenant, size).await?;

    let next = document
        .versions
        .iter()
        .map(|v| v.version)
        .max()
        .unwrap_or(0)
        .max(document.current_version)
        + 1;
    let storage_key = document_key(caller.tenant_id(), id, next, &file.file_name);
    state.store.put(&storage_key, file.data, &file.mime_type).await?;

    let appended = state
        .documents
        .add_version(
            caller.tenant_id(),
            id,
            NewVersion {
                file_name: file.file_name,
                storage_key: storage_key.clone(),
                file_size: size,
                mime_type: file.mime_type,
                uploaded_by: caller.id(),
                change_note,
            },
        )
        .await;
    let document = match appended {
        Ok(document) => document,
        Err(e) => {
            if let Err(cleanup) = state.store.delete(&storage_key).await {
                warn!(error = %cleanup, key = %storage_key, "Failed to remove orphaned upload");
            }
            return Err(e.into());
        }
    };

    Activity::new(&state, caller.tenant_id(), Some(caller.id()), "document.version")
        .resource("document", id)
        .client(&client)
        .metadata(serde_json::json!({ "version": document.current_version }))
        .record(&state);
    Ok(response::created(DocumentView::from(document)))
}

async fn versions(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let document = load_document(&state, &caller, id, AccessLevel::View).await?;
    let mut versions = document.versions;
    versions.sort_by(|a, b| b.version.cmp(&a.version));
    Ok(response::ok(versions))
}

async fn restore_version(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    client: ClientInfo,
    ApiPath((id, version)): ApiPath<(Uuid, u32)>,
) -> ApiResult<impl IntoResponse> {
    let document = load_document(&state, &caller, id, AccessLevel::Edit).await?;
    let target = document
        .version(version)
        .ok_or_else(|| VellumError::not_found("version", version))?;
    if version == document.current_version {
        return Err(VellumError::validation("This version is already the current version").into());
    }

    let restored = target.restore_as(caller.id());
    let document = state
        .documents
        .add_version(caller.tenant_id(), id, restored)
        .await?;

    info!(
        tenant_id = %caller.tenant_id(),
        document_id = %id,
        from = version,
        to = document.current_version,
        "Document version restored"
    );
    Activity::new(&state, caller.tenant_id(), Some(caller.id()), "document.restore")
        .resource("document", id)
        .client(&client)
        .metadata(serde_json::json!({
            "restored_from": version,
            "version": document.current_version,
        }))
        .record(&state);
    Ok(response::ok(DocumentView::from(document)))
}

#[derive(Debug, Serialize)]
pub struct DownloadLink {
    pub url: String,
    pub file_name: String,
    pub mime_type: String,
    pub file_size: u64,
    pub expires_in: u64,
}

async fn download(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    client: ClientInfo,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let document = load_document(&state, &caller, id, AccessLevel::View).await?;

    state
        .documents
        .increment_download_count(caller.tenant_id(), id)
        .await?;
    let url = state
        .store
        .presign_get(&document.storage_key, state.presign_ttl())
        .await?;

    Activity::new(&state, caller.tenant_id(), Some(caller.id()), "document.download")
        .resource("document", id)
        .client(&client)
        .record(&state);
    Ok(response::ok(DownloadLink {
        url,
        file_name: document.file_name,
        mime_type: document.mime_type,
        file_size: document.file_size,
        expires_in: state.settings.presign_ttl_secs,
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ShareRequest {
    pub user_id: Uuid,
    pub permission: SharePermission,
}

async fn share(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    client: ClientInfo,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(req): ValidatedJson<ShareRequest>,
) -> ApiResult<impl IntoResponse> {
    let document = load_document(&state, &caller, id, AccessLevel::Share).await?;

    if req.user_id == document.owner_id {
        return Err(field_error("user_id", "The owner already has full access"));
    }
    if req.user_id == caller.id() {
        return Err(field_error("user_id", "You cannot change your own access"));
    }
    let recipient = state.users.get_by_id(caller.tenant_id(), req.user_id).await?;
    if !recipient.is_active {
        return Err(field_error("user_id", "User is not active"));
    }

    let mut shares = document.shared_with.clone();
    let now = Utc::now();
    if !upsert_share(&mut shares, recipient.id, req.permission, caller.id(), now) {
        return Ok(response::ok(DocumentView::from(document)));
    }
    let document = state.documents.set_shares(caller.tenant_id(), id, shares).await?;

    let sharer = caller.user.full_name();
    notify::notify(
        &state,
        caller.tenant_id(),
        recipient.id,
        NewNotification {
            kind: NotificationKind::DocumentShared,
            title: "Document shared with you".into(),
            body: format!(
                "{sharer} shared \"{}\" with you ({} access)",
                document.title, req.permission
            ),
            subject: Some(NotificationSubject::Document(id)),
        },
    )
    .await;

    let recipient_name = recipient.full_name();
    send_mail(
        &state,
        templates::document_shared(
            &Recipient {
                email: &recipient.email,
                name: &recipient_name,
            },
            &sharer,
            &document.title,
            req.permission.as_str(),
            &state.app_url(&format!("/documents/{id}")),
        ),
    );

    Activity::new(&state, caller.tenant_id(), Some(caller.id()), "document.share")
        .resource("document", id)
        .client(&client)
        .metadata(serde_json::json!({
            "user_id": recipient.id,
            "permission": req.permission,
        }))
        .record(&state);
    Ok(response::ok(DocumentView::from(document)))
}

async fn unshare(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    client: ClientInfo,
    ApiPath((id, user_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<impl IntoResponse> {
    let document = load_document(&state, &caller, id, AccessLevel::Share).await?;

    let mut shares = document.shared_with;
    if !remove_share(&mut shares, user_id) {
        return Err(VellumError::not_found("share", user_id).into());
    }
    let document = state.documents.set_shares(caller.tenant_id(), id, shares).await?;

    Activity::new(&state, caller.tenant_id(), Some(caller.id()), "document.unshare")
        .resource("document", id)
        .client(&client)
        .metadata(serde_json::json!({ "user_id": user_id }))
        .record(&state);
    Ok(response::ok(DocumentView::from(document)))
}

async fn copy(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    client: ClientInfo,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let source = load_document(&state, &caller, id, AccessLevel::View).await?;
    check_quota(&state, &caller.tenant, source.file_size).await?;

    let new_id = Uuid::new_v4();
    let storage_key = document_key(caller.tenant_id(), new_id, 1, &source.file_name);
    state.store.copy(&source.storage_key, &storage_key).await?;

    let created = state
        .documents
        .create(CreateDocument {
            id: new_id,
            tenant_id: caller.tenant_id(),
            owner_id: caller.id(),
            title: format!("{} (Copy)", source.title),
            description: source.description,
            file_name: source.file_name,
            storage_key: storage_key.clone(),
            file_size: source.file_size,
            mime_type: source.mime_type,
            tags: source.tags,
        })
        .await;
    let document = match created {
        Ok(document) => document,
        Err(e) => {
            if let Err(cleanup) = state.store.delete(&storage_key).await {
                warn!(error = %cleanup, key = %storage_key, "Failed to remove orphaned copy");
            }
            return Err(e.into());
        }
    };

    Activity::new(&state, caller.tenant_id(), Some(caller.id()), "document.copy")
        .resource("document", new_id)
        .client(&client)
        .metadata(serde_json::json!({ "source_id": id }))
        .record(&state);
    Ok(response::created(DocumentView::from(document)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_trimmed_lowercased_and_deduplicated() {
        assert_eq!(
            parse_tags(" Finance, q3 ,finance,, Q3").unwrap(),
            ["finance", "q3"]
        );
    }

    #[test]
    fn too_many_tags_are_rejected() {
        let raw = (0..21).map(|i| format!("t{i}")).collect::<Vec<_>>().join(",");
        assert!(parse_tags(&raw).is_err());
    }

    #[test]
    fn mime_parameters_are_stripped() {
        assert_eq!(normalise_mime(Some("Text/Plain; charset=utf-8")), "text/plain");
        assert_eq!(normalise_mime(None), "application/octet-stream");
    }
}
