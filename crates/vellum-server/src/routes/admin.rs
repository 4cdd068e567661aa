//! `/admin` routes. Every handler takes [`AdminUser`]; these are the
//! only routes that read across tenants.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{delete, get, patch};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;
use validator::{Validate, ValidationError};
use vellum_core::error::VellumError;
use vellum_core::models::activity::ActivityFilter;
use vellum_core::models::document::{format_file_size, remove_share};
use vellum_core::models::tenant::{CreateTenant, UpdateTenant};
use vellum_core::repository::{
    ActivityLogRepository, DocumentRepository, StatsRepository, TenantRepository, UserRepository,
};
use vellum_storage::ObjectInfo;
use vellum_storage::key::tenant_prefix;

use crate::activity::Activity;
use crate::error::ApiResult;
use crate::extract::{ApiPath, ApiQuery, ValidatedJson, ValidatedQuery};
use crate::middleware::{AdminUser, ClientInfo};
use crate::response::{self, PageQuery};
use crate::state::AppState;
use crate::views::{DocumentView, UserView, double_option};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/stats", get(stats))
        .route("/tenants", get(list_tenants).post(create_tenant))
        .route("/tenants/{id}", patch(update_tenant))
        .route("/tenants/{id}/storage", get(tenant_storage))
        .route("/users", get(list_users))
        .route("/users/{id}", delete(purge_user))
        .route("/documents", get(list_documents))
        .route("/documents/{id}/purge", delete(purge_document))
        .route("/activity", get(list_activity))
}

async fn stats(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> ApiResult<impl IntoResponse> {
    Ok(response::ok(state.stats.platform_stats().await?))
}

// ---------------------------------------------------------------------------
// Tenants
// ---------------------------------------------------------------------------

fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    let valid = !slug.is_empty()
        && slug.len() <= 63
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("slug").with_message(
            "slug must be lowercase letters, digits and inner hyphens (max 63)".into(),
        ))
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTenantRequest {
    #[validate(length(min = 1, max = 100, message = "name must be 1 to 100 characters"))]
    pub name: String,
    #[validate(custom(function = "validate_slug"))]
    pub slug: String,
    pub storage_quota_bytes: Option<u64>,
    pub settings: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTenantRequest {
    #[validate(length(min = 1, max = 100, message = "name must be 1 to 100 characters"))]
    pub name: Option<String>,
    pub is_active: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub storage_quota_bytes: Option<Option<u64>>,
    pub settings: Option<serde_json::Value>,
}

async fn list_tenants(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ValidatedQuery(page): ValidatedQuery<PageQuery>,
) -> ApiResult<impl IntoResponse> {
    Ok(response::paginated(
        state.tenants.list(page.pagination()).await?,
    ))
}

async fn create_tenant(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    client: ClientInfo,
    ValidatedJson(req): ValidatedJson<CreateTenantRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.settings.as_ref().is_some_and(|s| !s.is_object()) {
        return Err(VellumError::validation("settings must be an object").into());
    }
    let tenant = state
        .tenants
        .create(CreateTenant {
            name: req.name.trim().to_string(),
            slug: req.slug,
            storage_quota_bytes: req.storage_quota_bytes,
            settings: req.settings,
        })
        .await?;

    info!(tenant_id = %tenant.id, slug = %tenant.slug, "Tenant created");
    Activity::new(&state, tenant.id, Some(admin.id()), "tenant.create")
        .resource("tenant", tenant.id)
        .client(&client)
        .record(&state);
    Ok(response::created(tenant))
}

async fn update_tenant(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    client: ClientInfo,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateTenantRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.settings.as_ref().is_some_and(|s| !s.is_object()) {
        return Err(VellumError::validation("settings must be an object").into());
    }
    let tenant = state
        .tenants
        .update(
            id,
            UpdateTenant {
                name: req.name.map(|n| n.trim().to_string()),
                is_active: req.is_active,
                storage_quota_bytes: req.storage_quota_bytes,
                settings: req.settings,
            },
        )
        .await?;

    info!(tenant_id = %id, is_active = tenant.is_active, "Tenant updated");
    Activity::new(&state, id, Some(admin.id()), "tenant.update")
        .resource("tenant", id)
        .client(&client)
        .record(&state);
    Ok(response::ok(tenant))
}

#[derive(Debug, Serialize)]
pub struct StorageUsage {
    pub tenant_id: Uuid,
    pub object_count: usize,
    pub total_bytes: u64,
    pub total_formatted: String,
    pub objects: Vec<ObjectInfo>,
}

async fn tenant_storage(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let tenant = state.tenants.get_by_id(id).await?;
    let objects = state.store.list(&tenant_prefix(tenant.id)).await?;
    let total_bytes = objects.iter().map(|o| o.size).sum();

    Ok(response::ok(StorageUsage {
        tenant_id: tenant.id,
        object_count: objects.len(),
        total_bytes,
        total_formatted: format_file_size(total_bytes),
        objects,
    }))
}

// ---------------------------------------------------------------------------
// Users and documents
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct TenantQuery {
    pub tenant_id: Option<Uuid>,
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ValidatedQuery(page): ValidatedQuery<PageQuery>,
    ApiQuery(query): ApiQuery<TenantQuery>,
) -> ApiResult<impl IntoResponse> {
    let result = state
        .users
        .list_all(query.tenant_id, page.pagination())
        .await?;
    Ok(response::paginated(result.map(UserView::from)))
}

#[derive(Debug, Default, Serialize)]
pub struct UserPurgeReport {
    pub user_id: Uuid,
    pub purged_documents: usize,
    pub removed_shares: usize,
    pub deleted_objects: usize,
    pub failed_objects: usize,
}

/// Hard delete a user. Documents they own are purged along with their
/// stored objects; their share entries on other documents are dropped.
async fn purge_user(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    client: ClientInfo,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    if id == admin.id() {
        return Err(VellumError::validation("You cannot delete your own account").into());
    }
    let user = state.users.find_by_id(id).await?;
    let mut report = UserPurgeReport {
        user_id: id,
        ..UserPurgeReport::default()
    };

    for document in state.documents.list_involving(user.tenant_id, id).await? {
        if document.owner_id == id {
            let keys = document.storage_keys();
            state.documents.purge(document.id).await?;
            let deleted = delete_objects(&state, document.id, &keys).await;
            report.purged_documents += 1;
            report.deleted_objects += deleted;
            report.failed_objects += keys.len() - deleted;
        } else {
            let mut shares = document.shared_with;
            if remove_share(&mut shares, id) {
                state
                    .documents
                    .set_shares(user.tenant_id, document.id, shares)
                    .await?;
                report.removed_shares += 1;
            }
        }
    }
    state.users.purge(id).await?;

    warn!(
        admin_id = %admin.id(),
        user_id = %id,
        tenant_id = %user.tenant_id,
        purged_documents = report.purged_documents,
        removed_shares = report.removed_shares,
        "User purged"
    );
    Activity::new(&state, user.tenant_id, Some(admin.id()), "user.purge")
        .resource("user", id)
        .client(&client)
        .metadata(serde_json::json!({
            "email": user.email,
            "purged_documents": report.purged_documents,
        }))
        .record(&state);
    Ok(response::ok(report))
}

#[derive(Debug, Deserialize)]
pub struct AdminDocumentQuery {
    pub tenant_id: Option<Uuid>,
    #[serde(default = "include_deleted_default")]
    pub include_deleted: bool,
}

fn include_deleted_default() -> bool {
    true
}

async fn list_documents(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ValidatedQuery(page): ValidatedQuery<PageQuery>,
    ApiQuery(query): ApiQuery<AdminDocumentQuery>,
) -> ApiResult<impl IntoResponse> {
    let result = state
        .documents
        .list_all(query.tenant_id, query.include_deleted, page.pagination())
        .await?;
    Ok(response::paginated(result.map(DocumentView::from)))
}

#[derive(Debug, Serialize)]
pub struct PurgeReport {
    pub document_id: Uuid,
    pub deleted_objects: usize,
    pub failed_objects: usize,
}

/// Delete stored objects one by one, returning how many went. Failures
/// are logged and left behind.
async fn delete_objects(state: &AppState, document_id: Uuid, keys: &[String]) -> usize {
    let mut deleted = 0;
    for key in keys {
        match state.store.delete(key).await {
            Ok(()) => deleted += 1,
            Err(e) => warn!(error = %e, %key, %document_id, "Failed to delete stored object"),
        }
    }
    deleted
}

/// Hard delete: the record, its comments and every stored version.
/// Object-store failures are logged and reported, not retried.
async fn purge_document(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    client: ClientInfo,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let document = state.documents.find_by_id(id).await?;
    let keys = document.storage_keys();
    state.documents.purge(id).await?;
    let deleted_objects = delete_objects(&state, id, &keys).await;

    warn!(
        admin_id = %admin.id(),
        document_id = %id,
        tenant_id = %document.tenant_id,
        deleted_objects,
        "Document purged"
    );
    Activity::new(&state, document.tenant_id, Some(admin.id()), "document.purge")
        .resource("document", id)
        .client(&client)
        .metadata(serde_json::json!({ "title": document.title, "objects": keys.len() }))
        .record(&state);
    Ok(response::ok(PurgeReport {
        document_id: id,
        deleted_objects,
        failed_objects: keys.len() - deleted_objects,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct ActivityQuery {
    pub tenant_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub action: Option<String>,
}

async fn list_activity(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ValidatedQuery(page): ValidatedQuery<PageQuery>,
    ApiQuery(query): ApiQuery<ActivityQuery>,
) -> ApiResult<impl IntoResponse> {
    let filter = ActivityFilter {
        tenant_id: query.tenant_id,
        user_id: query.user_id,
        action: query.action,
    };
    Ok(response::paginated(
        state.activity.list(filter, page.pagination()).await?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_are_lowercase_words() {
        assert!(validate_slug("acme").is_ok());
        assert!(validate_slug("acme-2").is_ok());
        assert!(validate_slug("Acme").is_err());
        assert!(validate_slug("-acme").is_err());
        assert!(validate_slug("ac me").is_err());
        assert!(validate_slug("").is_err());
    }
}
