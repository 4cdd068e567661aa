//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Tenant-scoped methods take a
//! `tenant_id` and must include it in every query they issue. The only
//! unscoped methods are identity resolution for authentication
//! (`find_by_*`) and the cross-tenant admin surface (`*_all`, `purge`);
//! their names say so.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::VellumResult;
use crate::models::{
    activity::{ActivityFilter, ActivityLog, CreateActivityLog},
    comment::{Comment, CreateComment, Reaction},
    document::{CreateDocument, Document, DocumentFilter, NewVersion, ShareEntry, UpdateDocument},
    message::{CreateMessage, Message, MessageFilter, UpdateMessage},
    notification::{CreateNotification, Notification},
    tenant::{CreateTenant, Tenant, UpdateTenant},
    user::{CreateUser, UpdateUser, User, UserFilter},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Pagination {
    /// Build from a 1-based page number.
    pub fn page(page: u64, limit: u64) -> Self {
        Self {
            offset: page.saturating_sub(1).saturating_mul(limit),
            limit,
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 20,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

impl<T> PaginatedResult<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginatedResult<U> {
        PaginatedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            offset: self.offset,
            limit: self.limit,
        }
    }
}

// ---------------------------------------------------------------------------
// Tenant (global scope)
// ---------------------------------------------------------------------------

pub trait TenantRepository: Send + Sync {
    fn create(&self, input: CreateTenant) -> impl Future<Output = VellumResult<Tenant>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = VellumResult<Tenant>> + Send;
    fn get_by_slug(&self, slug: &str) -> impl Future<Output = VellumResult<Tenant>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateTenant,
    ) -> impl Future<Output = VellumResult<Tenant>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = VellumResult<PaginatedResult<Tenant>>> + Send;
}

// ---------------------------------------------------------------------------
// Tenant-scoped repositories
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    fn create(&self, input: CreateUser) -> impl Future<Output = VellumResult<User>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = VellumResult<User>> + Send;
    fn get_by_email(
        &self,
        tenant_id: Uuid,
        email: &str,
    ) -> impl Future<Output = VellumResult<User>> + Send;
    fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdateUser,
    ) -> impl Future<Output = VellumResult<User>> + Send;
    /// Re-hash and store a new password, stamp `password_changed_at`,
    /// and clear any reset token and lockout.
    fn set_password(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        password: &str,
    ) -> impl Future<Output = VellumResult<User>> + Send;
    fn list(
        &self,
        tenant_id: Uuid,
        filter: UserFilter,
        pagination: Pagination,
    ) -> impl Future<Output = VellumResult<PaginatedResult<User>>> + Send;

    /// Identity resolution from a token subject. Unscoped: the tenant is
    /// only known once the user is loaded.
    fn find_by_id(&self, id: Uuid) -> impl Future<Output = VellumResult<User>> + Send;
    /// Unscoped lookup of an email-verification token hash.
    fn find_by_verification_token(
        &self,
        token_hash: &str,
    ) -> impl Future<Output = VellumResult<User>> + Send;
    /// Unscoped lookup of an unexpired password-reset token hash.
    fn find_by_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> impl Future<Output = VellumResult<User>> + Send;

    /// Admin surface: active admins across every tenant.
    fn list_active_admins(&self) -> impl Future<Output = VellumResult<Vec<User>>> + Send;
    /// Admin surface: users of one tenant or of all tenants.
    fn list_all(
        &self,
        tenant_id: Option<Uuid>,
        pagination: Pagination,
    ) -> impl Future<Output = VellumResult<PaginatedResult<User>>> + Send;
    /// Admin surface: hard delete.
    fn purge(&self, id: Uuid) -> impl Future<Output = VellumResult<()>> + Send;
}

pub trait DocumentRepository: Send + Sync {
    /// Create a document together with version 1.
    fn create(&self, input: CreateDocument)
    -> impl Future<Output = VellumResult<Document>> + Send;
    /// Direct id lookup. Soft-deleted documents are still returned;
    /// callers decide whether they are visible.
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = VellumResult<Document>> + Send;
    /// Documents owned by or shared with `user_id`, excluding
    /// soft-deleted ones.
    fn list_accessible(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        filter: DocumentFilter,
        pagination: Pagination,
    ) -> impl Future<Output = VellumResult<PaginatedResult<Document>>> + Send;
    fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdateDocument,
    ) -> impl Future<Output = VellumResult<Document>> + Send;
    /// Append a version numbered one past the highest existing version
    /// and mirror it onto the document.
    fn add_version(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        version: NewVersion,
    ) -> impl Future<Output = VellumResult<Document>> + Send;
    fn set_shares(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        shares: Vec<ShareEntry>,
    ) -> impl Future<Output = VellumResult<Document>> + Send;
    fn increment_download_count(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = VellumResult<()>> + Send;
    fn soft_delete(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        deleted_by: Uuid,
    ) -> impl Future<Output = VellumResult<()>> + Send;
    /// Sum of current-version sizes of live documents in a tenant.
    fn storage_used(&self, tenant_id: Uuid) -> impl Future<Output = VellumResult<u64>> + Send;

    /// Admin surface: direct lookup across tenants.
    fn find_by_id(&self, id: Uuid) -> impl Future<Output = VellumResult<Document>> + Send;
    /// Admin surface: every document, soft-deleted ones included.
    fn list_all(
        &self,
        tenant_id: Option<Uuid>,
        include_deleted: bool,
        pagination: Pagination,
    ) -> impl Future<Output = VellumResult<PaginatedResult<Document>>> + Send;
    /// Every document owned by or shared with `user_id`, soft-deleted
    /// ones included. Used when purging a user.
    fn list_involving(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = VellumResult<Vec<Document>>> + Send;
    /// Admin surface: hard delete.
    fn purge(&self, id: Uuid) -> impl Future<Output = VellumResult<()>> + Send;
}

pub trait CommentRepository: Send + Sync {
    fn create(&self, input: CreateComment) -> impl Future<Output = VellumResult<Comment>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = VellumResult<Comment>> + Send;
    /// Live comments of a document, oldest first.
    fn list_for_document(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
    ) -> impl Future<Output = VellumResult<Vec<Comment>>> + Send;
    fn update_content(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        content: String,
    ) -> impl Future<Output = VellumResult<Comment>> + Send;
    fn set_reactions(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        reactions: Vec<Reaction>,
    ) -> impl Future<Output = VellumResult<Comment>> + Send;
    fn soft_delete(&self, tenant_id: Uuid, id: Uuid)
    -> impl Future<Output = VellumResult<()>> + Send;
}

pub trait NotificationRepository: Send + Sync {
    fn create(
        &self,
        input: CreateNotification,
    ) -> impl Future<Output = VellumResult<Notification>> + Send;
    fn list_for_recipient(
        &self,
        tenant_id: Uuid,
        recipient_id: Uuid,
        unread_only: bool,
        pagination: Pagination,
    ) -> impl Future<Output = VellumResult<PaginatedResult<Notification>>> + Send;
    fn unread_count(
        &self,
        tenant_id: Uuid,
        recipient_id: Uuid,
    ) -> impl Future<Output = VellumResult<u64>> + Send;
    fn mark_read(
        &self,
        tenant_id: Uuid,
        recipient_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = VellumResult<Notification>> + Send;
    /// Returns how many notifications changed.
    fn mark_all_read(
        &self,
        tenant_id: Uuid,
        recipient_id: Uuid,
    ) -> impl Future<Output = VellumResult<u64>> + Send;
    fn delete(
        &self,
        tenant_id: Uuid,
        recipient_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = VellumResult<()>> + Send;
}

pub trait MessageRepository: Send + Sync {
    fn create(&self, input: CreateMessage) -> impl Future<Output = VellumResult<Message>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = VellumResult<Message>> + Send;
    fn list_for_sender(
        &self,
        tenant_id: Uuid,
        sender_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = VellumResult<PaginatedResult<Message>>> + Send;
    fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdateMessage,
    ) -> impl Future<Output = VellumResult<Message>> + Send;

    /// Admin surface: direct lookup across tenants.
    fn find_by_id(&self, id: Uuid) -> impl Future<Output = VellumResult<Message>> + Send;
    /// Admin surface: support inbox across tenants.
    fn list_all(
        &self,
        filter: MessageFilter,
        pagination: Pagination,
    ) -> impl Future<Output = VellumResult<PaginatedResult<Message>>> + Send;
}

pub trait ActivityLogRepository: Send + Sync {
    /// Append-only: entries are never updated.
    fn append(
        &self,
        input: CreateActivityLog,
    ) -> impl Future<Output = VellumResult<ActivityLog>> + Send;
    /// Admin surface: optionally narrowed to one tenant.
    fn list(
        &self,
        filter: ActivityFilter,
        pagination: Pagination,
    ) -> impl Future<Output = VellumResult<PaginatedResult<ActivityLog>>> + Send;
    /// Delete entries whose `expires_at` is before `now`; returns the count.
    fn purge_expired(&self, now: DateTime<Utc>) -> impl Future<Output = VellumResult<u64>> + Send;
}

/// Platform-wide counters for the admin dashboard.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct PlatformStats {
    pub tenants: u64,
    pub users: u64,
    pub active_users: u64,
    pub documents: u64,
    pub deleted_documents: u64,
    pub storage_bytes: u64,
    pub open_messages: u64,
}

pub trait StatsRepository: Send + Sync {
    fn platform_stats(&self) -> impl Future<Output = VellumResult<PlatformStats>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_to_offset() {
        let p = Pagination::page(3, 20);
        assert_eq!(p.offset, 40);
        assert_eq!(p.limit, 20);

        let first = Pagination::page(0, 10);
        assert_eq!(first.offset, 0);
    }

    #[test]
    fn huge_page_saturates() {
        let p = Pagination::page(u64::MAX, 100);
        assert_eq!(p.offset, u64::MAX);
        assert_eq!(p.limit, 100);
    }
}
