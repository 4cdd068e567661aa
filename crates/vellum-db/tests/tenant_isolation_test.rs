//! Every tenant-scoped read and write must miss records of another tenant.

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;
use vellum_core::error::VellumError;
use vellum_core::models::comment::CreateComment;
use vellum_core::models::document::{CreateDocument, DocumentFilter, UpdateDocument};
use vellum_core::models::message::{CreateMessage, MessageCategory, MessagePriority};
use vellum_core::models::notification::{CreateNotification, NotificationKind};
use vellum_core::models::tenant::CreateTenant;
use vellum_core::models::user::{CreateUser, UserFilter, UserRole};
use vellum_core::repository::{
    CommentRepository, DocumentRepository, MessageRepository, NotificationRepository,
    Pagination, TenantRepository, UserRepository,
};
use vellum_db::repository::{
    SurrealCommentRepository, SurrealDocumentRepository, SurrealMessageRepository,
    SurrealNotificationRepository, SurrealTenantRepository, SurrealUserRepository,
};

struct World {
    db: Surreal<Db>,
    t1: Uuid,
    t2: Uuid,
    alice: Uuid,
}

async fn setup() -> World {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    vellum_db::run_migrations(&db).await.unwrap();

    let tenants = SurrealTenantRepository::new(db.clone());
    let mut ids = Vec::new();
    for slug in ["one", "two"] {
        let t = tenants
            .create(CreateTenant {
                name: slug.into(),
                slug: slug.into(),
                storage_quota_bytes: None,
                settings: None,
            })
            .await
            .unwrap();
        ids.push(t.id);
    }

    let alice = SurrealUserRepository::new(db.clone())
        .create(CreateUser {
            tenant_id: ids[0],
            email: "alice@one.test".into(),
            password: "Password123".into(),
            first_name: "Alice".into(),
            last_name: "One".into(),
            role: UserRole::User,
            email_verification_token_hash: None,
        })
        .await
        .unwrap();

    World {
        db,
        t1: ids[0],
        t2: ids[1],
        alice: alice.id,
    }
}

fn is_not_found<T: std::fmt::Debug>(result: Result<T, VellumError>) -> bool {
    matches!(result, Err(VellumError::NotFound { .. }))
}

#[tokio::test]
async fn users_are_invisible_across_tenants() {
    let w = setup().await;
    let users = SurrealUserRepository::new(w.db.clone());

    assert!(is_not_found(users.get_by_id(w.t2, w.alice).await));
    assert!(is_not_found(users.get_by_email(w.t2, "alice@one.test").await));
    let listed = users
        .list(w.t2, UserFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(listed.total, 0);

    // Same email may exist in another tenant.
    users
        .create(CreateUser {
            tenant_id: w.t2,
            email: "alice@one.test".into(),
            password: "Password123".into(),
            first_name: "Other".into(),
            last_name: "Alice".into(),
            role: UserRole::User,
            email_verification_token_hash: None,
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn documents_are_invisible_across_tenants() {
    let w = setup().await;
    let docs = SurrealDocumentRepository::new(w.db.clone());
    let id = Uuid::new_v4();
    docs.create(CreateDocument {
        id,
        tenant_id: w.t1,
        owner_id: w.alice,
        title: "Secret".into(),
        description: None,
        file_name: "s.txt".into(),
        storage_key: "k".into(),
        file_size: 1,
        mime_type: "text/plain".into(),
        tags: Vec::new(),
    })
    .await
    .unwrap();

    assert!(is_not_found(docs.get_by_id(w.t2, id).await));
    assert!(is_not_found(
        docs.update(w.t2, id, UpdateDocument::default()).await
    ));
    assert!(is_not_found(docs.soft_delete(w.t2, id, w.alice).await));
    let listed = docs
        .list_accessible(w.t2, w.alice, DocumentFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(listed.total, 0);

    // The write through the wrong tenant changed nothing.
    assert!(!docs.get_by_id(w.t1, id).await.unwrap().is_deleted);
}

#[tokio::test]
async fn comments_notifications_and_messages_are_scoped() {
    let w = setup().await;

    let comments = SurrealCommentRepository::new(w.db.clone());
    let comment = comments
        .create(CreateComment {
            tenant_id: w.t1,
            document_id: Uuid::new_v4(),
            author_id: w.alice,
            content: "hello".into(),
            parent_id: None,
        })
        .await
        .unwrap();
    assert!(is_not_found(comments.get_by_id(w.t2, comment.id).await));
    assert!(comments
        .list_for_document(w.t2, comment.document_id)
        .await
        .unwrap()
        .is_empty());

    let notifications = SurrealNotificationRepository::new(w.db.clone());
    let n = notifications
        .create(CreateNotification {
            tenant_id: w.t1,
            recipient_id: w.alice,
            kind: NotificationKind::System,
            title: "t".into(),
            body: "b".into(),
            subject: None,
        })
        .await
        .unwrap();
    assert!(is_not_found(notifications.mark_read(w.t2, w.alice, n.id).await));
    assert_eq!(notifications.unread_count(w.t2, w.alice).await.unwrap(), 0);
    assert_eq!(notifications.unread_count(w.t1, w.alice).await.unwrap(), 1);

    let messages = SurrealMessageRepository::new(w.db.clone());
    let m = messages
        .create(CreateMessage {
            tenant_id: w.t1,
            sender_id: w.alice,
            subject: "help".into(),
            body: "please".into(),
            category: MessageCategory::General,
            priority: MessagePriority::Normal,
        })
        .await
        .unwrap();
    assert!(is_not_found(messages.get_by_id(w.t2, m.id).await));
    let listed = messages
        .list_for_sender(w.t2, w.alice, Pagination::default())
        .await
        .unwrap();
    assert_eq!(listed.total, 0);
}
