//! Integration tests for comments, notifications, support messages and
//! the activity log using in-memory SurrealDB.

use chrono::{Duration, Utc};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;
use vellum_core::models::activity::{ActivityFilter, CreateActivityLog};
use vellum_core::models::comment::{CreateComment, upsert_reaction};
use vellum_core::models::message::{
    CreateMessage, MessageCategory, MessageFilter, MessagePriority, MessageResponse,
    MessageStatus, UpdateMessage,
};
use vellum_core::models::notification::{
    CreateNotification, NotificationKind, NotificationSubject,
};
use vellum_core::repository::{
    ActivityLogRepository, CommentRepository, MessageRepository, NotificationRepository,
    Pagination,
};
use vellum_db::repository::{
    SurrealActivityLogRepository, SurrealCommentRepository, SurrealMessageRepository,
    SurrealNotificationRepository,
};

async fn db() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    vellum_db::run_migrations(&db).await.unwrap();
    db
}

#[tokio::test]
async fn comment_lifecycle() {
    let repo = SurrealCommentRepository::new(db().await);
    let (tenant, document, author) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    let root = repo
        .create(CreateComment {
            tenant_id: tenant,
            document_id: document,
            author_id: author,
            content: "First!".into(),
            parent_id: None,
        })
        .await
        .unwrap();
    let reply = repo
        .create(CreateComment {
            tenant_id: tenant,
            document_id: document,
            author_id: Uuid::new_v4(),
            content: "Reply".into(),
            parent_id: Some(root.id),
        })
        .await
        .unwrap();
    assert!(reply.is_reply());
    assert_eq!(reply.parent_id, Some(root.id));

    let edited = repo
        .update_content(tenant, root.id, "First, edited".into())
        .await
        .unwrap();
    assert!(edited.is_edited);
    assert!(edited.edited_at.is_some());
    assert_eq!(edited.content, "First, edited");

    let mut reactions = edited.reactions.clone();
    upsert_reaction(&mut reactions, author, "👍".into(), Utc::now());
    upsert_reaction(&mut reactions, author, "🎉".into(), Utc::now());
    let reacted = repo.set_reactions(tenant, root.id, reactions).await.unwrap();
    assert_eq!(reacted.reactions.len(), 1);
    assert_eq!(reacted.reactions[0].emoji, "🎉");

    repo.soft_delete(tenant, reply.id).await.unwrap();
    let listed = repo.list_for_document(tenant, document).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, root.id);
    assert!(repo.get_by_id(tenant, reply.id).await.is_err());
}

#[tokio::test]
async fn notifications_read_and_delete() {
    let repo = SurrealNotificationRepository::new(db().await);
    let (tenant, me, other) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let document = Uuid::new_v4();

    let mut created = Vec::new();
    for recipient in [me, me, me, other] {
        created.push(
            repo.create(CreateNotification {
                tenant_id: tenant,
                recipient_id: recipient,
                kind: NotificationKind::DocumentShared,
                title: "Shared".into(),
                body: "A document was shared with you".into(),
                subject: Some(NotificationSubject::Document(document)),
            })
            .await
            .unwrap(),
        );
    }
    assert_eq!(
        created[0].subject,
        Some(NotificationSubject::Document(document))
    );
    assert_eq!(repo.unread_count(tenant, me).await.unwrap(), 3);

    let read = repo.mark_read(tenant, me, created[0].id).await.unwrap();
    assert!(read.is_read);
    assert!(read.read_at.is_some());
    assert_eq!(repo.unread_count(tenant, me).await.unwrap(), 2);

    // Someone else's notification is not mine to touch.
    assert!(repo.mark_read(tenant, me, created[3].id).await.is_err());
    assert!(repo.delete(tenant, me, created[3].id).await.is_err());

    let unread = repo
        .list_for_recipient(tenant, me, true, Pagination::default())
        .await
        .unwrap();
    assert_eq!(unread.total, 2);

    assert_eq!(repo.mark_all_read(tenant, me).await.unwrap(), 2);
    assert_eq!(repo.unread_count(tenant, me).await.unwrap(), 0);
    assert_eq!(repo.unread_count(tenant, other).await.unwrap(), 1);

    repo.delete(tenant, me, created[1].id).await.unwrap();
    let all = repo
        .list_for_recipient(tenant, me, false, Pagination::default())
        .await
        .unwrap();
    assert_eq!(all.total, 2);
}

#[tokio::test]
async fn support_message_flow() {
    let repo = SurrealMessageRepository::new(db().await);
    let (tenant, sender, admin) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    let message = repo
        .create(CreateMessage {
            tenant_id: tenant,
            sender_id: sender,
            subject: "Cannot upload".into(),
            body: "Upload fails for large files".into(),
            category: MessageCategory::Technical,
            priority: MessagePriority::High,
        })
        .await
        .unwrap();
    assert_eq!(message.status, MessageStatus::Open);
    assert!(message.response.is_none());

    let responded = repo
        .update(
            tenant,
            message.id,
            UpdateMessage {
                status: Some(MessageStatus::InProgress),
                priority: None,
                response: Some(MessageResponse {
                    responder_id: admin,
                    body: "Looking into it".into(),
                    responded_at: Utc::now(),
                }),
            },
        )
        .await
        .unwrap();
    assert_eq!(responded.status, MessageStatus::InProgress);
    assert_eq!(responded.priority, MessagePriority::High);
    let response = responded.response.unwrap();
    assert_eq!(response.responder_id, admin);
    assert_eq!(response.body, "Looking into it");

    let inbox = repo
        .list_all(
            MessageFilter {
                status: Some(MessageStatus::InProgress),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(inbox.total, 1);

    let open = repo
        .list_all(
            MessageFilter {
                status: Some(MessageStatus::Open),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(open.total, 0);

    assert_eq!(repo.find_by_id(message.id).await.unwrap().id, message.id);
}

#[tokio::test]
async fn activity_log_filters_and_purges_expired() {
    let repo = SurrealActivityLogRepository::new(db().await);
    let (tenant, user) = (Uuid::new_v4(), Uuid::new_v4());
    let now = Utc::now();

    for (action, expires_at) in [
        ("auth.login", now - Duration::days(1)),
        ("document.upload", now + Duration::days(90)),
        ("document.download", now + Duration::days(90)),
    ] {
        repo.append(CreateActivityLog {
            tenant_id: tenant,
            user_id: Some(user),
            action: action.into(),
            resource_type: Some("document".into()),
            resource_id: None,
            ip_address: Some("10.0.0.1".into()),
            user_agent: None,
            metadata: Some(serde_json::json!({ "size": 10 })),
            expires_at,
        })
        .await
        .unwrap();
    }

    let uploads = repo
        .list(
            ActivityFilter {
                tenant_id: Some(tenant),
                action: Some("document.upload".into()),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(uploads.total, 1);
    assert_eq!(uploads.items[0].metadata["size"], 10);

    assert_eq!(repo.purge_expired(now).await.unwrap(), 1);
    let remaining = repo
        .list(ActivityFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(remaining.total, 2);
}
