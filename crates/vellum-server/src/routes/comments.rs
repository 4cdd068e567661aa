//! Comment routes. Listing and creation hang off a document
//! (`/documents/{id}/comments`); everything else addresses the comment
//! directly (`/comments/{id}`).

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, patch, put};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;
use vellum_core::error::VellumError;
use vellum_core::models::comment::{Comment, CreateComment, remove_reaction, upsert_reaction};
use vellum_core::models::document::{AccessLevel, Document};
use vellum_core::models::notification::{NotificationKind, NotificationSubject};
use vellum_core::repository::CommentRepository;

use crate::activity::Activity;
use crate::error::ApiResult;
use crate::extract::{ApiPath, ValidatedJson, not_blank};
use crate::middleware::{AuthUser, ClientInfo};
use crate::notify::{self, NewNotification};
use crate::response;
use crate::routes::documents::load_document;
use crate::state::AppState;
use crate::views::threads;

/// Routes nested under `/documents`.
pub fn document_router() -> Router<Arc<AppState>> {
    Router::new().route("/{id}/comments", get(list).post(create))
}

/// Routes nested under `/comments`.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/{id}", patch(edit).delete(remove))
        .route("/{id}/reactions", put(react).delete(unreact))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentRequest {
    #[validate(
        length(min = 1, max = 2000, message = "comment must be 1 to 2000 characters"),
        custom(function = "not_blank")
    )]
    pub content: String,
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct EditCommentRequest {
    #[validate(
        length(min = 1, max = 2000, message = "comment must be 1 to 2000 characters"),
        custom(function = "not_blank")
    )]
    pub content: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReactionRequest {
    #[validate(length(min = 1, max = 16, message = "emoji must be 1 to 16 characters"))]
    pub emoji: String,
}

/// A live comment of the caller's tenant together with its document,
/// which the caller must be able to view.
async fn load_comment(
    state: &AppState,
    caller: &AuthUser,
    id: Uuid,
) -> ApiResult<(Comment, Document)> {
    let comment = state.comments.get_by_id(caller.tenant_id(), id).await?;
    if comment.is_deleted {
        return Err(VellumError::not_found("comment", id).into());
    }
    let document = load_document(state, caller, comment.document_id, AccessLevel::View).await?;
    Ok((comment, document))
}

async fn list(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    ApiPath(document_id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    load_document(&state, &caller, document_id, AccessLevel::View).await?;
    let comments = state
        .comments
        .list_for_document(caller.tenant_id(), document_id)
        .await?;
    Ok(response::ok(threads(comments)))
}

async fn create(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    client: ClientInfo,
    ApiPath(document_id): ApiPath<Uuid>,
    ValidatedJson(req): ValidatedJson<CreateCommentRequest>,
) -> ApiResult<impl IntoResponse> {
    let document = load_document(&state, &caller, document_id, AccessLevel::View).await?;

    let parent = match req.parent_id {
        Some(parent_id) => {
            let parent = state.comments.get_by_id(caller.tenant_id(), parent_id).await?;
            if parent.is_deleted || parent.document_id != document_id {
                return Err(VellumError::not_found("comment", parent_id).into());
            }
            if parent.is_reply() {
                return Err(VellumError::validation("Replies cannot be nested").into());
            }
            Some(parent)
        }
        None => None,
    };

    let comment = state
        .comments
        .create(CreateComment {
            tenant_id: caller.tenant_id(),
            document_id,
            author_id: caller.id(),
            content: req.content.trim().to_string(),
            parent_id: parent.as_ref().map(|p| p.id),
        })
        .await?;

    let actor = caller.user.full_name();
    let subject = Some(NotificationSubject::Document(document_id));
    let mut notified = vec![caller.id()];

    if let Some(parent) = parent.as_ref().filter(|p| p.author_id != caller.id()) {
        notify::notify(
            &state,
            caller.tenant_id(),
            parent.author_id,
            NewNotification {
                kind: NotificationKind::CommentReply,
                title: "New reply to your comment".into(),
                body: format!("{actor} replied to your comment on \"{}\"", document.title),
                subject,
            },
        )
        .await;
        notified.push(parent.author_id);
    }
    if !notified.contains(&document.owner_id) {
        notify::notify(
            &state,
            caller.tenant_id(),
            document.owner_id,
            NewNotification {
                kind: NotificationKind::NewComment,
                title: "New comment on your document".into(),
                body: format!("{actor} commented on \"{}\"", document.title),
                subject,
            },
        )
        .await;
    }

    Activity::new(&state, caller.tenant_id(), Some(caller.id()), "comment.create")
        .resource("comment", comment.id)
        .client(&client)
        .metadata(serde_json::json!({ "document_id": document_id }))
        .record(&state);
    Ok(response::created(comment))
}

async fn edit(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(req): ValidatedJson<EditCommentRequest>,
) -> ApiResult<impl IntoResponse> {
    let (comment, _) = load_comment(&state, &caller, id).await?;
    if comment.author_id != caller.id() {
        return Err(VellumError::denied("Only the author can edit a comment").into());
    }
    let comment = state
        .comments
        .update_content(caller.tenant_id(), id, req.content.trim().to_string())
        .await?;
    Ok(response::ok(comment))
}

async fn remove(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    client: ClientInfo,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let (comment, document) = load_comment(&state, &caller, id).await?;
    if comment.author_id != caller.id() && document.owner_id != caller.id() {
        return Err(
            VellumError::denied("Only the author or the document owner can delete a comment")
                .into(),
        );
    }
    state.comments.soft_delete(caller.tenant_id(), id).await?;

    Activity::new(&state, caller.tenant_id(), Some(caller.id()), "comment.delete")
        .resource("comment", id)
        .client(&client)
        .record(&state);
    Ok(response::message("Comment deleted"))
}

async fn react(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(req): ValidatedJson<ReactionRequest>,
) -> ApiResult<impl IntoResponse> {
    let (comment, _) = load_comment(&state, &caller, id).await?;
    let mut reactions = comment.reactions;
    upsert_reaction(&mut reactions, caller.id(), req.emoji.trim().to_string(), Utc::now());
    let comment = state
        .comments
        .set_reactions(caller.tenant_id(), id, reactions)
        .await?;
    Ok(response::ok(comment))
}

async fn unreact(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let (comment, _) = load_comment(&state, &caller, id).await?;
    let mut reactions = comment.reactions.clone();
    if !remove_reaction(&mut reactions, caller.id()) {
        return Ok(response::ok(comment));
    }
    let comment = state
        .comments
        .set_reactions(caller.tenant_id(), id, reactions)
        .await?;
    Ok(response::ok(comment))
}
