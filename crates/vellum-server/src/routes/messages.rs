//! `/messages` routes: support tickets from users to the platform
//! admins.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;
use vellum_core::error::VellumError;
use vellum_core::models::message::{
    CreateMessage, Message, MessageCategory, MessageFilter, MessagePriority, MessageResponse,
    MessageStatus, UpdateMessage,
};
use vellum_core::models::notification::{NotificationKind, NotificationSubject};
use vellum_core::repository::{MessageRepository, UserRepository};
use vellum_mail::templates::{self, Recipient};

use crate::activity::Activity;
use crate::error::ApiResult;
use crate::extract::{ApiPath, ApiQuery, ValidatedJson, ValidatedQuery, not_blank};
use crate::middleware::{AdminUser, AuthUser, ClientInfo};
use crate::notify::{self, NewNotification, send_mail};
use crate::response::{self, PageQuery};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create).get(list_own))
        .route("/admin/inbox", get(inbox))
        .route("/{id}", get(show))
        .route("/{id}/respond", post(respond))
        .route("/{id}/status", patch(set_status))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMessageRequest {
    #[validate(
        length(min = 1, max = 200, message = "subject must be 1 to 200 characters"),
        custom(function = "not_blank")
    )]
    pub subject: String,
    #[validate(
        length(min = 1, max = 5000, message = "message must be 1 to 5000 characters"),
        custom(function = "not_blank")
    )]
    pub body: String,
    pub category: Option<MessageCategory>,
    pub priority: Option<MessagePriority>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RespondRequest {
    #[validate(
        length(min = 1, max = 5000, message = "response must be 1 to 5000 characters"),
        custom(function = "not_blank")
    )]
    pub response: String,
    pub status: Option<MessageStatus>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct StatusRequest {
    pub status: Option<MessageStatus>,
    pub priority: Option<MessagePriority>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InboxQuery {
    pub tenant_id: Option<Uuid>,
    pub status: Option<MessageStatus>,
    pub priority: Option<MessagePriority>,
}

async fn create(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    client: ClientInfo,
    ValidatedJson(req): ValidatedJson<CreateMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let message = state
        .messages
        .create(CreateMessage {
            tenant_id: caller.tenant_id(),
            sender_id: caller.id(),
            subject: req.subject.trim().to_string(),
            body: req.body.trim().to_string(),
            category: req.category.unwrap_or(MessageCategory::General),
            priority: req.priority.unwrap_or(MessagePriority::Normal),
        })
        .await?;

    match state.users.list_active_admins().await {
        Ok(admins) => {
            let recipients: Vec<(Uuid, Uuid)> = admins
                .iter()
                .filter(|a| a.id != caller.id())
                .map(|a| (a.id, a.tenant_id))
                .collect();
            let ids: Vec<Uuid> = recipients.iter().map(|(id, _)| *id).collect();
            let tenant_of = |id: Uuid| {
                recipients
                    .iter()
                    .find(|(admin_id, _)| *admin_id == id)
                    .map(|(_, tenant_id)| *tenant_id)
                    .unwrap_or(caller.tenant_id())
            };
            let notification = NewNotification {
                kind: NotificationKind::SupportMessage,
                title: "New support message".into(),
                body: format!(
                    "{} ({}): {}",
                    caller.user.full_name(),
                    caller.tenant.name,
                    message.subject
                ),
                subject: Some(NotificationSubject::Message(message.id)),
            };
            notify::fan_out(&state, tenant_of, &ids, &notification).await;
        }
        Err(e) => warn!(error = %e, message_id = %message.id, "Could not load admins to notify"),
    }

    Activity::new(&state, caller.tenant_id(), Some(caller.id()), "message.create")
        .resource("message", message.id)
        .client(&client)
        .record(&state);
    Ok(response::created(message))
}

async fn list_own(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    ValidatedQuery(page): ValidatedQuery<PageQuery>,
) -> ApiResult<impl IntoResponse> {
    let result = state
        .messages
        .list_for_sender(caller.tenant_id(), caller.id(), page.pagination())
        .await?;
    Ok(response::paginated(result))
}

async fn inbox(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ValidatedQuery(page): ValidatedQuery<PageQuery>,
    ApiQuery(query): ApiQuery<InboxQuery>,
) -> ApiResult<impl IntoResponse> {
    let filter = MessageFilter {
        tenant_id: query.tenant_id,
        status: query.status,
        priority: query.priority,
    };
    let result = state.messages.list_all(filter, page.pagination()).await?;
    Ok(response::paginated(result))
}

async fn show(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let message = if caller.user.is_admin() {
        state.messages.find_by_id(id).await?
    } else {
        let message = state.messages.get_by_id(caller.tenant_id(), id).await?;
        if message.sender_id != caller.id() {
            return Err(VellumError::not_found("message", id).into());
        }
        message
    };
    Ok(response::ok(message))
}

/// Status a ticket moves to when answered without an explicit status.
fn status_after_response(
    current: MessageStatus,
    requested: Option<MessageStatus>,
) -> MessageStatus {
    match (requested, current) {
        (Some(status), _) => status,
        (None, MessageStatus::Open) => MessageStatus::InProgress,
        (None, other) => other,
    }
}

async fn respond(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    client: ClientInfo,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(req): ValidatedJson<RespondRequest>,
) -> ApiResult<impl IntoResponse> {
    let message = state.messages.find_by_id(id).await?;
    let status = status_after_response(message.status, req.status);
    let body = req.response.trim().to_string();

    let message = state
        .messages
        .update(
            message.tenant_id,
            id,
            UpdateMessage {
                status: Some(status),
                priority: None,
                response: Some(MessageResponse {
                    responder_id: admin.id(),
                    body: body.clone(),
                    responded_at: Utc::now(),
                }),
            },
        )
        .await?;

    notify_sender(&state, &message, &body).await;

    info!(admin_id = %admin.id(), message_id = %id, status = %status, "Support message answered");
    Activity::new(&state, message.tenant_id, Some(admin.id()), "message.respond")
        .resource("message", id)
        .client(&client)
        .record(&state);
    Ok(response::ok(message))
}

async fn notify_sender(state: &AppState, message: &Message, response: &str) {
    notify::notify(
        state,
        message.tenant_id,
        message.sender_id,
        NewNotification {
            kind: NotificationKind::SupportResponse,
            title: "Support replied to your message".into(),
            body: format!("Your request \"{}\" has a new response", message.subject),
            subject: Some(NotificationSubject::Message(message.id)),
        },
    )
    .await;

    match state.users.get_by_id(message.tenant_id, message.sender_id).await {
        Ok(sender) => {
            let name = sender.full_name();
            send_mail(
                state,
                templates::support_response(
                    &Recipient {
                        email: &sender.email,
                        name: &name,
                    },
                    &message.subject,
                    response,
                    message.status.as_str(),
                ),
            );
        }
        Err(e) => warn!(error = %e, message_id = %message.id, "Sender not found for reply mail"),
    }
}

async fn set_status(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    client: ClientInfo,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(req): ValidatedJson<StatusRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.status.is_none() && req.priority.is_none() {
        return Err(VellumError::validation("Provide a status or a priority").into());
    }
    let message = state.messages.find_by_id(id).await?;
    let message = state
        .messages
        .update(
            message.tenant_id,
            id,
            UpdateMessage {
                status: req.status,
                priority: req.priority,
                response: None,
            },
        )
        .await?;

    Activity::new(&state, message.tenant_id, Some(admin.id()), "message.status")
        .resource("message", id)
        .client(&client)
        .metadata(serde_json::json!({
            "status": message.status,
            "priority": message.priority,
        }))
        .record(&state);
    Ok(response::ok(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answering_an_open_ticket_moves_it_in_progress() {
        assert_eq!(
            status_after_response(MessageStatus::Open, None),
            MessageStatus::InProgress
        );
        assert_eq!(
            status_after_response(MessageStatus::Resolved, None),
            MessageStatus::Resolved
        );
        assert_eq!(
            status_after_response(MessageStatus::Open, Some(MessageStatus::Closed)),
            MessageStatus::Closed
        );
    }
}
