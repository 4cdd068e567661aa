//! Notification fan-out and outbound mail.
//!
//! Notifications are written directly before the handler responds.
//! A failed write is logged and does not undo the action that caused
//! it. Mail is sent in the background.

use tracing::{debug, warn};
use vellum_core::models::notification::{CreateNotification, NotificationKind, NotificationSubject};
use vellum_core::repository::NotificationRepository;
use vellum_mail::Email;

use crate::state::AppState;

pub struct NewNotification {
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub subject: Option<NotificationSubject>,
}

/// Create one notification per recipient; returns how many were stored.
pub async fn fan_out(
    state: &AppState,
    tenant_of: impl Fn(uuid::Uuid) -> uuid::Uuid,
    recipients: &[uuid::Uuid],
    notification: &NewNotification,
) -> usize {
    let mut stored = 0;
    for &recipient_id in recipients {
        let input = CreateNotification {
            tenant_id: tenant_of(recipient_id),
            recipient_id,
            kind: notification.kind,
            title: notification.title.clone(),
            body: notification.body.clone(),
            subject: notification.subject,
        };
        match state.notifications.create(input).await {
            Ok(_) => stored += 1,
            Err(e) => warn!(
                error = %e,
                %recipient_id,
                kind = %notification.kind,
                "Failed to create notification"
            ),
        }
    }
    stored
}

/// Notify a single user of the given tenant.
pub async fn notify(
    state: &AppState,
    tenant_id: uuid::Uuid,
    recipient_id: uuid::Uuid,
    notification: NewNotification,
) {
    fan_out(state, |_| tenant_id, &[recipient_id], &notification).await;
}

/// Hand `email` to the mailer without waiting for delivery.
pub fn send_mail(state: &AppState, email: Email) {
    let mailer = state.mailer.clone();
    tokio::spawn(async move {
        let subject = email.subject.clone();
        match mailer.send(email).await {
            Ok(()) => debug!(%subject, "Mail sent"),
            Err(e) => warn!(error = %e, %subject, "Failed to send mail"),
        }
    });
}
