//! Notification domain model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    DocumentShared,
    NewComment,
    CommentReply,
    SupportMessage,
    SupportResponse,
    System,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::DocumentShared => "document_shared",
            NotificationKind::NewComment => "new_comment",
            NotificationKind::CommentReply => "comment_reply",
            NotificationKind::SupportMessage => "support_message",
            NotificationKind::SupportResponse => "support_response",
            NotificationKind::System => "system",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "document_shared" => Ok(NotificationKind::DocumentShared),
            "new_comment" => Ok(NotificationKind::NewComment),
            "comment_reply" => Ok(NotificationKind::CommentReply),
            "support_message" => Ok(NotificationKind::SupportMessage),
            "support_response" => Ok(NotificationKind::SupportResponse),
            "system" => Ok(NotificationKind::System),
            other => Err(format!("unknown notification kind: {other}")),
        }
    }
}

/// The single entity a notification points at, if any.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum NotificationSubject {
    Document(Uuid),
    User(Uuid),
    Message(Uuid),
}

impl NotificationSubject {
    pub fn type_str(&self) -> &'static str {
        match self {
            NotificationSubject::Document(_) => "document",
            NotificationSubject::User(_) => "user",
            NotificationSubject::Message(_) => "message",
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            NotificationSubject::Document(id)
            | NotificationSubject::User(id)
            | NotificationSubject::Message(id) => *id,
        }
    }

    pub fn from_parts(kind: &str, id: Uuid) -> Result<Self, String> {
        match kind {
            "document" => Ok(NotificationSubject::Document(id)),
            "user" => Ok(NotificationSubject::User(id)),
            "message" => Ok(NotificationSubject::Message(id)),
            other => Err(format!("unknown notification subject: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub recipient_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub subject: Option<NotificationSubject>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateNotification {
    pub tenant_id: Uuid,
    pub recipient_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub subject: Option<NotificationSubject>,
}
