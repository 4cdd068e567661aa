//! Support message (ticket) domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!(concat!("unknown ", stringify!($name), ": {}"), other)),
                }
            }
        }
    };
}

string_enum!(MessageStatus {
    Open => "open",
    InProgress => "in_progress",
    Resolved => "resolved",
    Closed => "closed",
});

string_enum!(MessagePriority {
    Low => "low",
    Normal => "normal",
    High => "high",
    Urgent => "urgent",
});

string_enum!(MessageCategory {
    General => "general",
    Technical => "technical",
    Billing => "billing",
    FeatureRequest => "feature_request",
});

/// The single admin response recorded on a ticket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageResponse {
    pub responder_id: Uuid,
    pub body: String,
    pub responded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub sender_id: Uuid,
    pub subject: String,
    pub body: String,
    pub category: MessageCategory,
    pub status: MessageStatus,
    pub priority: MessagePriority,
    pub response: Option<MessageResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateMessage {
    pub tenant_id: Uuid,
    pub sender_id: Uuid,
    pub subject: String,
    pub body: String,
    pub category: MessageCategory,
    pub priority: MessagePriority,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateMessage {
    pub status: Option<MessageStatus>,
    pub priority: Option<MessagePriority>,
    pub response: Option<MessageResponse>,
}

#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    pub tenant_id: Option<Uuid>,
    pub status: Option<MessageStatus>,
    pub priority: Option<MessagePriority>,
}
