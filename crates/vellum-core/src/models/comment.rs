//! Comment domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One reaction per user per comment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reaction {
    pub user_id: Uuid,
    pub emoji: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub document_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    /// Top-level comment this one replies to. Replies never nest deeper.
    pub parent_id: Option<Uuid>,
    pub reactions: Vec<Reaction>,
    pub is_edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct CreateComment {
    pub tenant_id: Uuid,
    pub document_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub parent_id: Option<Uuid>,
}

/// Replace `user_id`'s reaction (if any) with `emoji`.
pub fn upsert_reaction(
    reactions: &mut Vec<Reaction>,
    user_id: Uuid,
    emoji: String,
    now: DateTime<Utc>,
) {
    reactions.retain(|r| r.user_id != user_id);
    reactions.push(Reaction {
        user_id,
        emoji,
        created_at: now,
    });
}

/// Drop `user_id`'s reaction. Returns whether one existed.
pub fn remove_reaction(reactions: &mut Vec<Reaction>, user_id: Uuid) -> bool {
    let before = reactions.len();
    reactions.retain(|r| r.user_id != user_id);
    reactions.len() != before
}
