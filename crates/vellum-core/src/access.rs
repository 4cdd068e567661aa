//! Document access resolution.
//!
//! Pure and total: it only reads the document it is given and never
//! performs further lookups.

use uuid::Uuid;

use crate::models::document::{AccessLevel, Document};

/// Whether `user_id` may perform `level` on `document`.
///
/// The owner is always granted. Anyone else needs a `shared_with`
/// entry whose permission rank reaches the level's required rank;
/// no entry means no access.
pub fn has_access(document: &Document, user_id: Uuid, level: AccessLevel) -> bool {
    if document.owner_id == user_id {
        return true;
    }
    document
        .share_for(user_id)
        .is_some_and(|entry| entry.permission.rank() >= level.required_rank())
}
