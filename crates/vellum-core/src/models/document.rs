//! Document domain model.
//!
//! A document is owned by exactly one user, may be shared with other
//! users of the same tenant, and keeps an append-only version history
//! whose newest entry is mirrored onto the document itself.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Permission granted to a user a document is shared with.
///
/// Ordered by rank: `View < Edit < Admin`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SharePermission {
    View,
    Edit,
    Admin,
}

impl SharePermission {
    pub fn rank(&self) -> u8 {
        match self {
            SharePermission::View => 1,
            SharePermission::Edit => 2,
            SharePermission::Admin => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SharePermission::View => "view",
            SharePermission::Edit => "edit",
            SharePermission::Admin => "admin",
        }
    }
}

impl fmt::Display for SharePermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SharePermission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view" => Ok(SharePermission::View),
            "edit" => Ok(SharePermission::Edit),
            "admin" => Ok(SharePermission::Admin),
            other => Err(format!("unknown share permission: {other}")),
        }
    }
}

/// The operation a caller wants to perform on a document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    View,
    Edit,
    Share,
    Delete,
}

impl AccessLevel {
    /// Minimum share permission rank that grants this level.
    pub fn required_rank(&self) -> u8 {
        match self {
            AccessLevel::View => SharePermission::View.rank(),
            AccessLevel::Edit => SharePermission::Edit.rank(),
            AccessLevel::Share | AccessLevel::Delete => SharePermission::Admin.rank(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShareEntry {
    pub user_id: Uuid,
    pub permission: SharePermission,
    pub shared_by: Uuid,
    pub shared_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentVersion {
    /// Strictly increasing, starting at 1, never reused.
    pub version: u32,
    /// Name of the file as uploaded, before key sanitising.
    pub file_name: String,
    pub storage_key: String,
    pub file_size: u64,
    pub mime_type: String,
    pub uploaded_by: Uuid,
    pub change_note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    /// Original file name of the current version.
    pub file_name: String,
    /// Object-store key of the current version.
    pub storage_key: String,
    pub file_size: u64,
    pub mime_type: String,
    pub tags: Vec<String>,
    pub shared_with: Vec<ShareEntry>,
    pub versions: Vec<DocumentVersion>,
    pub current_version: u32,
    pub download_count: u64,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn file_size_formatted(&self) -> String {
        format_file_size(self.file_size)
    }

    pub fn share_for(&self, user_id: Uuid) -> Option<&ShareEntry> {
        self.shared_with.iter().find(|s| s.user_id == user_id)
    }

    pub fn version(&self, version: u32) -> Option<&DocumentVersion> {
        self.versions.iter().find(|v| v.version == version)
    }

    /// Every object-store key referenced by this document's history.
    pub fn storage_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.versions.iter().map(|v| v.storage_key.clone()).collect();
        if !keys.contains(&self.storage_key) {
            keys.push(self.storage_key.clone());
        }
        keys.sort();
        keys.dedup();
        keys
    }
}

/// Grant or update `user_id`'s share entry. Returns `false` when an
/// identical permission was already present.
pub fn upsert_share(
    shares: &mut Vec<ShareEntry>,
    user_id: Uuid,
    permission: SharePermission,
    shared_by: Uuid,
    now: DateTime<Utc>,
) -> bool {
    if let Some(existing) = shares.iter_mut().find(|s| s.user_id == user_id) {
        if existing.permission == permission {
            return false;
        }
        existing.permission = permission;
        existing.shared_by = shared_by;
        existing.shared_at = now;
        return true;
    }
    shares.push(ShareEntry {
        user_id,
        permission,
        shared_by,
        shared_at: now,
    });
    true
}

/// Drop `user_id`'s share entry. Returns whether one existed.
pub fn remove_share(shares: &mut Vec<ShareEntry>, user_id: Uuid) -> bool {
    let before = shares.len();
    shares.retain(|s| s.user_id != user_id);
    shares.len() != before
}

impl DocumentVersion {
    /// A new version that re-points at this version's stored object.
    pub fn restore_as(&self, restored_by: Uuid) -> NewVersion {
        NewVersion {
            file_name: self.file_name.clone(),
            storage_key: self.storage_key.clone(),
            file_size: self.file_size,
            mime_type: self.mime_type.clone(),
            uploaded_by: restored_by,
            change_note: Some(format!("Restored from version {}", self.version)),
        }
    }
}

/// Render a byte count as `B`, `KB`, `MB` or `GB` with two decimals.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".into();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}

/// Fields required to create a document together with its first version.
#[derive(Debug, Clone)]
pub struct CreateDocument {
    /// Pre-allocated so the storage key can embed it.
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub file_name: String,
    pub storage_key: String,
    pub file_size: u64,
    pub mime_type: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateDocument {
    pub title: Option<String>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
}

/// A new version to append to a document's history.
#[derive(Debug, Clone)]
pub struct NewVersion {
    pub file_name: String,
    pub storage_key: String,
    pub file_size: u64,
    pub mime_type: String,
    pub uploaded_by: Uuid,
    pub change_note: Option<String>,
}

/// Which documents a listing covers relative to the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentScope {
    #[default]
    All,
    Owned,
    Shared,
}

/// Filters for a caller's document listing. Soft-deleted documents are
/// never included.
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    pub scope: DocumentScope,
    /// Case-insensitive substring over title, description and file name.
    pub search: Option<String>,
    pub tag: Option<String>,
    pub mime_type: Option<String>,
}
