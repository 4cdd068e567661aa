//! Tenant domain model.
//!
//! Tenants are the isolation boundary: every other entity carries a
//! `tenant_id` that is part of each query's filter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An organization using Vellum. Users, documents, comments,
/// notifications, messages and activity logs all belong to one tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    /// Human-readable name.
    pub name: String,
    /// URL-safe unique identifier used at login (e.g., `acme`).
    pub slug: String,
    /// Inactive tenants cannot authenticate.
    pub is_active: bool,
    /// Optional ceiling on stored bytes across all documents.
    pub storage_quota_bytes: Option<u64>,
    /// Arbitrary key-value settings.
    pub settings: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create a new tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTenant {
    pub name: String,
    pub slug: String,
    pub storage_quota_bytes: Option<u64>,
    pub settings: Option<serde_json::Value>,
}

/// Fields that can be updated on an existing tenant.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateTenant {
    pub name: Option<String>,
    pub is_active: Option<bool>,
    /// `Some(Some(v))` = set, `Some(None)` = clear, `None` = no change.
    pub storage_quota_bytes: Option<Option<u64>>,
    pub settings: Option<serde_json::Value>,
}
