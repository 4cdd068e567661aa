//! Schema definitions and migration runner for SurrealDB.
//!
//! All tables are SCHEMAFULL. UUIDs are stored as record keys and as
//! strings in foreign-key fields. Enums are stored as their lowercase
//! strings with ASSERT constraints. Embedded arrays declare their
//! element fields so nothing is silently dropped.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Tenants (global scope)
-- =======================================================================
DEFINE TABLE tenant SCHEMAFULL;
DEFINE FIELD name ON TABLE tenant TYPE string;
DEFINE FIELD slug ON TABLE tenant TYPE string;
DEFINE FIELD is_active ON TABLE tenant TYPE bool DEFAULT true;
DEFINE FIELD storage_quota_bytes ON TABLE tenant TYPE option<int>;
DEFINE FIELD settings ON TABLE tenant TYPE object FLEXIBLE DEFAULT {};
DEFINE FIELD created_at ON TABLE tenant TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE tenant TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_tenant_slug ON TABLE tenant COLUMNS slug UNIQUE;

-- =======================================================================
-- Users (tenant scope)
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE user TYPE string;
DEFINE FIELD email ON TABLE user TYPE string;
DEFINE FIELD first_name ON TABLE user TYPE string;
DEFINE FIELD last_name ON TABLE user TYPE string;
DEFINE FIELD password_hash ON TABLE user TYPE string;
DEFINE FIELD role ON TABLE user TYPE string \
    ASSERT $value IN ['user', 'admin'];
DEFINE FIELD is_active ON TABLE user TYPE bool DEFAULT true;
DEFINE FIELD is_email_verified ON TABLE user TYPE bool DEFAULT false;
DEFINE FIELD email_verification_token_hash ON TABLE user \
    TYPE option<string>;
DEFINE FIELD password_reset_token_hash ON TABLE user TYPE option<string>;
DEFINE FIELD password_reset_expires_at ON TABLE user \
    TYPE option<datetime>;
DEFINE FIELD two_factor_enabled ON TABLE user TYPE bool DEFAULT false;
DEFINE FIELD two_factor_secret ON TABLE user TYPE option<string>;
DEFINE FIELD failed_login_attempts ON TABLE user TYPE int DEFAULT 0;
DEFINE FIELD lock_until ON TABLE user TYPE option<datetime>;
DEFINE FIELD last_login_at ON TABLE user TYPE option<datetime>;
DEFINE FIELD password_changed_at ON TABLE user TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_tenant_email ON TABLE user \
    COLUMNS tenant_id, email UNIQUE;
DEFINE INDEX idx_user_verification ON TABLE user \
    COLUMNS email_verification_token_hash;
DEFINE INDEX idx_user_reset ON TABLE user \
    COLUMNS password_reset_token_hash;

-- =======================================================================
-- Documents (tenant scope)
-- =======================================================================
DEFINE TABLE document SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE document TYPE string;
DEFINE FIELD owner_id ON TABLE document TYPE string;
DEFINE FIELD title ON TABLE document TYPE string;
DEFINE FIELD description ON TABLE document TYPE option<string>;
DEFINE FIELD file_name ON TABLE document TYPE string;
DEFINE FIELD storage_key ON TABLE document TYPE string;
DEFINE FIELD file_size ON TABLE document TYPE int;
DEFINE FIELD mime_type ON TABLE document TYPE string;
DEFINE FIELD tags ON TABLE document TYPE array<string> DEFAULT [];
DEFINE FIELD shared_with ON TABLE document TYPE array<object> DEFAULT [];
DEFINE FIELD shared_with.*.user_id ON TABLE document TYPE string;
DEFINE FIELD shared_with.*.permission ON TABLE document TYPE string \
    ASSERT $value IN ['view', 'edit', 'admin'];
DEFINE FIELD shared_with.*.shared_by ON TABLE document TYPE string;
DEFINE FIELD shared_with.*.shared_at ON TABLE document TYPE string;
DEFINE FIELD versions ON TABLE document TYPE array<object> DEFAULT [];
DEFINE FIELD versions.*.version ON TABLE document TYPE int;
DEFINE FIELD versions.*.file_name ON TABLE document TYPE string;
DEFINE FIELD versions.*.storage_key ON TABLE document TYPE string;
DEFINE FIELD versions.*.file_size ON TABLE document TYPE int;
DEFINE FIELD versions.*.mime_type ON TABLE document TYPE string;
DEFINE FIELD versions.*.uploaded_by ON TABLE document TYPE string;
DEFINE FIELD versions.*.change_note ON TABLE document \
    TYPE option<string>;
DEFINE FIELD versions.*.created_at ON TABLE document TYPE string;
DEFINE FIELD current_version ON TABLE document TYPE int DEFAULT 1;
DEFINE FIELD download_count ON TABLE document TYPE int DEFAULT 0;
DEFINE FIELD is_deleted ON TABLE document TYPE bool DEFAULT false;
DEFINE FIELD deleted_at ON TABLE document TYPE option<datetime>;
DEFINE FIELD deleted_by ON TABLE document TYPE option<string>;
DEFINE FIELD created_at ON TABLE document TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE document TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_document_tenant_owner ON TABLE document \
    COLUMNS tenant_id, owner_id;
DEFINE INDEX idx_document_tenant_deleted ON TABLE document \
    COLUMNS tenant_id, is_deleted;

-- =======================================================================
-- Comments (tenant scope)
-- =======================================================================
DEFINE TABLE comment SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE comment TYPE string;
DEFINE FIELD document_id ON TABLE comment TYPE string;
DEFINE FIELD author_id ON TABLE comment TYPE string;
DEFINE FIELD content ON TABLE comment TYPE string;
DEFINE FIELD parent_id ON TABLE comment TYPE option<string>;
DEFINE FIELD reactions ON TABLE comment TYPE array<object> DEFAULT [];
DEFINE FIELD reactions.*.user_id ON TABLE comment TYPE string;
DEFINE FIELD reactions.*.emoji ON TABLE comment TYPE string;
DEFINE FIELD reactions.*.created_at ON TABLE comment TYPE string;
DEFINE FIELD is_edited ON TABLE comment TYPE bool DEFAULT false;
DEFINE FIELD edited_at ON TABLE comment TYPE option<datetime>;
DEFINE FIELD is_deleted ON TABLE comment TYPE bool DEFAULT false;
DEFINE FIELD created_at ON TABLE comment TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE comment TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_comment_tenant_document ON TABLE comment \
    COLUMNS tenant_id, document_id;

-- =======================================================================
-- Notifications (tenant scope)
-- =======================================================================
DEFINE TABLE notification SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE notification TYPE string;
DEFINE FIELD recipient_id ON TABLE notification TYPE string;
DEFINE FIELD kind ON TABLE notification TYPE string \
    ASSERT $value IN ['document_shared', 'new_comment', 'comment_reply', \
    'support_message', 'support_response', 'system'];
DEFINE FIELD title ON TABLE notification TYPE string;
DEFINE FIELD body ON TABLE notification TYPE string;
DEFINE FIELD subject_type ON TABLE notification TYPE option<string> \
    ASSERT $value = NONE OR $value IN ['document', 'user', 'message'];
DEFINE FIELD subject_id ON TABLE notification TYPE option<string>;
DEFINE FIELD is_read ON TABLE notification TYPE bool DEFAULT false;
DEFINE FIELD read_at ON TABLE notification TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE notification TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_notification_recipient ON TABLE notification \
    COLUMNS tenant_id, recipient_id, is_read;

-- =======================================================================
-- Support messages (tenant scope, read cross-tenant by admins)
-- =======================================================================
DEFINE TABLE message SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE message TYPE string;
DEFINE FIELD sender_id ON TABLE message TYPE string;
DEFINE FIELD subject ON TABLE message TYPE string;
DEFINE FIELD body ON TABLE message TYPE string;
DEFINE FIELD category ON TABLE message TYPE string \
    ASSERT $value IN ['general', 'technical', 'billing', \
    'feature_request'];
DEFINE FIELD status ON TABLE message TYPE string \
    ASSERT $value IN ['open', 'in_progress', 'resolved', 'closed'];
DEFINE FIELD priority ON TABLE message TYPE string \
    ASSERT $value IN ['low', 'normal', 'high', 'urgent'];
DEFINE FIELD responder_id ON TABLE message TYPE option<string>;
DEFINE FIELD response_body ON TABLE message TYPE option<string>;
DEFINE FIELD responded_at ON TABLE message TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE message TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE message TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_message_tenant_sender ON TABLE message \
    COLUMNS tenant_id, sender_id;
DEFINE INDEX idx_message_status ON TABLE message COLUMNS status;

-- =======================================================================
-- Activity log (tenant scope, append-only, expired by a purge task)
-- =======================================================================
DEFINE TABLE activity_log SCHEMAFULL
    PERMISSIONS
        FOR create FULL
        FOR select FULL
        FOR update NONE
        FOR delete FULL;
DEFINE FIELD tenant_id ON TABLE activity_log TYPE string;
DEFINE FIELD user_id ON TABLE activity_log TYPE option<string>;
DEFINE FIELD action ON TABLE activity_log TYPE string;
DEFINE FIELD resource_type ON TABLE activity_log TYPE option<string>;
DEFINE FIELD resource_id ON TABLE activity_log TYPE option<string>;
DEFINE FIELD ip_address ON TABLE activity_log TYPE option<string>;
DEFINE FIELD user_agent ON TABLE activity_log TYPE option<string>;
DEFINE FIELD metadata ON TABLE activity_log TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD created_at ON TABLE activity_log TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD expires_at ON TABLE activity_log TYPE datetime;
DEFINE INDEX idx_activity_tenant_time ON TABLE activity_log \
    COLUMNS tenant_id, created_at;
DEFINE INDEX idx_activity_expires ON TABLE activity_log \
    COLUMNS expires_at;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }
        info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        db.query(migration.sql).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "Migration v{} '{}' failed: {}",
                migration.version, migration.name, e,
            ))
        })?;

        db.query("CREATE _migration SET version = $version, name = $name")
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;
    }

    Ok(())
}

/// Returns the raw schema DDL for version 1.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}
