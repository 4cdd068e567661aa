//! User domain model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Single-valued role. There is no hierarchy: `Admin` unlocks the
/// cross-tenant admin surface, nothing more.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(UserRole::User),
            "admin" => Ok(UserRole::Admin),
            other => Err(format!("unknown user role: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: UserRole,
    /// Soft-deactivation flag; users are only hard-deleted by an admin purge.
    pub is_active: bool,
    pub is_email_verified: bool,
    #[serde(skip_serializing)]
    pub email_verification_token_hash: Option<String>,
    #[serde(skip_serializing)]
    pub password_reset_token_hash: Option<String>,
    #[serde(skip_serializing)]
    pub password_reset_expires_at: Option<DateTime<Utc>>,
    pub two_factor_enabled: bool,
    /// AES-256-GCM encrypted TOTP secret (present once setup has begun).
    #[serde(skip_serializing)]
    pub two_factor_secret: Option<String>,
    #[serde(skip_serializing, default)]
    pub failed_login_attempts: u32,
    #[serde(skip_serializing)]
    pub lock_until: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    /// Tokens issued before this instant are rejected.
    #[serde(skip_serializing)]
    pub password_changed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Whether a lockout is in force at `now`.
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.lock_until.is_some_and(|until| until > now)
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub tenant_id: Uuid,
    pub email: String,
    /// Raw password (hashed with Argon2id before storage).
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    pub email_verification_token_hash: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateUser {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
    pub is_email_verified: Option<bool>,
    /// `Some(Some(val))` = set, `Some(None)` = clear, `None` = no change.
    pub email_verification_token_hash: Option<Option<String>>,
    pub password_reset_token_hash: Option<Option<String>>,
    pub password_reset_expires_at: Option<Option<DateTime<Utc>>>,
    pub two_factor_enabled: Option<bool>,
    pub two_factor_secret: Option<Option<String>>,
    pub failed_login_attempts: Option<u32>,
    pub lock_until: Option<Option<DateTime<Utc>>>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Filters for tenant user listings.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    /// Case-insensitive substring over email, first and last name.
    pub search: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            email: "ada@example.com".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            password_hash: String::new(),
            role: UserRole::User,
            is_active: true,
            is_email_verified: false,
            email_verification_token_hash: None,
            password_reset_token_hash: None,
            password_reset_expires_at: None,
            two_factor_enabled: false,
            two_factor_secret: None,
            failed_login_attempts: 0,
            lock_until: None,
            last_login_at: None,
            password_changed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn full_name_joins_parts() {
        assert_eq!(user().full_name(), "Ada Lovelace");

        let mut u = user();
        u.last_name = String::new();
        assert_eq!(u.full_name(), "Ada");
    }

    #[test]
    fn lock_expires() {
        let now = Utc::now();
        let mut u = user();
        assert!(!u.is_locked(now));

        u.lock_until = Some(now + Duration::hours(2));
        assert!(u.is_locked(now));
        assert!(!u.is_locked(now + Duration::hours(3)));
    }

    #[test]
    fn role_round_trips_through_str() {
        for role in [UserRole::User, UserRole::Admin] {
            assert_eq!(role.as_str().parse::<UserRole>().unwrap(), role);
        }
        assert!("owner".parse::<UserRole>().is_err());
    }

    #[test]
    fn secrets_are_not_serialized() {
        let mut u = user();
        u.password_hash = "$argon2id$secret".into();
        u.two_factor_secret = Some("encrypted".into());
        let json = serde_json::to_string(&u).unwrap();
        assert!(!json.contains("argon2id"));
        assert!(!json.contains("encrypted"));
    }
}
