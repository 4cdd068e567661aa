//! SurrealDB implementation of [`UserRepository`].
//!
//! Password hashing uses Argon2id (memory: 19 MiB, iterations: 2,
//! parallelism: 1) with a random salt per hash and an optional
//! server-side pepper. Emails are stored lower-cased.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher};
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use vellum_core::error::VellumResult;
use vellum_core::models::user::{CreateUser, UpdateUser, User, UserFilter};
use vellum_core::repository::{PaginatedResult, Pagination, UserRepository};

use crate::error::DbError;
use crate::rows::{CountRow, first, needle, parse_enum, parse_uuid, total_of};

#[derive(Debug, SurrealValue)]
struct UserRow {
    record_id: String,
    tenant_id: String,
    email: String,
    first_name: String,
    last_name: String,
    password_hash: String,
    role: String,
    is_active: bool,
    is_email_verified: bool,
    email_verification_token_hash: Option<String>,
    password_reset_token_hash: Option<String>,
    password_reset_expires_at: Option<DateTime<Utc>>,
    two_factor_enabled: bool,
    two_factor_secret: Option<String>,
    failed_login_attempts: u32,
    lock_until: Option<DateTime<Utc>>,
    last_login_at: Option<DateTime<Utc>>,
    password_changed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn try_into_user(self) -> Result<User, DbError> {
        Ok(User {
            id: parse_uuid(&self.record_id, "user")?,
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            password_hash: self.password_hash,
            role: parse_enum(&self.role)?,
            is_active: self.is_active,
            is_email_verified: self.is_email_verified,
            email_verification_token_hash: self.email_verification_token_hash,
            password_reset_token_hash: self.password_reset_token_hash,
            password_reset_expires_at: self.password_reset_expires_at,
            two_factor_enabled: self.two_factor_enabled,
            two_factor_secret: self.two_factor_secret,
            failed_login_attempts: self.failed_login_attempts,
            lock_until: self.lock_until,
            last_login_at: self.last_login_at,
            password_changed_at: self.password_changed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn collect(rows: Vec<UserRow>) -> Result<Vec<User>, DbError> {
    rows.into_iter().map(UserRow::try_into_user).collect()
}

const SELECT_SCOPED: &str = "SELECT meta::id(id) AS record_id, * \
     FROM type::record('user', $id) WHERE tenant_id = $tenant_id";

/// Hash a password with Argon2id.
///
/// If a pepper is provided, it is prepended to the password before
/// hashing. The salt is randomly generated for each call.
fn hash_password(password: &str, pepper: Option<&str>) -> Result<String, DbError> {
    let params = argon2::Params::new(19456, 2, 1, None)
        .map_err(|e| DbError::Hash(format!("argon2 params error: {e}")))?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let peppered: String;
    let input = match pepper {
        Some(p) => {
            peppered = format!("{p}{password}");
            peppered.as_bytes()
        }
        None => password.as_bytes(),
    };

    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let hash = argon2
        .hash_password(input, &salt)
        .map_err(|e| DbError::Hash(e.to_string()))?;

    Ok(hash.to_string())
}

/// SurrealDB implementation of the User repository.
#[derive(Clone)]
pub struct SurrealUserRepository<C: Connection> {
    db: Surreal<C>,
    pepper: Option<String>,
}

impl<C: Connection> SurrealUserRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db, pepper: None }
    }

    pub fn with_pepper(db: Surreal<C>, pepper: Option<String>) -> Self {
        Self { db, pepper }
    }

    async fn fetch_one(
        &self,
        query: &str,
        binds: Vec<(&'static str, String)>,
        label: String,
    ) -> Result<User, DbError> {
        let mut builder = self.db.query(query);
        for bind in binds {
            builder = builder.bind(bind);
        }
        let mut result = builder.await?;
        let rows: Vec<UserRow> = result.take(0)?;
        first(rows, "user", label)?.try_into_user()
    }

    async fn page(
        &self,
        conditions: &[&str],
        binds: Vec<(&'static str, String)>,
        pagination: Pagination,
    ) -> Result<PaginatedResult<User>, DbError> {
        let clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        let query = format!(
            "SELECT count() AS total FROM user {clause} GROUP ALL; \
             SELECT meta::id(id) AS record_id, * FROM user {clause} \
             ORDER BY created_at ASC LIMIT $limit START $offset;"
        );

        let mut builder = self
            .db
            .query(query)
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));
        for bind in binds {
            builder = builder.bind(bind);
        }
        let mut result = builder.await?;

        let counts: Vec<CountRow> = result.take(0)?;
        let rows: Vec<UserRow> = result.take(1)?;

        Ok(PaginatedResult {
            items: collect(rows)?,
            total: total_of(counts),
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}

impl<C: Connection> UserRepository for SurrealUserRepository<C> {
    async fn create(&self, input: CreateUser) -> VellumResult<User> {
        let id = Uuid::new_v4();
        let password_hash = hash_password(&input.password, self.pepper.as_deref())?;

        let result = self
            .db
            .query(format!(
                "CREATE type::record('user', $id) SET \
                 tenant_id = $tenant_id, email = $email, \
                 first_name = $first_name, last_name = $last_name, \
                 password_hash = $password_hash, role = $role, \
                 is_active = true, is_email_verified = false, \
                 email_verification_token_hash = $verification, \
                 two_factor_enabled = false, failed_login_attempts = 0; \
                 {SELECT_SCOPED};"
            ))
            .bind(("id", id.to_string()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("email", input.email.trim().to_lowercase()))
            .bind(("first_name", input.first_name))
            .bind(("last_name", input.last_name))
            .bind(("password_hash", password_hash))
            .bind(("role", input.role.as_str().to_string()))
            .bind(("verification", input.email_verification_token_hash))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("user", e))?;

        let rows: Vec<UserRow> = result.take(1).map_err(DbError::from)?;
        Ok(first(rows, "user", id)?.try_into_user()?)
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> VellumResult<User> {
        Ok(self
            .fetch_one(
                SELECT_SCOPED,
                vec![("id", id.to_string()), ("tenant_id", tenant_id.to_string())],
                id.to_string(),
            )
            .await?)
    }

    async fn get_by_email(&self, tenant_id: Uuid, email: &str) -> VellumResult<User> {
        let email = email.trim().to_lowercase();
        Ok(self
            .fetch_one(
                "SELECT meta::id(id) AS record_id, * FROM user \
                 WHERE tenant_id = $tenant_id AND email = $email",
                vec![("tenant_id", tenant_id.to_string()), ("email", email.clone())],
                format!("email={email}"),
            )
            .await?)
    }

    async fn update(&self, tenant_id: Uuid, id: Uuid, input: UpdateUser) -> VellumResult<User> {
        let mut sets = Vec::new();
        if input.first_name.is_some() {
            sets.push("first_name = $first_name");
        }
        if input.last_name.is_some() {
            sets.push("last_name = $last_name");
        }
        if input.role.is_some() {
            sets.push("role = $role");
        }
        if input.is_active.is_some() {
            sets.push("is_active = $is_active");
        }
        if input.is_email_verified.is_some() {
            sets.push("is_email_verified = $is_email_verified");
        }
        if input.email_verification_token_hash.is_some() {
            sets.push("email_verification_token_hash = $verification");
        }
        if input.password_reset_token_hash.is_some() {
            sets.push("password_reset_token_hash = $reset_hash");
        }
        if input.password_reset_expires_at.is_some() {
            sets.push("password_reset_expires_at = $reset_expires");
        }
        if input.two_factor_enabled.is_some() {
            sets.push("two_factor_enabled = $two_factor_enabled");
        }
        if input.two_factor_secret.is_some() {
            sets.push("two_factor_secret = $two_factor_secret");
        }
        if input.failed_login_attempts.is_some() {
            sets.push("failed_login_attempts = $failed_login_attempts");
        }
        if input.lock_until.is_some() {
            sets.push("lock_until = $lock_until");
        }
        if input.last_login_at.is_some() {
            sets.push("last_login_at = $last_login_at");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('user', $id) SET {} WHERE tenant_id = $tenant_id; \
             {SELECT_SCOPED};",
            sets.join(", ")
        );

        let mut builder = self
            .db
            .query(query)
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()));

        if let Some(first_name) = input.first_name {
            builder = builder.bind(("first_name", first_name));
        }
        if let Some(last_name) = input.last_name {
            builder = builder.bind(("last_name", last_name));
        }
        if let Some(role) = input.role {
            builder = builder.bind(("role", role.as_str().to_string()));
        }
        if let Some(is_active) = input.is_active {
            builder = builder.bind(("is_active", is_active));
        }
        if let Some(verified) = input.is_email_verified {
            builder = builder.bind(("is_email_verified", verified));
        }
        // Option<Option<_>> fields: Some(Some(v)) sets, Some(None) clears.
        if let Some(hash) = input.email_verification_token_hash {
            builder = builder.bind(("verification", hash));
        }
        if let Some(hash) = input.password_reset_token_hash {
            builder = builder.bind(("reset_hash", hash));
        }
        if let Some(expires) = input.password_reset_expires_at {
            builder = builder.bind(("reset_expires", expires));
        }
        if let Some(enabled) = input.two_factor_enabled {
            builder = builder.bind(("two_factor_enabled", enabled));
        }
        if let Some(secret) = input.two_factor_secret {
            builder = builder.bind(("two_factor_secret", secret));
        }
        if let Some(attempts) = input.failed_login_attempts {
            builder = builder.bind(("failed_login_attempts", attempts));
        }
        if let Some(lock_until) = input.lock_until {
            builder = builder.bind(("lock_until", lock_until));
        }
        if let Some(last_login_at) = input.last_login_at {
            builder = builder.bind(("last_login_at", last_login_at));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("user", e))?;

        let rows: Vec<UserRow> = result.take(1).map_err(DbError::from)?;
        Ok(first(rows, "user", id)?.try_into_user()?)
    }

    async fn set_password(&self, tenant_id: Uuid, id: Uuid, password: &str) -> VellumResult<User> {
        let password_hash = hash_password(password, self.pepper.as_deref())?;
        let changed_at = Utc::now();

        let result = self
            .db
            .query(format!(
                "UPDATE type::record('user', $id) SET \
                 password_hash = $password_hash, \
                 password_changed_at = $changed_at, \
                 password_reset_token_hash = NONE, \
                 password_reset_expires_at = NONE, \
                 failed_login_attempts = 0, lock_until = NONE, \
                 updated_at = time::now() \
                 WHERE tenant_id = $tenant_id; \
                 {SELECT_SCOPED};"
            ))
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("password_hash", password_hash))
            .bind(("changed_at", changed_at))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("user", e))?;

        let rows: Vec<UserRow> = result.take(1).map_err(DbError::from)?;
        Ok(first(rows, "user", id)?.try_into_user()?)
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        filter: UserFilter,
        pagination: Pagination,
    ) -> VellumResult<PaginatedResult<User>> {
        let mut conditions = vec!["tenant_id = $tenant_id"];
        let mut binds = vec![("tenant_id", tenant_id.to_string())];

        if let Some(search) = needle(filter.search) {
            conditions.push(
                "(string::contains(string::lowercase(email), $search) \
                 OR string::contains(string::lowercase(first_name), $search) \
                 OR string::contains(string::lowercase(last_name), $search))",
            );
            binds.push(("search", search));
        }
        if let Some(role) = filter.role {
            conditions.push("role = $role");
            binds.push(("role", role.as_str().to_string()));
        }
        match filter.is_active {
            Some(true) => conditions.push("is_active = true"),
            Some(false) => conditions.push("is_active = false"),
            None => {}
        }

        Ok(self.page(&conditions, binds, pagination).await?)
    }

    async fn find_by_id(&self, id: Uuid) -> VellumResult<User> {
        Ok(self
            .fetch_one(
                "SELECT meta::id(id) AS record_id, * FROM type::record('user', $id)",
                vec![("id", id.to_string())],
                id.to_string(),
            )
            .await?)
    }

    async fn find_by_verification_token(&self, token_hash: &str) -> VellumResult<User> {
        Ok(self
            .fetch_one(
                "SELECT meta::id(id) AS record_id, * FROM user \
                 WHERE email_verification_token_hash = $hash",
                vec![("hash", token_hash.to_string())],
                "verification token".to_string(),
            )
            .await?)
    }

    async fn find_by_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> VellumResult<User> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user \
                 WHERE password_reset_token_hash = $hash \
                 AND password_reset_expires_at > $now",
            )
            .bind(("hash", token_hash.to_string()))
            .bind(("now", now))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        Ok(first(rows, "user", "reset token")?.try_into_user()?)
    }

    async fn list_active_admins(&self) -> VellumResult<Vec<User>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user \
                 WHERE role = 'admin' AND is_active = true \
                 ORDER BY created_at ASC",
            )
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        Ok(collect(rows)?)
    }

    async fn list_all(
        &self,
        tenant_id: Option<Uuid>,
        pagination: Pagination,
    ) -> VellumResult<PaginatedResult<User>> {
        let (conditions, binds) = match tenant_id {
            Some(t) => (vec!["tenant_id = $tenant_id"], vec![("tenant_id", t.to_string())]),
            None => (Vec::new(), Vec::new()),
        };
        Ok(self.page(&conditions, binds, pagination).await?)
    }

    async fn purge(&self, id: Uuid) -> VellumResult<()> {
        self.find_by_id(id).await?;
        self.db
            .query(
                "DELETE type::record('user', $id); \
                 DELETE notification WHERE recipient_id = $id;",
            )
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;
        Ok(())
    }
}
