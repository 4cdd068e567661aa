//! Authentication configuration.

use crate::error::AuthError;

/// Configuration for the authentication service.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HMAC secret for access tokens.
    pub access_token_secret: String,
    /// HMAC secret for refresh tokens; must differ from the access secret.
    pub refresh_token_secret: String,
    /// Access token lifetime in seconds (default: 900 = 15 minutes).
    pub access_token_lifetime_secs: u64,
    /// Refresh token lifetime in seconds (default: 604_800 = 7 days).
    pub refresh_token_lifetime_secs: u64,
    /// JWT issuer (`iss` claim).
    pub jwt_issuer: String,
    /// Optional pepper prepended to passwords before Argon2id.
    pub pepper: Option<String>,
    pub min_password_length: usize,
    /// 256-bit AES-GCM key for encrypting TOTP secrets at rest.
    /// `None` disables two-factor setup.
    pub mfa_encryption_key: Option<[u8; 32]>,
    /// Issuer name shown in authenticator apps.
    pub totp_issuer: String,
    /// Consecutive failed attempts before the account locks (default: 5).
    pub max_failed_login_attempts: u32,
    /// Lock duration in seconds (default: 7200 = 2 hours).
    pub lockout_duration_secs: u64,
    /// Password-reset token lifetime in seconds (default: 3600).
    pub reset_token_lifetime_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_token_secret: String::new(),
            refresh_token_secret: String::new(),
            access_token_lifetime_secs: 900,
            refresh_token_lifetime_secs: 604_800,
            jwt_issuer: "vellum".into(),
            pepper: None,
            min_password_length: 8,
            mfa_encryption_key: None,
            totp_issuer: "Vellum".into(),
            max_failed_login_attempts: 5,
            lockout_duration_secs: 7200,
            reset_token_lifetime_secs: 3600,
        }
    }
}

/// Parse a 64-character hex string into an AES-256 key.
pub fn parse_encryption_key(hex_key: &str) -> Result<[u8; 32], AuthError> {
    let bytes = hex::decode(hex_key.trim())
        .map_err(|e| AuthError::Crypto(format!("encryption key is not hex: {e}")))?;
    bytes
        .try_into()
        .map_err(|_| AuthError::Crypto("encryption key must be 32 bytes (64 hex chars)".into()))
}
