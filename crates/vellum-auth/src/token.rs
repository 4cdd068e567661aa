//! JWT access/refresh token issuance and verification, plus opaque
//! single-use tokens for email verification and password reset.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;

/// Which secret signs the token. Access and refresh tokens are not
/// interchangeable because they are signed with different keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    fn secret<'a>(&self, config: &'a AuthConfig) -> &'a str {
        match self {
            TokenKind::Access => &config.access_token_secret,
            TokenKind::Refresh => &config.refresh_token_secret,
        }
    }

    fn lifetime_secs(&self, config: &AuthConfig) -> i64 {
        match self {
            TokenKind::Access => config.access_token_lifetime_secs as i64,
            TokenKind::Refresh => config.refresh_token_lifetime_secs as i64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: user ID.
    pub sub: String,
    pub iss: String,
    /// Issued-at (Unix seconds).
    pub iat: i64,
    /// Expiration (Unix seconds).
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid, AuthError> {
        Uuid::parse_str(&self.sub)
            .map_err(|e| AuthError::TokenInvalid(format!("bad subject: {e}")))
    }
}

/// Tokens handed to a client after login, refresh or password change.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

/// Issue a signed HS256 JWT for `user_id`.
pub fn issue_token(
    user_id: Uuid,
    kind: TokenKind,
    config: &AuthConfig,
) -> Result<String, AuthError> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        iss: config.jwt_issuer.clone(),
        iat: now,
        exp: now + kind.lifetime_secs(config),
    };
    let key = EncodingKey::from_secret(kind.secret(config).as_bytes());
    jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &key)
        .map_err(|e| AuthError::Crypto(format!("JWT encode: {e}")))
}

/// Decode and verify an HS256 JWT (signature, expiry, issuer).
pub fn decode_token(
    token: &str,
    kind: TokenKind,
    config: &AuthConfig,
) -> Result<Claims, AuthError> {
    let key = DecodingKey::from_secret(kind.secret(config).as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.jwt_issuer]);
    validation.set_required_spec_claims(&["sub", "exp", "iat", "iss"]);
    validation.leeway = 0;

    jsonwebtoken::decode::<Claims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::TokenInvalid(e.to_string()),
        })
}

pub fn issue_pair(user_id: Uuid, config: &AuthConfig) -> Result<TokenPair, AuthError> {
    Ok(TokenPair {
        access_token: issue_token(user_id, TokenKind::Access, config)?,
        refresh_token: issue_token(user_id, TokenKind::Refresh, config)?,
        expires_in: config.access_token_lifetime_secs,
    })
}

/// Generate a random opaque token (32 bytes, base64url without padding).
pub fn generate_opaque_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rand::Rng::random(&mut rng);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 of a raw opaque token, hex-encoded. Only this hash is stored.
pub fn hash_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AuthConfig {
        AuthConfig {
            access_token_secret: "access-secret".into(),
            refresh_token_secret: "refresh-secret".into(),
            jwt_issuer: "vellum-test".into(),
            ..AuthConfig::default()
        }
    }

    #[test]
    fn jwt_roundtrip() {
        let config = test_config();
        let user_id = Uuid::new_v4();

        let token = issue_token(user_id, TokenKind::Access, &config).unwrap();
        let claims = decode_token(&token, TokenKind::Access, &config).unwrap();

        assert_eq!(claims.user_id().unwrap(), user_id);
        assert_eq!(claims.iss, "vellum-test");
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn access_and_refresh_are_not_interchangeable() {
        let config = test_config();
        let pair = issue_pair(Uuid::new_v4(), &config).unwrap();

        assert!(matches!(
            decode_token(&pair.refresh_token, TokenKind::Access, &config),
            Err(AuthError::TokenInvalid(_))
        ));
        assert!(decode_token(&pair.access_token, TokenKind::Refresh, &config).is_err());
        assert!(decode_token(&pair.refresh_token, TokenKind::Refresh, &config).is_ok());
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let config = test_config();
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            iss: config.jwt_issuer.clone(),
            iat: now - 1000,
            exp: now - 100,
        };
        let key = EncodingKey::from_secret(config.access_token_secret.as_bytes());
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &key).unwrap();

        assert!(matches!(
            decode_token(&token, TokenKind::Access, &config),
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn wrong_issuer_is_rejected() {
        let config = test_config();
        let token = issue_token(Uuid::new_v4(), TokenKind::Access, &config).unwrap();
        let other = AuthConfig {
            jwt_issuer: "someone-else".into(),
            ..test_config()
        };
        assert!(decode_token(&token, TokenKind::Access, &other).is_err());
    }

    #[test]
    fn opaque_token_is_url_safe() {
        let token = generate_opaque_token();
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
        assert_eq!(token.len(), 43);
        assert_ne!(token, generate_opaque_token());
    }

    #[test]
    fn token_hash_is_deterministic_hex() {
        let h = hash_token("some-token");
        assert_eq!(h, hash_token("some-token"));
        assert_ne!(h, hash_token("other-token"));
        assert_eq!(h.len(), 64);
    }
}
