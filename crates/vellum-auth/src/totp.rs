//! TOTP generation, verification, and AES-256-GCM secret encryption.

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use totp_rs::{Algorithm, Secret, TOTP};

use crate::error::AuthError;

const DIGITS: usize = 6;
/// Accepted drift in 30-second steps, either side of now.
const SKEW: u8 = 2;
const STEP_SECS: u64 = 30;

/// Encrypt a TOTP secret with AES-256-GCM.
///
/// Returns `base64(nonce || ciphertext || tag)`.
pub fn encrypt_secret(key: &[u8; 32], plaintext: &[u8]) -> Result<String, AuthError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let mut nonce_bytes = [0u8; 12];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| AuthError::Crypto(format!("AES-GCM encrypt: {e}")))?;

    let mut combined = nonce_bytes.to_vec();
    combined.extend_from_slice(&ciphertext);
    Ok(STANDARD.encode(combined))
}

pub fn decrypt_secret(key: &[u8; 32], encoded: &str) -> Result<Vec<u8>, AuthError> {
    let combined = STANDARD
        .decode(encoded)
        .map_err(|e| AuthError::Crypto(format!("base64 decode: {e}")))?;

    if combined.len() < 13 {
        return Err(AuthError::Crypto("ciphertext too short".into()));
    }

    let (nonce_bytes, ciphertext) = combined.split_at(12);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|e| AuthError::Crypto(format!("AES-GCM decrypt: {e}")))
}

fn build(secret_bytes: Vec<u8>, issuer: &str, account: &str) -> Result<TOTP, AuthError> {
    TOTP::new(
        Algorithm::SHA1,
        DIGITS,
        SKEW,
        STEP_SECS,
        secret_bytes,
        Some(issuer.to_string()),
        account.to_string(),
    )
    .map_err(|e| AuthError::Crypto(format!("TOTP init: {e}")))
}

/// A fresh TOTP secret ready to be shown to the user.
#[derive(Debug, Clone)]
pub struct Enrollment {
    pub secret_bytes: Vec<u8>,
    /// Base32 form for manual entry.
    pub base32: String,
    pub otpauth_uri: String,
}

pub fn generate_enrollment(issuer: &str, account: &str) -> Result<Enrollment, AuthError> {
    let secret = Secret::generate_secret();
    let secret_bytes = secret
        .to_bytes()
        .map_err(|e| AuthError::Crypto(format!("secret bytes: {e}")))?;

    let totp = build(secret_bytes.clone(), issuer, account)?;

    Ok(Enrollment {
        secret_bytes,
        base32: secret.to_encoded().to_string(),
        otpauth_uri: totp.get_url(),
    })
}

pub fn verify_code(
    secret_bytes: &[u8],
    code: &str,
    issuer: &str,
    account: &str,
) -> Result<bool, AuthError> {
    let code = code.trim();
    if code.len() != DIGITS || !code.chars().all(|c| c.is_ascii_digit()) {
        return Ok(false);
    }
    build(secret_bytes.to_vec(), issuer, account)?
        .check_current(code)
        .map_err(|e| AuthError::Crypto(format!("TOTP check: {e}")))
}

/// Current code for a raw secret. Used by tests and tooling.
pub fn current_code(secret_bytes: &[u8], issuer: &str, account: &str) -> Result<String, AuthError> {
    build(secret_bytes.to_vec(), issuer, account)?
        .generate_current()
        .map_err(|e| AuthError::Crypto(format!("TOTP generate: {e}")))
}

/// Decode a base32 secret as shown to the user back into raw bytes.
pub fn decode_base32(base32: &str) -> Result<Vec<u8>, AuthError> {
    Secret::Encoded(base32.to_string())
        .to_bytes()
        .map_err(|e| AuthError::Crypto(format!("base32 decode: {e}")))
}
