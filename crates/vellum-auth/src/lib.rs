//! Vellum Auth: password policy, JWT access/refresh tokens, TOTP
//! two-factor and the login/lockout state machine.

pub mod config;
pub mod error;
pub mod password;
pub mod service;
pub mod token;
pub mod totp;

pub use config::AuthConfig;
pub use error::AuthError;
pub use service::{
    AuthService, Authenticated, LoginInput, LoginOutcome, RegisterInput, Registration,
    TwoFactorSetup,
};
pub use token::{Claims, TokenKind, TokenPair};
