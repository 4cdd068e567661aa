pub mod auth;
pub mod rate_limit;

pub use auth::{AdminUser, AuthUser, ClientInfo};
pub use rate_limit::{RateLimitSettings, RateLimiter};
