//! SurrealDB repository implementations.

mod activity;
mod comment;
mod document;
mod message;
mod notification;
mod stats;
mod tenant;
mod user;

pub use activity::SurrealActivityLogRepository;
pub use comment::SurrealCommentRepository;
pub use document::SurrealDocumentRepository;
pub use message::SurrealMessageRepository;
pub use notification::SurrealNotificationRepository;
pub use stats::SurrealStatsRepository;
pub use tenant::SurrealTenantRepository;
pub use user::SurrealUserRepository;
