//! Vellum Storage: the object-store collaborator holding document
//! bytes, with an S3 backend and an in-memory backend.

pub mod error;
pub mod key;
pub mod memory;
pub mod s3;
pub mod store;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use s3::{S3Config, S3Store};
pub use store::{ObjectInfo, ObjectStore};
