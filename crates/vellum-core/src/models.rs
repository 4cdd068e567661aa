//! Domain models for Vellum.
//!
//! These are the core types shared across all crates. Derived values
//! (`full_name`, `is_locked`, `file_size_formatted`) are computed on
//! read and never persisted.

pub mod activity;
pub mod comment;
pub mod document;
pub mod message;
pub mod notification;
pub mod tenant;
pub mod user;
