//! Vellum Core: domain models, repository traits, document access
//! resolution and the shared error type.

pub mod access;
pub mod error;
pub mod models;
pub mod repository;
