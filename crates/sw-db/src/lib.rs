//! sw-db: database access and persistence layer.
//!
//! This crate provides SQLite-backed storage for provider configuration
//! with connection pooling, embedded migrations, and a
//! [`SqliteConfigStore`](store::SqliteConfigStore) that implements the
//! `sw-core` persistence contract.

pub mod migrations;
pub mod pool;
pub mod queries;
pub mod store;

pub use store::SqliteConfigStore;
