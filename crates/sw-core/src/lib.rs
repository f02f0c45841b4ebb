//! sw-core: shared types, IDs, errors, configuration, and the provider
//! configuration persistence contract.
//!
//! This crate is the foundational dependency for the other sw-* crates.
//! It knows nothing about how providers are called; it only describes the
//! records the orchestration layer reads and writes.

pub mod config;
pub mod error;
pub mod ids;
pub mod provider_config;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use ids::ProviderId;
pub use provider_config::{
    HealthStatus, MemoryConfigStore, ProviderConfigRecord, ProviderConfigStore,
    DEFAULT_PRIORITY,
};
