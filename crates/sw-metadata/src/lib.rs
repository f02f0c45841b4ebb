//! Metadata provider orchestration for enriching library books with
//! external data.
//!
//! # Module layout
//!
//! - [`provider`] -- Provider contract: descriptor, capability traits, and
//!   the shared data types returned by provider calls.
//! - [`registry`] -- In-memory catalog of provider instances with
//!   validation, enable/disable, and priority ordering.
//! - [`circuit_breaker`] -- Per-provider failure isolation.
//! - [`orchestrator`] -- The facade the rest of the application calls.
//! - [`providers`] -- Reference provider implementations.
//! - [`error`] -- Typed errors surfaced by the orchestrator.

pub mod circuit_breaker;
pub mod error;
pub mod orchestrator;
pub mod provider;
pub mod providers;
pub mod registry;

pub use circuit_breaker::{BreakerPolicy, CircuitBreaker, CircuitState, CircuitStats};
pub use error::{MetadataError, Operation};
pub use orchestrator::ProviderOrchestrator;
pub use provider::{
    BookMetadata, Capabilities, Capability, MetadataFetchProvider, MetadataProvider,
    ProviderDescriptor, SearchProvider, SearchResult, SyncProvider, SyncResult,
};
pub use registry::{ProviderRegistry, ProviderSummary, RegistrationOptions};
