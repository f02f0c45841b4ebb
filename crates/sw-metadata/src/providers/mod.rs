//! Concrete metadata provider implementations.
//!
//! Each submodule implements [`MetadataProvider`](crate::MetadataProvider)
//! for a single source.

pub mod local_catalog;
pub mod manual;

pub use local_catalog::LocalCatalogProvider;
pub use manual::ManualProvider;
