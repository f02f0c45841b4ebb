//! Database query modules.

pub mod provider_configs;
