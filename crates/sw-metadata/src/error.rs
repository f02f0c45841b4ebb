//! Errors surfaced by the registry and orchestrator.
//!
//! Callers branch on two questions: is this provider down right now (try the
//! next one in priority order), or was the call itself wrong (fix the call
//! site). [`MetadataError::is_transient`] and [`MetadataError::is_caller_error`]
//! answer them.

use std::fmt;

use sw_core::ProviderId;

use crate::provider::Capability;

/// Operation being dispatched to a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Search,
    FetchMetadata,
    Sync,
    HealthCheck,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Search => "search",
            Operation::FetchMetadata => "fetch_metadata",
            Operation::Sync => "sync",
            Operation::HealthCheck => "health_check",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    /// Invalid or duplicate provider at registration. Fatal at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Provider not found: {0}")]
    ProviderNotFound(ProviderId),

    #[error("Provider '{provider}' does not support {capability}")]
    CapabilityUnsupported {
        provider: ProviderId,
        capability: Capability,
    },

    /// The circuit breaker rejected the call without invoking the provider.
    #[error("Circuit open for provider '{0}'")]
    CircuitOpen(ProviderId),

    /// The provider's own call failed or timed out.
    #[error("Provider '{provider}' failed during {operation}: {source}")]
    Provider {
        provider: ProviderId,
        operation: Operation,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The provider configuration store failed.
    #[error("Provider config store error: {0}")]
    Store(#[from] sw_core::Error),
}

impl MetadataError {
    pub fn provider(provider: ProviderId, operation: Operation, source: anyhow::Error) -> Self {
        MetadataError::Provider {
            provider,
            operation,
            source: source.into(),
        }
    }

    pub fn unsupported(provider: ProviderId, capability: Capability) -> Self {
        MetadataError::CapabilityUnsupported {
            provider,
            capability,
        }
    }

    /// The provider is unavailable right now; another provider may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            MetadataError::CircuitOpen(_) | MetadataError::Provider { .. }
        )
    }

    /// The call was invalid for this provider; retrying elsewhere will not help.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            MetadataError::ProviderNotFound(_) | MetadataError::CapabilityUnsupported { .. }
        )
    }
}

/// Result alias using [`MetadataError`].
pub type Result<T> = std::result::Result<T, MetadataError>;
