//! Manual entry provider.
//!
//! Books entered by hand have no external source to query, so this provider
//! declares no operations. It exists so manually created books still carry a
//! provider id and show up in provider listings.

use async_trait::async_trait;
use sw_core::HealthStatus;

use crate::provider::{Capabilities, MetadataProvider, ProviderDescriptor};

pub const MANUAL_PROVIDER_ID: &str = "manual";

pub struct ManualProvider {
    descriptor: ProviderDescriptor,
}

impl ManualProvider {
    pub fn new() -> Self {
        Self {
            descriptor: ProviderDescriptor::new(
                MANUAL_PROVIDER_ID,
                "Manual Entry",
                Capabilities::none(),
            ),
        }
    }
}

impl Default for ManualProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataProvider for ManualProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn health_check(&self) -> anyhow::Result<HealthStatus> {
        Ok(HealthStatus::Healthy)
    }
}
