//! The facade the rest of the application calls to reach providers.
//!
//! Every operation resolves the provider through the [`ProviderRegistry`] and
//! checks the requested capability *before* consulting the
//! [`CircuitBreaker`]: an unknown id or unsupported capability is a caller
//! bug and must not count against the provider's health. Admitted calls are
//! optionally bounded by a deadline, and their outcome is reported back to
//! the breaker.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use sw_core::{HealthStatus, ProviderConfigRecord, ProviderConfigStore, ProviderId};
use tracing::{debug, info, warn};

use crate::circuit_breaker::{CircuitBreaker, CircuitStats};
use crate::error::{MetadataError, Operation, Result};
use crate::provider::{BookMetadata, Capability, MetadataProvider, SearchResult, SyncResult};
use crate::registry::{ProviderRegistry, ProviderSummary};

/// Capability-checked, failure-isolated access to registered providers.
pub struct ProviderOrchestrator {
    registry: Arc<ProviderRegistry>,
    breaker: Arc<CircuitBreaker>,
    store: Arc<dyn ProviderConfigStore>,
    call_timeout: Option<Duration>,
}

impl ProviderOrchestrator {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        breaker: Arc<CircuitBreaker>,
        store: Arc<dyn ProviderConfigStore>,
    ) -> Self {
        Self {
            registry,
            breaker,
            store,
            call_timeout: None,
        }
    }

    /// Bound every provider call by `timeout`. An expired call counts as a
    /// circuit failure; an expired health check reads as unavailable.
    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    pub async fn search(&self, id: &ProviderId, query: &str) -> Result<Vec<SearchResult>> {
        let provider = self.resolve(id, Capability::Search)?;
        let search = provider
            .as_search()
            .ok_or_else(|| MetadataError::unsupported(id.clone(), Capability::Search))?;

        self.admit(id, Operation::Search)?;
        let outcome = self.bounded(search.search(query)).await;
        self.settle(id, Operation::Search, outcome)
    }

    pub async fn fetch_metadata(&self, id: &ProviderId, external_id: &str) -> Result<BookMetadata> {
        let provider = self.resolve(id, Capability::MetadataFetch)?;
        let fetch = provider
            .as_metadata_fetch()
            .ok_or_else(|| MetadataError::unsupported(id.clone(), Capability::MetadataFetch))?;

        self.admit(id, Operation::FetchMetadata)?;
        let outcome = self.bounded(fetch.fetch_metadata(external_id)).await;
        self.settle(id, Operation::FetchMetadata, outcome)
    }

    pub async fn sync(&self, id: &ProviderId) -> Result<SyncResult> {
        let provider = self.resolve(id, Capability::Sync)?;
        let sync = provider
            .as_sync()
            .ok_or_else(|| MetadataError::unsupported(id.clone(), Capability::Sync))?;

        self.admit(id, Operation::Sync)?;
        let outcome = self.bounded(sync.sync()).await;
        self.settle(id, Operation::Sync, outcome)
    }

    // -----------------------------------------------------------------------
    // Health
    // -----------------------------------------------------------------------

    /// Probe one provider regardless of its circuit state.
    ///
    /// Only an unknown id is an error. A failing or hung probe yields
    /// [`HealthStatus::Unavailable`]; the status is persisted and mirrored
    /// into the registry either way.
    pub async fn health_check(&self, id: &ProviderId) -> Result<HealthStatus> {
        let provider = self
            .registry
            .get(id)
            .ok_or_else(|| MetadataError::ProviderNotFound(id.clone()))?;
        Ok(self.check(provider.as_ref()).await)
    }

    /// Probe every registered provider concurrently. Each provider
    /// contributes exactly one entry.
    pub async fn health_check_all(&self) -> HashMap<ProviderId, HealthStatus> {
        let providers = self.registry.get_all();
        let checks = providers.iter().map(|provider| async move {
            let status = self.check(provider.as_ref()).await;
            (provider.id().clone(), status)
        });
        join_all(checks).await.into_iter().collect()
    }

    async fn check(&self, provider: &dyn MetadataProvider) -> HealthStatus {
        let id = provider.id();
        let status = match self.bounded(provider.health_check()).await {
            Ok(status) => status,
            Err(e) => {
                warn!(provider = %id, error = %e, "Health check failed; marking unavailable");
                HealthStatus::Unavailable
            }
        };

        let persisted = match self.ensure_record(id).await {
            Ok(()) => self.store.update_health(id, status, Utc::now()).await,
            Err(e) => Err(e),
        };
        if let Err(e) = persisted {
            warn!(provider = %id, error = %e, "Failed to persist health status");
        }
        self.registry.update_health(id, status);
        debug!(provider = %id, status = %status, "Health check complete");
        status
    }

    // -----------------------------------------------------------------------
    // Administration
    // -----------------------------------------------------------------------

    /// Persist the enabled flag and mirror it into the registry.
    pub async fn set_enabled(&self, id: &ProviderId, enabled: bool) -> Result<()> {
        self.require(id)?;
        self.ensure_record(id).await?;
        self.store.set_enabled(id, enabled).await?;
        self.registry.set_enabled(id, enabled);
        info!(provider = %id, enabled, "Provider enabled flag updated");
        Ok(())
    }

    /// Persist the priority and mirror it into the registry.
    pub async fn set_priority(&self, id: &ProviderId, priority: i32) -> Result<()> {
        self.require(id)?;
        self.ensure_record(id).await?;
        self.store.set_priority(id, priority).await?;
        self.registry.set_priority(id, priority);
        info!(provider = %id, priority, "Provider priority updated");
        Ok(())
    }

    pub async fn update_settings(
        &self,
        id: &ProviderId,
        settings: serde_json::Map<String, serde_json::Value>,
    ) -> Result<()> {
        self.require(id)?;
        self.ensure_record(id).await?;
        self.store.update_settings(id, settings).await?;
        info!(provider = %id, "Provider settings updated");
        Ok(())
    }

    pub async fn update_credentials(
        &self,
        id: &ProviderId,
        credentials: HashMap<String, String>,
    ) -> Result<()> {
        self.require(id)?;
        self.ensure_record(id).await?;
        let keys = credentials.len();
        self.store.update_credentials(id, credentials).await?;
        info!(provider = %id, keys, "Provider credentials updated");
        Ok(())
    }

    /// The persisted record for a registered provider, if one was ever written.
    pub async fn provider_config(&self, id: &ProviderId) -> Result<Option<ProviderConfigRecord>> {
        self.require(id)?;
        Ok(self.store.find_by_provider(id).await?)
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    /// Enabled providers in failover order, after reconciling with the store.
    pub async fn get_enabled_providers(&self) -> Vec<Arc<dyn MetadataProvider>> {
        self.reconcile().await;
        self.registry.get_enabled()
    }

    pub async fn get_providers_by_capability(
        &self,
        capability: Capability,
    ) -> Vec<Arc<dyn MetadataProvider>> {
        self.reconcile().await;
        self.registry.get_by_capability(capability)
    }

    /// Reconciled snapshot of every registry entry.
    pub async fn provider_summaries(&self) -> Vec<ProviderSummary> {
        self.reconcile().await;
        self.registry.summaries()
    }

    pub fn circuit_stats(&self, id: &ProviderId) -> CircuitStats {
        self.breaker.stats(id)
    }

    pub fn reset_circuit(&self, id: &ProviderId) {
        self.breaker.reset(id);
    }

    /// Copy persisted enabled/priority values into the registry. Providers
    /// without a record keep their registration values; a store failure
    /// keeps the cached values.
    async fn reconcile(&self) {
        for provider in self.registry.get_all() {
            let id = provider.id();
            match self.store.find_by_provider(id).await {
                Ok(Some(record)) => {
                    self.registry.set_enabled(id, record.enabled);
                    self.registry.set_priority(id, record.priority);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(provider = %id, error = %e, "Failed to load provider config; using cached values");
                }
            }
        }
    }

    /// Persist the registry's enabled flag and priority for `id` if the store
    /// has no record yet, so the first write never resets them to defaults.
    async fn ensure_record(&self, id: &ProviderId) -> sw_core::Result<()> {
        let Some(entry) = self.registry.entry(id) else {
            return Ok(());
        };
        let mut record = ProviderConfigRecord::new(id.clone());
        record.enabled = entry.enabled;
        record.priority = entry.priority;
        if self.store.create_if_missing(record).await? {
            debug!(provider = %id, "Seeded provider config from registry");
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Dispatch helpers
    // -----------------------------------------------------------------------

    fn require(&self, id: &ProviderId) -> Result<()> {
        if self.registry.has(id) {
            Ok(())
        } else {
            Err(MetadataError::ProviderNotFound(id.clone()))
        }
    }

    fn resolve(&self, id: &ProviderId, capability: Capability) -> Result<Arc<dyn MetadataProvider>> {
        let provider = self
            .registry
            .get(id)
            .ok_or_else(|| MetadataError::ProviderNotFound(id.clone()))?;
        if !provider.descriptor().capabilities.supports(capability) {
            return Err(MetadataError::unsupported(id.clone(), capability));
        }
        Ok(provider)
    }

    fn admit(&self, id: &ProviderId, operation: Operation) -> Result<()> {
        if self.breaker.can_proceed(id) {
            Ok(())
        } else {
            warn!(provider = %id, operation = %operation, "Circuit open; rejecting call");
            Err(MetadataError::CircuitOpen(id.clone()))
        }
    }

    async fn bounded<T>(&self, call: impl Future<Output = anyhow::Result<T>>) -> anyhow::Result<T> {
        match self.call_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| anyhow::anyhow!("timed out after {limit:?}"))?,
            None => call.await,
        }
    }

    fn settle<T>(&self, id: &ProviderId, operation: Operation, outcome: anyhow::Result<T>) -> Result<T> {
        match outcome {
            Ok(value) => {
                self.breaker.record_success(id);
                debug!(provider = %id, operation = %operation, "Provider call succeeded");
                Ok(value)
            }
            Err(e) => {
                self.breaker.record_failure(id);
                warn!(provider = %id, operation = %operation, error = %e, "Provider call failed");
                Err(MetadataError::provider(id.clone(), operation, e))
            }
        }
    }
}
