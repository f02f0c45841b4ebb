//! Provider registry: the in-memory catalog of provider instances.
//!
//! The [`ProviderRegistry`] owns one entry per provider id, holding the shared
//! provider instance plus its enabled flag, priority and cached health. The
//! enabled providers sorted by priority form the failover sequence callers
//! walk through; ties keep registration order.
//!
//! The registry is an explicit instance built at bootstrap and shared behind
//! `Arc`. Its one-shot initialized latch lets a re-entrant bootstrap path
//! register the standard providers exactly once.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use sw_core::{HealthStatus, ProviderId, DEFAULT_PRIORITY};
use tracing::{error, info, warn};

use crate::error::{MetadataError, Result};
use crate::provider::{Capabilities, Capability, MetadataProvider};

/// Options applied when a provider is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationOptions {
    pub enabled: bool,
    /// Lower runs first.
    pub priority: i32,
}

impl Default for RegistrationOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            priority: DEFAULT_PRIORITY,
        }
    }
}

/// Point-in-time view of one registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderSummary {
    pub id: ProviderId,
    pub name: String,
    pub capabilities: Capabilities,
    pub enabled: bool,
    pub priority: i32,
    pub health_status: HealthStatus,
    pub last_health_check: Option<DateTime<Utc>>,
}

struct Entry {
    provider: Arc<dyn MetadataProvider>,
    enabled: bool,
    priority: i32,
    health_status: HealthStatus,
    last_health_check: Option<DateTime<Utc>>,
    /// Registration sequence number, the priority tie-breaker.
    order: u64,
}

impl Entry {
    fn summary(&self) -> ProviderSummary {
        let descriptor = self.provider.descriptor();
        ProviderSummary {
            id: descriptor.id.clone(),
            name: descriptor.name.clone(),
            capabilities: descriptor.capabilities,
            enabled: self.enabled,
            priority: self.priority,
            health_status: self.health_status,
            last_health_check: self.last_health_check,
        }
    }
}

#[derive(Default)]
struct Inner {
    entries: HashMap<ProviderId, Entry>,
    next_order: u64,
    initialized: bool,
}

impl Inner {
    /// Entries in registration order.
    fn ordered(&self) -> Vec<&Entry> {
        let mut entries: Vec<&Entry> = self.entries.values().collect();
        entries.sort_by_key(|e| e.order);
        entries
    }

    /// Enabled entries in failover order.
    fn enabled(&self) -> Vec<&Entry> {
        let mut entries: Vec<&Entry> = self.ordered().into_iter().filter(|e| e.enabled).collect();
        // Stable: equal priorities keep registration order.
        entries.sort_by_key(|e| e.priority);
        entries
    }
}

/// Thread-safe catalog of registered providers.
#[derive(Default)]
pub struct ProviderRegistry {
    inner: RwLock<Inner>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and store a provider.
    ///
    /// Fails with [`MetadataError::Configuration`] if the descriptor is
    /// invalid, if a declared capability has no implementation (or the
    /// reverse), or if the id is already registered. The existing entry is
    /// left untouched on failure.
    pub fn register(
        &self,
        provider: Arc<dyn MetadataProvider>,
        options: RegistrationOptions,
    ) -> Result<()> {
        if let Err(err) = validate(provider.as_ref()) {
            error!(provider = %provider.id(), error = %err, "Rejected provider registration");
            return Err(err);
        }

        let id = provider.id().clone();
        let mut inner = self.inner.write();
        if inner.entries.contains_key(&id) {
            let err =
                MetadataError::Configuration(format!("provider '{id}' is already registered"));
            error!(provider = %id, "Duplicate provider registration");
            return Err(err);
        }

        let order = inner.next_order;
        inner.next_order += 1;
        info!(
            provider = %id,
            name = %provider.descriptor().name,
            capabilities = ?provider.descriptor().capabilities.declared(),
            enabled = options.enabled,
            priority = options.priority,
            "Registered metadata provider"
        );
        inner.entries.insert(
            id,
            Entry {
                provider,
                enabled: options.enabled,
                priority: options.priority,
                health_status: HealthStatus::Healthy,
                last_health_check: None,
                order,
            },
        );
        Ok(())
    }

    pub fn get(&self, id: &ProviderId) -> Option<Arc<dyn MetadataProvider>> {
        self.inner
            .read()
            .entries
            .get(id)
            .map(|e| Arc::clone(&e.provider))
    }

    /// Every registered provider. Order is unspecified.
    pub fn get_all(&self) -> Vec<Arc<dyn MetadataProvider>> {
        self.inner
            .read()
            .entries
            .values()
            .map(|e| Arc::clone(&e.provider))
            .collect()
    }

    /// Enabled providers, ascending by priority, ties in registration order.
    pub fn get_enabled(&self) -> Vec<Arc<dyn MetadataProvider>> {
        self.inner
            .read()
            .enabled()
            .into_iter()
            .map(|e| Arc::clone(&e.provider))
            .collect()
    }

    /// [`get_enabled`](Self::get_enabled) filtered to providers declaring
    /// `capability`.
    pub fn get_by_capability(&self, capability: Capability) -> Vec<Arc<dyn MetadataProvider>> {
        self.inner
            .read()
            .enabled()
            .into_iter()
            .filter(|e| e.provider.descriptor().capabilities.supports(capability))
            .map(|e| Arc::clone(&e.provider))
            .collect()
    }

    /// Record a health check outcome, stamping the check time.
    pub fn update_health(&self, id: &ProviderId, status: HealthStatus) {
        self.update_entry(id, "update_health", |entry| {
            entry.health_status = status;
            entry.last_health_check = Some(Utc::now());
        });
    }

    pub fn set_enabled(&self, id: &ProviderId, enabled: bool) {
        self.update_entry(id, "set_enabled", |entry| entry.enabled = enabled);
    }

    pub fn set_priority(&self, id: &ProviderId, priority: i32) {
        self.update_entry(id, "set_priority", |entry| entry.priority = priority);
    }

    fn update_entry(&self, id: &ProviderId, action: &str, apply: impl FnOnce(&mut Entry)) {
        match self.inner.write().entries.get_mut(id) {
            Some(entry) => apply(entry),
            None => warn!(provider = %id, action, "Ignoring update for unknown provider"),
        }
    }

    pub fn has(&self, id: &ProviderId) -> bool {
        self.inner.read().entries.contains_key(id)
    }

    /// Remove a provider. Returns `true` if it was registered.
    pub fn unregister(&self, id: &ProviderId) -> bool {
        self.inner.write().entries.remove(id).is_some()
    }

    /// Remove every provider and reset the initialized latch.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.entries.clear();
        inner.initialized = false;
    }

    /// Flip the initialized latch. Returns `true` only for the call that
    /// flipped it.
    pub fn mark_initialized(&self) -> bool {
        let mut inner = self.inner.write();
        !std::mem::replace(&mut inner.initialized, true)
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.read().initialized
    }

    pub fn entry(&self, id: &ProviderId) -> Option<ProviderSummary> {
        self.inner.read().entries.get(id).map(Entry::summary)
    }

    /// Every entry: enabled ones in failover order, then disabled ones in
    /// registration order.
    pub fn summaries(&self) -> Vec<ProviderSummary> {
        let inner = self.inner.read();
        let mut out: Vec<ProviderSummary> =
            inner.enabled().into_iter().map(Entry::summary).collect();
        out.extend(
            inner
                .ordered()
                .into_iter()
                .filter(|e| !e.enabled)
                .map(Entry::summary),
        );
        out
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }
}

/// Check a provider's descriptor against its implementation.
fn validate(provider: &dyn MetadataProvider) -> Result<()> {
    let descriptor = provider.descriptor();
    if descriptor.id.is_blank() {
        return Err(MetadataError::Configuration(
            "provider id must not be empty".into(),
        ));
    }
    if descriptor.name.trim().is_empty() {
        return Err(MetadataError::Configuration(format!(
            "provider '{}' has an empty name",
            descriptor.id
        )));
    }

    for capability in Capability::ALL {
        let declared = descriptor.capabilities.supports(capability);
        let implemented = provider.implements(capability);
        if declared && !implemented {
            return Err(MetadataError::Configuration(format!(
                "provider '{}' declares {capability} but does not implement it",
                descriptor.id
            )));
        }
        if implemented && !declared {
            return Err(MetadataError::Configuration(format!(
                "provider '{}' implements {capability} without declaring it",
                descriptor.id
            )));
        }
    }
    Ok(())
}
