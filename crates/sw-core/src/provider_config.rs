//! Persisted provider configuration and the store contract used to reach it.
//!
//! The orchestration layer treats persistence as a narrow collaborator: it
//! reads the enabled flag and priority (the source of truth for failover
//! ordering), and writes health results and administrative changes back. It
//! never sees the storage format. [`MemoryConfigStore`] is the process-local
//! implementation; the SQLite-backed one lives in `sw-db`.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ids::ProviderId;
use crate::Error;

/// Priority assigned to providers that have no explicit priority.
pub const DEFAULT_PRIORITY: i32 = 100;

// ---------------------------------------------------------------------------
// HealthStatus
// ---------------------------------------------------------------------------

/// Cached health classification of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unavailable,
}

impl HealthStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Unavailable => "unavailable",
        }
    }

    pub fn is_healthy(self) -> bool {
        self == HealthStatus::Healthy
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HealthStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "healthy" => Ok(HealthStatus::Healthy),
            "unavailable" => Ok(HealthStatus::Unavailable),
            other => Err(Error::validation(format!("unknown health status '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// ProviderConfigRecord
// ---------------------------------------------------------------------------

/// Persisted configuration for one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfigRecord {
    pub provider_id: ProviderId,
    pub enabled: bool,
    /// Lower runs first.
    pub priority: i32,
    /// Free-form provider settings.
    pub settings: serde_json::Map<String, serde_json::Value>,
    /// Free-form credentials. Never logged.
    #[serde(skip_serializing, default)]
    pub credentials: HashMap<String, String>,
    pub health_status: Option<HealthStatus>,
    pub last_health_check: Option<DateTime<Utc>>,
}

impl ProviderConfigRecord {
    /// A record with default values: enabled, default priority, empty maps,
    /// never health-checked.
    pub fn new(provider_id: ProviderId) -> Self {
        Self {
            provider_id,
            enabled: true,
            priority: DEFAULT_PRIORITY,
            settings: serde_json::Map::new(),
            credentials: HashMap::new(),
            health_status: None,
            last_health_check: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Store contract
// ---------------------------------------------------------------------------

/// Persistence contract for provider configuration.
///
/// All writes upsert: writing to a provider without a record creates one
/// from [`ProviderConfigRecord::new`] before applying the change. Callers
/// that know better starting values call
/// [`create_if_missing`](ProviderConfigStore::create_if_missing) first.
#[async_trait]
pub trait ProviderConfigStore: Send + Sync {
    /// Load the record for `id`, or `None` if it was never written.
    async fn find_by_provider(&self, id: &ProviderId) -> Result<Option<ProviderConfigRecord>>;

    /// Store `record` unless one already exists for its provider. Returns
    /// `true` if it was inserted; an existing record is left untouched.
    async fn create_if_missing(&self, record: ProviderConfigRecord) -> Result<bool>;

    async fn set_enabled(&self, id: &ProviderId, enabled: bool) -> Result<()>;

    async fn set_priority(&self, id: &ProviderId, priority: i32) -> Result<()>;

    /// Replace the settings map.
    async fn update_settings(
        &self,
        id: &ProviderId,
        settings: serde_json::Map<String, serde_json::Value>,
    ) -> Result<()>;

    /// Replace the credentials map.
    async fn update_credentials(
        &self,
        id: &ProviderId,
        credentials: HashMap<String, String>,
    ) -> Result<()>;

    async fn update_health(
        &self,
        id: &ProviderId,
        status: HealthStatus,
        checked_at: DateTime<Utc>,
    ) -> Result<()>;
}

// ---------------------------------------------------------------------------
// MemoryConfigStore
// ---------------------------------------------------------------------------

/// Process-local [`ProviderConfigStore`].
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    records: RwLock<HashMap<ProviderId, ProviderConfigRecord>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or overwrite a full record.
    pub fn insert(&self, record: ProviderConfigRecord) {
        self.records
            .write()
            .insert(record.provider_id.clone(), record);
    }

    fn upsert_with(&self, id: &ProviderId, apply: impl FnOnce(&mut ProviderConfigRecord)) {
        let mut records = self.records.write();
        let record = records
            .entry(id.clone())
            .or_insert_with(|| ProviderConfigRecord::new(id.clone()));
        apply(record);
    }
}

#[async_trait]
impl ProviderConfigStore for MemoryConfigStore {
    async fn find_by_provider(&self, id: &ProviderId) -> Result<Option<ProviderConfigRecord>> {
        Ok(self.records.read().get(id).cloned())
    }

    async fn create_if_missing(&self, record: ProviderConfigRecord) -> Result<bool> {
        let mut records = self.records.write();
        if records.contains_key(&record.provider_id) {
            return Ok(false);
        }
        records.insert(record.provider_id.clone(), record);
        Ok(true)
    }

    async fn set_enabled(&self, id: &ProviderId, enabled: bool) -> Result<()> {
        self.upsert_with(id, |record| record.enabled = enabled);
        Ok(())
    }

    async fn set_priority(&self, id: &ProviderId, priority: i32) -> Result<()> {
        self.upsert_with(id, |record| record.priority = priority);
        Ok(())
    }

    async fn update_settings(
        &self,
        id: &ProviderId,
        settings: serde_json::Map<String, serde_json::Value>,
    ) -> Result<()> {
        self.upsert_with(id, |record| record.settings = settings);
        Ok(())
    }

    async fn update_credentials(
        &self,
        id: &ProviderId,
        credentials: HashMap<String, String>,
    ) -> Result<()> {
        self.upsert_with(id, |record| record.credentials = credentials);
        Ok(())
    }

    async fn update_health(
        &self,
        id: &ProviderId,
        status: HealthStatus,
        checked_at: DateTime<Utc>,
    ) -> Result<()> {
        self.upsert_with(id, |record| {
            record.health_status = Some(status);
            record.last_health_check = Some(checked_at);
        });
        Ok(())
    }
}
