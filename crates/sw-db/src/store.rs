//! SQLite implementation of [`ProviderConfigStore`].

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sw_core::{HealthStatus, ProviderConfigRecord, ProviderConfigStore, ProviderId, Result};

use crate::pool::{get_conn, DbPool};
use crate::queries::provider_configs;

/// Provider configuration persisted in the `provider_configs` table.
#[derive(Clone)]
pub struct SqliteConfigStore {
    pool: DbPool,
}

impl SqliteConfigStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Every stored record, enabled first, then by priority.
    pub fn list(&self) -> Result<Vec<ProviderConfigRecord>> {
        let conn = get_conn(&self.pool)?;
        provider_configs::list_provider_configs(&conn)
    }
}

#[async_trait]
impl ProviderConfigStore for SqliteConfigStore {
    async fn find_by_provider(&self, id: &ProviderId) -> Result<Option<ProviderConfigRecord>> {
        let conn = get_conn(&self.pool)?;
        provider_configs::get_provider_config(&conn, id)
    }

    async fn create_if_missing(&self, record: ProviderConfigRecord) -> Result<bool> {
        let conn = get_conn(&self.pool)?;
        provider_configs::insert_provider_config_if_absent(&conn, &record)
    }

    async fn set_enabled(&self, id: &ProviderId, enabled: bool) -> Result<()> {
        let conn = get_conn(&self.pool)?;
        provider_configs::set_enabled(&conn, id, enabled)
    }

    async fn set_priority(&self, id: &ProviderId, priority: i32) -> Result<()> {
        let conn = get_conn(&self.pool)?;
        provider_configs::set_priority(&conn, id, priority)
    }

    async fn update_settings(
        &self,
        id: &ProviderId,
        settings: serde_json::Map<String, serde_json::Value>,
    ) -> Result<()> {
        let conn = get_conn(&self.pool)?;
        provider_configs::update_settings(&conn, id, &settings)
    }

    async fn update_credentials(
        &self,
        id: &ProviderId,
        credentials: HashMap<String, String>,
    ) -> Result<()> {
        let conn = get_conn(&self.pool)?;
        provider_configs::update_credentials(&conn, id, &credentials)
    }

    async fn update_health(
        &self,
        id: &ProviderId,
        status: HealthStatus,
        checked_at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = get_conn(&self.pool)?;
        provider_configs::update_health(&conn, id, status, checked_at)
    }
}
