//! Provider configuration queries.
//!
//! Every write is an upsert: the row is created with default values first if
//! the provider has never been written, then the requested column is updated.
//! [`insert_provider_config_if_absent`] creates a row with chosen values.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use sw_core::{Error, HealthStatus, ProviderConfigRecord, ProviderId, Result};

const SELECT_COLUMNS: &str = "SELECT provider_id, enabled, priority, settings, credentials, \
     health_status, last_health_check FROM provider_configs";

/// Raw row as stored; JSON and timestamp columns are decoded afterwards so
/// decode failures surface as typed errors instead of rusqlite conversion
/// errors.
struct RawRow {
    provider_id: String,
    enabled: bool,
    priority: i32,
    settings: String,
    credentials: String,
    health_status: Option<String>,
    last_health_check: Option<String>,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            provider_id: row.get(0)?,
            enabled: row.get(1)?,
            priority: row.get(2)?,
            settings: row.get(3)?,
            credentials: row.get(4)?,
            health_status: row.get(5)?,
            last_health_check: row.get(6)?,
        })
    }

    fn decode(self) -> Result<ProviderConfigRecord> {
        let settings = serde_json::from_str(&self.settings).map_err(|e| {
            Error::internal(format!("bad settings for {}: {e}", self.provider_id))
        })?;
        let credentials = serde_json::from_str(&self.credentials).map_err(|e| {
            Error::internal(format!("bad credentials for {}: {e}", self.provider_id))
        })?;
        let health_status = self
            .health_status
            .as_deref()
            .map(str::parse::<HealthStatus>)
            .transpose()?;
        let last_health_check = self
            .last_health_check
            .as_deref()
            .map(|ts| {
                DateTime::parse_from_rfc3339(ts)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| Error::internal(format!("bad timestamp '{ts}': {e}")))
            })
            .transpose()?;

        Ok(ProviderConfigRecord {
            provider_id: ProviderId::new(self.provider_id),
            enabled: self.enabled,
            priority: self.priority,
            settings,
            credentials,
            health_status,
            last_health_check,
        })
    }
}

/// Get the configuration for a provider.
pub fn get_provider_config(
    conn: &Connection,
    id: &ProviderId,
) -> Result<Option<ProviderConfigRecord>> {
    let raw = conn
        .query_row(
            &format!("{SELECT_COLUMNS} WHERE provider_id = ?1"),
            [id.as_str()],
            RawRow::from_row,
        )
        .optional()
        .map_err(|e| Error::database(e.to_string()))?;

    raw.map(RawRow::decode).transpose()
}

/// List all provider configurations, enabled first, then by priority and id.
pub fn list_provider_configs(conn: &Connection) -> Result<Vec<ProviderConfigRecord>> {
    let mut stmt = conn
        .prepare(&format!(
            "{SELECT_COLUMNS} ORDER BY enabled DESC, priority ASC, provider_id ASC"
        ))
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([], RawRow::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    rows.into_iter().map(RawRow::decode).collect()
}

/// Insert `record` unless the provider already has a row. Returns `true` if
/// the row was inserted. Health columns are not written.
pub fn insert_provider_config_if_absent(
    conn: &Connection,
    record: &ProviderConfigRecord,
) -> Result<bool> {
    let settings =
        serde_json::to_string(&record.settings).map_err(|e| Error::internal(e.to_string()))?;
    let credentials =
        serde_json::to_string(&record.credentials).map_err(|e| Error::internal(e.to_string()))?;
    let n = conn
        .execute(
            "INSERT OR IGNORE INTO provider_configs
             (provider_id, enabled, priority, settings, credentials, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                record.provider_id.as_str(),
                record.enabled,
                record.priority,
                settings,
                credentials,
                Utc::now().to_rfc3339()
            ],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Insert a default row for `id` if none exists.
fn ensure_row(conn: &Connection, id: &ProviderId) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO provider_configs (provider_id, updated_at) VALUES (?1, ?2)",
        rusqlite::params![id.as_str(), Utc::now().to_rfc3339()],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

/// Apply a single-column update after making sure the row exists.
fn upsert_column(
    conn: &Connection,
    id: &ProviderId,
    assignment: &str,
    value: &dyn rusqlite::ToSql,
) -> Result<()> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| Error::database(e.to_string()))?;
    ensure_row(&tx, id)?;
    tx.execute(
        &format!("UPDATE provider_configs SET {assignment}, updated_at = ?2 WHERE provider_id = ?3"),
        rusqlite::params![value, Utc::now().to_rfc3339(), id.as_str()],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    tx.commit().map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

/// Enable or disable a provider.
pub fn set_enabled(conn: &Connection, id: &ProviderId, enabled: bool) -> Result<()> {
    upsert_column(conn, id, "enabled = ?1", &enabled)
}

/// Change a provider's priority.
pub fn set_priority(conn: &Connection, id: &ProviderId, priority: i32) -> Result<()> {
    upsert_column(conn, id, "priority = ?1", &priority)
}

/// Replace a provider's settings map.
pub fn update_settings(
    conn: &Connection,
    id: &ProviderId,
    settings: &serde_json::Map<String, serde_json::Value>,
) -> Result<()> {
    let json = serde_json::to_string(settings).map_err(|e| Error::internal(e.to_string()))?;
    upsert_column(conn, id, "settings = ?1", &json)
}

/// Replace a provider's credentials map.
pub fn update_credentials(
    conn: &Connection,
    id: &ProviderId,
    credentials: &HashMap<String, String>,
) -> Result<()> {
    let json = serde_json::to_string(credentials).map_err(|e| Error::internal(e.to_string()))?;
    upsert_column(conn, id, "credentials = ?1", &json)
}

/// Record the outcome of a health check.
pub fn update_health(
    conn: &Connection,
    id: &ProviderId,
    status: HealthStatus,
    checked_at: DateTime<Utc>,
) -> Result<()> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| Error::database(e.to_string()))?;
    ensure_row(&tx, id)?;
    tx.execute(
        "UPDATE provider_configs
         SET health_status = ?1, last_health_check = ?2, updated_at = ?3
         WHERE provider_id = ?4",
        rusqlite::params![
            status.as_str(),
            checked_at.to_rfc3339(),
            Utc::now().to_rfc3339(),
            id.as_str()
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    tx.commit().map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

/// Delete a provider's configuration. Returns `true` if a row was removed.
pub fn delete_provider_config(conn: &Connection, id: &ProviderId) -> Result<bool> {
    let n = conn
        .execute(
            "DELETE FROM provider_configs WHERE provider_id = ?1",
            [id.as_str()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;

    #[test]
    fn missing_provider_is_none() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let found = get_provider_config(&conn, &ProviderId::new("nope")).unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn set_enabled_creates_default_row() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let id = ProviderId::new("manual");

        set_enabled(&conn, &id, false).unwrap();

        let record = get_provider_config(&conn, &id).unwrap().unwrap();
        assert!(!record.enabled);
        assert_eq!(record.priority, 100);
        assert!(record.settings.is_empty());
        assert!(record.credentials.is_empty());
        assert!(record.health_status.is_none());
        assert!(record.last_health_check.is_none());
    }

    #[test]
    fn updates_preserve_other_columns() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let id = ProviderId::new("remote");

        set_priority(&conn, &id, 5).unwrap();
        set_enabled(&conn, &id, false).unwrap();
        let mut settings = serde_json::Map::new();
        settings.insert("region".into(), serde_json::json!("eu"));
        update_settings(&conn, &id, &settings).unwrap();
        update_credentials(
            &conn,
            &id,
            &HashMap::from([("token".to_string(), "abc".to_string())]),
        )
        .unwrap();

        let record = get_provider_config(&conn, &id).unwrap().unwrap();
        assert_eq!(record.priority, 5);
        assert!(!record.enabled);
        assert_eq!(record.settings["region"], "eu");
        assert_eq!(record.credentials["token"], "abc");
    }

    #[test]
    fn insert_if_absent_does_not_overwrite() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let id = ProviderId::new("remote");

        let mut record = ProviderConfigRecord::new(id.clone());
        record.enabled = false;
        record.priority = 4;
        assert!(insert_provider_config_if_absent(&conn, &record).unwrap());

        update_health(&conn, &id, HealthStatus::Healthy, Utc::now()).unwrap();
        let fresh = ProviderConfigRecord::new(id.clone());
        assert!(!insert_provider_config_if_absent(&conn, &fresh).unwrap());

        let stored = get_provider_config(&conn, &id).unwrap().unwrap();
        assert!(!stored.enabled);
        assert_eq!(stored.priority, 4);
        assert_eq!(stored.health_status, Some(HealthStatus::Healthy));
    }

    #[test]
    fn health_round_trip() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let id = ProviderId::new("remote");
        let checked_at = Utc::now();

        update_health(&conn, &id, HealthStatus::Unavailable, checked_at).unwrap();

        let record = get_provider_config(&conn, &id).unwrap().unwrap();
        assert_eq!(record.health_status, Some(HealthStatus::Unavailable));
        let stored = record.last_health_check.unwrap();
        assert_eq!(stored.timestamp_micros(), checked_at.timestamp_micros());
    }

    #[test]
    fn list_orders_enabled_then_priority() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        set_priority(&conn, &ProviderId::new("b"), 10).unwrap();
        set_priority(&conn, &ProviderId::new("a"), 20).unwrap();
        set_priority(&conn, &ProviderId::new("c"), 1).unwrap();
        set_enabled(&conn, &ProviderId::new("c"), false).unwrap();

        let ids: Vec<String> = list_provider_configs(&conn)
            .unwrap()
            .into_iter()
            .map(|r| r.provider_id.to_string())
            .collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn delete() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let id = ProviderId::new("manual");

        set_enabled(&conn, &id, true).unwrap();
        assert!(delete_provider_config(&conn, &id).unwrap());
        assert!(!delete_provider_config(&conn, &id).unwrap());
        assert!(get_provider_config(&conn, &id).unwrap().is_none());
    }
}
