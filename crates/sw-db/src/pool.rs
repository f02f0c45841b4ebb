//! Connection pool management for SQLite via r2d2.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use sw_core::{Error, Result};

use crate::migrations;

/// Pool over the provider config database.
pub type DbPool = Pool<SqliteConnectionManager>;

pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

const MAX_CONNECTIONS: u32 = 4;

/// Open (or create) the provider config database at `db_path`.
///
/// Missing parent directories are created. Connections use WAL and wait up
/// to five seconds on a lock held by another process.
pub fn init_pool(db_path: &Path) -> Result<DbPool> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )
    });
    let pool = build_migrated(manager)?;

    tracing::debug!(path = %db_path.display(), "Provider config database ready");
    Ok(pool)
}

/// A private in-memory database, migrated and shared by every connection
/// of the returned pool. Separate calls never see each other's data.
pub fn init_memory_pool() -> Result<DbPool> {
    static NEXT_DB: AtomicU64 = AtomicU64::new(0);
    let n = NEXT_DB.fetch_add(1, Ordering::Relaxed);
    let manager =
        SqliteConnectionManager::file(format!("file:swmemdb_{n}?mode=memory&cache=shared"));
    build_migrated(manager)
}

fn build_migrated(manager: SqliteConnectionManager) -> Result<DbPool> {
    let pool = Pool::builder()
        .max_size(MAX_CONNECTIONS)
        .build(manager)
        .map_err(|e| Error::database(format!("Failed to create connection pool: {e}")))?;

    let conn = get_conn(&pool)?;
    migrations::run_migrations(&conn)?;
    Ok(pool)
}

pub fn get_conn(pool: &DbPool) -> Result<PooledConnection> {
    pool.get()
        .map_err(|e| Error::database(format!("Failed to get connection from pool: {e}")))
}
