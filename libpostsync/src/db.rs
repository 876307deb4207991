//! Store handle shared by every repository
//!
//! The store is one long-lived SQLite connection, opened explicitly and
//! passed to the repositories that need it. Opening runs the schema
//! migrations; a `Store` value therefore always points at an up-to-date
//! schema.

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::error::{DbError, PostSyncError, Result};
use crate::events::EventBus;
use crate::migrations::{self, SchemaMigrator};

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if needed) the store at `db_path` and migrate it
    pub async fn open(db_path: &str) -> Result<Self> {
        Self::open_with(db_path, SchemaMigrator::new()).await
    }

    /// Open the store, reporting migration progress on `events`
    pub async fn open_with_events(db_path: &str, events: &EventBus) -> Result<Self> {
        Self::open_with(db_path, SchemaMigrator::new().with_events(events.clone())).await
    }

    pub async fn open_with(db_path: &str, migrator: SchemaMigrator) -> Result<Self> {
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = single_connection_pool(options).await?;
        migrator.ensure_up_to_date(&pool).await?;

        info!("Store opened at {}", expanded_path);
        Ok(Self { pool })
    }

    /// Open a private in-memory store, already migrated
    pub async fn open_in_memory() -> Result<Self> {
        let pool = memory_pool().await?;
        SchemaMigrator::new().ensure_up_to_date(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn schema_version(&self) -> Result<u32> {
        Ok(migrations::read_version(&self.pool).await?.unwrap_or(0))
    }

    /// Close the underlying connection; clones of this handle become unusable
    pub async fn close(self) {
        self.pool.close().await;
        info!("Store closed");
    }
}

/// One connection that never expires; an in-memory database lives exactly
/// as long as that connection.
async fn single_connection_pool(options: SqliteConnectOptions) -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .map_err(DbError::SqlxError)?;
    Ok(pool)
}

/// Parse a `CURRENT_TIMESTAMP` value (UTC, `YYYY-MM-DD HH:MM:SS`)
pub(crate) fn parse_timestamp(table: &'static str, raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            PostSyncError::from(DbError::CorruptRow {
                table,
                message: format!("bad created_at '{}': {}", raw, e),
            })
        })
}

pub(crate) async fn memory_pool() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(DbError::SqlxError)?;
    single_connection_pool(options).await
}
