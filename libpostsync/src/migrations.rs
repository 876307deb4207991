//! Versioned schema migrations
//!
//! The schema is an append-only list of steps. `db_version` stores how many
//! steps from the start have been applied, so shipped steps must never be
//! reordered or edited; new ones go at the end.

use sqlx::sqlite::SqlitePool;
use tracing::{error, info, warn};

use crate::error::{MigrationError, Result};
use crate::events::{Event, EventBus};

/// One schema-definition statement
#[derive(Debug, Clone, Copy)]
pub struct MigrationStep {
    pub description: &'static str,
    pub sql: &'static str,
}

/// Schema steps in the order they shipped
pub const STEPS: &[MigrationStep] = &[
    MigrationStep {
        description: "create users table",
        sql: r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(100) NOT NULL,
                email VARCHAR(100) UNIQUE NOT NULL
            )
        "#,
    },
    MigrationStep {
        description: "create auth_tokens table",
        sql: r#"
            CREATE TABLE IF NOT EXISTS auth_tokens (
                platform TEXT PRIMARY KEY NOT NULL,
                username TEXT NOT NULL,
                token TEXT NOT NULL,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
        "#,
    },
    MigrationStep {
        description: "create posts table",
        sql: r#"
            CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                content TEXT,
                images TEXT,
                status TEXT NOT NULL,
                platforms TEXT,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
        "#,
    },
    MigrationStep {
        description: "add tags column to posts",
        sql: "ALTER TABLE posts ADD COLUMN tags TEXT",
    },
];

/// Applies pending schema steps exactly once each
pub struct SchemaMigrator {
    steps: &'static [MigrationStep],
    events: Option<EventBus>,
}

impl Default for SchemaMigrator {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaMigrator {
    pub fn new() -> Self {
        Self::with_steps(STEPS)
    }

    pub fn with_steps(steps: &'static [MigrationStep]) -> Self {
        Self {
            steps,
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Number of steps this migrator knows about
    pub fn target_version(&self) -> u32 {
        self.steps.len() as u32
    }

    /// Bring the store up to date. Safe to call on every open.
    ///
    /// Each step commits together with its version bump, so the stored
    /// version always equals the number of fully applied steps. A failing
    /// step aborts the run; the next call retries that same step.
    ///
    /// Returns the version the store is at afterwards.
    pub async fn ensure_up_to_date(&self, pool: &SqlitePool) -> Result<u32> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS db_version (
                version INTEGER PRIMARY KEY NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await
        .map_err(MigrationError::VersionTable)?;

        let current = match read_version(pool).await? {
            Some(version) => version,
            None => {
                sqlx::query("INSERT INTO db_version (version) VALUES (0)")
                    .execute(pool)
                    .await
                    .map_err(MigrationError::VersionTable)?;
                0
            }
        };

        info!("Current schema version: {}", current);

        let target = self.target_version();
        if current >= target {
            if current > target {
                warn!(
                    "Schema version {} is ahead of the {} known steps; leaving it untouched",
                    current, target
                );
            } else {
                info!("Schema is up to date");
            }
            return Ok(current);
        }

        info!("Applying {} pending migration(s)", target - current);

        for (index, step) in self.steps.iter().enumerate().skip(current as usize) {
            let version = index as u32 + 1;
            if let Err(source) = apply_step(pool, step, version).await {
                error!(
                    "Migration #{} ({}) failed: {}",
                    version, step.description, source
                );
                self.emit(Event::MigrationFailed {
                    version,
                    description: step.description.to_string(),
                    error: source.to_string(),
                });
                return Err(MigrationError::StepFailed {
                    version,
                    description: step.description,
                    source,
                }
                .into());
            }

            info!("Migration #{} applied: {}", version, step.description);
            self.emit(Event::MigrationApplied {
                version,
                description: step.description.to_string(),
            });
        }

        info!("All migrations completed");
        Ok(target)
    }

    fn emit(&self, event: Event) {
        if let Some(events) = &self.events {
            events.emit(event);
        }
    }
}

/// Read the stored schema version, `None` when the version row is missing
pub async fn read_version(pool: &SqlitePool) -> Result<Option<u32>> {
    let version: Option<i64> = sqlx::query_scalar("SELECT version FROM db_version LIMIT 1")
        .fetch_optional(pool)
        .await
        .map_err(MigrationError::VersionTable)?;

    Ok(version.map(|v| v.max(0) as u32))
}

async fn apply_step(
    pool: &SqlitePool,
    step: &MigrationStep,
    version: u32,
) -> std::result::Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(step.sql).execute(&mut *tx).await?;
    sqlx::query("UPDATE db_version SET version = ?")
        .bind(version as i64)
        .execute(&mut *tx)
        .await?;

    tx.commit().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;
    use crate::error::PostSyncError;

    static FLAKY_STEPS: &[MigrationStep] = &[
        MigrationStep {
            description: "create a",
            sql: "CREATE TABLE a (id INTEGER PRIMARY KEY)",
        },
        MigrationStep {
            description: "broken b",
            sql: "CREATE TABLE b (id INTEGER PRIMARY KEY",
        },
    ];

    static FIXED_STEPS: &[MigrationStep] = &[
        MigrationStep {
            description: "create a",
            sql: "CREATE TABLE a (id INTEGER PRIMARY KEY)",
        },
        MigrationStep {
            description: "create b",
            sql: "CREATE TABLE b (id INTEGER PRIMARY KEY)",
        },
        MigrationStep {
            description: "create c",
            sql: "CREATE TABLE c (id INTEGER PRIMARY KEY)",
        },
    ];

    async fn table_exists(pool: &SqlitePool, name: &str) -> bool {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(name)
        .fetch_one(pool)
        .await
        .unwrap();
        count == 1
    }

    #[tokio::test]
    async fn test_fresh_store_applies_all_steps() {
        let pool = memory_pool().await.unwrap();
        let version = SchemaMigrator::new().ensure_up_to_date(&pool).await.unwrap();

        assert_eq!(version, STEPS.len() as u32);
        assert_eq!(read_version(&pool).await.unwrap(), Some(STEPS.len() as u32));
        assert!(table_exists(&pool, "auth_tokens").await);
        assert!(table_exists(&pool, "posts").await);
        assert!(table_exists(&pool, "users").await);
    }

    #[tokio::test]
    async fn test_rerun_is_noop() {
        let pool = memory_pool().await.unwrap();
        let migrator = SchemaMigrator::new();
        migrator.ensure_up_to_date(&pool).await.unwrap();

        // Step 4 is a plain ALTER TABLE and would fail if re-applied
        let version = migrator.ensure_up_to_date(&pool).await.unwrap();
        assert_eq!(version, STEPS.len() as u32);

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM db_version")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn test_failed_step_leaves_version_at_last_good_step() {
        let pool = memory_pool().await.unwrap();

        let result = SchemaMigrator::with_steps(FLAKY_STEPS)
            .ensure_up_to_date(&pool)
            .await;

        match result {
            Err(PostSyncError::Migration(MigrationError::StepFailed { version, .. })) => {
                assert_eq!(version, 2);
            }
            other => panic!("Expected StepFailed, got {:?}", other),
        }
        assert_eq!(read_version(&pool).await.unwrap(), Some(1));
        assert!(!table_exists(&pool, "b").await);
    }

    #[tokio::test]
    async fn test_resume_applies_only_remaining_steps() {
        let pool = memory_pool().await.unwrap();
        let _ = SchemaMigrator::with_steps(FLAKY_STEPS)
            .ensure_up_to_date(&pool)
            .await;

        // Step 1 has no IF NOT EXISTS, so re-applying it would fail
        let version = SchemaMigrator::with_steps(FIXED_STEPS)
            .ensure_up_to_date(&pool)
            .await
            .unwrap();

        assert_eq!(version, 3);
        assert!(table_exists(&pool, "b").await);
        assert!(table_exists(&pool, "c").await);
    }

    #[tokio::test]
    async fn test_store_ahead_of_known_steps_is_left_alone() {
        let pool = memory_pool().await.unwrap();
        SchemaMigrator::with_steps(FIXED_STEPS)
            .ensure_up_to_date(&pool)
            .await
            .unwrap();

        let version = SchemaMigrator::with_steps(&FIXED_STEPS[..1])
            .ensure_up_to_date(&pool)
            .await
            .unwrap();
        assert_eq!(version, 3);
    }

    #[tokio::test]
    async fn test_events_emitted_per_step() {
        let pool = memory_pool().await.unwrap();
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        SchemaMigrator::with_steps(FIXED_STEPS)
            .with_events(bus.clone())
            .ensure_up_to_date(&pool)
            .await
            .unwrap();

        for expected in 1..=3 {
            match rx.recv().await.unwrap() {
                Event::MigrationApplied { version, .. } => assert_eq!(version, expected),
                other => panic!("Unexpected event {:?}", other),
            }
        }
    }
}
