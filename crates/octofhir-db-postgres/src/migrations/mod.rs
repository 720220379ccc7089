//! Embedded schema migrations for the tracker and resource tables.

use sqlx_core::migrate::{Migration, MigrationType, Migrator};
use sqlx_postgres::PgPool;
use std::borrow::Cow;
use tracing::{info, instrument};

use crate::error::{PostgresError, Result};

/// Migrations in apply order: `(version, description, sql)`.
macro_rules! embedded_migrations {
    () => {
        &[
            (
                20250101000001i64,
                "resource_versions",
                include_str!("../../migrations/20250101000001_resource_versions.sql"),
            ),
            (
                20250101000002i64,
                "resource_current",
                include_str!("../../migrations/20250101000002_resource_current.sql"),
            ),
        ]
    };
}

fn build_migrations() -> Vec<Migration> {
    embedded_migrations!()
        .iter()
        .map(|(version, description, sql)| Migration {
            version: *version,
            description: Cow::Borrowed(description),
            migration_type: MigrationType::Simple,
            sql: Cow::Borrowed(sql),
            checksum: Cow::Borrowed(&[]),
            no_tx: false,
        })
        .collect()
}

/// Versions of all embedded migrations, oldest first.
pub fn versions() -> Vec<i64> {
    build_migrations().iter().map(|m| m.version).collect()
}

/// Applies all pending embedded migrations.
///
/// Applied migrations are tracked in `_sqlx_migrations`; running this on an
/// up-to-date database is a no-op.
///
/// # Errors
///
/// Returns `PostgresError::Migration` if a migration fails to execute.
#[instrument(skip(pool))]
pub async fn run(pool: &PgPool) -> Result<()> {
    let migrations = build_migrations();
    info!(count = migrations.len(), "Running embedded migrations");

    let migrator = Migrator {
        migrations: Cow::Owned(migrations),
        ignore_missing: false,
        locking: true,
        no_tx: false,
    };

    migrator
        .run(pool)
        .await
        .map_err(|e| PostgresError::Migration(format!("Migration failed: {e}")))?;

    info!("Database migrations completed");
    Ok(())
}
