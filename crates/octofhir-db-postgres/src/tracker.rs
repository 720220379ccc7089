//! PostgreSQL [`VersionTracker`].
//!
//! The version counter lives in `resource_version`, one row per resource.
//! Updates and deletes advance it with a conditional
//! `UPDATE ... WHERE version_id = $expected AND NOT deleted`, so the check
//! and the write are one statement under the row lock Postgres takes for the
//! update. The history row is written in the same transaction.
//!
//! The `*_in` functions take a `&mut PgConnection` so a caller can run them
//! inside its own transaction together with the resource row write.

use async_trait::async_trait;
use serde_json::Value;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_core::query_scalar::query_scalar;
use sqlx_postgres::{PgConnection, PgPool};
use time::OffsetDateTime;
use tracing::{debug, instrument, warn};

use octofhir_storage::{
    HistoryAction, HistoryEntry, HistoryParams, StorageError, TrackOutcome, VersionTracker,
};

use crate::config::PostgresConfig;
use crate::error::storage_error;
use crate::{migrations, pool};

#[derive(Debug, Clone)]
pub struct PostgresVersionTracker {
    pool: PgPool,
}

impl PostgresVersionTracker {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates a pool from `config` and runs migrations if enabled.
    pub async fn connect(config: &PostgresConfig) -> Result<Self, StorageError> {
        let pool = pool::create_pool(config).await?;
        if config.run_migrations {
            migrations::run(&pool).await?;
        }
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Inserts version 1 and its `create` entry.
    #[instrument(skip(conn, resource))]
    pub async fn record_create_in(
        conn: &mut PgConnection,
        resource_type: &str,
        id: &str,
        resource: &Value,
    ) -> Result<TrackOutcome, StorageError> {
        let now = OffsetDateTime::now_utc();
        let inserted = query(
            "INSERT INTO resource_version (resource_type, resource_id, version_id, deleted, updated_at)
             VALUES ($1, $2, 1, FALSE, $3)
             ON CONFLICT (resource_type, resource_id) DO NOTHING",
        )
        .bind(resource_type)
        .bind(id)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(storage_error)?;

        if inserted.rows_affected() == 0 {
            return Err(StorageError::already_exists(resource_type, id));
        }

        let entry = entry(resource_type, id, 1, HistoryAction::Create, resource.clone(), now);
        insert_history(conn, &entry).await?;
        debug!(resource_type, id, version_id = 1, "recorded create");
        Ok(TrackOutcome::Tracked(entry))
    }

    /// Advances the version if it still equals `expected_version`.
    #[instrument(skip(conn, resource))]
    pub async fn record_update_in(
        conn: &mut PgConnection,
        resource_type: &str,
        id: &str,
        expected_version: u64,
        resource: &Value,
    ) -> Result<TrackOutcome, StorageError> {
        let now = OffsetDateTime::now_utc();
        let version_id =
            advance(conn, resource_type, id, expected_version, false, now).await?;
        let entry = entry(resource_type, id, version_id, HistoryAction::Update, resource.clone(), now);
        insert_history(conn, &entry).await?;
        debug!(resource_type, id, version_id, "recorded update");
        Ok(TrackOutcome::Tracked(entry))
    }

    /// Marks the resource deleted if its version still equals `expected_version`.
    ///
    /// The `delete` entry carries the snapshot of the latest history entry.
    #[instrument(skip(conn))]
    pub async fn record_delete_in(
        conn: &mut PgConnection,
        resource_type: &str,
        id: &str,
        expected_version: u64,
    ) -> Result<TrackOutcome, StorageError> {
        let now = OffsetDateTime::now_utc();
        let version_id = advance(conn, resource_type, id, expected_version, true, now).await?;

        let snapshot: Option<Value> = query_scalar(
            "SELECT resource FROM resource_history
             WHERE resource_type = $1 AND resource_id = $2
             ORDER BY version_id DESC
             LIMIT 1",
        )
        .bind(resource_type)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(storage_error)?;

        let entry = entry(
            resource_type,
            id,
            version_id,
            HistoryAction::Delete,
            snapshot.unwrap_or(Value::Null),
            now,
        );
        insert_history(conn, &entry).await?;
        debug!(resource_type, id, version_id, "recorded delete");
        Ok(TrackOutcome::Tracked(entry))
    }
}

fn entry(
    resource_type: &str,
    id: &str,
    version_id: u64,
    action: HistoryAction,
    resource: Value,
    timestamp: OffsetDateTime,
) -> HistoryEntry {
    HistoryEntry {
        timestamp,
        ..HistoryEntry::new(resource_type, id, version_id, action, resource)
    }
}

fn to_db_version(version: u64) -> Result<i64, StorageError> {
    i64::try_from(version)
        .map_err(|_| StorageError::invalid_resource(format!("Version {version} is out of range")))
}

fn from_db_version(version: i64) -> Result<u64, StorageError> {
    u64::try_from(version)
        .map_err(|_| StorageError::internal(format!("Stored version {version} is negative")))
}

/// Compare-and-swap on the version row. Returns the new version.
async fn advance(
    conn: &mut PgConnection,
    resource_type: &str,
    id: &str,
    expected_version: u64,
    delete: bool,
    now: OffsetDateTime,
) -> Result<u64, StorageError> {
    let expected = to_db_version(expected_version)?;
    let advanced: Option<i64> = query_scalar(
        "UPDATE resource_version
         SET version_id = version_id + 1, deleted = $4, updated_at = $5
         WHERE resource_type = $1 AND resource_id = $2 AND version_id = $3 AND NOT deleted
         RETURNING version_id",
    )
    .bind(resource_type)
    .bind(id)
    .bind(expected)
    .bind(delete)
    .bind(now)
    .fetch_optional(&mut *conn)
    .await
    .map_err(storage_error)?;

    if let Some(version) = advanced {
        return from_db_version(version);
    }

    // The conditional update matched nothing; find out why.
    let current: Option<(i64, bool)> = query_as(
        "SELECT version_id, deleted FROM resource_version
         WHERE resource_type = $1 AND resource_id = $2",
    )
    .bind(resource_type)
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(storage_error)?;

    match current {
        None => Err(StorageError::not_found(resource_type, id)),
        Some((_, true)) => Err(StorageError::deleted(resource_type, id)),
        Some((actual, false)) => {
            let actual = from_db_version(actual)?;
            warn!(resource_type, id, expected_version, actual, "version conflict");
            Err(StorageError::version_conflict(expected_version, actual))
        }
    }
}

async fn insert_history(conn: &mut PgConnection, entry: &HistoryEntry) -> Result<(), StorageError> {
    query(
        "INSERT INTO resource_history (resource_type, resource_id, version_id, action, resource, recorded_at)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(&entry.resource_type)
    .bind(&entry.resource_id)
    .bind(to_db_version(entry.version_id)?)
    .bind(entry.action.as_str())
    .bind(&entry.resource)
    .bind(entry.timestamp)
    .execute(&mut *conn)
    .await
    .map_err(storage_error)?;
    Ok(())
}

type HistoryRow = (i64, String, Value, OffsetDateTime);

fn history_entry(resource_type: &str, id: &str, row: HistoryRow) -> Result<HistoryEntry, StorageError> {
    let (version_id, action, resource, recorded_at) = row;
    Ok(entry(
        resource_type,
        id,
        from_db_version(version_id)?,
        action.parse()?,
        resource,
        recorded_at,
    ))
}

#[async_trait]
impl VersionTracker for PostgresVersionTracker {
    async fn record_create(
        &self,
        resource_type: &str,
        id: &str,
        resource: &Value,
    ) -> Result<TrackOutcome, StorageError> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;
        let outcome = Self::record_create_in(&mut *tx, resource_type, id, resource).await?;
        tx.commit()
            .await
            .map_err(|e| StorageError::transaction_error(format!("Failed to commit: {e}")))?;
        Ok(outcome)
    }

    async fn record_update(
        &self,
        resource_type: &str,
        id: &str,
        expected_version: u64,
        resource: &Value,
    ) -> Result<TrackOutcome, StorageError> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;
        let outcome =
            Self::record_update_in(&mut *tx, resource_type, id, expected_version, resource).await?;
        tx.commit()
            .await
            .map_err(|e| StorageError::transaction_error(format!("Failed to commit: {e}")))?;
        Ok(outcome)
    }

    async fn record_delete(
        &self,
        resource_type: &str,
        id: &str,
        expected_version: u64,
    ) -> Result<TrackOutcome, StorageError> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;
        let outcome = Self::record_delete_in(&mut *tx, resource_type, id, expected_version).await?;
        tx.commit()
            .await
            .map_err(|e| StorageError::transaction_error(format!("Failed to commit: {e}")))?;
        Ok(outcome)
    }

    #[instrument(skip(self, params))]
    async fn history(
        &self,
        resource_type: &str,
        id: &str,
        params: &HistoryParams,
    ) -> Result<Vec<HistoryEntry>, StorageError> {
        let rows: Vec<HistoryRow> = query_as(
            "SELECT version_id, action, resource, recorded_at FROM resource_history
             WHERE resource_type = $1 AND resource_id = $2
               AND ($3::timestamptz IS NULL OR recorded_at >= $3)
             ORDER BY version_id ASC
             LIMIT $4 OFFSET $5",
        )
        .bind(resource_type)
        .bind(id)
        .bind(params.since)
        .bind(params.count.map(i64::from))
        .bind(i64::from(params.offset.unwrap_or(0)))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        rows.into_iter()
            .map(|row| history_entry(resource_type, id, row))
            .collect()
    }

    #[instrument(skip(self))]
    async fn version(
        &self,
        resource_type: &str,
        id: &str,
        version_id: u64,
    ) -> Result<HistoryEntry, StorageError> {
        let row: Option<HistoryRow> = query_as(
            "SELECT version_id, action, resource, recorded_at FROM resource_history
             WHERE resource_type = $1 AND resource_id = $2 AND version_id = $3",
        )
        .bind(resource_type)
        .bind(id)
        .bind(to_db_version(version_id)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        match row {
            Some(row) => history_entry(resource_type, id, row),
            None => Err(StorageError::not_found(
                resource_type,
                format!("{id}/_history/{version_id}"),
            )),
        }
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
