use std::sync::Arc;

use async_trait::async_trait;
use octofhir_storage::{
    HistoryAction, HistoryEntry, HistoryParams, StorageError, TrackOutcome, VersionTracker,
};
use papaya::HashMap as PapayaHashMap;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::{StorageKey, make_storage_key};

/// Version counter and history of one resource.
#[derive(Debug, Default)]
struct VersionRow {
    current: u64,
    deleted: bool,
    entries: Vec<HistoryEntry>,
}

impl VersionRow {
    /// Checks that the row is live and still at `expected`.
    fn check(&self, resource_type: &str, id: &str, expected: u64) -> Result<(), StorageError> {
        if self.entries.is_empty() {
            return Err(StorageError::not_found(resource_type, id));
        }
        if self.deleted {
            return Err(StorageError::deleted(resource_type, id));
        }
        if self.current != expected {
            return Err(StorageError::version_conflict(expected, self.current));
        }
        Ok(())
    }

    fn append(&mut self, entry: HistoryEntry) -> TrackOutcome {
        self.current = entry.version_id;
        self.deleted = entry.action == HistoryAction::Delete;
        self.entries.push(entry.clone());
        TrackOutcome::Tracked(entry)
    }
}

/// In-memory [`VersionTracker`].
///
/// Each resource gets its own row guarded by an async mutex. The mutex is the
/// row lock: the version check and the history append happen under it, so two
/// writers holding the same expected version cannot both succeed.
#[derive(Debug, Default)]
pub struct InMemoryVersionTracker {
    rows: PapayaHashMap<StorageKey, Arc<Mutex<VersionRow>>>,
}

impl InMemoryVersionTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the row for a key, inserting an empty one if needed.
    fn row(&self, resource_type: &str, id: &str) -> Arc<Mutex<VersionRow>> {
        let rows = self.rows.pin();
        rows.get_or_insert_with(make_storage_key(resource_type, id), Default::default)
            .clone()
    }

    fn existing_row(&self, resource_type: &str, id: &str) -> Option<Arc<Mutex<VersionRow>>> {
        let rows = self.rows.pin();
        rows.get(&make_storage_key(resource_type, id)).cloned()
    }
}

#[async_trait]
impl VersionTracker for InMemoryVersionTracker {
    async fn record_create(
        &self,
        resource_type: &str,
        id: &str,
        resource: &Value,
    ) -> Result<TrackOutcome, StorageError> {
        let row = self.row(resource_type, id);
        let mut row = row.lock().await;
        if !row.entries.is_empty() {
            return Err(StorageError::already_exists(resource_type, id));
        }

        let entry = HistoryEntry::new(resource_type, id, 1, HistoryAction::Create, resource.clone());
        tracing::debug!(resource_type, id, version_id = 1, "recorded create");
        Ok(row.append(entry))
    }

    async fn record_update(
        &self,
        resource_type: &str,
        id: &str,
        expected_version: u64,
        resource: &Value,
    ) -> Result<TrackOutcome, StorageError> {
        let Some(row) = self.existing_row(resource_type, id) else {
            return Err(StorageError::not_found(resource_type, id));
        };
        let mut row = row.lock().await;
        if let Err(e) = row.check(resource_type, id, expected_version) {
            if e.is_version_conflict() {
                tracing::warn!(resource_type, id, expected_version, actual = row.current, "version conflict on update");
            }
            return Err(e);
        }

        let version_id = row.current + 1;
        let entry = HistoryEntry::new(
            resource_type,
            id,
            version_id,
            HistoryAction::Update,
            resource.clone(),
        );
        tracing::debug!(resource_type, id, version_id, "recorded update");
        Ok(row.append(entry))
    }

    async fn record_delete(
        &self,
        resource_type: &str,
        id: &str,
        expected_version: u64,
    ) -> Result<TrackOutcome, StorageError> {
        let Some(row) = self.existing_row(resource_type, id) else {
            return Err(StorageError::not_found(resource_type, id));
        };
        let mut row = row.lock().await;
        if let Err(e) = row.check(resource_type, id, expected_version) {
            if e.is_version_conflict() {
                tracing::warn!(resource_type, id, expected_version, actual = row.current, "version conflict on delete");
            }
            return Err(e);
        }

        let snapshot = row
            .entries
            .last()
            .map(|e| e.resource.clone())
            .unwrap_or(Value::Null);
        let version_id = row.current + 1;
        let entry = HistoryEntry::new(resource_type, id, version_id, HistoryAction::Delete, snapshot);
        tracing::debug!(resource_type, id, version_id, "recorded delete");
        Ok(row.append(entry))
    }

    async fn history(
        &self,
        resource_type: &str,
        id: &str,
        params: &HistoryParams,
    ) -> Result<Vec<HistoryEntry>, StorageError> {
        let Some(row) = self.existing_row(resource_type, id) else {
            return Ok(Vec::new());
        };
        let entries = row.lock().await.entries.clone();
        Ok(params.apply(entries))
    }

    async fn version(
        &self,
        resource_type: &str,
        id: &str,
        version_id: u64,
    ) -> Result<HistoryEntry, StorageError> {
        let Some(row) = self.existing_row(resource_type, id) else {
            return Err(StorageError::not_found(resource_type, id));
        };
        let row = row.lock().await;
        row.entries
            .iter()
            .find(|e| e.version_id == version_id)
            .cloned()
            .ok_or_else(|| StorageError::not_found(resource_type, format!("{id}/_history/{version_id}")))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
