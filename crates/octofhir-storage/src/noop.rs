//! Tracker used when versioning is disabled for a resource type.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StorageError;
use crate::traits::VersionTracker;
use crate::types::{HistoryEntry, HistoryParams, TrackOutcome};

/// A [`VersionTracker`] that records nothing.
///
/// Writes report [`TrackOutcome::Untracked`] instead of inventing a version,
/// history is always empty and every version read is `NotFound`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopVersionTracker;

#[async_trait]
impl VersionTracker for NoopVersionTracker {
    async fn record_create(
        &self,
        _resource_type: &str,
        _id: &str,
        _resource: &Value,
    ) -> Result<TrackOutcome, StorageError> {
        Ok(TrackOutcome::Untracked)
    }

    async fn record_update(
        &self,
        _resource_type: &str,
        _id: &str,
        _expected_version: u64,
        _resource: &Value,
    ) -> Result<TrackOutcome, StorageError> {
        Ok(TrackOutcome::Untracked)
    }

    async fn record_delete(
        &self,
        _resource_type: &str,
        _id: &str,
        _expected_version: u64,
    ) -> Result<TrackOutcome, StorageError> {
        Ok(TrackOutcome::Untracked)
    }

    async fn history(
        &self,
        _resource_type: &str,
        _id: &str,
        _params: &HistoryParams,
    ) -> Result<Vec<HistoryEntry>, StorageError> {
        Ok(Vec::new())
    }

    async fn version(
        &self,
        resource_type: &str,
        id: &str,
        _version_id: u64,
    ) -> Result<HistoryEntry, StorageError> {
        Err(StorageError::not_found(resource_type, id))
    }

    fn is_enabled(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "noop"
    }
}
