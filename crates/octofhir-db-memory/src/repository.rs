use async_trait::async_trait;
use octofhir_storage::{ResourceRepository, StorageError, StoredResource};
use papaya::{Compute, HashMap as PapayaHashMap, Operation};

use crate::{StorageKey, make_storage_key};

/// In-memory [`ResourceRepository`] keyed by `ResourceType/id`.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    data: PapayaHashMap<StorageKey, StoredResource>,
}

impl InMemoryRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored resources.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[async_trait]
impl ResourceRepository for InMemoryRepository {
    async fn insert(&self, resource: StoredResource) -> Result<(), StorageError> {
        let key = resource.key();
        let (resource_type, id) = (resource.resource_type.clone(), resource.id.clone());
        let data = self.data.pin();
        match data.try_insert(key, resource) {
            Ok(_) => Ok(()),
            Err(_) => Err(StorageError::already_exists(resource_type, id)),
        }
    }

    async fn fetch(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Option<StoredResource>, StorageError> {
        let data = self.data.pin();
        Ok(data.get(&make_storage_key(resource_type, id)).cloned())
    }

    async fn replace(&self, resource: StoredResource) -> Result<(), StorageError> {
        let key = resource.key();
        let data = self.data.pin();
        let outcome = data.compute(key, |entry| match entry {
            None => Operation::Abort(StorageError::not_found(
                &resource.resource_type,
                &resource.id,
            )),
            Some((_, current)) => match (current.version_id, resource.version_id) {
                (Some(stored), Some(incoming)) if stored >= incoming => Operation::Abort(
                    StorageError::version_conflict(incoming.saturating_sub(1), stored),
                ),
                _ => Operation::Insert(resource.clone()),
            },
        });
        match outcome {
            Compute::Aborted(err) => Err(err),
            _ => Ok(()),
        }
    }

    async fn remove(&self, resource_type: &str, id: &str) -> Result<(), StorageError> {
        let data = self.data.pin();
        match data.remove(&make_storage_key(resource_type, id)) {
            Some(_) => Ok(()),
            None => Err(StorageError::not_found(resource_type, id)),
        }
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
