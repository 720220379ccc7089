//! # octofhir-storage
//!
//! Version tracking and persistence contracts for OctoFHIR records.
//!
//! This crate defines the traits and types that storage backends implement.
//! Apart from [`NoopVersionTracker`] it contains no implementations; those
//! live in `octofhir-db-memory` and `octofhir-db-postgres`.
//!
//! ## Overview
//!
//! - [`VersionTracker`] owns the per-resource version counter and the
//!   append-only history log, guarded by compare-and-swap on the version.
//! - [`ResourceRepository`] persists current resource content.
//!
//! ## Example
//!
//! ```ignore
//! use octofhir_storage::{DynVersionTracker, StorageError};
//!
//! async fn create(tracker: &DynVersionTracker, body: &Value) -> Result<Option<u64>, StorageError> {
//!     let outcome = tracker.record_create("Basic", "b1", body).await?;
//!     Ok(outcome.version_id())
//! }
//! ```

mod error;
mod noop;
mod traits;
mod types;

// Re-export everything from submodules
pub use error::{ErrorCategory, StorageError};
pub use noop::NoopVersionTracker;
pub use traits::{ResourceRepository, VersionTracker};
pub use types::{HistoryAction, HistoryEntry, HistoryParams, StoredResource, TrackOutcome};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shared version tracker.
pub type DynVersionTracker = std::sync::Arc<dyn VersionTracker>;

/// Type alias for a shared resource repository.
pub type DynRepository = std::sync::Arc<dyn ResourceRepository>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use octofhir_storage::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{ErrorCategory, StorageError};
    pub use crate::noop::NoopVersionTracker;
    pub use crate::traits::{ResourceRepository, VersionTracker};
    pub use crate::types::{
        HistoryAction, HistoryEntry, HistoryParams, StoredResource, TrackOutcome,
    };
    pub use crate::{DynRepository, DynVersionTracker, StorageResult};
}
