//! Storage error types shared by version trackers and repositories.

use std::fmt;

/// Errors that can occur while tracking versions or persisting resources.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested resource (or version of it) was not found.
    #[error("Resource not found: {resource_type}/{id}")]
    NotFound {
        /// The type of resource that was not found.
        resource_type: String,
        /// The ID of the resource that was not found.
        id: String,
    },

    /// The resource exists in history but its latest version is a delete.
    #[error("Resource deleted: {resource_type}/{id}")]
    Deleted {
        /// The type of the deleted resource.
        resource_type: String,
        /// The ID of the deleted resource.
        id: String,
    },

    /// The caller's expected version did not match the stored one.
    #[error("Version conflict: expected {expected}, found {actual}")]
    VersionConflict {
        /// The version the caller last saw.
        expected: u64,
        /// The version currently stored.
        actual: u64,
    },

    /// Attempted to create a resource that already exists.
    #[error("Resource already exists: {resource_type}/{id}")]
    AlreadyExists {
        /// The type of resource that already exists.
        resource_type: String,
        /// The ID of the resource that already exists.
        id: String,
    },

    /// The resource data is invalid.
    #[error("Invalid resource: {message}")]
    InvalidResource {
        /// Description of why the resource is invalid.
        message: String,
    },

    /// A write to the version counter or history log failed.
    #[error("Persistence error: {message}")]
    Persistence {
        /// Description of the failed write.
        message: String,
    },

    /// An error occurred while beginning or committing a transaction.
    #[error("Transaction error: {message}")]
    TransactionError {
        /// Description of the transaction error.
        message: String,
    },

    /// Failed to connect to the storage backend.
    #[error("Connection error: {message}")]
    ConnectionError {
        /// Description of the connection error.
        message: String,
    },

    /// An internal storage error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl StorageError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    /// Creates a new `Deleted` error.
    #[must_use]
    pub fn deleted(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Deleted {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    /// Creates a new `VersionConflict` error.
    #[must_use]
    pub fn version_conflict(expected: u64, actual: u64) -> Self {
        Self::VersionConflict { expected, actual }
    }

    /// Creates a new `AlreadyExists` error.
    #[must_use]
    pub fn already_exists(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    /// Creates a new `InvalidResource` error.
    #[must_use]
    pub fn invalid_resource(message: impl Into<String>) -> Self {
        Self::InvalidResource {
            message: message.into(),
        }
    }

    /// Creates a new `Persistence` error.
    #[must_use]
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
        }
    }

    /// Creates a new `TransactionError` error.
    #[must_use]
    pub fn transaction_error(message: impl Into<String>) -> Self {
        Self::TransactionError {
            message: message.into(),
        }
    }

    /// Creates a new `ConnectionError` error.
    #[must_use]
    pub fn connection_error(message: impl Into<String>) -> Self {
        Self::ConnectionError {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if this is a deleted error.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        matches!(self, Self::Deleted { .. })
    }

    /// Returns `true` if this is a version conflict error.
    #[must_use]
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }

    /// Returns `true` if this is an already exists error.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Returns the error category for logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Deleted { .. } => ErrorCategory::Gone,
            Self::VersionConflict { .. } | Self::AlreadyExists { .. } => ErrorCategory::Conflict,
            Self::InvalidResource { .. } => ErrorCategory::Validation,
            Self::Persistence { .. } | Self::TransactionError { .. } => {
                ErrorCategory::Persistence
            }
            Self::ConnectionError { .. } => ErrorCategory::Infrastructure,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of storage errors for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Resource or version not found.
    NotFound,
    /// Resource was deleted.
    Gone,
    /// Conflict (version or existence).
    Conflict,
    /// Validation error.
    Validation,
    /// Failed write or transaction.
    Persistence,
    /// Infrastructure/connection error.
    Infrastructure,
    /// Internal error.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Gone => write!(f, "gone"),
            Self::Conflict => write!(f, "conflict"),
            Self::Validation => write!(f, "validation"),
            Self::Persistence => write!(f, "persistence"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
