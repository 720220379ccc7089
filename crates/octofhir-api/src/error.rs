use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use octofhir_patch::PatchError;
use octofhir_search::SearchError;
use octofhir_storage::StorageError;
use thiserror::Error;

use crate::outcome::OperationOutcome;

/// FHIR JSON media type used for every response body.
pub const FHIR_JSON: &str = "application/fhir+json";

/// High-level API errors to be mapped to HTTP responses and FHIR OperationOutcome
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Invalid search parameter '{param}': {message}")]
    InvalidSearchParameter { param: String, message: String },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Gone: {0}")]
    Gone(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),
    #[error("Unprocessable entity: {0}")]
    UnprocessableEntity(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
    pub fn gone(msg: impl Into<String>) -> Self {
        Self::Gone(msg.into())
    }
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
    pub fn precondition_failed(msg: impl Into<String>) -> Self {
        Self::PreconditionFailed(msg.into())
    }
    pub fn unsupported_media_type(msg: impl Into<String>) -> Self {
        Self::UnsupportedMediaType(msg.into())
    }
    pub fn unprocessable_entity(msg: impl Into<String>) -> Self {
        Self::UnprocessableEntity(msg.into())
    }
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Maps a storage error raised under an `If-Match` precondition.
    ///
    /// A version conflict becomes 412 instead of 409 because the client
    /// named the version it expected.
    pub fn from_conditional(err: StorageError) -> Self {
        match err {
            StorageError::VersionConflict { .. } => Self::PreconditionFailed(err.to_string()),
            other => other.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::InvalidSearchParameter { .. } => {
                StatusCode::BAD_REQUEST
            }
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Gone(_) => StatusCode::GONE,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
            ApiError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn to_operation_outcome(&self) -> OperationOutcome {
        match self {
            ApiError::BadRequest(msg) => OperationOutcome::single("error", "invalid", msg),
            ApiError::InvalidSearchParameter { param, message } => {
                OperationOutcome::single("error", "invalid", message).with_expression(param)
            }
            ApiError::NotFound(msg) => OperationOutcome::single("error", "not-found", msg),
            ApiError::Gone(msg) => OperationOutcome::single("error", "deleted", msg),
            ApiError::Conflict(msg) => OperationOutcome::single("error", "conflict", msg),
            ApiError::PreconditionFailed(msg) => OperationOutcome::single("error", "conflict", msg),
            ApiError::UnsupportedMediaType(msg) => {
                OperationOutcome::single("error", "not-supported", msg)
            }
            ApiError::UnprocessableEntity(msg) => {
                OperationOutcome::single("error", "processing", msg)
            }
            ApiError::Internal(msg) => OperationOutcome::single("fatal", "exception", msg),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        let message = err.to_string();
        match err {
            StorageError::NotFound { .. } => Self::NotFound(message),
            StorageError::Deleted { .. } => Self::Gone(message),
            StorageError::VersionConflict { .. } | StorageError::AlreadyExists { .. } => {
                Self::Conflict(message)
            }
            StorageError::InvalidResource { .. } => Self::BadRequest(message),
            StorageError::Persistence { .. }
            | StorageError::TransactionError { .. }
            | StorageError::ConnectionError { .. }
            | StorageError::Internal { .. } => {
                tracing::error!(category = %err.category(), error = %message, "storage failure");
                Self::Internal(message)
            }
        }
    }
}

impl From<PatchError> for ApiError {
    fn from(err: PatchError) -> Self {
        let message = err.to_string();
        match err {
            PatchError::Parse(_) => Self::BadRequest(message),
            PatchError::UnsupportedMediaType(_) => Self::UnsupportedMediaType(message),
            PatchError::PathNotFound { .. }
            | PatchError::InvalidTarget { .. }
            | PatchError::TestFailed { .. }
            | PatchError::ProtectedField { .. }
            | PatchError::InvalidResult(_) => Self::UnprocessableEntity(message),
        }
    }
}

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::InvalidValue { param, message } => {
                Self::InvalidSearchParameter { param, message }
            }
            SearchError::InvalidModifier { ref param, .. } => Self::InvalidSearchParameter {
                param: param.clone(),
                message: err.to_string(),
            },
            SearchError::QueryTooComplex(_) => Self::BadRequest(err.to_string()),
            SearchError::InvalidIdentifier(_) | SearchError::Execution(_) => {
                tracing::error!(error = %err, "search failure");
                Self::Internal(err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let outcome = self.to_operation_outcome();
        let body = serde_json::to_vec(&outcome).unwrap_or_else(|_| {
            let fallback = OperationOutcome::single("fatal", "exception", "Serialization failure");
            serde_json::to_vec(&fallback).unwrap_or_else(|_| b"{}".to_vec())
        });

        let mut response = (status, body).into_response();
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(FHIR_JSON));
        response
    }
}
