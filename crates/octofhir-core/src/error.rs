use thiserror::Error;

use crate::id::IdError;

/// Errors raised while interpreting FHIR primitive values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid FHIR DateTime: {0}")]
    InvalidDateTime(String),

    #[error("Invalid FHIR ID: {0}")]
    InvalidId(#[from] IdError),
}

impl CoreError {
    pub fn invalid_date_time(detail: impl Into<String>) -> Self {
        Self::InvalidDateTime(detail.into())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
