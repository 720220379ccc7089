use thiserror::Error;

/// Errors raised while compiling or running a search.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SearchError {
    #[error("Invalid value for search parameter '{param}': {message}")]
    InvalidValue { param: String, message: String },

    #[error("Unsupported modifier ':{modifier}' on search parameter '{param}'")]
    InvalidModifier { param: String, modifier: String },

    #[error("Invalid SQL identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Query too complex: {0}")]
    QueryTooComplex(String),

    #[error("Search execution failed: {0}")]
    Execution(String),
}

impl SearchError {
    pub fn invalid_value(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            param: param.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if the error was caused by request input.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidValue { .. } | Self::InvalidModifier { .. } | Self::QueryTooComplex(_)
        )
    }
}
