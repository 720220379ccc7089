//! Patch error types.

/// Errors produced while parsing or applying a patch.
///
/// `index` is the zero-based position of the failing operation in a JSON
/// Patch document. A failure at any index aborts the whole patch.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PatchError {
    /// The patch body is not a well-formed patch document.
    #[error("Invalid patch document: {0}")]
    Parse(String),

    /// A `path` or `from` pointer does not resolve in the document, including
    /// array indexes past the end.
    #[error("Operation {index}: path not found: {path}")]
    PathNotFound { index: usize, path: String },

    /// The operation cannot be applied to the value it targets.
    #[error("Operation {index}: {message}")]
    InvalidTarget { index: usize, message: String },

    /// A `test` operation found a different value.
    #[error("Operation {index}: test failed at {path}")]
    TestFailed { index: usize, path: String },

    /// The request media type is not a supported patch format.
    #[error("Unsupported patch media type: {0}")]
    UnsupportedMediaType(String),

    /// The patch changed `resourceType` or `id`.
    #[error("Patch must not change '{field}'")]
    ProtectedField { field: String },

    /// The patched document no longer fits the target record type.
    #[error("Patched document is invalid: {0}")]
    InvalidResult(String),
}

impl PatchError {
    /// Creates a new `Parse` error.
    #[must_use]
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Returns `true` if the patch body itself was malformed.
    #[must_use]
    pub fn is_parse_error(&self) -> bool {
        matches!(self, Self::Parse(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PatchError::PathNotFound {
            index: 2,
            path: "/a/b".into(),
        };
        assert_eq!(err.to_string(), "Operation 2: path not found: /a/b");

        let err = PatchError::ProtectedField { field: "id".into() };
        assert_eq!(err.to_string(), "Patch must not change 'id'");
    }

    #[test]
    fn test_error_classification() {
        assert!(PatchError::parse("bad").is_parse_error());
        assert!(
            !PatchError::TestFailed {
                index: 0,
                path: "/x".into()
            }
            .is_parse_error()
        );
    }
}
