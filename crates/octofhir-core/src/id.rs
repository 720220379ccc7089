use thiserror::Error;

/// Maximum length of a FHIR logical id.
pub const MAX_ID_LENGTH: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("ID must not be empty")]
    Empty,

    #[error("ID is longer than {MAX_ID_LENGTH} characters")]
    TooLong,

    #[error("ID contains invalid character '{0}'")]
    InvalidCharacter(char),
}

pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Checks an id against the FHIR `id` datatype: `[A-Za-z0-9\-\.]{1,64}`.
pub fn validate_id(id: &str) -> Result<(), IdError> {
    if id.is_empty() {
        return Err(IdError::Empty);
    }
    if id.len() > MAX_ID_LENGTH {
        return Err(IdError::TooLong);
    }
    match id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '.'))
    {
        Some(c) => Err(IdError::InvalidCharacter(c)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_id_is_valid() {
        let id = generate_id();
        assert!(validate_id(&id).is_ok());
        assert_ne!(id, generate_id());
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id("example").is_ok());
        assert!(validate_id("a.b-c.1").is_ok());
        assert_eq!(validate_id(""), Err(IdError::Empty));
        assert_eq!(validate_id(&"a".repeat(65)), Err(IdError::TooLong));
        assert!(validate_id(&"a".repeat(64)).is_ok());
        assert_eq!(validate_id("a/b"), Err(IdError::InvalidCharacter('/')));
        assert_eq!(validate_id("a_b"), Err(IdError::InvalidCharacter('_')));
    }
}
