use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::SearchError;

/// Page window of a search, derived from `_count` and `_offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u32,
}

impl Pagination {
    pub fn new(limit: u32, offset: u32) -> Self {
        Self { limit, offset }
    }

    /// Reads `_count` and `_offset` from raw query parameters.
    ///
    /// A missing `_count` falls back to `default_count`; a larger one is
    /// clamped to `max_count`.
    pub fn from_params(
        params: &HashMap<String, String>,
        default_count: u32,
        max_count: u32,
    ) -> Result<Self, SearchError> {
        let limit = match params.get("_count") {
            Some(raw) => parse_non_negative("_count", raw)?.min(max_count),
            None => default_count.min(max_count),
        };
        let offset = match params.get("_offset") {
            Some(raw) => parse_non_negative("_offset", raw)?,
            None => 0,
        };
        Ok(Self { limit, offset })
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 10,
            offset: 0,
        }
    }
}

fn parse_non_negative(name: &str, raw: &str) -> Result<u32, SearchError> {
    raw.trim()
        .parse::<u32>()
        .map_err(|_| SearchError::invalid_value(name, format!("expected a non-negative integer, got '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let page = Pagination::from_params(&params(&[]), 20, 100).unwrap();
        assert_eq!(page, Pagination::new(20, 0));
    }

    #[test]
    fn test_explicit_values() {
        let page = Pagination::from_params(&params(&[("_count", "5"), ("_offset", "15")]), 20, 100)
            .unwrap();
        assert_eq!(page, Pagination::new(5, 15));
    }

    #[test]
    fn test_count_is_clamped() {
        let page = Pagination::from_params(&params(&[("_count", "5000")]), 20, 100).unwrap();
        assert_eq!(page.limit, 100);
    }

    #[test]
    fn test_zero_count_is_allowed() {
        let page = Pagination::from_params(&params(&[("_count", "0")]), 20, 100).unwrap();
        assert_eq!(page.limit, 0);
    }

    #[test]
    fn test_invalid_values() {
        for (key, value) in [("_count", "-1"), ("_count", "ten"), ("_offset", "1.5")] {
            let err = Pagination::from_params(&params(&[(key, value)]), 20, 100).unwrap_err();
            assert!(matches!(err, SearchError::InvalidValue { ref param, .. } if param == key));
        }
    }
}
