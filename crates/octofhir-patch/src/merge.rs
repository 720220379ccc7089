//! JSON Merge Patch (RFC 7396).

use json_patch::merge;
use serde_json::Value;

use crate::error::PatchError;

/// Parses a merge patch body. Any JSON value is a valid merge patch.
///
/// # Errors
///
/// Returns `PatchError::Parse` for malformed JSON.
pub fn parse_merge_patch(body: &[u8]) -> Result<Value, PatchError> {
    serde_json::from_slice(body)
        .map_err(|e| PatchError::parse(format!("Invalid JSON Merge Patch document: {e}")))
}

/// Applies a merge patch to a copy of `document`.
///
/// `null` members delete the key, object members merge recursively and any
/// other value (arrays included) replaces the target wholesale. A patch that
/// is not an object replaces the whole document.
#[must_use]
pub fn apply_merge_patch(document: &Value, patch: &Value) -> Value {
    let mut working = document.clone();
    merge(&mut working, patch);
    working
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_removes_key() {
        let out = apply_merge_patch(&json!({"status": "draft", "code": "x"}), &json!({"status": null}));
        assert_eq!(out, json!({"code": "x"}));
    }

    #[test]
    fn test_nested_merge_creates_objects() {
        let out = apply_merge_patch(
            &json!({"a": {"keep": 1, "drop": 2}}),
            &json!({"a": {"drop": null, "new": 3}, "b": {"c": {"d": 4, "e": null}}}),
        );
        assert_eq!(out, json!({"a": {"keep": 1, "new": 3}, "b": {"c": {"d": 4}}}));
    }

    #[test]
    fn test_arrays_replace_atomically() {
        let out = apply_merge_patch(&json!({"tags": [1, 2, 3]}), &json!({"tags": [4]}));
        assert_eq!(out, json!({"tags": [4]}));
    }

    #[test]
    fn test_non_object_patch_replaces_document() {
        assert_eq!(apply_merge_patch(&json!({"a": 1}), &json!(["x"])), json!(["x"]));
        assert_eq!(apply_merge_patch(&json!({"a": 1}), &json!(null)), json!(null));
    }

    #[test]
    fn test_object_patch_on_scalar_target() {
        assert_eq!(apply_merge_patch(&json!("text"), &json!({"a": 1})), json!({"a": 1}));
        assert_eq!(
            apply_merge_patch(&json!({"a": 5}), &json!({"a": {"b": 1}})),
            json!({"a": {"b": 1}})
        );
    }

    #[test]
    fn test_idempotent() {
        let doc = json!({"status": "draft", "nested": {"a": 1, "b": [1]}, "gone": true});
        let patch = json!({"status": "active", "nested": {"a": null, "c": {"d": 1}}, "gone": null});
        let once = apply_merge_patch(&doc, &patch);
        let twice = apply_merge_patch(&once, &patch);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_parse_merge_patch() {
        assert_eq!(parse_merge_patch(br#"{"a":null}"#).unwrap(), json!({"a": null}));
        assert!(parse_merge_patch(b"{").unwrap_err().is_parse_error());
    }
}
