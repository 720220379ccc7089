//! Conversion between typed resource records and the patchable document tree.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::PatchError;

/// Turns a typed record into its canonical JSON document.
///
/// # Errors
///
/// Returns `PatchError::InvalidResult` if the record cannot be serialized.
pub fn to_document<T: Serialize>(record: &T) -> Result<Value, PatchError> {
    serde_json::to_value(record).map_err(|e| PatchError::InvalidResult(e.to_string()))
}

/// Reads a typed record back out of a (patched) document.
///
/// # Errors
///
/// Returns `PatchError::InvalidResult` if the document no longer matches the
/// record's shape.
pub fn from_document<T: DeserializeOwned>(document: Value) -> Result<T, PatchError> {
    serde_json::from_value(document).map_err(|e| PatchError::InvalidResult(e.to_string()))
}

/// Patches a typed record and returns the full patched record.
///
/// # Errors
///
/// Any error from [`crate::apply_patch`] or from converting the result back.
pub fn patch_record<T>(record: &T, content_type: &str, body: &[u8]) -> Result<T, PatchError>
where
    T: Serialize + DeserializeOwned,
{
    let document = to_document(record)?;
    let patched = crate::apply_patch(&document, content_type, body)?;
    from_document(patched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Goal {
        resource_type: String,
        id: String,
        lifecycle_status: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        note: Vec<String>,
    }

    fn goal() -> Goal {
        Goal {
            resource_type: "Goal".into(),
            id: "g1".into(),
            lifecycle_status: "proposed".into(),
            description: Some("walk daily".into()),
            note: vec!["first".into()],
        }
    }

    #[test]
    fn test_patch_record_keeps_untouched_fields() {
        let body = br#"[{"op": "replace", "path": "/lifecycleStatus", "value": "active"},
                        {"op": "add", "path": "/note/-", "value": "second"}]"#;
        let patched = patch_record(&goal(), "application/json-patch+json", body).unwrap();

        assert_eq!(patched.lifecycle_status, "active");
        assert_eq!(patched.description.as_deref(), Some("walk daily"));
        assert_eq!(patched.note, vec!["first", "second"]);
    }

    #[test]
    fn test_merge_patch_can_clear_optional_fields() {
        let body = br#"{"description": null}"#;
        let patched = patch_record(&goal(), "application/merge-patch+json", body).unwrap();
        assert_eq!(patched.description, None);
        assert_eq!(patched.lifecycle_status, "proposed");
    }

    #[test]
    fn test_result_that_breaks_the_record_is_rejected() {
        let body = br#"[{"op": "remove", "path": "/lifecycleStatus"}]"#;
        let err = patch_record(&goal(), "application/json-patch+json", body).unwrap_err();
        assert!(matches!(err, PatchError::InvalidResult(_)));
    }
}
