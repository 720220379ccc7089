//! JSON Patch (RFC 6902) and JSON Merge Patch (RFC 7396) for FHIR resources.
//!
//! Patches are applied to a working copy of the document, so a failure never
//! leaves a partially patched resource behind. After either format is applied
//! the resource identity (`resourceType` and `id`) must be unchanged.
//!
//! # Example
//!
//! ```ignore
//! use octofhir_patch::apply_patch;
//!
//! let patched = apply_patch(
//!     &current,
//!     "application/json-patch+json",
//!     br#"[{"op": "replace", "path": "/status", "value": "active"}]"#,
//! )?;
//! ```

mod error;

pub mod document;
pub mod format;
pub mod merge;
pub mod patch;

use serde_json::Value;

pub use document::{from_document, patch_record, to_document};
pub use error::PatchError;
pub use format::{JSON_PATCH_MEDIA_TYPE, MERGE_PATCH_MEDIA_TYPE, PatchFormat};
pub use merge::{apply_merge_patch, parse_merge_patch};
pub use patch::{PatchOperation, apply_operations, deep_equal, parse_patch};

/// Members a patch may never change.
pub const PROTECTED_FIELDS: [&str; 2] = ["resourceType", "id"];

/// Parses `body` according to `content_type` and applies it to `document`.
///
/// The media type is checked before the body is looked at.
///
/// # Errors
///
/// - `PatchError::UnsupportedMediaType` for an unknown content type
/// - `PatchError::Parse` for a malformed body
/// - any application error, or `PatchError::ProtectedField` if the result
///   changes the resource identity
pub fn apply_patch(document: &Value, content_type: &str, body: &[u8]) -> Result<Value, PatchError> {
    let format = PatchFormat::from_content_type(content_type)?;
    let patched = match format {
        PatchFormat::JsonPatch => {
            let operations = parse_patch(body)?;
            let patched = apply_operations(document, &operations)?;
            tracing::debug!(operations = operations.len(), "applied JSON Patch");
            patched
        }
        PatchFormat::MergePatch => {
            let merge = parse_merge_patch(body)?;
            tracing::debug!("applied JSON Merge Patch");
            apply_merge_patch(document, &merge)
        }
    };
    ensure_identity_unchanged(document, &patched)?;
    Ok(patched)
}

/// Fails if `patched` has a different `resourceType` or `id` than `original`.
///
/// # Errors
///
/// Returns `PatchError::ProtectedField` naming the first changed member.
pub fn ensure_identity_unchanged(original: &Value, patched: &Value) -> Result<(), PatchError> {
    match PROTECTED_FIELDS
        .iter()
        .find(|field| original.get(**field) != patched.get(**field))
    {
        Some(field) => Err(PatchError::ProtectedField {
            field: (*field).to_string(),
        }),
        None => Ok(()),
    }
}
