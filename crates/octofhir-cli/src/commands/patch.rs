use std::fs;

use anyhow::{Context, Result};
use octofhir_patch::{JSON_PATCH_MEDIA_TYPE, MERGE_PATCH_MEDIA_TYPE, apply_patch};
use serde_json::Value;

use crate::cli::{OutputFormat, PatchArgs};
use crate::output::print_value;

/// A patch document that is a JSON array is a JSON Patch; anything else is a merge patch.
pub fn guess_content_type(patch: &[u8]) -> &'static str {
    match patch.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'[') => JSON_PATCH_MEDIA_TYPE,
        _ => MERGE_PATCH_MEDIA_TYPE,
    }
}

pub fn patch_document(resource: &[u8], patch: &[u8], content_type: Option<&str>) -> Result<Value> {
    let document: Value =
        serde_json::from_slice(resource).context("resource file is not valid JSON")?;
    let content_type = content_type.unwrap_or_else(|| guess_content_type(patch));
    let patched = apply_patch(&document, content_type, patch)
        .with_context(|| format!("failed to apply {content_type}"))?;
    Ok(patched)
}

pub fn run(args: &PatchArgs, format: OutputFormat) -> Result<()> {
    let resource =
        fs::read(&args.resource).with_context(|| format!("cannot read {}", args.resource))?;
    let patch = fs::read(&args.patch).with_context(|| format!("cannot read {}", args.patch))?;
    let patched = patch_document(&resource, &patch, args.content_type.as_deref())?;
    print_value(&patched, format);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASIC: &[u8] = br#"{"resourceType": "Basic", "id": "b1", "status": "draft"}"#;

    #[test]
    fn content_type_guess() {
        assert_eq!(guess_content_type(b"  [{\"op\": \"remove\"}]"), JSON_PATCH_MEDIA_TYPE);
        assert_eq!(guess_content_type(b"{\"status\": null}"), MERGE_PATCH_MEDIA_TYPE);
    }

    #[test]
    fn patches_with_guessed_format() {
        let patched = patch_document(
            BASIC,
            br#"[{"op": "replace", "path": "/status", "value": "active"}]"#,
            None,
        )
        .unwrap();
        assert_eq!(patched["status"], "active");

        let merged = patch_document(BASIC, br#"{"status": null}"#, None).unwrap();
        assert!(merged.get("status").is_none());
    }

    #[test]
    fn explicit_content_type_wins() {
        let err = patch_document(BASIC, br#"{"status": null}"#, Some("application/fhir+json"))
            .unwrap_err();
        assert!(format!("{err:#}").contains("application/fhir+json"));
    }

    #[test]
    fn patch_files_are_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let resource = dir.path().join("basic.json");
        let patch = dir.path().join("patch.json");
        fs::write(&resource, BASIC).unwrap();
        fs::write(&patch, br#"{"code": {"text": "x"}}"#).unwrap();

        let args = PatchArgs {
            resource: resource.to_string_lossy().into_owned(),
            patch: patch.to_string_lossy().into_owned(),
            content_type: None,
        };
        assert!(run(&args, OutputFormat::Json).is_ok());
    }
}
