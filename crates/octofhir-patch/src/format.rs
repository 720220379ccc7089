//! Selection of the patch format from the request media type.

use std::fmt;

use crate::error::PatchError;

/// Media type of RFC 6902 JSON Patch documents.
pub const JSON_PATCH_MEDIA_TYPE: &str = "application/json-patch+json";

/// Media type of RFC 7396 JSON Merge Patch documents.
pub const MERGE_PATCH_MEDIA_TYPE: &str = "application/merge-patch+json";

/// Supported patch body formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchFormat {
    JsonPatch,
    MergePatch,
}

impl PatchFormat {
    /// Picks the format from a `Content-Type` header value.
    ///
    /// Parameters such as `charset` and letter case are ignored.
    ///
    /// # Errors
    ///
    /// Returns `PatchError::UnsupportedMediaType` for anything other than the
    /// two patch media types, FHIRPath Patch (`application/fhir+json`) included.
    pub fn from_content_type(content_type: &str) -> Result<Self, PatchError> {
        let unsupported = || PatchError::UnsupportedMediaType(content_type.to_string());
        let mime: mime::Mime = content_type.trim().parse().map_err(|_| unsupported())?;
        let essence = mime.essence_str();

        if essence.eq_ignore_ascii_case(JSON_PATCH_MEDIA_TYPE) {
            Ok(Self::JsonPatch)
        } else if essence.eq_ignore_ascii_case(MERGE_PATCH_MEDIA_TYPE) {
            Ok(Self::MergePatch)
        } else {
            Err(unsupported())
        }
    }

    #[must_use]
    pub fn media_type(self) -> &'static str {
        match self {
            Self::JsonPatch => JSON_PATCH_MEDIA_TYPE,
            Self::MergePatch => MERGE_PATCH_MEDIA_TYPE,
        }
    }
}

impl fmt::Display for PatchFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.media_type())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_media_types() {
        assert_eq!(
            PatchFormat::from_content_type("application/json-patch+json").unwrap(),
            PatchFormat::JsonPatch
        );
        assert_eq!(
            PatchFormat::from_content_type("application/merge-patch+json; charset=utf-8").unwrap(),
            PatchFormat::MergePatch
        );
        assert_eq!(
            PatchFormat::from_content_type("Application/JSON-Patch+JSON").unwrap(),
            PatchFormat::JsonPatch
        );
    }

    #[test]
    fn test_unsupported_media_types() {
        for ct in ["application/json", "application/fhir+json", "text/plain", "", "garbage"] {
            let err = PatchFormat::from_content_type(ct).unwrap_err();
            assert_eq!(err, PatchError::UnsupportedMediaType(ct.to_string()));
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(PatchFormat::MergePatch.to_string(), MERGE_PATCH_MEDIA_TYPE);
    }
}
