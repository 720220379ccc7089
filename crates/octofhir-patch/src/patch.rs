//! JSON Patch (RFC 6902).
//!
//! Parsing and the structural operations come from `json-patch`. Operations
//! are applied one at a time so failures carry their index, and `test` is
//! evaluated here with numeric-aware equality.

use json_patch::{PatchErrorKind, patch};
use serde_json::Value;

use crate::error::PatchError;

pub use json_patch::{Patch, PatchOperation};

/// Parses a JSON Patch document.
///
/// The whole document is rejected if it is not an array of well-formed
/// operations; nothing is applied in that case.
///
/// # Errors
///
/// Returns `PatchError::Parse` for malformed JSON, unknown `op` values,
/// missing members and invalid pointers.
pub fn parse_patch(body: &[u8]) -> Result<Vec<PatchOperation>, PatchError> {
    let Patch(operations) = serde_json::from_slice(body)
        .map_err(|e| PatchError::parse(format!("Invalid JSON Patch document: {e}")))?;
    Ok(operations)
}

/// Applies operations strictly in order to a copy of `document`.
///
/// Either every operation succeeds and the patched copy is returned, or the
/// first failure is returned and `document` is left untouched.
///
/// # Errors
///
/// Returns the first operation failure, tagged with its index.
pub fn apply_operations(
    document: &Value,
    operations: &[PatchOperation],
) -> Result<Value, PatchError> {
    let mut working = document.clone();
    for (index, operation) in operations.iter().enumerate() {
        apply_operation(&mut working, operation, index)?;
    }
    Ok(working)
}

fn apply_operation(
    doc: &mut Value,
    operation: &PatchOperation,
    index: usize,
) -> Result<(), PatchError> {
    match operation {
        PatchOperation::Test(test) => {
            let path = test.path.as_str();
            let actual = doc.pointer(path).ok_or_else(|| not_found(path, index))?;
            if deep_equal(actual, &test.value) {
                Ok(())
            } else {
                Err(PatchError::TestFailed {
                    index,
                    path: path.to_string(),
                })
            }
        }
        PatchOperation::Move(op) if doc.pointer(op.from.as_str()).is_none() => {
            Err(not_found(op.from.as_str(), index))
        }
        PatchOperation::Copy(op) if doc.pointer(op.from.as_str()).is_none() => {
            Err(not_found(op.from.as_str(), index))
        }
        _ => patch(doc, std::slice::from_ref(operation)).map_err(|err| match err.kind {
            PatchErrorKind::CannotMoveInsideItself => PatchError::InvalidTarget {
                index,
                message: format!("cannot move into its own child: {}", target(operation)),
            },
            _ => not_found(target(operation), index),
        }),
    }
}

fn target(operation: &PatchOperation) -> &str {
    match operation {
        PatchOperation::Add(op) => op.path.as_str(),
        PatchOperation::Remove(op) => op.path.as_str(),
        PatchOperation::Replace(op) => op.path.as_str(),
        PatchOperation::Move(op) => op.path.as_str(),
        PatchOperation::Copy(op) => op.path.as_str(),
        PatchOperation::Test(op) => op.path.as_str(),
    }
}

fn not_found(path: &str, index: usize) -> PatchError {
    PatchError::PathNotFound {
        index,
        path: path.to_string(),
    }
}

/// Structural equality used by `test`.
///
/// Numbers compare by value, so `1` equals `1.0`. Array order matters,
/// object member order does not.
#[must_use]
pub fn deep_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => {
            if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
                a == b
            } else if let (Some(a), Some(b)) = (a.as_u64(), b.as_u64()) {
                a == b
            } else {
                a.as_f64() == b.as_f64()
            }
        }
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| deep_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| deep_equal(x, y)))
        }
        _ => left == right,
    }
}
