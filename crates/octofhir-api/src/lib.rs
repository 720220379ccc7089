//! HTTP-facing types shared by OctoFHIR record handlers.
//!
//! [`ApiError`] is the single error type handlers return. Library errors
//! from storage, patching and search convert into it with the FHIR status
//! codes, and it renders as an `OperationOutcome`.

mod error;
mod outcome;

pub use error::{ApiError, FHIR_JSON};
pub use outcome::{OperationOutcome, OperationOutcomeIssue};
