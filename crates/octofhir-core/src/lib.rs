pub mod error;
pub mod id;
pub mod time;

pub use error::{CoreError, Result};
pub use id::{IdError, generate_id, validate_id};
pub use time::{FhirDateTime, PartialDateTime, Precision, now_utc};
