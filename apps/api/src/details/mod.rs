//! Per-user detail records: declaration, personal details and profile summary.
//!
//! Each record travels as one flat camelCase JSON object. Clients send only
//! the fields they changed; the server merges them into the stored record,
//! checks the required fields, and writes the whole record back.

pub mod declaration;
pub mod handlers;
pub mod personal;
pub mod profile_summary;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub use declaration::DeclarationDetail;
pub use personal::PersonalDetail;
pub use profile_summary::ProfileSummary;

/// A detail record as seen on the wire, shared by the server and the client.
pub trait DetailResource:
    Serialize + DeserializeOwned + Clone + Default + PartialEq + Send + Sync + 'static
{
    /// Endpoint path below `/api/v1/`.
    const PATH: &'static str;
    /// Human-readable name for messages.
    const LABEL: &'static str;

    /// First required field that is blank, if any.
    fn missing_required(&self) -> Option<&'static str>;
}

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("Unknown field '{0}'")]
    UnknownField(String),

    #[error("Patch body must be a JSON object")]
    NotAnObject,

    #[error("Invalid field value: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Overlays the fields of `patch` onto `current`. Unknown keys are rejected;
/// `null` clears optional fields and is a type error on required ones.
pub fn apply_patch<R: DetailResource>(
    current: &R,
    patch: &Map<String, Value>,
) -> Result<R, PatchError> {
    let mut merged = serde_json::to_value(current)?;
    let fields = merged.as_object_mut().ok_or(PatchError::NotAnObject)?;

    for (key, value) in patch {
        if !fields.contains_key(key) {
            return Err(PatchError::UnknownField(key.clone()));
        }
        fields.insert(key.clone(), value.clone());
    }

    Ok(serde_json::from_value(merged)?)
}

pub(crate) fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}
