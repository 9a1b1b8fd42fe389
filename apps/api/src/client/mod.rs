//! Editor-side logic for ResumeX forms: fetch on load, validate and diff on
//! submit, and send only what changed.

pub mod diff;
pub mod editor;
pub mod metadata_editor;
pub mod transport;

use thiserror::Error;

pub use diff::changed_fields;
pub use editor::{DetailEditor, SubmitOutcome};
pub use metadata_editor::MetadataEditor;
pub use transport::{ApiClient, Transport};

#[derive(Debug, Error)]
pub enum ClientError {
    /// A required field is blank. Raised before any request is made.
    #[error("{field} is required")]
    Validation { field: &'static str },

    /// The server answered with `success: false`.
    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected response (status {status}): {body}")]
    UnexpectedResponse { status: u16, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No session token found")]
    MissingToken,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
