//! Resume styling metadata: one optional section per editor, changed only
//! through the `apply` reducer.

pub mod document;
pub mod handlers;
pub mod reducer;

pub use document::ResumeMetadata;
pub use reducer::{apply, SectionPatch};
